//! Compile-time macros for SWC programs, compatible with `babel-plugin-macros`.
//!
//! Files import macros like any other module:
//!
//! ```js
//! import preval from './preval.macro';
//! const answer = preval`module.exports = 40 + 2`;
//! ```
//!
//! [`MacrosPlugin::transform`] finds those imports, hands every usage site of the imported
//! bindings to the macro so that it can rewrite them, and removes the import.

pub mod apply_macros;
pub mod config;
pub mod create_macro;
pub mod errors;
pub mod loader;
pub mod looks_like;
pub mod plugin;
pub mod references;
pub mod resolve_path;

#[cfg(test)]
mod test_fixtures;

pub use apply_macros::MacroStatement;
pub use create_macro::{
  create_macro, FileState, Macro, MacroFn, MacroHost, MacroOptions, MacroParams, MacroResult,
};
pub use errors::{MacroError, MacrosError};
pub use loader::{interop_require, LoadMacro, LoadMacroRef, MacroRegistry, ModuleExports};
pub use looks_like::{is_macros_name, looks_like, Shape};
pub use plugin::{IsMacrosName, MacrosPlugin, MacrosPluginOptions};
pub use references::{collect_references, ImportBinding, Reference, References};
pub use resolve_path::{NodeResolvePath, ResolvePath, ResolvePathRef};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::RwLock;
use serde_json::Value;

use crate::create_macro::{Macro, MacroFn};

/// The value a macro module exports
#[derive(Clone)]
pub enum ModuleExports {
  /// A macro wrapped with `create_macro`
  Macro(Macro),
  /// A bare function that was never wrapped with `create_macro`
  Function(Arc<MacroFn>),
  /// Any other value
  Value(Value),
  /// A compiled ES module, whose default export is what callers actually want
  EsModule { default: Option<Box<ModuleExports>> },
}

impl std::fmt::Debug for ModuleExports {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ModuleExports::Macro(macro_) => f.debug_tuple("Macro").field(macro_).finish(),
      ModuleExports::Function(_) => f.write_str("Function"),
      ModuleExports::Value(value) => f.debug_tuple("Value").field(value).finish(),
      ModuleExports::EsModule { default } => f
        .debug_struct("EsModule")
        .field("default", default)
        .finish(),
    }
  }
}

/// Loads the module at a resolved path
#[mockall::automock]
pub trait LoadMacro {
  fn load(&self, path: &Path) -> anyhow::Result<ModuleExports>;
}

pub type LoadMacroRef = Arc<dyn LoadMacro + Send + Sync>;

/// Load a module and unwrap the default export of compiled ES modules
pub fn interop_require(loader: &dyn LoadMacro, path: &Path) -> anyhow::Result<ModuleExports> {
  match loader.load(path)? {
    ModuleExports::EsModule {
      default: Some(default),
    } => Ok(*default),
    exports => Ok(exports),
  }
}

/// Macro modules registered ahead of time, keyed by their resolved path.
///
/// Macros are compiled into the host rather than evaluated, so every module a file may import
/// must be registered before the file is transformed.
#[derive(Debug, Default)]
pub struct MacroRegistry {
  modules: RwLock<HashMap<PathBuf, ModuleExports>>,
}

impl MacroRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&self, path: impl Into<PathBuf>, exports: ModuleExports) {
    self.modules.write().insert(path.into(), exports);
  }

  pub fn register_macro(&self, path: impl Into<PathBuf>, macro_: Macro) {
    self.register(path, ModuleExports::Macro(macro_));
  }
}

impl LoadMacro for MacroRegistry {
  fn load(&self, path: &Path) -> anyhow::Result<ModuleExports> {
    self
      .modules
      .read()
      .get(path)
      .cloned()
      .ok_or_else(|| anyhow!("Cannot find module '{}'", path.display()))
  }
}

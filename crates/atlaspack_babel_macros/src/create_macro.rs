use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use swc_core::common::sync::Lrc;
use swc_core::common::{Mark, SourceMap};
use swc_core::ecma::ast::Program;

use crate::errors::{MacroError, MacrosError};
use crate::references::References;

/// Compiler handles forwarded to macros so they can create and resolve new syntax
#[derive(Clone)]
pub struct MacroHost {
  pub source_map: Lrc<SourceMap>,
  /// Mark of identifiers that do not resolve to any binding
  pub unresolved_mark: Mark,
  /// Mark of top-level bindings
  pub global_mark: Mark,
}

/// State of the file being transformed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileState {
  pub filename: Option<PathBuf>,
}

impl FileState {
  pub fn new(filename: impl Into<PathBuf>) -> Self {
    FileState {
      filename: Some(filename.into()),
    }
  }

  /// Absolute path of the file. Unnamed input is treated as a file in `cwd`.
  pub(crate) fn full_filename(&self, cwd: &Path) -> PathBuf {
    match &self.filename {
      Some(filename) if filename.is_absolute() => filename.clone(),
      Some(filename) => cwd.join(filename),
      None => cwd.join("index"),
    }
  }
}

/// Everything a macro receives when it is invoked
pub struct MacroParams<'a> {
  /// Usage sites of each imported name
  pub references: &'a References,
  /// The import source the macro was loaded from, as written in the file
  pub source: &'a str,
  /// The whole program, which the macro rewrites in place
  pub program: &'a mut Program,
  pub state: &'a FileState,
  pub host: &'a MacroHost,
  /// Merged config for macros that declared a `config_name`
  pub config: Option<&'a Value>,
  /// Only true when invoked by the macros plugin
  pub is_babel_macros_call: bool,
}

/// What a macro asks the plugin to do with the statement that imported it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MacroResult {
  pub keep_imports: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MacroOptions {
  /// Section of the project and plugin configuration this macro reads
  pub config_name: Option<String>,
}

pub type MacroFn = dyn Fn(MacroParams<'_>) -> anyhow::Result<Option<MacroResult>> + Send + Sync;

/// A macro implementation wrapped with [`create_macro`]
#[derive(Clone)]
pub struct Macro {
  implementation: Arc<MacroFn>,
  options: MacroOptions,
}

impl fmt::Debug for Macro {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Macro")
      .field("options", &self.options)
      .finish_non_exhaustive()
  }
}

/// Wrap a macro implementation so that it can only run when invoked by the macros plugin.
///
/// Fails when `options.config_name` is `"options"`, which is reserved for the plugin's own options.
pub fn create_macro<F>(implementation: F, options: MacroOptions) -> Result<Macro, MacrosError>
where
  F: Fn(MacroParams<'_>) -> anyhow::Result<Option<MacroResult>> + Send + Sync + 'static,
{
  if options.config_name.as_deref() == Some("options") {
    return Err(MacrosError::ReservedConfigName);
  }

  Ok(Macro {
    implementation: Arc::new(implementation),
    options,
  })
}

impl Macro {
  pub fn is_babel_macro(&self) -> bool {
    true
  }

  pub fn options(&self) -> &MacroOptions {
    &self.options
  }

  /// Run the macro. Calls that do not come from the macros plugin fail with a [`MacroError`].
  pub fn call(&self, params: MacroParams<'_>) -> anyhow::Result<Option<MacroResult>> {
    if !params.is_babel_macros_call {
      return Err(MacroError::outside_compilation(params.source).into());
    }

    (self.implementation)(params)
  }
}

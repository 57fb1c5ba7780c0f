use once_cell::sync::Lazy;
use regex::Regex;
use swc_core::common::SyntaxContext;
use swc_core::ecma::ast::Program;
use swc_core::ecma::atoms::Atom;

use crate::config::get_config;
use crate::create_macro::{FileState, MacroHost, MacroParams, MacroResult};
use crate::errors::{MacroError, MacrosError};
use crate::loader::{interop_require, ModuleExports};
use crate::plugin::MacrosPlugin;
use crate::references::{collect_references, ImportBinding};

/// Everything but the package name of a bare import source, e.g. `@org/package/macro` ->
/// `@org/package`
static PACKAGE_NAME: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^((?:@[^/]+/)?[^/]+).*").unwrap());

/// An import or require of a macro module found in the program
#[derive(Clone, Debug, PartialEq)]
pub struct MacroStatement {
  /// The import source, as written
  pub source: Atom,
  pub imports: Vec<ImportBinding>,
  /// Syntax context the statement's bindings were resolved into
  pub scope: SyntaxContext,
}

impl MacrosPlugin {
  /// Resolve, load and invoke the macro imported by `statement`.
  ///
  /// Returns `None` without loading anything when none of the imported bindings are used, or when
  /// the macro itself returns nothing.
  #[tracing::instrument(level = "debug", skip_all, fields(source = %statement.source))]
  pub(crate) fn apply_macros(
    &self,
    program: &mut Program,
    statement: &MacroStatement,
    state: &FileState,
    host: &MacroHost,
  ) -> Result<Option<MacroResult>, MacrosError> {
    let references = collect_references(program, statement.scope, &statement.imports);
    if !references.has_references() {
      tracing::debug!("Skipping macro without references");
      return Ok(None);
    }

    let source = &*statement.source;
    let cwd = self
      .fs
      .cwd()
      .map_err(|error| MacrosError::Resolve(error.into()))?;
    let filename = state.full_filename(&cwd);
    let basedir = filename.parent().unwrap_or(cwd.as_path());

    let require_path = self
      .resolve_path
      .resolve_path(source, basedir)
      .map_err(MacrosError::Resolve)?;

    let macro_ = match interop_require(&*self.require, &require_path).map_err(MacrosError::Load)? {
      ModuleExports::Macro(macro_) => macro_,
      _ => {
        return Err(MacrosError::NotWrapped {
          import_source: source.to_string(),
        })
      }
    };

    let config = get_config(
      macro_.options().config_name.as_deref(),
      basedir,
      source,
      &self.config,
      self.config_explorer(),
    )?;

    tracing::debug!("Invoking macro from {}", require_path.display());

    macro_
      .call(MacroParams {
        references: &references,
        source,
        program,
        state,
        host,
        config: config.as_ref(),
        is_babel_macros_call: true,
      })
      .map_err(|error| macro_failed(source, error))
  }
}

/// Errors raised with [`MacroError`] are surfaced as they are. Anything else is prefixed with the
/// import source, plus a link to the package for macros that come from npm.
fn macro_failed(source: &str, error: anyhow::Error) -> MacrosError {
  match error.downcast::<MacroError>() {
    Ok(error) => MacrosError::Macro(error),
    Err(error) => {
      let mut message = format!("{source}: {error}");
      if !source.starts_with('.') {
        let package = PACKAGE_NAME.replace(source, "$1");
        message.push_str(&format!(" Learn more: https://www.npmjs.com/package/{package}"));
      }

      MacrosError::MacroFailed {
        message,
        cause: error.into(),
      }
    }
  }
}

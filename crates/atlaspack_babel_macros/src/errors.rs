use std::path::PathBuf;

pub(crate) const USER_DOCS_URL: &str =
  "https://github.com/kentcdodds/babel-plugin-macros/blob/master/other/docs/user.md";

pub(crate) const AUTHOR_DOCS_URL: &str =
  "https://github.com/kentcdodds/babel-plugin-macros/blob/master/other/docs/author.md#writing-a-macro";

/// An error raised by a macro author, or by a macro invoked outside of the macros plugin.
///
/// These errors are surfaced to the user verbatim. Any other error returned from a macro is
/// prefixed with the import source it was loaded from.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct MacroError {
  message: String,
}

impl MacroError {
  pub fn new(message: impl Into<String>) -> Self {
    MacroError {
      message: message.into(),
    }
  }

  pub(crate) fn outside_compilation(source: &str) -> Self {
    MacroError::new(format!(
      "The macro you imported from \"{source}\" is being executed outside the context of compilation with babel-plugin-macros. \
       This indicates that you don't have the babel plugin \"babel-plugin-macros\" configured correctly. \
       Please see the documentation for how to configure babel-plugin-macros properly: {USER_DOCS_URL}"
    ))
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

/// Every way applying macros to a file can fail. All of them abort the transformation of the file.
#[derive(Debug, thiserror::Error)]
pub enum MacrosError {
  /// Raised by a macro author, or a macro called outside of compilation
  #[error(transparent)]
  Macro(#[from] MacroError),

  #[error(
    "The macro imported from \"{import_source}\" must be wrapped in createMacro \
     which you can get from \"babel-plugin-macros\". \
     Please refer to the documentation to see how to do this properly: {docs}",
    docs = AUTHOR_DOCS_URL
  )]
  NotWrapped { import_source: String },

  #[error("You cannot use the configName \"options\". It is reserved for babel-plugin-macros.")]
  ReservedConfigName,

  /// The import source could not be resolved to a module
  #[error(transparent)]
  Resolve(anyhow::Error),

  /// The resolved module could not be loaded
  #[error(transparent)]
  Load(anyhow::Error),

  #[error("{0}")]
  UnsupportedBinding(&'static str),

  #[error(
    "{} specified a {config_name} config of type {found}, but the macros plugin's \
     options.{config_name} did contain an object. \
     Both configs must contain objects for their options to be mergeable.",
    .path.display()
  )]
  ConfigMismatch {
    path: PathBuf,
    config_name: String,
    found: &'static str,
  },

  /// Searching for a config file failed and the plugin options had nothing to offer instead
  #[error(transparent)]
  ConfigLookup(anyhow::Error),

  /// Any other error returned from a macro, with the import source prepended to its message
  #[error("{message}")]
  MacroFailed {
    message: String,
    #[source]
    cause: Box<dyn std::error::Error + Send + Sync>,
  },
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail};
use atlaspack_filesystem::FileSystemRef;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::errors::MacrosError;

/// Files searched for in each directory, in order of preference
pub const SEARCH_PLACES: [&str; 7] = [
  "package.json",
  ".babel-plugin-macrosrc",
  ".babel-plugin-macrosrc.json",
  ".babel-plugin-macrosrc.yaml",
  ".babel-plugin-macrosrc.yml",
  ".babel-plugin-macrosrc.js",
  "babel-plugin-macros.config.js",
];

/// The `package.json` field holding macros configuration
const PACKAGE_PROP: &str = "babelMacros";

/// A configuration file found by [`ConfigExplorer::search`]
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedConfig {
  /// Mapping from config name to the configuration of that macro
  pub config: Value,
  pub filepath: PathBuf,
}

/// Searches for project-wide macros configuration, starting from a directory and walking up to
/// the file-system root.
///
/// Results are cached per directory, so the explorer should live as long as the files it is used
/// for are not expected to change.
#[derive(Debug)]
pub struct ConfigExplorer {
  fs: FileSystemRef,
  cache: Mutex<HashMap<PathBuf, Option<LoadedConfig>>>,
}

impl ConfigExplorer {
  pub fn new(fs: FileSystemRef) -> Self {
    ConfigExplorer {
      fs,
      cache: Mutex::new(HashMap::new()),
    }
  }

  /// Find the closest configuration file to `directory`.
  ///
  /// Returns `None` when there is no configuration anywhere up the tree. Files that exist but
  /// cannot be loaded are errors, and are not cached.
  pub fn search(&self, directory: &Path) -> anyhow::Result<Option<LoadedConfig>> {
    let mut visited = Vec::new();
    let mut result = None;

    for dir in directory.ancestors() {
      let cached = self.cache.lock().get(dir).cloned();
      if let Some(cached) = cached {
        result = cached;
        break;
      }

      visited.push(dir.to_path_buf());

      if let Some(loaded) = self.search_directory(dir)? {
        tracing::debug!("Found macros config at {}", loaded.filepath.display());
        result = Some(loaded);
        break;
      }
    }

    let mut cache = self.cache.lock();
    for dir in visited {
      cache.insert(dir, result.clone());
    }

    Ok(result)
  }

  fn search_directory(&self, dir: &Path) -> anyhow::Result<Option<LoadedConfig>> {
    for place in SEARCH_PLACES {
      let filepath = dir.join(place);
      if !self.fs.is_file(&filepath) {
        continue;
      }

      if let Some(config) = self.load(place, &filepath)? {
        return Ok(Some(LoadedConfig { config, filepath }));
      }
    }

    Ok(None)
  }

  /// Load a single search place. Empty files, and package.json files without a `babelMacros`
  /// field, hold no config.
  fn load(&self, place: &str, filepath: &Path) -> anyhow::Result<Option<Value>> {
    if place.ends_with(".js") {
      bail!(
        "Unable to load {}: JavaScript config files are not supported",
        filepath.display()
      );
    }

    let contents = self.fs.read_to_string(filepath)?;
    if contents.trim().is_empty() {
      return Ok(None);
    }

    let parse_error = |error: &dyn std::fmt::Display| {
      anyhow!("Error parsing {}: {error}", filepath.display())
    };

    let config = match place {
      "package.json" => {
        let package_json: Value =
          serde_json::from_str(&contents).map_err(|error| parse_error(&error))?;

        match package_json {
          Value::Object(mut fields) => fields.remove(PACKAGE_PROP),
          _ => None,
        }
      }
      ".babel-plugin-macrosrc" => Some(
        serde_json5::from_str::<Value>(&contents)
          .or_else(|_| serde_yml::from_str::<Value>(&contents))
          .map_err(|error| parse_error(&error))?,
      ),
      ".babel-plugin-macrosrc.json" => {
        Some(serde_json::from_str(&contents).map_err(|error| parse_error(&error))?)
      }
      _ => Some(serde_yml::from_str(&contents).map_err(|error| parse_error(&error))?),
    };

    Ok(config)
  }
}

/// Name of a config value's type, for error messages
fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

fn is_mergeable(value: &Value) -> bool {
  value.is_object() || value.is_null()
}

/// The `config_name` section of the plugin options. Anything other than an object or null is
/// ignored.
fn get_config_from_options(config_name: &str, options: &Map<String, Value>) -> Option<Value> {
  let value = options.get(config_name)?;

  if !is_mergeable(value) {
    tracing::error!("The macro plugin options' {config_name} property was not an object or null.");
    return None;
  }

  Some(value.clone())
}

/// Resolve the configuration of a macro that declared `config_name`.
///
/// The section is read from both the closest configuration file to `directory` and the plugin
/// options. When both are objects they are merged, with the file's keys taking precedence. Macros
/// without a config name get no config at all.
pub fn get_config(
  config_name: Option<&str>,
  directory: &Path,
  source: &str,
  options: &Map<String, Value>,
  explorer: &ConfigExplorer,
) -> Result<Option<Value>, MacrosError> {
  let Some(config_name) = config_name else {
    return Ok(None);
  };

  let options_config = get_config_from_options(config_name, options);

  let file_config = match explorer.search(directory) {
    Ok(loaded) => loaded.and_then(|loaded| {
      let section = loaded.config.get(config_name).cloned()?;
      Some((section, loaded.filepath))
    }),
    Err(error) => {
      if options_config.is_none() {
        tracing::error!(
          "There was an error trying to load the config \"{config_name}\" for the macro imported from \"{source}\". \
           Please see the error thrown for more information."
        );
        return Err(MacrosError::ConfigLookup(error));
      }

      tracing::debug!("Ignoring macros config error in favour of plugin options: {error}");
      None
    }
  };

  match (file_config, options_config) {
    (Some((file, path)), Some(_)) if !is_mergeable(&file) => Err(MacrosError::ConfigMismatch {
      path,
      config_name: config_name.to_string(),
      found: type_name(&file),
    }),
    (Some((file, path)), None) if !is_mergeable(&file) => {
      tracing::error!(
        "{} specified a {config_name} config of type {} which was not an object or null, ignoring it.",
        path.display(),
        type_name(&file)
      );
      Ok(Some(Value::Object(Map::new())))
    }
    (file_config, options_config) => {
      let mut merged = Map::new();

      for side in [options_config, file_config.map(|(file, _)| file)] {
        if let Some(Value::Object(fields)) = side {
          merged.extend(fields);
        }
      }

      Ok(Some(Value::Object(merged)))
    }
  }
}

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

/// In-memory file-system for testing
pub mod in_memory_file_system;

/// File-system implementation using std::fs
pub mod os_file_system;

/// FileSystem abstraction instance
///
/// This should be `OsFileSystem` for non-testing environments and `InMemoryFileSystem` for testing.
pub type FileSystemRef = Arc<dyn FileSystem + Send + Sync>;

/// Trait abstracting the read-only file-system operations needed to resolve macro modules and
/// search for macro configuration.
pub trait FileSystem: std::fmt::Debug {
  fn cwd(&self) -> std::io::Result<PathBuf>;
  /// Absolute path of an existing entry with all symlinks resolved
  fn canonicalize(&self, path: &Path) -> std::io::Result<PathBuf>;
  fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
  fn is_file(&self, path: &Path) -> bool;
  fn is_dir(&self, path: &Path) -> bool;
}

/// Lexically join `path` onto `base` and drop any `.` and `..` components.
///
/// No symlinks are followed and the path does not need to exist.
pub fn normalize_path(base: &Path, path: &Path) -> PathBuf {
  let mut result: Vec<Component> = if path.is_absolute() {
    vec![]
  } else {
    base.components().collect()
  };

  for component in path.components() {
    match component {
      Component::Prefix(prefix) => {
        result = vec![Component::Prefix(prefix)];
      }
      Component::RootDir => {
        result.push(Component::RootDir);
      }
      Component::CurDir => {}
      Component::ParentDir => {
        if !matches!(result.last(), Some(Component::RootDir) | None) {
          result.pop();
        }
      }
      Component::Normal(name) => {
        result.push(Component::Normal(name));
      }
    }
  }

  PathBuf::from_iter(result)
}

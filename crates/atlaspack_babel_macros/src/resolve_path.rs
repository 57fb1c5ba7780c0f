use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use atlaspack_filesystem::FileSystemRef;
use oxc_resolver::{FileMetadata, ResolveError, ResolveOptions, ResolverGeneric};

/// Extensions tried, in order, when a specifier does not name a file exactly
pub const EXTENSIONS: [&str; 6] = [".js", ".ts", ".tsx", ".mjs", ".cjs", ".jsx"];

/// Resolves the source of a macro import to the path of the module that implements it
#[mockall::automock]
pub trait ResolvePath {
  fn resolve_path(&self, source: &str, basedir: &Path) -> anyhow::Result<PathBuf>;
}

pub type ResolvePathRef = Arc<dyn ResolvePath + Send + Sync>;

/// Exposes a [`FileSystemRef`] to `oxc_resolver`
struct ResolverFileSystem(FileSystemRef);

impl ResolverFileSystem {
  fn entry_metadata(&self, path: &Path, is_symlink: bool) -> io::Result<FileMetadata> {
    if self.0.is_file(path) {
      Ok(FileMetadata::new(true, false, is_symlink))
    } else if self.0.is_dir(path) {
      Ok(FileMetadata::new(false, true, is_symlink))
    } else {
      Err(io::Error::new(io::ErrorKind::NotFound, "File not found"))
    }
  }
}

impl oxc_resolver::FileSystem for ResolverFileSystem {
  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    self.0.read_to_string(path)
  }

  fn metadata(&self, path: &Path) -> io::Result<FileMetadata> {
    self.entry_metadata(path, false)
  }

  // Any path that does not canonicalize to itself goes through a link, which is all the
  // resolver needs to decide whether to ask for the real path
  fn symlink_metadata(&self, path: &Path) -> io::Result<FileMetadata> {
    let is_symlink = self.0.canonicalize(path)? != path;
    self.entry_metadata(path, is_symlink)
  }

  fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
    self.0.canonicalize(path)
  }
}

/// Node module resolution over a `FileSystem`, backed by `oxc_resolver`.
///
/// Relative and absolute sources are resolved against `basedir`. Package sources are looked up in
/// the `node_modules` directories of `basedir` and its ancestors, then in `paths`, which lets a
/// globally installed compiler find macros installed next to it. Resolved paths have their
/// symlinks resolved, so packages linked into `node_modules` resolve to their real location.
pub struct NodeResolvePath {
  fs: FileSystemRef,
  paths: Vec<PathBuf>,
  resolver: ResolverGeneric<ResolverFileSystem>,
}

impl fmt::Debug for NodeResolvePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NodeResolvePath")
      .field("paths", &self.paths)
      .finish()
  }
}

impl NodeResolvePath {
  pub fn new(fs: FileSystemRef) -> Self {
    Self::with_file_system(fs, install_location().into_iter().collect())
  }

  /// Replace the fallback search paths
  pub fn with_paths(self, paths: Vec<PathBuf>) -> Self {
    Self::with_file_system(self.fs, paths)
  }

  fn with_file_system(fs: FileSystemRef, paths: Vec<PathBuf>) -> Self {
    let modules = std::iter::once(String::from("node_modules"))
      .chain(paths.iter().map(|path| path.to_string_lossy().into_owned()))
      .collect();

    let options = ResolveOptions {
      extensions: EXTENSIONS.iter().map(|extension| extension.to_string()).collect(),
      modules,
      ..ResolveOptions::default()
    };

    NodeResolvePath {
      resolver: ResolverGeneric::new_with_file_system(ResolverFileSystem(fs.clone()), options),
      fs,
      paths,
    }
  }
}

impl ResolvePath for NodeResolvePath {
  fn resolve_path(&self, source: &str, basedir: &Path) -> anyhow::Result<PathBuf> {
    match self.resolver.resolve(basedir, source) {
      Ok(resolution) => Ok(resolution.into_path_buf()),
      Err(ResolveError::NotFound(_)) => Err(anyhow!(
        "Cannot find module '{source}' from '{}'",
        basedir.display()
      )),
      Err(error) => Err(anyhow!(error)),
    }
  }
}

/// The `node_modules` directory this binary was installed into, if any
fn install_location() -> Option<PathBuf> {
  let exe = std::env::current_exe().ok()?;
  exe
    .ancestors()
    .find(|dir| dir.file_name().is_some_and(|name| name == "node_modules"))
    .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use assert_fs::prelude::*;
  use assert_fs::TempDir;
  use atlaspack_filesystem::in_memory_file_system::InMemoryFileSystem;
  use atlaspack_filesystem::os_file_system::OsFileSystem;
  use pretty_assertions::assert_eq;

  use super::*;

  fn resolver(files: &[(&str, &str)]) -> NodeResolvePath {
    let fs = InMemoryFileSystem::default();
    for (path, contents) in files {
      fs.write_file(Path::new(path), *contents);
    }

    NodeResolvePath::new(Arc::new(fs)).with_paths(vec![])
  }

  #[test]
  fn test_resolves_relative_sources_with_extensions() {
    let resolver = resolver(&[("/project/src/fixtures/eval.macro.ts", "")]);

    assert_eq!(
      resolver
        .resolve_path("./fixtures/eval.macro", Path::new("/project/src"))
        .unwrap(),
      PathBuf::from("/project/src/fixtures/eval.macro.ts")
    );
  }

  #[test]
  fn test_prefers_exact_files_then_extension_order() {
    let resolver = resolver(&[
      ("/project/src/eval.macro", ""),
      ("/project/src/eval.macro.js", ""),
      ("/project/src/other.macro.cjs", ""),
      ("/project/src/other.macro.mjs", ""),
    ]);

    assert_eq!(
      resolver
        .resolve_path("./eval.macro", Path::new("/project/src"))
        .unwrap(),
      PathBuf::from("/project/src/eval.macro")
    );
    assert_eq!(
      resolver
        .resolve_path("../src/other.macro", Path::new("/project/src"))
        .unwrap(),
      PathBuf::from("/project/src/other.macro.mjs")
    );
  }

  #[test]
  fn test_resolves_packages_from_node_modules() {
    let resolver = resolver(&[
      ("/project/node_modules/fake/macro.js", ""),
      ("/project/node_modules/@scope/pkg/macro/index.js", ""),
    ]);

    assert_eq!(
      resolver
        .resolve_path("fake/macro", Path::new("/project/src/nested"))
        .unwrap(),
      PathBuf::from("/project/node_modules/fake/macro.js")
    );
    assert_eq!(
      resolver
        .resolve_path("@scope/pkg/macro", Path::new("/project/src"))
        .unwrap(),
      PathBuf::from("/project/node_modules/@scope/pkg/macro/index.js")
    );
  }

  #[test]
  fn test_resolves_package_main() {
    let resolver = resolver(&[
      (
        "/project/node_modules/eval.macro/package.json",
        r#"{ "main": "dist/eval" }"#,
      ),
      ("/project/node_modules/eval.macro/dist/eval.js", ""),
    ]);

    assert_eq!(
      resolver
        .resolve_path("eval.macro", Path::new("/project/src"))
        .unwrap(),
      PathBuf::from("/project/node_modules/eval.macro/dist/eval.js")
    );
  }

  #[test]
  fn test_falls_back_to_the_search_paths() {
    let resolver = resolver(&[("/global/node_modules/fake/macro.js", "")])
      .with_paths(vec![PathBuf::from("/global/node_modules")]);

    assert_eq!(
      resolver
        .resolve_path("fake/macro", Path::new("/project/src"))
        .unwrap(),
      PathBuf::from("/global/node_modules/fake/macro.js")
    );
  }

  #[test]
  fn test_prefers_package_main_over_index() {
    let resolver = resolver(&[
      (
        "/project/node_modules/eval.macro/package.json",
        r#"{ "main": "lib" }"#,
      ),
      ("/project/node_modules/eval.macro/index.js", ""),
      ("/project/node_modules/eval.macro/lib/index.cjs", ""),
    ]);

    assert_eq!(
      resolver
        .resolve_path("eval.macro", Path::new("/project/src"))
        .unwrap(),
      PathBuf::from("/project/node_modules/eval.macro/lib/index.cjs")
    );
  }

  #[cfg(unix)]
  #[test]
  fn test_resolves_linked_packages_to_their_real_path() {
    let dir = TempDir::new().unwrap();
    dir
      .child(".pnpm/eval.macro/node_modules/eval.macro/index.js")
      .touch()
      .unwrap();
    dir.child("project/src").create_dir_all().unwrap();
    dir.child("project/node_modules").create_dir_all().unwrap();
    std::os::unix::fs::symlink(
      dir.path().join(".pnpm/eval.macro/node_modules/eval.macro"),
      dir.path().join("project/node_modules/eval.macro"),
    )
    .unwrap();

    let root = std::fs::canonicalize(dir.path()).unwrap();
    let resolver = NodeResolvePath::new(Arc::new(OsFileSystem)).with_paths(vec![]);

    assert_eq!(
      resolver
        .resolve_path("eval.macro", &root.join("project/src"))
        .unwrap(),
      root.join(".pnpm/eval.macro/node_modules/eval.macro/index.js")
    );
  }

  #[test]
  fn test_fails_for_missing_modules() {
    let resolver = resolver(&[]);

    assert_eq!(
      resolver
        .resolve_path("./missing.macro", Path::new("/project/src"))
        .map_err(|error| error.to_string()),
      Err(String::from(
        "Cannot find module './missing.macro' from '/project/src'"
      ))
    );
    assert_eq!(
      resolver
        .resolve_path("missing.macro", Path::new("/project/src"))
        .map_err(|error| error.to_string()),
      Err(String::from(
        "Cannot find module 'missing.macro' from '/project/src'"
      ))
    );
  }
}

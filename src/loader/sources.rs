use std::collections::HashMap;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::LoaderError;
use crate::output::normalize_path;

/// Where stylesheet sources are read from.
pub trait Sources: Send + Sync + 'static {
    fn read(&self, path: &Utf8Path) -> io::Result<String>;

    fn is_file(&self, path: &Utf8Path) -> bool {
        self.read(path).is_ok()
    }

    fn is_dir(&self, _path: &Utf8Path) -> bool {
        false
    }
}

/// Reads sources from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSources;

impl Sources for FsSources {
    fn read(&self, path: &Utf8Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn is_file(&self, path: &Utf8Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        path.is_dir()
    }
}

/// Sources kept in memory, keyed by normalized absolute path.
#[derive(Debug, Clone, Default)]
pub struct MemorySources {
    files: HashMap<Utf8PathBuf, String>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl AsRef<Utf8Path>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Utf8Path>, source: impl Into<String>) {
        self.files
            .insert(normalize_path(path.as_ref()), source.into());
    }
}

impl Sources for MemorySources {
    fn read(&self, path: &Utf8Path) -> io::Result<String> {
        self.files
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no source for {path}"))
            })
    }

    fn is_file(&self, path: &Utf8Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        let path = normalize_path(path);
        self.files
            .keys()
            .any(|file| file != &path && file.starts_with(&path))
    }
}

/// Read a stylesheet, compiling Sass sources to CSS first.
///
/// Returns the CSS together with every other file read to produce it.
pub(crate) fn read_stylesheet(
    sources: &dyn Sources,
    path: &Utf8Path,
) -> Result<(String, Vec<Utf8PathBuf>), LoaderError> {
    let source = sources
        .read(path)
        .map_err(|e| LoaderError::Source(path.to_owned(), e))?;

    match path.extension() {
        #[cfg(feature = "grass")]
        Some("scss" | "sass") => super::scss::compile(sources, path, source),
        _ => Ok((source, Vec::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sources() {
        let sources = MemorySources::new().with("/p/src/./a.css", ".a{}");

        assert_eq!(sources.read(Utf8Path::new("/p/src/a.css")).unwrap(), ".a{}");
        assert_eq!(
            sources.read(Utf8Path::new("/p/src/b.css")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        assert!(sources.is_file(Utf8Path::new("/p/src/a.css")));
        assert!(!sources.is_file(Utf8Path::new("/p/src")));
        assert!(sources.is_dir(Utf8Path::new("/p/src")));
        assert!(sources.is_dir(Utf8Path::new("/p")));
        assert!(!sources.is_dir(Utf8Path::new("/p/src/a.css")));
        assert!(!sources.is_dir(Utf8Path::new("/p/sr")));
    }

    #[test]
    fn test_read_stylesheet_missing() {
        let sources = MemorySources::new();
        let err = read_stylesheet(&sources, Utf8Path::new("/p/missing.css")).unwrap_err();
        assert!(matches!(err, LoaderError::Source(..)));
    }

    #[test]
    fn test_fs_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("a.wxss")).unwrap();
        fs::write(&path, ".a{}").unwrap();

        let (css, partials) = read_stylesheet(&FsSources, &path).unwrap();
        assert_eq!(css, ".a{}");
        assert!(partials.is_empty());
        assert!(FsSources.is_file(&path));
        assert!(!FsSources.is_dir(&path));
    }
}

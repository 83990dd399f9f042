use std::cell::RefCell;
use std::fmt;
use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::LoaderError;
use crate::loader::Sources;
use crate::output::normalize_path;

/// Lets Sass load partials through [`Sources`], remembering what it read.
struct SourcesFs<'a> {
    sources: &'a dyn Sources,
    read: RefCell<Vec<Utf8PathBuf>>,
}

impl fmt::Debug for SourcesFs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourcesFs")
            .field("read", &self.read)
            .finish_non_exhaustive()
    }
}

impl grass::Fs for SourcesFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        Utf8Path::from_path(path).is_some_and(|path| self.sources.is_dir(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        Utf8Path::from_path(path).is_some_and(|path| self.sources.is_file(path))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = Utf8Path::from_path(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("{} is not UTF-8", path.display()))
        })?;
        let source = self.sources.read(path)?;

        let path = normalize_path(path);
        let mut read = self.read.borrow_mut();
        if !read.contains(&path) {
            read.push(path);
        }

        Ok(source.into_bytes())
    }
}

/// Compile Sass source to plain CSS, resolving `@use` relative to the file.
///
/// Also returns the partials loaded along the way.
pub(crate) fn compile(
    sources: &dyn Sources,
    path: &Utf8Path,
    source: String,
) -> Result<(String, Vec<Utf8PathBuf>), LoaderError> {
    let syntax = match path.extension() {
        Some("sass") => grass::InputSyntax::Sass,
        _ => grass::InputSyntax::Scss,
    };

    let fs = SourcesFs {
        sources,
        read: RefCell::new(Vec::new()),
    };

    let mut options = grass::Options::default().input_syntax(syntax).fs(&fs);
    if let Some(dir) = path.parent() {
        options = options.load_path(dir);
    }

    let css = grass::from_string(source, &options)
        .map_err(|e| LoaderError::Scss(path.to_owned(), e))?;

    Ok((css, fs.read.into_inner()))
}

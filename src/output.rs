//! Utilities for working with output paths.
//!
//! Every path that ends up in emitted text is built here, in forward-slash
//! form, so that two runs on different platforms produce identical output.

use std::fs;
use std::io;

use camino::Utf8Component;
use camino::{Utf8Path, Utf8PathBuf};

/// Convert any backslash separators to forward slashes.
pub fn to_posix(path: impl AsRef<str>) -> String {
    path.as_ref().replace('\\', "/")
}

/// Strip the extension from a path, keeping the directory and stem.
pub fn strip_extension(path: &Utf8Path) -> Utf8PathBuf {
    match path.extension() {
        Some(_) => path.with_extension(""),
        None => path.to_path_buf(),
    }
}

/// Normalize a path, removing things like `.` and `..`.
///
/// CAUTION: This does not resolve symlinks (unlike [`std::fs::canonicalize`]).
/// This may cause incorrect or surprising behavior at times. This should be
/// used carefully. Unfortunately, [`std::fs::canonicalize`] can be hard to use
/// correctly, since it can often fail, or on Windows returns annoying device
/// paths.
///
/// Adapted from
/// <https://github.com/rust-lang/cargo/blob/f7acf448fc127df9a77c52cc2bba027790ac4931/crates/cargo-util/src/paths.rs#L76-L116>
pub(crate) fn normalize_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Utf8Component::Prefix(..)) = components.peek().cloned() {
        components.next();
        Utf8PathBuf::from(c.as_str())
    } else {
        Utf8PathBuf::new()
    };

    for component in components {
        match component {
            Utf8Component::Prefix(..) => unreachable!(),
            Utf8Component::RootDir => {
                ret.push(Utf8Component::RootDir);
            }
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if ret.ends_with(Utf8Component::ParentDir) {
                    ret.push(Utf8Component::ParentDir);
                } else {
                    let popped = ret.pop();
                    if !popped && !ret.has_root() {
                        ret.push(Utf8Component::ParentDir);
                    }
                }
            }
            Utf8Component::Normal(c) => {
                ret.push(c);
            }
        }
    }
    ret
}

/// Resolve `path` against `base`, the way `path.resolve(base, path)` does.
pub(crate) fn resolve_path(base: &Utf8Path, path: impl AsRef<Utf8Path>) -> Utf8PathBuf {
    let path = Utf8PathBuf::from(to_posix(path.as_ref()));
    normalize_path(&base.join(path))
}

/// Compute the path leading from the directory `from` to `to`.
///
/// Both paths are normalized first. The result is always in posix form and is
/// empty when both point at the same location.
pub fn relative_path(from: impl AsRef<Utf8Path>, to: impl AsRef<Utf8Path>) -> String {
    let from = normalize_path(&Utf8PathBuf::from(to_posix(from.as_ref())));
    let to = normalize_path(&Utf8PathBuf::from(to_posix(to.as_ref())));

    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from.len() {
        parts.push("..");
    }
    for component in &to[common..] {
        parts.push(component.as_str());
    }

    parts.join("/")
}

/// The parent directory of an output name, empty for names at the root.
pub(crate) fn output_dir(name: &str) -> &str {
    match name.rfind('/') {
        Some(i) => &name[..i],
        None => "",
    }
}

/// Baidu requires relative references to start with a dot.
pub fn fix_swan_relative(path: String) -> String {
    if !path.is_empty() && !path.starts_with('.') {
        format!("./{path}")
    } else {
        path
    }
}

/// Write every additional asset below `output_dir`, creating directories as
/// needed.
pub(crate) fn save_assets_to_dist<'a>(
    assets: impl IntoIterator<Item = (&'a String, &'a String)>,
    output_dir: &Utf8Path,
) -> io::Result<()> {
    for (name, text) in assets {
        let file_path = output_dir.join(name);

        if let Some(parent_dir) = file_path.parent() {
            fs::create_dir_all(parent_dir)?;
        }

        fs::write(&file_path, text)?;
    }

    Ok(())
}

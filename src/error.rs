use std::fmt::Display;
use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;

pub use crate::css::ParseError;

/// Failure of a nested compilation.
///
/// The error is reference counted so that every stylesheet waiting on the
/// same output path receives the same failure.
#[derive(Debug, Clone)]
pub struct CompileError(pub(crate) Arc<anyhow::Error>);

impl CompileError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(err.into()))
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<anyhow::Error> for CompileError {
    fn from(e: anyhow::Error) -> Self {
        CompileError(Arc::new(e))
    }
}

/// Errors aborting the processing of a single stylesheet.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Couldn't parse stylesheet '{0}'.\n{1}")]
    Stylesheet(Utf8PathBuf, ParseError),

    #[error("Nested compilation of '{request}' failed.\n{source}")]
    NestedCompilation {
        request: String,
        source: CompileError,
    },

    #[error("Couldn't read stylesheet '{0}'.\n{1}")]
    Source(Utf8PathBuf, std::io::Error),

    #[cfg(feature = "grass")]
    #[error("Sass compilation error in '{0}': {1}")]
    Scss(Utf8PathBuf, Box<grass::Error>),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read configuration file '{0}'.\n{1}")]
    Io(Utf8PathBuf, std::io::Error),

    #[error("Malformed configuration.\n{0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while writing the additional assets of a run.
#[derive(Debug, Error)]
#[error("Couldn't write assets to '{0}'.\n{1}")]
pub struct EmitError(pub Utf8PathBuf, pub std::io::Error);

/// Non-fatal problems found while processing a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An `@import` with a block attached to it.
    MalformedImport {
        file: Utf8PathBuf,
        rule: String,
        line: usize,
        column: usize,
    },
    /// An `@import` whose first token is not a URL.
    MissingUri {
        file: Utf8PathBuf,
        rule: String,
        line: usize,
        column: usize,
    },
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::MalformedImport {
                file, line, column, ..
            } => write!(
                f,
                "{file}:{line}:{column}: It looks like you didn't end your @import statement \
                 correctly. Child nodes are attached to it."
            ),
            Warning::MissingUri {
                file,
                rule,
                line,
                column,
            } => {
                write!(f, "{file}:{line}:{column}: Unable to find uri in '{rule}'")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_is_shared() {
        let err = CompileError::new(anyhow::anyhow!("boom"));
        let copy = err.clone();

        assert!(Arc::ptr_eq(&err.0, &copy.0));
        assert_eq!(copy.to_string(), "boom");
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning::MissingUri {
            file: "src/app.wxss".into(),
            rule: "@import ;".into(),
            line: 3,
            column: 1,
        };

        assert_eq!(
            warning.to_string(),
            "src/app.wxss:3:1: Unable to find uri in '@import ;'"
        );
    }
}

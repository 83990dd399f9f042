//! Rewrites applied to a parsed stylesheet before it is assembled.

pub mod import;
pub mod url;

pub use import::{ImportOptions, ImportReference, ImportResult, Placeholder, parse_imports};
pub use url::{UrlItem, extract_urls};

/// Token standing in for the output path of the `index`-th unique import.
pub fn import_placeholder(index: usize) -> String {
    format!("___CSS_LOADER_IMPORT_URL___{index}___")
}

/// Token standing in for the `index`-th `url()` reference.
pub fn url_placeholder(index: usize) -> String {
    format!("___CSS_LOADER_URL___{index}___")
}

//! Turning URLs found in stylesheets into module requests.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::config::AliasTarget;
use crate::output::to_posix;

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.-]*:").expect("valid scheme regex"));

static WINDOWS_ABSOLUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]:[\\/]").expect("valid windows path regex"));

static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[{}\[\]#*;,'§$%&(=?`´^°<>]").expect("valid template regex")
});

static MODULE_REQUEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^?]*~").expect("valid module request regex"));

#[derive(Debug, Clone)]
struct Alias {
    name: String,
    target: String,
    only_module: bool,
}

/// Alias substitution over an ordered table.
///
/// A key ending with `$` only matches the exact name, any other key matches
/// the name itself and everything below `name/`. The first matching entry in
/// declaration order wins.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    aliases: Vec<Alias>,
}

impl AliasResolver {
    pub fn new(table: &IndexMap<String, AliasTarget>) -> Self {
        let aliases = table
            .iter()
            .map(|(key, target)| {
                let (name, exact) = match key.strip_suffix('$') {
                    Some(name) => (name, true),
                    None => (key.as_str(), false),
                };
                let (target, only_module) = match target {
                    AliasTarget::Path(path) => (path.clone(), false),
                    AliasTarget::Full { alias, only_module } => (alias.clone(), *only_module),
                };

                Alias {
                    name: name.to_string(),
                    target,
                    only_module: exact || only_module,
                }
            })
            .collect();

        Self { aliases }
    }

    pub fn resolve(&self, url: &str) -> String {
        for alias in &self.aliases {
            let Some(rest) = url.strip_prefix(alias.name.as_str()) else {
                continue;
            };

            if rest.is_empty() || (!alias.only_module && rest.starts_with('/')) {
                return to_posix(format!("{}{rest}", alias.target));
            }
        }

        to_posix(url)
    }
}

/// Whether a URL refers to a module the host can resolve.
pub fn is_url_request(url: &str, root: Option<&str>) -> bool {
    if SCHEME.is_match(url) && !WINDOWS_ABSOLUTE.is_match(url) {
        return false;
    }

    if url.starts_with("//") || TEMPLATE.is_match(url) {
        return false;
    }

    !(root.is_none() && url.starts_with('/'))
}

/// Map a URL to the request the host resolves it with.
pub fn url_to_request(url: &str, root: Option<&str>) -> String {
    if url.is_empty() {
        return String::new();
    }

    let request = if WINDOWS_ABSOLUTE.is_match(url) {
        url.to_string()
    } else if let (Some(root), true) = (root, url.starts_with('/')) {
        if MODULE_REQUEST.is_match(root) {
            let mut root = root.to_string();
            if !root.ends_with(['~', '/']) {
                root.push('/');
            }
            format!("{root}{}", &url[1..])
        } else {
            format!("{root}{url}")
        }
    } else if url.starts_with("./") || url.starts_with("../") {
        url.to_string()
    } else {
        format!("./{url}")
    };

    MODULE_REQUEST.replace(&request, "").into_owned()
}

/// Split `webfont.eot?#iefix` into the path and the suffix kept verbatim.
pub fn split_request(url: &str) -> (&str, &str) {
    let index = url.find("?#").or_else(|| url.find('#'));

    match index {
        Some(i) if i > 0 => url.split_at(i),
        _ => (url, ""),
    }
}

/// A request as a JavaScript string literal.
pub fn stringify_request(request: &str) -> String {
    serde_json::Value::String(request.to_string()).to_string()
}

/// The rules of the runtime `escape` helper, applied to a resolved URL.
pub fn escape_url(url: &str) -> String {
    let quoted = url.len() >= 2
        && url.starts_with(['"', '\''])
        && url.ends_with(['"', '\'']);
    let url = if quoted { &url[1..url.len() - 1] } else { url };

    if url.contains(['"', '\'', '(', ')', ' ', '\t', '\n']) {
        format!("\"{}\"", url.replace('"', "\\\"").replace('\n', "\\n"))
    } else {
        url.to_string()
    }
}

use serde_json::Value;

use crate::output::to_posix;
use crate::resolve::stringify_request;

/// Parts of the runtime module.
pub(super) struct Runtime<'a> {
    /// Request of the URL escape helper, required when `url()` items exist.
    pub escape: Option<&'a str>,
    pub css_base: &'a str,
    pub source_map: bool,
    /// Import statements, emitted in inline mode.
    pub imports: &'a [String],
    /// The stylesheet as a JavaScript expression.
    pub css: &'a str,
    pub map: Option<&'a Value>,
}

pub(super) fn module_text(runtime: &Runtime) -> String {
    let mut out = String::new();

    if let Some(escape) = runtime.escape {
        out.push_str(&format!("var escape = require({});\n", stringify_request(escape)));
    }

    out.push_str(&format!(
        "exports = module.exports = require({})({});\n",
        stringify_request(runtime.css_base),
        runtime.source_map
    ));

    if !runtime.imports.is_empty() {
        out.push_str("// imports\n");
        out.push_str(&runtime.imports.join("\n"));
        out.push_str("\n\n");
    }

    out.push_str("// module\n");
    match runtime.map {
        Some(map) => out.push_str(&format!(
            "exports.push([module.id, {}, \"\", {map}]);",
            runtime.css
        )),
        None => out.push_str(&format!("exports.push([module.id, {}, \"\"]);", runtime.css)),
    }
    out.push_str("\n\n");

    out
}

/// The inside of a JavaScript string literal holding `text`.
pub(super) fn js_fragment(text: &str) -> String {
    let literal = stringify_request(text);
    literal[1..literal.len() - 1].to_string()
}

fn clean_source(source: &str) -> String {
    to_posix(source.rsplit('!').next().unwrap_or(source))
}

/// Strip loader prefixes and backslashes from the paths of a source map.
pub(super) fn normalize_map(map: Value) -> Value {
    let mut map = match map {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        map => map,
    };

    if let Some(object) = map.as_object_mut() {
        if let Some(Value::Array(sources)) = object.get_mut("sources") {
            for source in sources.iter_mut() {
                if let Value::String(path) = source {
                    *path = clean_source(path);
                }
            }
            object.insert("sourceRoot".into(), Value::String(String::new()));
        }

        if let Some(Value::String(file)) = object.get_mut("file") {
            *file = clean_source(file);
        }
    }

    map
}

//! Collecting and rewriting top-level `@import` rules.

use std::collections::HashSet;

use camino::Utf8Path;
use tracing::warn;

use crate::config::ImportMode;
use crate::css::{Stylesheet, value};
use crate::error::Warning;
use crate::resolve::{is_url_request, stringify_request, url_to_request};

use super::import_placeholder;

/// A unique `@import`, keyed by its URL and normalized media query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportReference {
    pub url: String,
    pub media: String,
}

/// A placeholder inserted in place of an import URL, substituted at assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub placeholder: String,
    pub reference: ImportReference,
}

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions<'a> {
    pub mode: ImportMode,
    pub prefix: &'a str,
    pub root: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct ImportResult {
    /// Unique references in order of first appearance.
    pub references: Vec<ImportReference>,
    /// Filled in deferred mode only, one entry per reference.
    pub placeholders: Vec<Placeholder>,
    /// Filled in inline mode only, one statement per reference.
    pub code: Vec<String>,
    pub warnings: Vec<Warning>,
}

fn parse_params(params: &str) -> Option<ImportReference> {
    let nodes = value::parse(params);
    let url = nodes.first()?.url()?;

    if url.trim().is_empty() {
        return None;
    }

    Some(ImportReference {
        url: url.to_string(),
        media: value::stringify(&nodes[1..]).trim().to_lowercase(),
    })
}

/// Code registering an import in the runtime module.
fn import_item_code(reference: &ImportReference, options: &ImportOptions) -> String {
    let media = stringify_request(&reference.media);

    if !is_url_request(&reference.url, options.root) {
        let rule = format!("@import url({});", reference.url);
        return format!(
            "exports.push([module.id, {}, {media}]);",
            stringify_request(&rule)
        );
    }

    let request = format!(
        "{}{}",
        options.prefix,
        url_to_request(&reference.url, options.root)
    );
    format!("exports.i(require({}), {media});", stringify_request(&request))
}

/// Collect the top-level `@import` rules of `sheet` and rewrite them.
///
/// Rules with a block attached are reported and left as they are, rules
/// without a URL are reported and removed. Of all rules sharing a URL and
/// media query only the first survives: in deferred mode its URL becomes a
/// placeholder, in inline mode it is removed too and replaced by runtime code.
pub fn parse_imports(
    sheet: &mut Stylesheet,
    file: &Utf8Path,
    options: &ImportOptions,
) -> ImportResult {
    let mut result = ImportResult::default();
    let mut traversed = Vec::new();
    let mut dropped = Vec::new();

    for (index, node, rule) in sheet.at_rules("import") {
        let position = node.position;

        if rule.block.is_some() {
            let warning = Warning::MalformedImport {
                file: file.to_owned(),
                rule: rule.to_string(),
                line: position.line,
                column: position.column,
            };
            warn!("{warning}");
            result.warnings.push(warning);
            continue;
        }

        match parse_params(rule.params()) {
            Some(reference) => traversed.push((index, reference)),
            None => {
                let warning = Warning::MissingUri {
                    file: file.to_owned(),
                    rule: rule.to_string(),
                    line: position.line,
                    column: position.column,
                };
                warn!("{warning}");
                result.warnings.push(warning);
                dropped.push(index);
            }
        }
    }

    let mut seen: HashSet<&ImportReference> = HashSet::new();
    let mut survivors = Vec::new();

    for (index, reference) in &traversed {
        if !seen.insert(reference) {
            dropped.push(*index);
            continue;
        }

        let n = result.references.len();
        result.references.push(reference.clone());

        match options.mode {
            ImportMode::Keep => {
                let placeholder = import_placeholder(n);
                survivors.push((*index, placeholder.clone(), reference));
                result.placeholders.push(Placeholder {
                    placeholder,
                    reference: reference.clone(),
                });
            }
            ImportMode::Inline => {
                result.code.push(import_item_code(reference, options));
                dropped.push(*index);
            }
        }
    }

    for (index, placeholder, reference) in survivors {
        let params = match reference.media.as_str() {
            "" => format!("\"{placeholder}\""),
            media => format!("\"{placeholder}\" {media}"),
        };
        if let Some(rule) = sheet.nodes[index].as_at_rule_mut() {
            rule.set_params(params);
        }
    }

    sheet.remove(&dropped);
    result
}

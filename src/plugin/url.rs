//! Extracting `url()` references from declaration blocks.
//!
//! Blocks are tokenized with `cssparser`, so strings and comments that merely
//! look like `url()` are never touched.

use std::ops::Range;

use cssparser::{Parser, ParserInput, Token};

use crate::css::{Stylesheet, string_argument};
use crate::resolve::is_url_request;

use super::url_placeholder;

/// A `url()` reference replaced by a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlItem {
    pub url: String,
}

/// Replace every `url()` pointing at a module with a placeholder.
///
/// `@import` parameters are left alone, as are references that are not
/// module requests (remote URLs, data URIs and such).
pub fn extract_urls(sheet: &mut Stylesheet, root: Option<&str>) -> Vec<UrlItem> {
    let mut items = Vec::new();

    for node in &mut sheet.nodes {
        if node.as_at_rule().is_some_and(|rule| rule.is_named("import")) {
            continue;
        }

        if let Some(block) = node.block_mut() {
            *block = rewrite_block(block, root, &mut items);
        }
    }

    items
}

/// A `url()` token and the byte range it covers.
struct Found {
    range: Range<usize>,
    url: String,
}

fn find_urls<'i>(parser: &mut Parser<'i, '_>, found: &mut Vec<Found>) {
    loop {
        let start = parser.position().byte_index();
        let Ok(token) = parser.next_including_whitespace_and_comments().cloned() else {
            return;
        };

        match token {
            Token::UnquotedUrl(url) => found.push(Found {
                range: start..parser.position().byte_index(),
                url: url.to_string(),
            }),
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                if let Ok(url) = parser.parse_nested_block(string_argument) {
                    found.push(Found {
                        range: start..parser.position().byte_index(),
                        url,
                    });
                }
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                let _ = parser.parse_nested_block(|nested| {
                    find_urls(nested, found);
                    Ok::<(), cssparser::ParseError<'i, ()>>(())
                });
            }
            _ => {}
        }
    }
}

fn rewrite_block(block: &str, root: Option<&str>, items: &mut Vec<UrlItem>) -> String {
    let mut found = Vec::new();
    let mut input = ParserInput::new(block);
    find_urls(&mut Parser::new(&mut input), &mut found);

    let mut out = String::with_capacity(block.len());
    let mut copied = 0;

    for Found { range, url } in found {
        if url.trim().is_empty() || !is_url_request(&url, root) {
            continue;
        }

        out.push_str(&block[copied..range.start]);
        out.push_str("url(");
        out.push_str(&url_placeholder(items.len()));
        out.push(')');
        items.push(UrlItem { url });
        copied = range.end;
    }

    out.push_str(&block[copied..]);
    out
}

//! A lossless parser for the top level of a stylesheet.
//!
//! Statements directly below the document root are split with `cssparser`,
//! blocks are kept as raw text. This is all the loader needs: `@import` is
//! only honoured at the root, and `url()` references are found by tokenizing
//! block text. Serializing an untouched [`Stylesheet`] gives back the exact
//! input.

pub mod value;

use std::fmt::Display;

use cssparser::{Parser as CssParser, ParserInput, ParserState, SourceLocation, Token};
use thiserror::Error;

/// Syntax error found while splitting a stylesheet into statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: &'static str,
}

/// 1-based location of a statement in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// An at-rule such as `@import "a.css" screen;` or `@media print { ... }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    /// Name without the `@`, as written.
    pub name: String,
    after_name: String,
    params: String,
    between: String,
    /// Raw text inside the braces, if the rule has a block.
    pub block: Option<String>,
    terminated: bool,
}

impl AtRule {
    pub fn params(&self) -> &str {
        &self.params
    }

    pub fn set_params(&mut self, params: impl Into<String>) {
        self.params = params.into();
        if self.after_name.is_empty() && !self.params.is_empty() {
            self.after_name.push(' ');
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    fn write(&self, out: &mut String) {
        out.push('@');
        out.push_str(&self.name);
        out.push_str(&self.after_name);
        out.push_str(&self.params);
        out.push_str(&self.between);
        match &self.block {
            Some(block) => {
                out.push('{');
                out.push_str(block);
                out.push('}');
            }
            None if self.terminated => out.push(';'),
            None => {}
        }
    }
}

impl Display for AtRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        self.write(&mut out);
        f.write_str(&out)
    }
}

/// A qualified rule, `selector { declarations }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// The selector including trailing whitespace.
    pub prelude: String,
    /// Raw text inside the braces.
    pub block: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    AtRule(AtRule),
    Rule(Rule),
}

/// A top-level statement together with the whitespace and comments before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    before: String,
    pub position: Position,
    pub kind: NodeKind,
}

impl Node {
    pub fn as_at_rule(&self) -> Option<&AtRule> {
        match &self.kind {
            NodeKind::AtRule(rule) => Some(rule),
            NodeKind::Rule(_) => None,
        }
    }

    pub fn as_at_rule_mut(&mut self) -> Option<&mut AtRule> {
        match &mut self.kind {
            NodeKind::AtRule(rule) => Some(rule),
            NodeKind::Rule(_) => None,
        }
    }

    /// Mutable access to the raw block text, for both rule kinds.
    pub fn block_mut(&mut self) -> Option<&mut String> {
        match &mut self.kind {
            NodeKind::AtRule(rule) => rule.block.as_mut(),
            NodeKind::Rule(rule) => Some(&mut rule.block),
        }
    }
}

/// The root of a parsed stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stylesheet {
    pub nodes: Vec<Node>,
    after: String,
}

impl Stylesheet {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let mut input = ParserInput::new(source);
        let mut parser = CssParser::new(&mut input);
        parse_stylesheet(&mut parser)
    }

    /// Top-level at-rules with the given name, matched case-insensitively.
    pub fn at_rules<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (usize, &'a Node, &'a AtRule)> + 'a {
        self.nodes.iter().enumerate().filter_map(move |(i, node)| {
            node.as_at_rule()
                .filter(|rule| rule.is_named(name))
                .map(|rule| (i, node, rule))
        })
    }

    /// Remove the nodes at the given indices along with their leading trivia.
    pub fn remove(&mut self, indices: &[usize]) {
        let mut i = 0;
        self.nodes.retain(|_| {
            let keep = !indices.contains(&i);
            i += 1;
            keep
        });
    }

    pub fn to_css(&self) -> String {
        let mut out = String::new();

        for node in &self.nodes {
            out.push_str(&node.before);
            match &node.kind {
                NodeKind::AtRule(rule) => rule.write(&mut out),
                NodeKind::Rule(rule) => {
                    out.push_str(&rule.prelude);
                    out.push('{');
                    out.push_str(&rule.block);
                    out.push('}');
                }
            }
        }

        out.push_str(&self.after);
        out
    }
}

impl Display for Stylesheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_css())
    }
}

fn error_at(location: SourceLocation, message: &'static str) -> ParseError {
    let Position { line, column } = position_of(location);
    ParseError {
        line,
        column,
        message,
    }
}

fn position_of(location: SourceLocation) -> Position {
    Position {
        line: location.line as usize + 1,
        column: location.column as usize,
    }
}

/// Text of the token read last, which started at `state`.
fn token_text<'i>(parser: &CssParser<'i, '_>, state: &ParserState) -> &'i str {
    parser.slice_from(state.position())
}

/// Reject comments and strings cut off by the end of input.
fn check_closed(parser: &CssParser, state: &ParserState, token: &Token) -> Result<(), ParseError> {
    let text = token_text(parser, state);

    let (closed, message) = match token {
        Token::Comment(_) => (text.len() >= 4 && text.ends_with("*/"), "Unclosed comment"),
        Token::QuotedString(_) => {
            (text.len() >= 2 && text.ends_with(&text[..1]), "Unclosed string")
        }
        Token::BadString(_) => (false, "Unclosed string"),
        _ => (true, ""),
    };

    match closed {
        true => Ok(()),
        false => Err(error_at(state.source_location(), message)),
    }
}

/// The next token that starts a statement, skipping whitespace, comments and
/// stray semicolons.
fn next_statement<'i>(
    parser: &mut CssParser<'i, '_>,
) -> Result<Option<(ParserState, Token<'i>)>, ParseError> {
    loop {
        let state = parser.state();
        let Ok(token) = parser.next_including_whitespace_and_comments().cloned() else {
            return Ok(None);
        };

        match token {
            Token::WhiteSpace(_) | Token::Semicolon => {}
            Token::Comment(_) => check_closed(parser, &state, &token)?,
            token => return Ok(Some((state, token))),
        }
    }
}

/// Consume the block opened by the `{` read last. Returns the text between
/// the braces and whether the closing brace was there.
fn read_block<'i>(parser: &mut CssParser<'i, '_>) -> (&'i str, bool) {
    let start = parser.position();
    let mut end = start;

    let _ = parser.parse_nested_block(|nested| {
        while nested.next_including_whitespace_and_comments().is_ok() {}
        end = nested.position();
        Ok::<(), cssparser::ParseError<'i, ()>>(())
    });

    (parser.slice(start..end), parser.position() != end)
}

enum Terminator {
    Semicolon,
    Block(SourceLocation),
    End,
}

/// Parse the rest of an at-rule, its `@name` has just been read.
fn parse_at_rule(parser: &mut CssParser, name: String) -> Result<AtRule, ParseError> {
    let start = parser.position();

    let (prelude_end, terminator) = loop {
        let state = parser.state();
        let Ok(token) = parser.next_including_whitespace_and_comments().cloned() else {
            break (parser.position(), Terminator::End);
        };

        match token {
            Token::Semicolon => break (state.position(), Terminator::Semicolon),
            Token::CurlyBracketBlock => {
                break (state.position(), Terminator::Block(state.source_location()));
            }
            // Reported by the statement loop.
            Token::CloseCurlyBracket => {
                parser.reset(&state);
                break (state.position(), Terminator::End);
            }
            token => check_closed(parser, &state, &token)?,
        }
    };

    let raw = parser.slice(start..prelude_end);
    let trimmed = raw.trim_start();
    let after_name = raw[..raw.len() - trimmed.len()].to_string();
    let params = trimmed.trim_end().to_string();
    let between = trimmed[params.len()..].to_string();

    let (block, terminated) = match terminator {
        Terminator::Block(location) => match read_block(parser) {
            (block, true) => (Some(block.to_string()), false),
            (_, false) => return Err(error_at(location, "Unclosed block")),
        },
        Terminator::Semicolon => (None, true),
        Terminator::End => (None, false),
    };

    Ok(AtRule {
        name,
        after_name,
        params,
        between,
        block,
        terminated,
    })
}

/// Parse a qualified rule starting with `first`, read at `start`.
fn parse_rule<'i>(
    parser: &mut CssParser<'i, '_>,
    start: &ParserState,
    first: Token<'i>,
) -> Result<Rule, ParseError> {
    let mut state = start.clone();
    let mut token = first;

    loop {
        match &token {
            Token::CurlyBracketBlock => {
                let prelude = parser.slice(start.position()..state.position()).to_string();
                return match read_block(parser) {
                    (block, true) => Ok(Rule {
                        prelude,
                        block: block.to_string(),
                    }),
                    (_, false) => Err(error_at(state.source_location(), "Unclosed block")),
                };
            }
            Token::CloseCurlyBracket => {
                return Err(error_at(state.source_location(), "Unexpected }"));
            }
            Token::Semicolon => return Err(error_at(start.source_location(), "Unknown word")),
            token => check_closed(parser, &state, token)?,
        }

        state = parser.state();
        token = match parser.next_including_whitespace_and_comments().cloned() {
            Ok(token) => token,
            Err(_) => return Err(error_at(start.source_location(), "Unknown word")),
        };
    }
}

fn parse_stylesheet(parser: &mut CssParser) -> Result<Stylesheet, ParseError> {
    let mut nodes = Vec::new();
    let mut start = parser.position();

    loop {
        let Some((state, token)) = next_statement(parser)? else {
            return Ok(Stylesheet {
                nodes,
                after: parser.slice_from(start).to_string(),
            });
        };

        let before = parser.slice(start..state.position()).to_string();
        let location = state.source_location();

        let kind = match token {
            Token::AtKeyword(name) => NodeKind::AtRule(parse_at_rule(parser, name.to_string())?),
            Token::CloseCurlyBracket => return Err(error_at(location, "Unexpected }")),
            token => NodeKind::Rule(parse_rule(parser, &state, token)?),
        };

        nodes.push(Node {
            before,
            position: position_of(location),
            kind,
        });
        start = parser.position();
    }
}

/// Read the single string argument of a function like `url("a.css")`.
pub(crate) fn string_argument<'i>(
    nested: &mut CssParser<'i, '_>,
) -> Result<String, cssparser::ParseError<'i, ()>> {
    Ok(nested.expect_string()?.to_string())
}

//! Components of an at-rule prelude, such as the parameters of `@import`.

use cssparser::{Parser, ParserInput, Token};

use super::string_argument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    /// A quoted string, unescaped.
    Str(String),
    /// `url(...)`, quoted or not, with the URL unescaped.
    Url(String),
    Function(String),
    Space,
    Comment,
    Other,
}

/// One token of a prelude together with the text it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component<'i> {
    pub kind: ComponentKind,
    pub text: &'i str,
}

impl Component<'_> {
    /// The URL this component points at, either `url(...)` or a bare string.
    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            ComponentKind::Str(url) | ComponentKind::Url(url) => Some(url),
            _ => None,
        }
    }
}

pub fn parse(input: &str) -> Vec<Component<'_>> {
    let mut input = ParserInput::new(input);
    let mut parser = Parser::new(&mut input);
    let mut components = Vec::new();

    loop {
        let start = parser.position();
        let Ok(token) = parser.next_including_whitespace_and_comments().cloned() else {
            // A block skipped right before the end still has text.
            let rest = parser.slice_from(start);
            if !rest.is_empty() {
                components.push(Component {
                    kind: ComponentKind::Other,
                    text: rest,
                });
            }
            break;
        };

        let kind = match token {
            Token::WhiteSpace(_) => ComponentKind::Space,
            Token::Comment(_) => ComponentKind::Comment,
            Token::QuotedString(value) => ComponentKind::Str(value.to_string()),
            Token::UnquotedUrl(value) => ComponentKind::Url(value.to_string()),
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                match parser.parse_nested_block(string_argument) {
                    Ok(url) => ComponentKind::Url(url),
                    Err(_) => ComponentKind::Function(name.to_string()),
                }
            }
            Token::Function(name) => ComponentKind::Function(name.to_string()),
            _ => ComponentKind::Other,
        };

        components.push(Component {
            kind,
            text: parser.slice_from(start),
        });
    }

    components
}

/// Source text of a run of components.
pub fn stringify(components: &[Component]) -> String {
    components.iter().map(|component| component.text).collect()
}

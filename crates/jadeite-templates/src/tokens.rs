use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;

use jadeite_source::LineCol;
use jadeite_source::Location;
use serde::Serialize;

use crate::error::ParseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BlockMode {
    Replace,
    Append,
    Prepend,
}

impl fmt::Display for BlockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlockMode::Replace => "replace",
            BlockMode::Append => "append",
            BlockMode::Prepend => "prepend",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum TokenKind {
    Tag(String),
    /// `#{expression}` in tag position.
    InterpolatedTag(String),
    CssId(String),
    CssClass(String),
    StartAttributes,
    Attribute {
        name: String,
        /// `None` for a bare boolean attribute.
        value: Option<String>,
        escaped: bool,
    },
    EndAttributes,
    /// `&attributes(expression)`
    AttributesBlock(String),
    Text(String),
    TextHtml(String),
    Code {
        code: String,
        buffered: bool,
        escaped: bool,
    },
    BlockCode,
    /// `#{expression}` or `!{expression}` inside text.
    InterpolatedCode {
        code: String,
        escaped: bool,
    },
    StartInterpolation,
    EndInterpolation,
    StartPipelessText,
    EndPipelessText,
    Indent(usize),
    Outdent,
    Newline,
    Doctype(String),
    Each {
        value: String,
        key: Option<String>,
        expression: String,
    },
    While(String),
    If(String),
    Unless(String),
    ElseIf(String),
    Else,
    Case(String),
    When(String),
    Default,
    Mixin {
        name: String,
        args: Option<String>,
    },
    Call {
        name: String,
        dynamic: bool,
        args: Option<String>,
    },
    MixinBlock,
    Filter(String),
    Comment {
        text: String,
        buffered: bool,
    },
    Block {
        name: String,
        mode: BlockMode,
    },
    Include,
    Extends,
    Path(String),
    Yield,
    Dot,
    Colon,
    Slash,
    Eos,
}

impl TokenKind {
    /// Human readable token name for error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Tag(_) => "tag",
            TokenKind::InterpolatedTag(_) => "interpolated tag",
            TokenKind::CssId(_) => "id",
            TokenKind::CssClass(_) => "class",
            TokenKind::StartAttributes => "start of attributes",
            TokenKind::Attribute { .. } => "attribute",
            TokenKind::EndAttributes => "end of attributes",
            TokenKind::AttributesBlock(_) => "&attributes",
            TokenKind::Text(_) => "text",
            TokenKind::TextHtml(_) => "html text",
            TokenKind::Code { .. } => "code",
            TokenKind::BlockCode => "block code",
            TokenKind::InterpolatedCode { .. } => "interpolated code",
            TokenKind::StartInterpolation => "start of interpolation",
            TokenKind::EndInterpolation => "end of interpolation",
            TokenKind::StartPipelessText => "start of text block",
            TokenKind::EndPipelessText => "end of text block",
            TokenKind::Indent(_) => "indent",
            TokenKind::Outdent => "outdent",
            TokenKind::Newline => "newline",
            TokenKind::Doctype(_) => "doctype",
            TokenKind::Each { .. } => "each",
            TokenKind::While(_) => "while",
            TokenKind::If(_) => "if",
            TokenKind::Unless(_) => "unless",
            TokenKind::ElseIf(_) => "else if",
            TokenKind::Else => "else",
            TokenKind::Case(_) => "case",
            TokenKind::When(_) => "when",
            TokenKind::Default => "default",
            TokenKind::Mixin { .. } => "mixin",
            TokenKind::Call { .. } => "mixin call",
            TokenKind::MixinBlock => "block",
            TokenKind::Filter(_) => "filter",
            TokenKind::Comment { .. } => "comment",
            TokenKind::Block { .. } => "named block",
            TokenKind::Include => "include",
            TokenKind::Extends => "extends",
            TokenKind::Path(_) => "path",
            TokenKind::Yield => "yield",
            TokenKind::Dot => "`.`",
            TokenKind::Colon => "`:`",
            TokenKind::Slash => "`/`",
            TokenKind::Eos => "end of input",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    kind: TokenKind,
    start: LineCol,
    end: LineCol,
    file: Arc<str>,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, start: LineCol, end: LineCol, file: Arc<str>) -> Self {
        Self {
            kind,
            start,
            end,
            file,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    #[must_use]
    pub fn into_kind(self) -> TokenKind {
        self.kind
    }

    #[must_use]
    pub fn start(&self) -> LineCol {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> LineCol {
        self.end
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn location(&self) -> Location {
        Location::new(Arc::clone(&self.file), self.start)
    }
}

/// Pull-based access to lexed tokens with lookahead and pushback.
///
/// Reading past the end keeps returning the final `Eos` token.
#[derive(Debug)]
pub struct TokenStream {
    tokens: VecDeque<Token>,
    eos: Token,
}

impl TokenStream {
    #[must_use]
    pub fn new(tokens: Vec<Token>, file: Arc<str>) -> Self {
        let end = tokens.last().map_or(LineCol::default(), Token::end);
        Self {
            tokens: tokens.into(),
            eos: Token::new(TokenKind::Eos, end, end, file),
        }
    }

    #[must_use]
    pub fn peek(&self) -> &Token {
        self.lookahead(0)
    }

    #[must_use]
    pub fn lookahead(&self, n: usize) -> &Token {
        self.tokens.get(n).unwrap_or(&self.eos)
    }

    pub fn advance(&mut self) -> Token {
        self.tokens
            .pop_front()
            .unwrap_or_else(|| self.eos.clone())
    }

    /// Push a token back so the next `peek`/`advance` sees it.
    pub fn defer(&mut self, token: Token) {
        self.tokens.push_front(token);
    }

    /// Consume the next token if it is the same kind of token as `kind`,
    /// ignoring payloads.
    pub fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        let next = self.peek();
        if mem::discriminant(next.kind()) == mem::discriminant(kind) {
            return Ok(self.advance());
        }
        Err(ParseError::UnexpectedToken {
            expected: kind.name().to_string(),
            found: next.kind().name(),
            location: next.location(),
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: TokenKind, line: u32) -> Token {
        Token::new(
            kind,
            LineCol::new(line, 1),
            LineCol::new(line, 2),
            Arc::from("t.pug"),
        )
    }

    #[test]
    fn stream_peeks_advances_and_defers() {
        let mut stream = TokenStream::new(
            vec![
                token(TokenKind::Tag("p".into()), 1),
                token(TokenKind::Newline, 1),
                token(TokenKind::Eos, 2),
            ],
            Arc::from("t.pug"),
        );

        assert_eq!(stream.lookahead(1).kind(), &TokenKind::Newline);
        let tag = stream.advance();
        assert_eq!(tag.kind(), &TokenKind::Tag("p".into()));

        stream.defer(tag);
        assert_eq!(stream.peek().kind(), &TokenKind::Tag("p".into()));

        stream.advance();
        stream.advance();
        stream.advance();
        assert_eq!(stream.advance().kind(), &TokenKind::Eos);
        assert_eq!(stream.peek().kind(), &TokenKind::Eos);
    }

    #[test]
    fn expect_matches_kind_not_payload() {
        let mut stream = TokenStream::new(
            vec![token(TokenKind::Tag("p".into()), 1)],
            Arc::from("t.pug"),
        );

        let err = stream.expect(&TokenKind::Newline).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedToken { found: "tag", .. }
        ));

        let tag = stream.expect(&TokenKind::Tag(String::new())).unwrap();
        assert_eq!(tag.kind(), &TokenKind::Tag("p".into()));
    }
}

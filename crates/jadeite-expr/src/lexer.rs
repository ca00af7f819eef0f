use crate::ExpressionError;

const PUNCTUATORS: &[&str] = &[
    "===", "!==", "...", "==", "!=", "<=", ">=", "&&", "||", "??", "++", "--", "+=", "-=",
    "*=", "/=", "%=", "(", ")", "[", "]", "{", "}", ",", ".", ";", ":", "?", "!", "+", "-",
    "*", "/", "%", "<", ">", "=",
];

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    String(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

impl Token {
    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == punct)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(ident) if ident == name)
    }
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        let Some(ch) = rest.chars().next() else {
            break;
        };

        if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        }

        if rest.starts_with("//") {
            pos += rest.find('\n').unwrap_or(rest.len());
            continue;
        }

        if rest.starts_with("/*") {
            let end = rest[2..]
                .find("*/")
                .ok_or_else(|| ExpressionError::syntax("unterminated comment", pos))?;
            pos += end + 4;
            continue;
        }

        if ch.is_ascii_digit()
            || (ch == '.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit))
        {
            let (value, len) = number(rest, pos)?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                offset: pos,
            });
            pos += len;
            continue;
        }

        if matches!(ch, '\'' | '"' | '`') {
            let (value, len) = string(rest, pos)?;
            tokens.push(Token {
                kind: TokenKind::String(value),
                offset: pos,
            });
            pos += len;
            continue;
        }

        if is_ident_start(ch) {
            let len = rest
                .char_indices()
                .find(|(_, c)| !is_ident_continue(*c))
                .map_or(rest.len(), |(index, _)| index);
            tokens.push(Token {
                kind: TokenKind::Ident(rest[..len].to_string()),
                offset: pos,
            });
            pos += len;
            continue;
        }

        if let Some(punct) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
            tokens.push(Token {
                kind: TokenKind::Punct(punct),
                offset: pos,
            });
            pos += punct.len();
            continue;
        }

        return Err(ExpressionError::syntax(
            format!("unexpected character `{ch}`"),
            pos,
        ));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: source.len(),
    });
    Ok(tokens)
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

pub(crate) fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

fn number(rest: &str, offset: usize) -> Result<(f64, usize), ExpressionError> {
    let bytes = rest.as_bytes();
    let mut len = 0;
    while bytes.get(len).is_some_and(u8::is_ascii_digit) {
        len += 1;
    }
    if bytes.get(len) == Some(&b'.') && bytes.get(len + 1).is_some_and(u8::is_ascii_digit) {
        len += 1;
        while bytes.get(len).is_some_and(u8::is_ascii_digit) {
            len += 1;
        }
    }
    if matches!(bytes.get(len), Some(b'e' | b'E')) {
        let mut exp = len + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            len = exp;
            while bytes.get(len).is_some_and(u8::is_ascii_digit) {
                len += 1;
            }
        }
    }
    if bytes.get(len).is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_') {
        return Err(ExpressionError::syntax("invalid number literal", offset));
    }
    rest[..len]
        .parse()
        .map(|value| (value, len))
        .map_err(|_| ExpressionError::syntax("invalid number literal", offset))
}

fn string(rest: &str, offset: usize) -> Result<(String, usize), ExpressionError> {
    let mut chars = rest.char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(ExpressionError::syntax("expected string", offset));
    };
    let mut value = String::new();

    while let Some((index, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((value, index + c.len_utf8())),
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    'u' => {
                        let hex: String = chars.by_ref().take(4).map(|(_, c)| c).collect();
                        let decoded = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| {
                                ExpressionError::syntax("invalid unicode escape", offset + index)
                            })?;
                        value.push(decoded);
                    }
                    '\n' => {}
                    other => value.push(other),
                }
            }
            '\n' if quote != '`' => {
                return Err(ExpressionError::syntax(
                    "unterminated string literal",
                    offset,
                ))
            }
            other => value.push(other),
        }
    }

    Err(ExpressionError::syntax("unterminated string literal", offset))
}

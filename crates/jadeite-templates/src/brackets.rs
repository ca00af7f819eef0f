use thiserror::Error;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BracketError {
    #[error("`{opening}` is never closed")]
    Unterminated { opening: char, offset: usize },
    #[error("expected `{expected}` but found `{found}`")]
    Mismatched {
        expected: char,
        found: char,
        offset: usize,
    },
}

impl BracketError {
    /// Byte offset (relative to the scanned text) the error points at.
    #[must_use]
    pub fn offset(&self) -> usize {
        match self {
            BracketError::Unterminated { offset, .. } | BracketError::Mismatched { offset, .. } => {
                *offset
            }
        }
    }
}

/// A balanced bracket pair found by [`match_bracket`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BracketMatch<'a> {
    /// Byte index of the opening bracket.
    pub start: usize,
    /// Byte index of the closing bracket.
    pub end: usize,
    /// The text between the brackets.
    pub inner: &'a str,
}

fn closing(opening: char) -> Option<char> {
    match opening {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

/// Incremental bracket/string state, fed one character at a time.
///
/// Tracks nesting of `()`, `[]` and `{}` and whether the current position is
/// inside a `'`, `"` or `` ` `` string literal. Backslash escapes inside
/// strings are honored.
#[derive(Clone, Debug, Default)]
pub struct BracketState {
    stack: Vec<char>,
    quote: Option<char>,
    escape: bool,
}

impl BracketState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the character at byte `offset`.
    pub fn feed(&mut self, ch: char, offset: usize) -> Result<(), BracketError> {
        if self.escape {
            self.escape = false;
            return Ok(());
        }

        if let Some(quote) = self.quote {
            match ch {
                '\\' => self.escape = true,
                c if c == quote => self.quote = None,
                _ => {}
            }
            return Ok(());
        }

        match ch {
            '\'' | '"' | '`' => self.quote = Some(ch),
            '(' | '[' | '{' => self.stack.extend(closing(ch)),
            ')' | ']' | '}' => match self.stack.pop() {
                Some(expected) if expected == ch => {}
                Some(expected) => {
                    return Err(BracketError::Mismatched {
                        expected,
                        found: ch,
                        offset,
                    })
                }
                None => {
                    return Err(BracketError::Mismatched {
                        expected: ch,
                        found: ch,
                        offset,
                    })
                }
            },
            _ => {}
        }
        Ok(())
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_nesting(&self) -> bool {
        !self.stack.is_empty()
    }

    #[must_use]
    pub fn is_string(&self) -> bool {
        self.quote.is_some()
    }
}

/// Find the bracket closing the one at byte `open` in `src`.
///
/// Brackets and quotes inside string literals are ignored.
pub fn match_bracket(src: &str, open: usize) -> Result<BracketMatch<'_>, BracketError> {
    let opening = src[open..]
        .chars()
        .next()
        .filter(|ch| closing(*ch).is_some())
        .ok_or(BracketError::Unterminated {
            opening: '(',
            offset: open,
        })?;

    let mut state = BracketState::new();
    state.feed(opening, open)?;

    for (index, ch) in src[open + 1..].char_indices() {
        let offset = open + 1 + index;
        state.feed(ch, offset)?;
        if !state.is_nesting() && !state.is_string() {
            return Ok(BracketMatch {
                start: open,
                end: offset,
                inner: &src[open + 1..offset],
            });
        }
    }

    Err(BracketError::Unterminated {
        opening,
        offset: open,
    })
}

/// Split `src` on `delimiter` where it is neither nested in brackets nor
/// inside a string literal. Pieces are trimmed; a trailing empty piece is
/// dropped.
pub fn split_top_level(src: &str, delimiter: char) -> Result<Vec<&str>, BracketError> {
    let mut pieces = Vec::new();
    let mut state = BracketState::new();
    let mut start = 0;

    for (index, ch) in src.char_indices() {
        if ch == delimiter && !state.is_nesting() && !state.is_string() {
            pieces.push(src[start..index].trim());
            start = index + ch.len_utf8();
            continue;
        }
        state.feed(ch, index)?;
    }

    let last = src[start..].trim();
    if !last.is_empty() {
        pieces.push(last);
    }
    Ok(pieces)
}

/// Whether `ch` is a JavaScript punctuator character.
#[must_use]
pub fn is_punctuator(ch: char) -> bool {
    matches!(
        ch,
        '.' | '('
            | ')'
            | ';'
            | ','
            | '{'
            | '}'
            | '['
            | ']'
            | ':'
            | '?'
            | '~'
            | '%'
            | '&'
            | '*'
            | '+'
            | '-'
            | '/'
            | '<'
            | '>'
            | '^'
            | '|'
            | '!'
            | '='
    )
}

use std::fmt;
use std::sync::Arc;

use jadeite_expr::ExpressionHandler;
use jadeite_source::LineCol;
use jadeite_source::Location;

use crate::brackets::is_punctuator;
use crate::brackets::match_bracket;
use crate::brackets::BracketError;
use crate::brackets::BracketState;
use crate::error::LexError;
use crate::scanner::Scanner;
use crate::tokens::BlockMode;
use crate::tokens::Token;
use crate::tokens::TokenKind;

type LexResult = Result<bool, LexError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IndentStyle {
    Tabs,
    Spaces,
}

impl fmt::Display for IndentStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndentStyle::Tabs => "tabs",
            IndentStyle::Spaces => "spaces",
        })
    }
}

/// Turns template source into tokens.
///
/// Each call to [`Lexer::advance`] tries the rules in a fixed priority order
/// and the first one that recognizes the front of the remaining input
/// consumes it. Indentation is tracked with a stack of widths so that a
/// dedent by several levels yields one `Outdent` per level.
pub struct Lexer<'h> {
    input: Scanner,
    file: Arc<str>,
    position: LineCol,
    indent_stack: Vec<usize>,
    indent_style: Option<IndentStyle>,
    /// Lexing the inside of a `#[...]` tag interpolation.
    interpolated: bool,
    interpolation_allowed: bool,
    ended: bool,
    tokens: Vec<Token>,
    syntax: &'h dyn ExpressionHandler,
}

impl<'h> Lexer<'h> {
    #[must_use]
    pub fn new(source: &str, file: Arc<str>, syntax: &'h dyn ExpressionHandler) -> Self {
        Self {
            input: Scanner::new(source),
            file,
            position: LineCol::default(),
            indent_stack: vec![0],
            indent_style: None,
            interpolated: false,
            interpolation_allowed: true,
            ended: false,
            tokens: Vec::new(),
            syntax,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        if !self.interpolated {
            self.check_first_line()?;
        }
        while !self.ended {
            self.advance()?;
        }
        Ok(self.tokens)
    }

    /// Indentation is measured from the first line, so it cannot be
    /// indented itself.
    fn check_first_line(&self) -> Result<(), LexError> {
        let line = self.input.line();
        if line.starts_with([' ', '\t']) && !line.trim().is_empty() {
            return Err(LexError::InvalidIndentation {
                reason: "the first line cannot be indented".to_string(),
                location: self.location(self.position),
            });
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<(), LexError> {
        let matched = self.blank()
            || self.eos()
            || self.keyword_token("yield", TokenKind::Yield)
            || self.doctype()
            || self.interpolated_tag()?
            || self.case()?
            || self.when()?
            || self.keyword_token("default", TokenKind::Default)
            || self.extends()?
            || self.named_block()?
            || self.mixin_block()
            || self.include()?
            || self.mixin()?
            || self.call()?
            || self.conditional()?
            || self.each()?
            || self.while_loop()?
            || self.tag()
            || self.filter()?
            || self.block_code()?
            || self.code()?
            || self.id()?
            || self.dot()?
            || self.class()?
            || self.attributes()?
            || self.attributes_block()?
            || self.indent()?
            || self.text()?
            || self.text_html()?
            || self.comment()?
            || self.slash()
            || self.colon();

        if matched {
            Ok(())
        } else {
            Err(self.fail())
        }
    }

    fn take(&mut self, len: usize) -> String {
        let text = self.input.consume(len).to_string();
        self.position = self.position.advance(&text);
        text
    }

    fn push(&mut self, kind: TokenKind, start: LineCol) {
        let end = self.position;
        self.push_span(kind, start, end);
    }

    fn push_span(&mut self, kind: TokenKind, start: LineCol, end: LineCol) {
        self.tokens
            .push(Token::new(kind, start, end, Arc::clone(&self.file)));
    }

    fn location(&self, position: LineCol) -> Location {
        Location::new(Arc::clone(&self.file), position)
    }

    fn malformed(&self, keyword: &'static str, reason: &'static str, at: LineCol) -> LexError {
        LexError::MalformedKeyword {
            keyword,
            reason,
            location: self.location(at),
        }
    }

    fn bracket_error(&self, err: BracketError, text: &str, start: LineCol) -> LexError {
        let offset = err.offset().min(text.len());
        let location = self.location(start.advance(&text[..offset]));
        match err {
            BracketError::Unterminated { opening, .. } => {
                LexError::UnterminatedBracket { opening, location }
            }
            BracketError::Mismatched {
                expected, found, ..
            } => LexError::MismatchedBracket {
                expected,
                found,
                location,
            },
        }
    }

    /// Match the bracket at byte `open` of the remaining input, returning
    /// the index of its closer and the enclosed text.
    fn bracket_at(&self, open: usize) -> Result<(usize, String), LexError> {
        let rest = self.input.rest();
        match_bracket(rest, open)
            .map(|found| (found.end, found.inner.to_string()))
            .map_err(|err| self.bracket_error(err, rest, self.position))
    }

    fn at_keyword(&self, word: &str) -> bool {
        keyword_rest(self.input.rest(), word).is_some()
    }

    fn keyword_token(&mut self, word: &str, kind: TokenKind) -> bool {
        if !self.at_keyword(word) {
            return false;
        }
        let start = self.position;
        self.take(word.len());
        self.push(kind, start);
        true
    }

    /// Consume `word` and the rest of its line, returning the trimmed rest.
    fn keyword_argument(&mut self, word: &str) -> String {
        self.take(word.len());
        let line = self.input.line().to_string();
        self.take(line.len());
        line.trim().to_string()
    }

    fn blank(&mut self) -> bool {
        if self.interpolated {
            return false;
        }
        let Some(after) = self.input.rest().strip_prefix('\n') else {
            return false;
        };
        let whitespace = after.len() - after.trim_start_matches([' ', '\t']).len();
        if !after[whitespace..].starts_with('\n') {
            return false;
        }
        self.take(1 + whitespace);
        true
    }

    fn eos(&mut self) -> bool {
        if !self.input.is_empty() {
            return false;
        }
        let start = self.position;
        if !self.interpolated {
            while self.indent_stack.len() > 1 {
                self.indent_stack.pop();
                self.push(TokenKind::Outdent, start);
            }
        }
        self.push(TokenKind::Eos, start);
        self.ended = true;
        true
    }

    fn doctype(&mut self) -> bool {
        if !self.at_keyword("doctype") {
            return false;
        }
        let start = self.position;
        let value = self.keyword_argument("doctype");
        self.push(TokenKind::Doctype(value), start);
        true
    }

    fn interpolated_tag(&mut self) -> LexResult {
        if !self.input.starts_with("#{") {
            return Ok(false);
        }
        let start = self.position;
        let (end, expression) = self.bracket_at(1)?;
        self.take(end + 1);
        self.push(TokenKind::InterpolatedTag(expression), start);
        Ok(true)
    }

    fn case(&mut self) -> LexResult {
        if !self.at_keyword("case") {
            return Ok(false);
        }
        let start = self.position;
        let subject = self.keyword_argument("case");
        if subject.is_empty() {
            return Err(self.malformed("case", "expected an expression", start));
        }
        self.push(TokenKind::Case(subject), start);
        Ok(true)
    }

    fn when(&mut self) -> LexResult {
        if !self.at_keyword("when") {
            return Ok(false);
        }
        let start = self.position;
        self.take(4);
        let line = self.input.line().to_string();
        let (expression, consumed) = match expansion_colon(&line) {
            Some(colon) if line[colon + 1..].trim().is_empty() => (&line[..colon], line.len()),
            Some(colon) => (&line[..colon], colon),
            None => (line.as_str(), line.len()),
        };
        let expression = expression.trim().to_string();
        if expression.is_empty() {
            return Err(self.malformed("when", "expected an expression", start));
        }
        self.take(consumed);
        self.push(TokenKind::When(expression), start);
        Ok(true)
    }

    fn extends(&mut self) -> LexResult {
        let word = if self.at_keyword("extends") {
            "extends"
        } else if self.at_keyword("extend") {
            "extend"
        } else {
            return Ok(false);
        };
        let start = self.position;
        self.take(word.len());
        self.push(TokenKind::Extends, start);
        if !self.path() {
            return Err(self.malformed("extends", "expected a template path", start));
        }
        Ok(true)
    }

    fn path(&mut self) -> bool {
        let line = self.input.line();
        if !line.starts_with(' ') || line.trim().is_empty() {
            return false;
        }
        let lead = line.len() - line.trim_start().len();
        let len = line.len();
        let value = line.trim().to_string();
        self.take(lead);
        let start = self.position;
        self.take(len - lead);
        self.push(TokenKind::Path(value), start);
        true
    }

    fn named_block(&mut self) -> LexResult {
        let line = self.input.line().to_string();
        let (mode, name) = if let Some(name) = keyword_rest(&line, "append") {
            (BlockMode::Append, name)
        } else if let Some(name) = keyword_rest(&line, "prepend") {
            (BlockMode::Prepend, name)
        } else if let Some(rest) = keyword_rest(&line, "block") {
            let rest = rest.trim_start();
            if let Some(name) = keyword_rest(rest, "append") {
                (BlockMode::Append, name)
            } else if let Some(name) = keyword_rest(rest, "prepend") {
                (BlockMode::Prepend, name)
            } else {
                (BlockMode::Replace, rest)
            }
        } else {
            return Ok(false);
        };

        let name = name.split("//").next().unwrap_or_default().trim();
        let start = self.position;
        if name.is_empty() {
            if mode == BlockMode::Replace {
                return Ok(false);
            }
            return Err(self.malformed("block", "expected a block name", start));
        }
        let name = name.to_string();
        self.take(line.len());
        self.push(TokenKind::Block { name, mode }, start);
        Ok(true)
    }

    fn mixin_block(&mut self) -> bool {
        if !self.at_keyword("block") || !self.input.line()[5..].trim().is_empty() {
            return false;
        }
        let start = self.position;
        let len = self.input.line().len();
        self.take(len);
        self.push(TokenKind::MixinBlock, start);
        true
    }

    fn include(&mut self) -> LexResult {
        if !self.at_keyword("include") {
            return Ok(false);
        }
        let start = self.position;
        self.take(7);
        self.push(TokenKind::Include, start);

        while self.input.starts_with(":") {
            let len = word_len(&self.input.rest()[1..]);
            if len == 0 {
                return Err(self.malformed("include", "expected a filter name", start));
            }
            let filter_start = self.position;
            self.take(1);
            let name = self.take(len);
            self.push(TokenKind::Filter(name), filter_start);
            self.attributes()?;
        }

        if !self.path() {
            return Err(self.malformed("include", "expected a template path", start));
        }
        Ok(true)
    }

    fn mixin(&mut self) -> LexResult {
        if !self.at_keyword("mixin") {
            return Ok(false);
        }
        let start = self.position;
        let rest = &self.input.rest()[5..];
        let spaces = rest.len() - rest.trim_start_matches(' ').len();
        let len = word_len(&rest[spaces..]);
        if spaces == 0 || len == 0 {
            return Err(self.malformed("mixin", "expected a mixin name", start));
        }
        self.take(5 + spaces);
        let name = self.take(len);
        let args = self.arguments(false)?;
        self.push(TokenKind::Mixin { name, args }, start);
        Ok(true)
    }

    fn call(&mut self) -> LexResult {
        if !self.input.starts_with("+") {
            return Ok(false);
        }
        let rest = &self.input.rest()[1..];
        let spaces = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        let start = self.position;

        let (name, dynamic) = if rest[spaces..].starts_with("#{") {
            let (end, expression) = self.bracket_at(2 + spaces)?;
            self.take(end + 1);
            (expression, true)
        } else {
            let len = word_len(&rest[spaces..]);
            if len == 0 {
                return Ok(false);
            }
            self.take(1 + spaces);
            (self.take(len), false)
        };

        let args = self.arguments(true)?;
        self.push(
            TokenKind::Call {
                name,
                dynamic,
                args,
            },
            start,
        );
        Ok(true)
    }

    /// A parenthesized argument list after a mixin name. For calls, a list
    /// that reads like `(name=...)` is left for the attribute rule.
    fn arguments(&mut self, call: bool) -> Result<Option<String>, LexError> {
        let rest = self.input.rest();
        let spaces = rest.len() - rest.trim_start_matches(' ').len();
        if !rest[spaces..].starts_with('(') {
            return Ok(None);
        }
        let (end, inner) = self.bracket_at(spaces)?;
        if call && looks_like_attributes(&inner) {
            self.take(spaces);
            return Ok(None);
        }
        self.take(end + 1);
        Ok(Some(inner))
    }

    fn conditional(&mut self) -> LexResult {
        let line = self.input.line().to_string();
        let (keyword, condition) = if let Some(condition) = keyword_rest(&line, "if") {
            ("if", condition)
        } else if let Some(condition) = keyword_rest(&line, "unless") {
            ("unless", condition)
        } else if let Some(rest) = keyword_rest(&line, "else") {
            match keyword_rest(rest.trim_start(), "if") {
                Some(condition) if rest.starts_with([' ', '\t']) => ("else if", condition),
                _ => ("else", rest),
            }
        } else {
            return Ok(false);
        };

        let start = self.position;
        let condition = condition.trim().to_string();
        let kind = match keyword {
            "else" if !condition.is_empty() => {
                return Err(self.malformed("else", "`else` cannot have a condition", start));
            }
            "else" => TokenKind::Else,
            _ if condition.is_empty() => {
                return Err(self.malformed(keyword, "expected a condition", start));
            }
            "if" => TokenKind::If(condition),
            "unless" => TokenKind::Unless(condition),
            _ => TokenKind::ElseIf(condition),
        };
        self.take(line.len());
        self.push(kind, start);
        Ok(true)
    }

    fn each(&mut self) -> LexResult {
        let line = self.input.line().to_string();
        let Some(rest) = keyword_rest(&line, "each").or_else(|| keyword_rest(&line, "for")) else {
            return Ok(false);
        };
        let start = self.position;
        let Some((value, key, expression)) = parse_each(rest) else {
            return Err(self.malformed(
                "each",
                "expected `each VALUE[, KEY] in EXPRESSION`",
                start,
            ));
        };
        self.take(line.len());
        self.push(
            TokenKind::Each {
                value,
                key,
                expression,
            },
            start,
        );
        Ok(true)
    }

    fn while_loop(&mut self) -> LexResult {
        if !self.at_keyword("while") {
            return Ok(false);
        }
        let start = self.position;
        let condition = self.keyword_argument("while");
        if condition.is_empty() {
            return Err(self.malformed("while", "expected a condition", start));
        }
        self.push(TokenKind::While(condition), start);
        Ok(true)
    }

    fn tag(&mut self) -> bool {
        let rest = self.input.rest();
        if !rest
            .chars()
            .next()
            .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return false;
        }
        let end = rest
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ':')))
            .unwrap_or(rest.len());
        let len = rest[..end].trim_end_matches(['-', ':']).len();
        let start = self.position;
        let name = self.take(len);
        self.push(TokenKind::Tag(name), start);
        true
    }

    fn filter(&mut self) -> LexResult {
        if !self.input.starts_with(":") {
            return Ok(false);
        }
        let len = word_len(&self.input.rest()[1..]);
        if len == 0 {
            return Ok(false);
        }
        let start = self.position;
        self.take(1);
        let name = self.take(len);
        self.push(TokenKind::Filter(name), start);
        self.attributes()?;
        self.interpolation_allowed = false;
        self.pipeless_text()?;
        Ok(true)
    }

    fn block_code(&mut self) -> LexResult {
        if !self.input.starts_with("-") || !self.input.line()[1..].trim().is_empty() {
            return Ok(false);
        }
        let start = self.position;
        let len = self.input.line().len();
        self.take(len);
        self.push(TokenKind::BlockCode, start);
        self.interpolation_allowed = false;
        self.pipeless_text()?;
        Ok(true)
    }

    fn code(&mut self) -> LexResult {
        let line = self.input.line();
        let (flag, buffered, escaped) = if line.starts_with("!=") {
            (2, true, false)
        } else if line.starts_with('=') {
            (1, true, true)
        } else if line.starts_with('-') {
            (1, false, false)
        } else {
            return Ok(false);
        };
        let code = line[flag..].trim().to_string();
        if code.is_empty() {
            return Ok(false);
        }
        let len = line.len();
        let start = self.position;

        if buffered {
            if let Err(err) = self.syntax.assert_syntax_valid(&code) {
                return Err(LexError::InvalidExpression {
                    expression: code,
                    message: err.to_string(),
                    location: self.location(start),
                });
            }
        }

        self.take(len);
        self.push(
            TokenKind::Code {
                code,
                buffered,
                escaped,
            },
            start,
        );
        Ok(true)
    }

    fn id(&mut self) -> LexResult {
        if !self.input.starts_with("#") {
            return Ok(false);
        }
        let start = self.position;
        let len = word_len(&self.input.rest()[1..]);
        if len == 0 {
            let name = self.input.line()[1..]
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();
            return Err(LexError::InvalidId {
                name,
                location: self.location(start),
            });
        }
        self.take(1);
        let name = self.take(len);
        self.push(TokenKind::CssId(name), start);
        Ok(true)
    }

    fn dot(&mut self) -> LexResult {
        if !self.input.starts_with(".") || !self.input.line()[1..].trim().is_empty() {
            return Ok(false);
        }
        let start = self.position;
        let len = self.input.line().len();
        self.take(len);
        self.push(TokenKind::Dot, start);
        self.pipeless_text()?;
        Ok(true)
    }

    fn class(&mut self) -> LexResult {
        if !self.input.starts_with(".") {
            return Ok(false);
        }
        let rest = &self.input.rest()[1..];
        let len = word_len(rest);
        if len == 0 {
            return Ok(false);
        }
        let start = self.position;
        if !is_class_name(&rest[..len]) {
            return Err(LexError::InvalidClassName {
                name: rest[..len].to_string(),
                location: self.location(start),
            });
        }
        self.take(1);
        let name = self.take(len);
        self.push(TokenKind::CssClass(name), start);
        Ok(true)
    }

    fn attributes(&mut self) -> LexResult {
        if !self.input.starts_with("(") {
            return Ok(false);
        }
        let (end, inner) = self.bracket_at(0)?;
        let start = self.position;
        self.take(1);
        self.push(TokenKind::StartAttributes, start);

        self.attribute_list(&inner)?;

        self.take(end - 1);
        let close = self.position;
        self.take(1);
        self.push(TokenKind::EndAttributes, close);
        Ok(true)
    }

    /// Split the text between attribute parentheses into attribute tokens.
    ///
    /// Values are not delimited by anything but the expression grammar:
    /// `(a=1 b=2)` and `(a=x + y)` are told apart by asking the expression
    /// handler whether the text before a space is already a complete
    /// expression.
    fn attribute_list(&mut self, inner: &str) -> Result<(), LexError> {
        let base = self.position;
        let at = |offset: usize| base.advance(&inner[..offset]);
        let mut index = 0;

        loop {
            index = skip_while(inner, index, |ch| ch.is_whitespace() || ch == ',');
            if index >= inner.len() {
                break;
            }

            let key_start = index;
            let Some((name, after_key)) = attribute_name(inner, index) else {
                return Err(LexError::UnexpectedText {
                    text: inner[index..].chars().take(20).collect(),
                    location: self.location(at(index)),
                });
            };

            let mut cursor = skip_while(inner, after_key, char::is_whitespace);
            let operator = if inner[cursor..].starts_with("!=") {
                Some(false)
            } else if inner[cursor..].starts_with('=') {
                Some(true)
            } else {
                None
            };

            let (value, escaped) = match operator {
                Some(escaped) => {
                    cursor += if escaped { 1 } else { 2 };
                    let value_start = skip_while(inner, cursor, char::is_whitespace);
                    let value_end = self.attribute_value_end(inner, value_start, base)?;
                    let value = inner[value_start..value_end].trim();
                    if value.is_empty() {
                        return Err(LexError::UnexpectedText {
                            text: format!("{name}="),
                            location: self.location(at(key_start)),
                        });
                    }
                    cursor = value_end;
                    (Some(value.to_string()), escaped)
                }
                None => {
                    cursor = after_key;
                    (None, true)
                }
            };

            self.push_span(
                TokenKind::Attribute {
                    name,
                    value,
                    escaped,
                },
                at(key_start),
                at(cursor),
            );
            index = cursor;
        }
        Ok(())
    }

    fn attribute_value_end(
        &self,
        text: &str,
        start: usize,
        base: LineCol,
    ) -> Result<usize, LexError> {
        let mut state = BracketState::new();
        for (index, ch) in text[start..].char_indices() {
            let offset = start + index;
            if !state.is_nesting() && !state.is_string() {
                if ch == ',' {
                    return Ok(offset);
                }
                if ch.is_whitespace() {
                    let candidate = text[start..offset].trim();
                    match text[offset..].trim_start().chars().next() {
                        None => return Ok(offset),
                        Some(next)
                            if !is_punctuator(next)
                                && !candidate.is_empty()
                                && self.syntax.assert_syntax_valid(candidate).is_ok() =>
                        {
                            return Ok(offset);
                        }
                        _ => {}
                    }
                }
            }
            state
                .feed(ch, offset)
                .map_err(|err| self.bracket_error(err, text, base))?;
        }
        Ok(text.len())
    }

    fn attributes_block(&mut self) -> LexResult {
        const KEYWORD: &str = "&attributes";
        if !self.at_keyword(KEYWORD) {
            return Ok(false);
        }
        let start = self.position;
        if !self.input.rest()[KEYWORD.len()..].starts_with('(') {
            return Err(self.malformed(KEYWORD, "expected `(`", start));
        }
        let (end, expression) = self.bracket_at(KEYWORD.len())?;
        self.take(end + 1);
        self.push(TokenKind::AttributesBlock(expression), start);
        Ok(true)
    }

    fn indent(&mut self) -> LexResult {
        let rest = self.input.rest();
        let Some(body) = rest.strip_prefix('\n') else {
            return Ok(false);
        };
        let line = &body[..body.find('\n').unwrap_or(body.len())];
        let tabs = line.len() - line.trim_start_matches('\t').len();
        let spaces = line[tabs..].len() - line[tabs..].trim_start_matches(' ').len();
        let indents = tabs + spaces;
        let blank = line[indents..].trim().is_empty();

        let start = self.position.advance("\n");
        if (tabs > 0 && spaces > 0) || line[indents..].starts_with('\t') {
            return Err(LexError::InvalidIndentation {
                reason: "you can use tabs or spaces but not both".to_string(),
                location: self.location(start),
            });
        }

        let style = match (tabs, spaces) {
            (0, 0) => None,
            (0, _) => Some(IndentStyle::Spaces),
            _ => Some(IndentStyle::Tabs),
        };
        if let (Some(style), Some(locked)) = (style, self.indent_style) {
            if style != locked && !blank {
                return Err(LexError::InvalidIndentation {
                    reason: format!("the file is indented with {locked} but this line uses {style}"),
                    location: self.location(start),
                });
            }
        }

        self.take(1 + indents);
        self.interpolation_allowed = true;

        if blank {
            self.push(TokenKind::Newline, start);
            return Ok(true);
        }
        if self.indent_style.is_none() {
            self.indent_style = style;
        }

        let top = self.indent_stack.last().copied().unwrap_or(0);
        if indents < top {
            let mut outdents = 0;
            while self.indent_stack.last().is_some_and(|level| *level > indents) {
                self.indent_stack.pop();
                outdents += 1;
            }
            let landed = self.indent_stack.last().copied().unwrap_or(0);
            if landed != indents {
                return Err(LexError::InvalidIndentation {
                    reason: format!(
                        "inconsistent indentation, expected {landed} or {top} but found {indents}"
                    ),
                    location: self.location(start),
                });
            }
            for _ in 0..outdents {
                self.push(TokenKind::Outdent, start);
            }
        } else if indents > top {
            self.indent_stack.push(indents);
            self.push(TokenKind::Indent(indents), start);
        } else {
            self.push(TokenKind::Newline, start);
        }
        Ok(true)
    }

    /// Lines indented deeper than the current level, taken verbatim.
    ///
    /// The block's indentation is that of its least indented line, so a
    /// later line with less indentation (but still inside the block) lowers
    /// the amount stripped from every line. Trailing blank lines are left
    /// in the input.
    fn pipeless_text(&mut self) -> LexResult {
        let top = self.indent_stack.last().copied().unwrap_or(0);
        let Some(body) = self.input.rest().strip_prefix('\n') else {
            self.interpolation_allowed = true;
            return Ok(false);
        };
        let lines: Vec<&str> = body.split('\n').collect();

        let mut indent = usize::MAX;
        let mut count = 0;
        for line in &lines {
            if !line.trim().is_empty() {
                let level = indentation(line);
                if level <= top {
                    break;
                }
                indent = indent.min(level);
            }
            count += 1;
        }
        while count > 0 && lines[count - 1].trim().is_empty() {
            count -= 1;
        }
        if count == 0 {
            self.interpolation_allowed = true;
            return Ok(false);
        }

        let lines: Vec<String> = lines[..count].iter().map(ToString::to_string).collect();
        self.push(TokenKind::StartPipelessText, self.position);
        for (index, line) in lines.iter().enumerate() {
            let newline = self.position;
            self.take(1);
            if index > 0 {
                self.push(TokenKind::Newline, newline);
            }
            let strip = if line.trim().is_empty() {
                line.len()
            } else {
                indent
            };
            self.take(strip);
            let text = &line[strip..];
            let start = self.position;
            self.take(text.len());
            if !text.is_empty() {
                self.add_text(text, start, false)?;
            }
        }
        self.push(TokenKind::EndPipelessText, self.position);
        self.interpolation_allowed = true;
        Ok(true)
    }

    fn text(&mut self) -> LexResult {
        let line = self.input.line();
        let prefix = if line.starts_with("| ") {
            2
        } else if line.starts_with('|') || line.starts_with(' ') {
            1
        } else {
            return Ok(false);
        };
        let value = line[prefix..].to_string();
        self.take(prefix);
        let start = self.position;
        self.take(value.len());
        if !value.is_empty() {
            self.add_text(&value, start, false)?;
        }
        Ok(true)
    }

    fn text_html(&mut self) -> LexResult {
        if !self.input.starts_with("<") {
            return Ok(false);
        }
        let value = self.input.line().to_string();
        let start = self.position;
        self.take(value.len());
        self.add_text(&value, start, true)?;
        Ok(true)
    }

    /// Emit text, splitting out `#{}`/`!{}` code and `#[]` tag interpolation.
    fn add_text(&mut self, value: &str, start: LineCol, html: bool) -> Result<(), LexError> {
        if !self.interpolation_allowed {
            self.push_span(text_kind(value.to_string(), html), start, start.advance(value));
            return Ok(());
        }

        let mut segment = String::new();
        let mut segment_start = 0;
        let mut index = 0;

        while let Some(ch) = value[index..].chars().next() {
            let rest = &value[index..];
            if rest.starts_with("\\#{") || rest.starts_with("\\!{") || rest.starts_with("\\#[") {
                segment.push_str(&rest[1..3]);
                index += 3;
                continue;
            }

            let tag = rest.starts_with("#[");
            if !(tag || rest.starts_with("#{") || rest.starts_with("!{")) {
                segment.push(ch);
                index += ch.len_utf8();
                continue;
            }

            let (end, inner) = match match_bracket(value, index + 1) {
                Ok(found) => (found.end, found.inner.to_string()),
                Err(err) => return Err(self.bracket_error(err, value, start)),
            };
            let code_start = start.advance(&value[..index]);
            let code_end = start.advance(&value[..=end]);
            if !segment.is_empty() {
                let kind = text_kind(std::mem::take(&mut segment), html);
                self.push_span(kind, start.advance(&value[..segment_start]), code_start);
            }

            if tag {
                self.push_span(TokenKind::StartInterpolation, code_start, code_start);
                let inner_start = start.advance(&value[..index + 2]);
                let (tokens, inner_end) =
                    lex_nested(&inner, Arc::clone(&self.file), inner_start, self.syntax)?;
                self.tokens.extend(tokens);
                self.push_span(TokenKind::EndInterpolation, inner_end, code_end);
            } else {
                if let Err(err) = self.syntax.assert_syntax_valid(&inner) {
                    return Err(LexError::InvalidExpression {
                        expression: inner,
                        message: err.to_string(),
                        location: self.location(code_start),
                    });
                }
                self.push_span(
                    TokenKind::InterpolatedCode {
                        code: inner,
                        escaped: ch == '#',
                    },
                    code_start,
                    code_end,
                );
            }

            index = end + 1;
            segment_start = index;
        }

        if !segment.is_empty() {
            self.push_span(
                text_kind(segment, html),
                start.advance(&value[..segment_start]),
                start.advance(value),
            );
        }
        Ok(())
    }

    fn comment(&mut self) -> LexResult {
        if !self.input.starts_with("//") {
            return Ok(false);
        }
        let line = self.input.line().to_string();
        let buffered = !line[2..].starts_with('-');
        let text = line[if buffered { 2 } else { 3 }..].to_string();
        let start = self.position;
        self.take(line.len());
        self.push(TokenKind::Comment { text, buffered }, start);
        self.interpolation_allowed = false;
        self.pipeless_text()?;
        Ok(true)
    }

    fn slash(&mut self) -> bool {
        if !self.input.starts_with("/") {
            return false;
        }
        let start = self.position;
        self.take(1);
        self.push(TokenKind::Slash, start);
        true
    }

    fn colon(&mut self) -> bool {
        if !self.input.starts_with(": ") {
            return false;
        }
        let rest = &self.input.rest()[1..];
        let spaces = rest.len() - rest.trim_start_matches(' ').len();
        let start = self.position;
        self.take(1 + spaces);
        self.push(TokenKind::Colon, start);
        true
    }

    fn fail(&self) -> LexError {
        LexError::UnexpectedText {
            text: self.input.line().chars().take(20).collect(),
            location: self.location(self.position),
        }
    }
}

/// Lex the contents of a `#[...]` interpolation starting at `start`.
///
/// Returns the tokens without the trailing `Eos`, plus the position where
/// the nested text ends.
pub fn lex_nested(
    text: &str,
    file: Arc<str>,
    start: LineCol,
    syntax: &dyn ExpressionHandler,
) -> Result<(Vec<Token>, LineCol), LexError> {
    let mut lexer = Lexer::new(text, file, syntax);
    lexer.position = start;
    lexer.interpolated = true;
    let mut tokens = lexer.tokenize()?;
    let end = tokens.pop().map_or(start, |eos| eos.end());
    Ok((tokens, end))
}

fn text_kind(text: String, html: bool) -> TokenKind {
    if html {
        TokenKind::TextHtml(text)
    } else {
        TokenKind::Text(text)
    }
}

/// The text after `word` when `text` starts with it as a whole word.
fn keyword_rest<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(word)?;
    match rest.chars().next() {
        Some(ch) if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' => None,
        _ => Some(rest),
    }
}

/// `-?[_a-zA-Z][_a-zA-Z0-9-]*`; the tail is already bounded by [`word_len`].
fn is_class_name(name: &str) -> bool {
    let name = name.strip_prefix('-').unwrap_or(name);
    name.chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_')
}

/// Length of the leading `[A-Za-z0-9_-]` run.
fn word_len(text: &str) -> usize {
    text.find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'))
        .unwrap_or(text.len())
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn skip_while(text: &str, from: usize, predicate: impl Fn(char) -> bool) -> usize {
    text[from..]
        .find(|ch: char| !predicate(ch))
        .map_or(text.len(), |offset| from + offset)
}

fn attribute_name(text: &str, start: usize) -> Option<(String, usize)> {
    let rest = &text[start..];
    let first = rest.chars().next()?;
    if first == '\'' || first == '"' {
        let close = rest[1..].find(first)?;
        return Some((rest[1..=close].to_string(), start + close + 2));
    }
    let len = rest
        .find(|ch: char| ch.is_whitespace() || matches!(ch, '!' | '=' | ','))
        .unwrap_or(rest.len());
    if len == 0 {
        return None;
    }
    Some((rest[..len].to_string(), start + len))
}

/// The `:` separating a `when` expression from an inline block, ignoring
/// colons nested in brackets, strings or a ternary.
fn expansion_colon(line: &str) -> Option<usize> {
    let mut state = BracketState::new();
    let mut ternaries = 0usize;
    for (index, ch) in line.char_indices() {
        if !state.is_nesting() && !state.is_string() {
            match ch {
                '?' => ternaries += 1,
                ':' if ternaries > 0 => ternaries -= 1,
                ':' if line[index + 1..].is_empty() || line[index + 1..].starts_with(' ') => {
                    return Some(index);
                }
                _ => {}
            }
        }
        state.feed(ch, index).ok()?;
    }
    None
}

fn looks_like_attributes(args: &str) -> bool {
    let args = args.trim_start();
    let len = word_len(args);
    if len == 0 {
        return false;
    }
    let after = args[len..].trim_start_matches(' ');
    after.starts_with('=') && !after.starts_with("==")
}

fn parse_each(rest: &str) -> Option<(String, Option<String>, String)> {
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    let (value, rest) = split_identifier(rest.trim_start())?;
    let rest = rest.trim_start();
    let (key, rest) = match rest.strip_prefix(',') {
        Some(rest) => {
            let (key, rest) = split_identifier(rest.trim_start())?;
            (Some(key.to_string()), rest.trim_start())
        }
        None => (None, rest),
    };
    let expression = keyword_rest(rest, "in")?.trim();
    if expression.is_empty() {
        return None;
    }
    Some((value.to_string(), key, expression.to_string()))
}

fn split_identifier(text: &str) -> Option<(&str, &str)> {
    let first = text.chars().next()?;
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return None;
    }
    let len = text
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'))
        .unwrap_or(text.len());
    Some((&text[..len], &text[len..]))
}

#[cfg(test)]
mod tests {
    use jadeite_expr::DefaultExpressionHandler;

    use super::*;

    fn lex(source: &str) -> Result<Vec<Token>, LexError> {
        let syntax = DefaultExpressionHandler::new();
        Lexer::new(source, Arc::from("test.pug"), &syntax).tokenize()
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .unwrap()
            .into_iter()
            .map(Token::into_kind)
            .collect()
    }

    fn tag(name: &str) -> TokenKind {
        TokenKind::Tag(name.to_string())
    }

    fn text(value: &str) -> TokenKind {
        TokenKind::Text(value.to_string())
    }

    fn attribute(name: &str, value: Option<&str>) -> TokenKind {
        TokenKind::Attribute {
            name: name.to_string(),
            value: value.map(ToString::to_string),
            escaped: true,
        }
    }

    mod indentation {
        use super::*;

        #[test]
        fn indent_and_outdent() {
            insta::assert_yaml_snapshot!(kinds("div\n  p hi\nspan"), @r"
            - Tag: div
            - Indent: 2
            - Tag: p
            - Text: hi
            - Outdent
            - Tag: span
            - Eos
            ");
        }

        #[test]
        fn one_outdent_per_level() {
            insta::assert_yaml_snapshot!(kinds("a\n  b\n    c\nd"), @r"
            - Tag: a
            - Indent: 2
            - Tag: b
            - Indent: 4
            - Tag: c
            - Outdent
            - Outdent
            - Tag: d
            - Eos
            ");
        }

        #[test]
        fn dedents_several_levels_at_once() {
            insta::assert_yaml_snapshot!(kinds("a\n  b\n    c\n      d\n        e\nf"), @r"
            - Tag: a
            - Indent: 2
            - Tag: b
            - Indent: 4
            - Tag: c
            - Indent: 6
            - Tag: d
            - Indent: 8
            - Tag: e
            - Outdent
            - Outdent
            - Outdent
            - Outdent
            - Tag: f
            - Eos
            ");
        }

        #[test]
        fn dedent_count_matches_levels_crossed() {
            for depth in 1..=6 {
                let mut source = String::from("root");
                for level in 1..=depth {
                    source.push('\n');
                    source.push_str(&"  ".repeat(level));
                    source.push('x');
                }
                source.push_str("\n  y");

                let tokens = kinds(&source);
                let y = tokens.iter().position(|kind| kind == &tag("y")).unwrap();
                let outdents = tokens[..y]
                    .iter()
                    .rev()
                    .take_while(|kind| **kind == TokenKind::Outdent)
                    .count();
                assert_eq!(outdents, depth - 1, "{source:?}");
            }
        }

        #[test]
        fn closes_open_levels_at_end() {
            insta::assert_yaml_snapshot!(kinds("a\n  b\n    c"), @r"
            - Tag: a
            - Indent: 2
            - Tag: b
            - Indent: 4
            - Tag: c
            - Outdent
            - Outdent
            - Eos
            ");
        }

        #[test]
        fn blank_lines_collapse() {
            insta::assert_yaml_snapshot!(kinds("a\n\n  \nb\n"), @r"
            - Tag: a
            - Newline
            - Tag: b
            - Newline
            - Eos
            ");
        }

        #[test]
        fn indented_first_line() {
            let err = lex("  p x\np y").unwrap_err();
            assert!(matches!(err, LexError::InvalidIndentation { .. }));
            assert_eq!(err.location().line(), 1);
            assert!(matches!(
                lex("\tp").unwrap_err(),
                LexError::InvalidIndentation { .. }
            ));
        }

        #[test]
        fn inconsistent_outdent() {
            let err = lex("a\n    b\n  c").unwrap_err();
            assert!(matches!(err, LexError::InvalidIndentation { .. }));
            assert_eq!(err.location().line(), 3);
        }

        #[test]
        fn tabs_and_spaces_on_one_line() {
            assert!(matches!(
                lex("a\n\t b").unwrap_err(),
                LexError::InvalidIndentation { .. }
            ));
        }

        #[test]
        fn tabs_then_spaces() {
            assert!(matches!(
                lex("a\n\tb\nc\n  d").unwrap_err(),
                LexError::InvalidIndentation { .. }
            ));
        }

        #[test]
        fn tracks_positions() {
            let tokens = lex("div\n  p").unwrap();
            let p = tokens
                .iter()
                .find(|token| token.kind() == &tag("p"))
                .unwrap();
            assert_eq!(p.start(), LineCol::new(2, 3));
            assert_eq!(p.end(), LineCol::new(2, 4));
            assert_eq!(p.file(), "test.pug");
        }
    }

    mod tags {
        use super::*;

        #[test]
        fn ids_classes_and_text() {
            insta::assert_yaml_snapshot!(kinds("#main.a.b text"), @r"
            - CssId: main
            - CssClass: a
            - CssClass: b
            - Text: text
            - Eos
            ");
        }

        #[test]
        fn namespaced_tag_and_block_expansion() {
            assert_eq!(
                kinds("svg:use\nli: a"),
                vec![
                    tag("svg:use"),
                    TokenKind::Newline,
                    tag("li"),
                    TokenKind::Colon,
                    tag("a"),
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn self_closing_slash() {
            assert_eq!(
                kinds("foo/"),
                vec![tag("foo"), TokenKind::Slash, TokenKind::Eos]
            );
        }

        #[test]
        fn invalid_class_name() {
            assert!(matches!(
                lex(".1").unwrap_err(),
                LexError::InvalidClassName { name, .. } if name == "1"
            ));
            assert!(matches!(
                lex(".1a").unwrap_err(),
                LexError::InvalidClassName { name, .. } if name == "1a"
            ));
            assert!(matches!(
                lex(".-1").unwrap_err(),
                LexError::InvalidClassName { name, .. } if name == "-1"
            ));
        }

        #[test]
        fn class_names_may_start_with_a_dash_or_underscore() {
            assert_eq!(
                kinds(".-a._b.c1-2"),
                vec![
                    TokenKind::CssClass("-a".into()),
                    TokenKind::CssClass("_b".into()),
                    TokenKind::CssClass("c1-2".into()),
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn invalid_id() {
            assert!(matches!(
                lex("# x").unwrap_err(),
                LexError::InvalidId { .. }
            ));
        }

        #[test]
        fn interpolated_tag_name() {
            assert_eq!(
                kinds("#{level} Title"),
                vec![
                    TokenKind::InterpolatedTag("level".into()),
                    text("Title"),
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn unexpected_text() {
            assert!(matches!(
                lex("@foo").unwrap_err(),
                LexError::UnexpectedText { text, .. } if text == "@foo"
            ));
        }
    }

    mod attributes {
        use super::*;

        #[test]
        fn space_and_comma_separated() {
            assert_eq!(
                kinds("a(href='/home' title=x, data-id=\"1\" checked)"),
                vec![
                    tag("a"),
                    TokenKind::StartAttributes,
                    attribute("href", Some("'/home'")),
                    attribute("title", Some("x")),
                    attribute("data-id", Some("\"1\"")),
                    attribute("checked", None),
                    TokenKind::EndAttributes,
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn expressions_with_spaces() {
            assert_eq!(
                kinds("p(class= a + b title=c)"),
                vec![
                    tag("p"),
                    TokenKind::StartAttributes,
                    attribute("class", Some("a + b")),
                    attribute("title", Some("c")),
                    TokenKind::EndAttributes,
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn unescaped_and_quoted_names() {
            assert_eq!(
                kinds("div('(click)'='go()' body!=html)"),
                vec![
                    tag("div"),
                    TokenKind::StartAttributes,
                    attribute("(click)", Some("'go()'")),
                    TokenKind::Attribute {
                        name: "body".into(),
                        value: Some("html".into()),
                        escaped: false,
                    },
                    TokenKind::EndAttributes,
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn spans_lines() {
            let tokens = kinds("input(\n  type='text'\n  name='q'\n)");
            assert_eq!(
                tokens,
                vec![
                    tag("input"),
                    TokenKind::StartAttributes,
                    attribute("type", Some("'text'")),
                    attribute("name", Some("'q'")),
                    TokenKind::EndAttributes,
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn attributes_block() {
            assert_eq!(
                kinds("div&attributes({id: 'x'})"),
                vec![
                    tag("div"),
                    TokenKind::AttributesBlock("{id: 'x'}".into()),
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn unterminated() {
            let err = lex("a(href='x'").unwrap_err();
            assert_eq!(
                err,
                LexError::UnterminatedBracket {
                    opening: '(',
                    location: Location::new(Arc::from("test.pug"), LineCol::new(1, 2)),
                }
            );
        }
    }

    mod text {
        use super::*;

        #[test]
        fn piped_text() {
            assert_eq!(
                kinds("| plain\n|\n|  two"),
                vec![
                    text("plain"),
                    TokenKind::Newline,
                    TokenKind::Newline,
                    text(" two"),
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn interpolated_code() {
            assert_eq!(
                kinds("p Hello, #{name}!"),
                vec![
                    tag("p"),
                    text("Hello, "),
                    TokenKind::InterpolatedCode {
                        code: "name".into(),
                        escaped: true,
                    },
                    text("!"),
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn unescaped_interpolation() {
            assert_eq!(
                kinds("p !{html}"),
                vec![
                    tag("p"),
                    TokenKind::InterpolatedCode {
                        code: "html".into(),
                        escaped: false,
                    },
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn escaped_interpolation() {
            assert_eq!(
                kinds("p \\#{x} and \\#[y]"),
                vec![tag("p"), text("#{x} and #[y]"), TokenKind::Eos]
            );
        }

        #[test]
        fn tag_interpolation() {
            assert_eq!(
                kinds("p a #[strong b] c"),
                vec![
                    tag("p"),
                    text("a "),
                    TokenKind::StartInterpolation,
                    tag("strong"),
                    text("b"),
                    TokenKind::EndInterpolation,
                    text(" c"),
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn invalid_interpolated_expression() {
            assert!(matches!(
                lex("p #{a +}").unwrap_err(),
                LexError::InvalidExpression { .. }
            ));
        }

        #[test]
        fn html_text() {
            assert_eq!(
                kinds("<em>#{x}</em>"),
                vec![
                    TokenKind::TextHtml("<em>".into()),
                    TokenKind::InterpolatedCode {
                        code: "x".into(),
                        escaped: true,
                    },
                    TokenKind::TextHtml("</em>".into()),
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn pipeless_text_after_dot() {
            assert_eq!(
                kinds("script.\n  if (a)\n    b()\np"),
                vec![
                    tag("script"),
                    TokenKind::Dot,
                    TokenKind::StartPipelessText,
                    text("if (a)"),
                    TokenKind::Newline,
                    text("  b()"),
                    TokenKind::EndPipelessText,
                    TokenKind::Newline,
                    tag("p"),
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn pipeless_text_lowers_indent() {
            assert_eq!(
                kinds("div\n  p.\n      a\n    b"),
                vec![
                    tag("div"),
                    TokenKind::Indent(2),
                    tag("p"),
                    TokenKind::Dot,
                    TokenKind::StartPipelessText,
                    text("  a"),
                    TokenKind::Newline,
                    text("b"),
                    TokenKind::EndPipelessText,
                    TokenKind::Outdent,
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn comments() {
            assert_eq!(
                kinds("// hi #{x}\n//- secret\n  body"),
                vec![
                    TokenKind::Comment {
                        text: " hi #{x}".into(),
                        buffered: true,
                    },
                    TokenKind::Newline,
                    TokenKind::Comment {
                        text: " secret".into(),
                        buffered: false,
                    },
                    TokenKind::StartPipelessText,
                    text("body"),
                    TokenKind::EndPipelessText,
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn filter_body_is_raw() {
            assert_eq!(
                kinds(":cdata\n  a #{b}"),
                vec![
                    TokenKind::Filter("cdata".into()),
                    TokenKind::StartPipelessText,
                    text("a #{b}"),
                    TokenKind::EndPipelessText,
                    TokenKind::Eos,
                ]
            );
        }
    }

    mod code {
        use super::*;

        #[test]
        fn buffered_and_unbuffered() {
            assert_eq!(
                kinds("p= user.name\n- var x = 1\np!= raw"),
                vec![
                    tag("p"),
                    TokenKind::Code {
                        code: "user.name".into(),
                        buffered: true,
                        escaped: true,
                    },
                    TokenKind::Newline,
                    TokenKind::Code {
                        code: "var x = 1".into(),
                        buffered: false,
                        escaped: false,
                    },
                    TokenKind::Newline,
                    tag("p"),
                    TokenKind::Code {
                        code: "raw".into(),
                        buffered: true,
                        escaped: false,
                    },
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn invalid_buffered_code() {
            let err = lex("p= a +").unwrap_err();
            assert!(matches!(err, LexError::InvalidExpression { .. }));
            assert_eq!(err.code(), "J107");
        }

        #[test]
        fn block_code() {
            assert_eq!(
                kinds("-\n  var a = 1\n  var b = 2"),
                vec![
                    TokenKind::BlockCode,
                    TokenKind::StartPipelessText,
                    text("var a = 1"),
                    TokenKind::Newline,
                    text("var b = 2"),
                    TokenKind::EndPipelessText,
                    TokenKind::Eos,
                ]
            );
        }
    }

    mod keywords {
        use super::*;

        #[test]
        fn conditionals() {
            assert_eq!(
                kinds("if a\nelse if b\nunless c\nelse"),
                vec![
                    TokenKind::If("a".into()),
                    TokenKind::Newline,
                    TokenKind::ElseIf("b".into()),
                    TokenKind::Newline,
                    TokenKind::Unless("c".into()),
                    TokenKind::Newline,
                    TokenKind::Else,
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn keywords_need_a_boundary() {
            assert_eq!(kinds("iframe"), vec![tag("iframe"), TokenKind::Eos]);
            assert_eq!(kinds("format"), vec![tag("format"), TokenKind::Eos]);
        }

        #[test]
        fn else_with_condition() {
            assert!(matches!(
                lex("if a\nelse b").unwrap_err(),
                LexError::MalformedKeyword { keyword: "else", .. }
            ));
        }

        #[test]
        fn each_forms() {
            assert_eq!(
                kinds("each item, i in items\nfor x in [1, 2]"),
                vec![
                    TokenKind::Each {
                        value: "item".into(),
                        key: Some("i".into()),
                        expression: "items".into(),
                    },
                    TokenKind::Newline,
                    TokenKind::Each {
                        value: "x".into(),
                        key: None,
                        expression: "[1, 2]".into(),
                    },
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn malformed_each() {
            assert!(matches!(
                lex("each in items").unwrap_err(),
                LexError::MalformedKeyword { keyword: "each", .. }
            ));
        }

        #[test]
        fn case_when_default() {
            assert_eq!(
                kinds("case x\n  when 1: p one\n  when 2\n  default"),
                vec![
                    TokenKind::Case("x".into()),
                    TokenKind::Indent(2),
                    TokenKind::When("1".into()),
                    TokenKind::Colon,
                    tag("p"),
                    text("one"),
                    TokenKind::Newline,
                    TokenKind::When("2".into()),
                    TokenKind::Newline,
                    TokenKind::Default,
                    TokenKind::Outdent,
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn when_with_string_colon() {
            assert_eq!(
                kinds("when 'a: b'"),
                vec![TokenKind::When("'a: b'".into()), TokenKind::Eos]
            );
        }

        #[test]
        fn inheritance() {
            assert_eq!(
                kinds("extends layout\nblock content\nappend scripts\nblock prepend head"),
                vec![
                    TokenKind::Extends,
                    TokenKind::Path("layout".into()),
                    TokenKind::Newline,
                    TokenKind::Block {
                        name: "content".into(),
                        mode: BlockMode::Replace,
                    },
                    TokenKind::Newline,
                    TokenKind::Block {
                        name: "scripts".into(),
                        mode: BlockMode::Append,
                    },
                    TokenKind::Newline,
                    TokenKind::Block {
                        name: "head".into(),
                        mode: BlockMode::Prepend,
                    },
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn extends_without_path() {
            assert!(matches!(
                lex("extends").unwrap_err(),
                LexError::MalformedKeyword { keyword: "extends", .. }
            ));
        }

        #[test]
        fn include_with_filter() {
            assert_eq!(
                kinds("include:cdata(flavor='x') doc.txt"),
                vec![
                    TokenKind::Include,
                    TokenKind::Filter("cdata".into()),
                    TokenKind::StartAttributes,
                    attribute("flavor", Some("'x'")),
                    TokenKind::EndAttributes,
                    TokenKind::Path("doc.txt".into()),
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn mixins() {
            assert_eq!(
                kinds("mixin card(title, ...rest)\n  block\n+card('x')(class='y')\n+#{name}"),
                vec![
                    TokenKind::Mixin {
                        name: "card".into(),
                        args: Some("title, ...rest".into()),
                    },
                    TokenKind::Indent(2),
                    TokenKind::MixinBlock,
                    TokenKind::Outdent,
                    TokenKind::Call {
                        name: "card".into(),
                        dynamic: false,
                        args: Some("'x'".into()),
                    },
                    TokenKind::StartAttributes,
                    attribute("class", Some("'y'")),
                    TokenKind::EndAttributes,
                    TokenKind::Newline,
                    TokenKind::Call {
                        name: "name".into(),
                        dynamic: true,
                        args: None,
                    },
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn call_with_attributes_only() {
            assert_eq!(
                kinds("+link(href='/')"),
                vec![
                    TokenKind::Call {
                        name: "link".into(),
                        dynamic: false,
                        args: None,
                    },
                    TokenKind::StartAttributes,
                    attribute("href", Some("'/'")),
                    TokenKind::EndAttributes,
                    TokenKind::Eos,
                ]
            );
        }

        #[test]
        fn doctype_and_yield() {
            assert_eq!(
                kinds("doctype html\nyield"),
                vec![
                    TokenKind::Doctype("html".into()),
                    TokenKind::Newline,
                    TokenKind::Yield,
                    TokenKind::Eos,
                ]
            );
        }
    }
}

use std::sync::Arc;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use jadeite_expr::ExpressionHandler;
use jadeite_source::LineCol;
use jadeite_source::Location;
use rustc_hash::FxHashMap;

use crate::ast::Attribute;
use crate::ast::AttributeValue;
use crate::ast::Block;
use crate::ast::BlockComment;
use crate::ast::Branch;
use crate::ast::Case;
use crate::ast::Code;
use crate::ast::Comment;
use crate::ast::Conditional;
use crate::ast::Doctype;
use crate::ast::Each;
use crate::ast::Filter;
use crate::ast::Literal;
use crate::ast::MixinCall;
use crate::ast::MixinDefinition;
use crate::ast::MixinName;
use crate::ast::MixinParam;
use crate::ast::NamedBlock;
use crate::ast::Node;
use crate::ast::Tag;
use crate::ast::TagName;
use crate::ast::Text;
use crate::ast::When;
use crate::ast::While;
use crate::brackets::split_top_level;
use crate::error::ParseError;
use crate::error::TemplateError;
use crate::lexer::Lexer;
use crate::loader::TemplateLoader;
use crate::tokens::BlockMode;
use crate::tokens::TokenKind;
use crate::tokens::TokenStream;

type ParseResult<T> = Result<T, TemplateError>;

/// How a run of text treats the line breaks inside it.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Lines {
    /// Stop at the end of the line.
    Single,
    /// Piped text: keep going, joining text lines with `\n`.
    Piped,
    /// A text block: every line break is kept.
    Block,
}

/// State shared by every template parsed for one compilation: the template
/// itself, the parents it extends and everything they include.
pub struct ParseContext<'a> {
    loader: &'a dyn TemplateLoader,
    syntax: &'a dyn ExpressionHandler,
    /// Named blocks seen so far, merged across the inheritance chain.
    blocks: FxHashMap<String, NamedBlock>,
    /// Templates currently being parsed, outermost first.
    chain: Vec<Utf8PathBuf>,
}

impl<'a> ParseContext<'a> {
    #[must_use]
    pub fn new(
        path: &Utf8Path,
        loader: &'a dyn TemplateLoader,
        syntax: &'a dyn ExpressionHandler,
    ) -> Self {
        Self {
            loader,
            syntax,
            blocks: FxHashMap::default(),
            chain: vec![path.to_owned()],
        }
    }
}

/// The parts shared by tags and mixin calls.
struct TagParts {
    attributes: Vec<Attribute>,
    attribute_blocks: Vec<String>,
    block: Block,
    self_closing: bool,
    text_only: bool,
}

/// Builds the node tree of one template file.
pub struct Parser<'c, 'a> {
    tokens: TokenStream,
    path: Utf8PathBuf,
    file: Arc<str>,
    ctx: &'c mut ParseContext<'a>,
    /// The parent template, lexed as soon as `extends` is seen.
    extending: Option<(Utf8PathBuf, TokenStream)>,
    mixin_depth: usize,
}

impl<'c, 'a> Parser<'c, 'a> {
    #[must_use]
    pub fn new(tokens: TokenStream, path: Utf8PathBuf, ctx: &'c mut ParseContext<'a>) -> Self {
        let file = Arc::from(path.as_str());
        Self {
            tokens,
            path,
            file,
            ctx,
            extending: None,
            mixin_depth: 0,
        }
    }

    pub fn parse(mut self) -> ParseResult<Block> {
        let mut root = Block::new(Location::new(Arc::clone(&self.file), LineCol::default()));

        loop {
            match self.tokens.peek().kind() {
                TokenKind::Eos => break,
                TokenKind::Newline => {
                    self.tokens.advance();
                }
                _ => {
                    let nodes = self.parse_expr()?;
                    root.nodes.extend(nodes);
                }
            }
        }

        let Some((parent_path, tokens)) = self.extending.take() else {
            return Ok(root);
        };

        tracing::debug!(template = %self.path, parent = %parent_path, "parsing parent template");
        let mixins: Vec<Node> = root
            .nodes
            .into_iter()
            .filter(|node| matches!(node, Node::MixinDefinition(_)))
            .collect();

        self.ctx.chain.push(parent_path.clone());
        let parent = Parser::new(tokens, parent_path, &mut *self.ctx).parse();
        self.ctx.chain.pop();

        let mut parent = parent?;
        parent.nodes.splice(0..0, mixins);
        Ok(parent)
    }

    fn location(&self) -> Location {
        self.tokens.peek().location()
    }

    fn unexpected(&self, expected: &str) -> TemplateError {
        let token = self.tokens.peek();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.kind().name(),
            location: token.location(),
        }
        .into()
    }

    fn peek_is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.tokens.peek().kind()) == std::mem::discriminant(kind)
    }

    fn parse_expr(&mut self) -> ParseResult<Vec<Node>> {
        let next = self.tokens.peek();
        match next.kind() {
            TokenKind::CssId(_)
            | TokenKind::CssClass(_)
            | TokenKind::StartAttributes
            | TokenKind::AttributesBlock(_) => {
                let location = next.location();
                return Ok(vec![self.tag(TagName::Static("div".to_string()), location)?]);
            }
            TokenKind::Text(_) | TokenKind::InterpolatedCode { .. } | TokenKind::StartInterpolation => {
                return self.text_nodes(Lines::Piped);
            }
            TokenKind::TextHtml(_) => return self.html_text(),
            TokenKind::StartPipelessText => return self.text_block().map(|block| block.nodes),
            TokenKind::Indent(_) => return self.block().map(|block| block.nodes),
            _ => {}
        }

        let token = self.tokens.advance();
        let location = token.location();
        let node = match token.into_kind() {
            TokenKind::Tag(name) => self.tag(TagName::Static(name), location)?,
            TokenKind::InterpolatedTag(expression) => {
                self.tag(TagName::Interpolated(expression), location)?
            }
            TokenKind::Code {
                code,
                buffered,
                escaped,
            } => self.code(code, buffered, escaped, false, location)?,
            TokenKind::BlockCode => self.block_code(location)?,
            TokenKind::Each {
                value,
                key,
                expression,
            } => self.each(value, key, expression, location)?,
            TokenKind::While(condition) => Node::While(While {
                condition,
                block: self.optional_block(&location)?,
                location,
            }),
            TokenKind::If(condition) => self.conditional(condition, location)?,
            TokenKind::Unless(condition) => {
                self.conditional(format!("!({condition})"), location)?
            }
            TokenKind::ElseIf(_) | TokenKind::Else => {
                return Err(ParseError::OrphanedBranch {
                    keyword: "else",
                    expected: "if",
                    location,
                }
                .into());
            }
            TokenKind::Case(subject) => self.case(subject, location)?,
            TokenKind::When(_) => {
                return Err(ParseError::OrphanedBranch {
                    keyword: "when",
                    expected: "case",
                    location,
                }
                .into());
            }
            TokenKind::Default => {
                return Err(ParseError::OrphanedBranch {
                    keyword: "default",
                    expected: "case",
                    location,
                }
                .into());
            }
            TokenKind::Mixin { name, args } => self.mixin_definition(name, args, location)?,
            TokenKind::Call {
                name,
                dynamic,
                args,
            } => self.mixin_call(name, dynamic, args, location)?,
            TokenKind::MixinBlock => {
                if self.mixin_depth == 0 {
                    return Err(ParseError::AnonymousBlockOutsideMixin { location }.into());
                }
                Node::MixinBlock(location)
            }
            TokenKind::Block { name, mode } => self.named_block(name, mode, location)?,
            TokenKind::Extends => {
                self.extends(location)?;
                return Ok(Vec::new());
            }
            TokenKind::Include => return self.include(location),
            TokenKind::Yield => Node::Yield(location),
            TokenKind::Filter(name) => self.filter(name, location)?,
            TokenKind::Comment { text, buffered } => self.comment(text, buffered, location)?,
            TokenKind::Doctype(value) => Node::Doctype(Doctype { value, location }),
            TokenKind::Dot => {
                if self.peek_is(&TokenKind::StartPipelessText) {
                    return self.text_block().map(|block| block.nodes);
                }
                return Ok(Vec::new());
            }
            TokenKind::Newline => return Ok(Vec::new()),
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a tag, text or keyword".to_string(),
                    found: other.name(),
                    location,
                }
                .into());
            }
        };
        Ok(vec![node])
    }

    /// An indented block, up to and including its `Outdent`.
    fn block(&mut self) -> ParseResult<Block> {
        let indent = self.tokens.expect(&TokenKind::Indent(0))?;
        let mut block = Block::new(indent.location());
        loop {
            match self.tokens.peek().kind() {
                TokenKind::Outdent => {
                    self.tokens.advance();
                    break;
                }
                TokenKind::Eos => break,
                TokenKind::Newline => {
                    self.tokens.advance();
                }
                _ => {
                    let nodes = self.parse_expr()?;
                    block.nodes.extend(nodes);
                }
            }
        }
        Ok(block)
    }

    fn optional_block(&mut self, location: &Location) -> ParseResult<Block> {
        if self.peek_is(&TokenKind::Indent(0)) {
            self.block()
        } else {
            Ok(Block::new(location.clone()))
        }
    }

    /// Text, interpolated code and `#[...]` tags, merging adjacent text.
    fn text_nodes(&mut self, lines: Lines) -> ParseResult<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut pending: Option<Text> = None;

        loop {
            let wanted = match self.tokens.peek().kind() {
                TokenKind::Text(_)
                | TokenKind::InterpolatedCode { .. }
                | TokenKind::StartInterpolation => true,
                TokenKind::Newline => lines != Lines::Single,
                _ => false,
            };
            if !wanted {
                break;
            }

            let token = self.tokens.advance();
            let location = token.location();
            match token.into_kind() {
                TokenKind::Text(value) => push_text(&mut pending, &value, location),
                TokenKind::Newline => {
                    let joined = lines == Lines::Block
                        || matches!(
                            self.tokens.peek().kind(),
                            TokenKind::Text(_) | TokenKind::InterpolatedCode { .. }
                        );
                    if joined {
                        push_text(&mut pending, "\n", location);
                    }
                }
                TokenKind::InterpolatedCode { code, escaped } => {
                    nodes.extend(pending.take().map(Node::Text));
                    nodes.push(Node::Code(Code {
                        code,
                        buffered: true,
                        escaped,
                        inline: true,
                        block: None,
                        location,
                    }));
                }
                TokenKind::StartInterpolation => {
                    nodes.extend(pending.take().map(Node::Text));
                    let interpolated = self.interpolation()?;
                    nodes.extend(interpolated);
                }
                _ => {}
            }
        }

        nodes.extend(pending.map(Node::Text));
        Ok(nodes)
    }

    /// The nodes of a `#[...]` interpolation; the start token is consumed.
    fn interpolation(&mut self) -> ParseResult<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            match self.tokens.peek().kind() {
                TokenKind::EndInterpolation => {
                    self.tokens.advance();
                    return Ok(nodes);
                }
                TokenKind::Eos => return Err(self.unexpected("end of interpolation")),
                _ => {
                    let parsed = self.parse_expr()?;
                    nodes.extend(parsed);
                }
            }
        }
    }

    fn text_block(&mut self) -> ParseResult<Block> {
        let start = self.tokens.expect(&TokenKind::StartPipelessText)?;
        let nodes = self.text_nodes(Lines::Block)?;
        self.tokens.expect(&TokenKind::EndPipelessText)?;
        Ok(Block::with_nodes(nodes, start.location()))
    }

    /// Consecutive lines of inline HTML, merged into as few text nodes as
    /// interpolation allows.
    fn html_text(&mut self) -> ParseResult<Vec<Node>> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut joinable = false;

        loop {
            match self.tokens.peek().kind() {
                TokenKind::TextHtml(_) => {
                    let token = self.tokens.advance();
                    let location = token.location();
                    let TokenKind::TextHtml(value) = token.into_kind() else {
                        continue;
                    };
                    match nodes.last_mut() {
                        Some(Node::Text(text)) if joinable && text.html => {
                            text.value.push('\n');
                            text.value.push_str(&value);
                        }
                        _ => nodes.push(Node::Text(Text {
                            value,
                            html: true,
                            location,
                        })),
                    }
                    joinable = false;
                }
                TokenKind::InterpolatedCode { .. } | TokenKind::StartInterpolation => {
                    nodes.extend(self.text_nodes(Lines::Single)?);
                    joinable = false;
                }
                TokenKind::Newline
                    if matches!(self.tokens.lookahead(1).kind(), TokenKind::TextHtml(_)) =>
                {
                    self.tokens.advance();
                    joinable = true;
                }
                TokenKind::Indent(_) => {
                    let block = self.block()?;
                    for node in block.nodes {
                        match (node, nodes.last_mut()) {
                            (Node::Text(inner), Some(Node::Text(text))) if inner.html && text.html => {
                                text.value.push('\n');
                                text.value.push_str(&inner.value);
                            }
                            (node, _) => nodes.push(node),
                        }
                    }
                    joinable = false;
                }
                _ => return Ok(nodes),
            }
        }
    }

    fn tag(&mut self, name: TagName, location: Location) -> ParseResult<Node> {
        let parts = self.tag_parts(&location)?;
        Ok(Node::Tag(Tag {
            name,
            attributes: parts.attributes,
            attribute_blocks: parts.attribute_blocks,
            block: parts.block,
            self_closing: parts.self_closing,
            text_only: parts.text_only,
            location,
        }))
    }

    fn tag_parts(&mut self, location: &Location) -> ParseResult<TagParts> {
        let mut parts = TagParts {
            attributes: Vec::new(),
            attribute_blocks: Vec::new(),
            block: Block::new(location.clone()),
            self_closing: false,
            text_only: false,
        };

        loop {
            let token = self.tokens.peek();
            let location = token.location();
            match token.kind() {
                TokenKind::CssId(_) | TokenKind::CssClass(_) => {
                    let (name, value) = match self.tokens.advance().into_kind() {
                        TokenKind::CssId(id) => ("id", id),
                        TokenKind::CssClass(class) => ("class", class),
                        _ => continue,
                    };
                    add_attribute(
                        &mut parts.attributes,
                        Attribute {
                            name: name.to_string(),
                            value: AttributeValue::Literal(value),
                            escaped: false,
                        },
                        location,
                    )?;
                }
                TokenKind::StartAttributes => self.attributes(&mut parts.attributes)?,
                TokenKind::AttributesBlock(_) => {
                    if let TokenKind::AttributesBlock(expression) = self.tokens.advance().into_kind()
                    {
                        parts.attribute_blocks.push(expression);
                    }
                }
                _ => break,
            }
        }

        match self.tokens.peek().kind() {
            TokenKind::Dot => {
                self.tokens.advance();
                parts.text_only = true;
                if self.peek_is(&TokenKind::StartPipelessText) {
                    parts.block = self.text_block()?;
                }
            }
            TokenKind::Text(_) | TokenKind::InterpolatedCode { .. } | TokenKind::StartInterpolation => {
                let nodes = self.text_nodes(Lines::Single)?;
                parts.block.nodes.extend(nodes);
            }
            TokenKind::Code { .. } => {
                let token = self.tokens.advance();
                let location = token.location();
                if let TokenKind::Code {
                    code,
                    buffered,
                    escaped,
                } = token.into_kind()
                {
                    let node = self.code(code, buffered, escaped, true, location)?;
                    parts.block.nodes.push(node);
                }
            }
            TokenKind::Colon => {
                self.tokens.advance();
                let nodes = self.parse_expr()?;
                parts.block.nodes.extend(nodes);
            }
            TokenKind::Slash => {
                self.tokens.advance();
                parts.self_closing = true;
            }
            _ => {}
        }

        if self.peek_is(&TokenKind::Indent(0)) {
            let block = self.block()?;
            parts.block.nodes.extend(block.nodes);
        }
        Ok(parts)
    }

    /// An attribute list; the next token is `StartAttributes`.
    fn attributes(&mut self, attributes: &mut Vec<Attribute>) -> ParseResult<()> {
        self.tokens.expect(&TokenKind::StartAttributes)?;
        loop {
            let token = self.tokens.advance();
            let location = token.location();
            match token.into_kind() {
                TokenKind::Attribute {
                    name,
                    value,
                    escaped,
                } => add_attribute(
                    attributes,
                    Attribute {
                        name,
                        value: attribute_value(value),
                        escaped,
                    },
                    location,
                )?,
                TokenKind::EndAttributes => return Ok(()),
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "an attribute".to_string(),
                        found: other.name(),
                        location,
                    }
                    .into());
                }
            }
        }
    }

    fn code(
        &mut self,
        code: String,
        buffered: bool,
        escaped: bool,
        inline: bool,
        location: Location,
    ) -> ParseResult<Node> {
        let block = if self.peek_is(&TokenKind::Indent(0)) {
            if buffered {
                return Err(ParseError::BufferedCodeWithBlock { location }.into());
            }
            Some(self.block()?)
        } else {
            None
        };
        Ok(Node::Code(Code {
            code,
            buffered,
            escaped,
            inline,
            block,
            location,
        }))
    }

    /// `-` followed by an indented block of statements.
    fn block_code(&mut self, location: Location) -> ParseResult<Node> {
        let mut code = String::new();
        if self.peek_is(&TokenKind::StartPipelessText) {
            let block = self.text_block()?;
            for node in block.nodes {
                if let Node::Text(text) = node {
                    code.push_str(&text.value);
                }
            }
        }
        Ok(Node::Code(Code {
            code,
            buffered: false,
            escaped: false,
            inline: false,
            block: None,
            location,
        }))
    }

    fn each(
        &mut self,
        value_name: String,
        key_name: Option<String>,
        expression: String,
        location: Location,
    ) -> ParseResult<Node> {
        let block = self.optional_block(&location)?;
        self.skip_newline_before(&TokenKind::Else);
        let else_block = if self.peek_is(&TokenKind::Else) {
            let token = self.tokens.advance();
            Some(self.optional_block(&token.location())?)
        } else {
            None
        };
        Ok(Node::Each(Each {
            value_name,
            key_name,
            expression,
            block,
            else_block,
            location,
        }))
    }

    fn skip_newline_before(&mut self, kind: &TokenKind) {
        let following = self.tokens.lookahead(1).kind();
        if self.peek_is(&TokenKind::Newline)
            && std::mem::discriminant(following) == std::mem::discriminant(kind)
        {
            self.tokens.advance();
        }
    }

    fn conditional(&mut self, condition: String, location: Location) -> ParseResult<Node> {
        let mut branches = vec![Branch {
            condition: Some(condition),
            block: self.optional_block(&location)?,
            location: location.clone(),
        }];

        loop {
            self.skip_newline_before(&TokenKind::ElseIf(String::new()));
            self.skip_newline_before(&TokenKind::Else);

            let token = self.tokens.peek();
            let branch_location = token.location();
            match token.kind() {
                TokenKind::ElseIf(_) => {
                    let TokenKind::ElseIf(condition) = self.tokens.advance().into_kind() else {
                        break;
                    };
                    branches.push(Branch {
                        condition: Some(condition),
                        block: self.optional_block(&branch_location)?,
                        location: branch_location,
                    });
                }
                TokenKind::Else => {
                    self.tokens.advance();
                    branches.push(Branch {
                        condition: None,
                        block: self.optional_block(&branch_location)?,
                        location: branch_location,
                    });
                    break;
                }
                _ => break,
            }
        }

        Ok(Node::Conditional(Conditional { branches, location }))
    }

    fn case(&mut self, subject: String, location: Location) -> ParseResult<Node> {
        let mut branches = Vec::new();
        if self.peek_is(&TokenKind::Indent(0)) {
            self.tokens.advance();
            loop {
                let token = self.tokens.advance();
                let branch_location = token.location();
                let condition = match token.into_kind() {
                    TokenKind::Newline => continue,
                    TokenKind::Outdent | TokenKind::Eos => break,
                    TokenKind::When(condition) => Some(condition),
                    TokenKind::Default => None,
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            expected: "`when` or `default`".to_string(),
                            found: other.name(),
                            location: branch_location,
                        }
                        .into());
                    }
                };
                let block = self.when_body(&branch_location)?;
                branches.push(When {
                    condition,
                    block,
                    location: branch_location,
                });
            }
        }
        Ok(Node::Case(Case {
            subject,
            branches,
            location,
        }))
    }

    fn when_body(&mut self, location: &Location) -> ParseResult<Option<Block>> {
        match self.tokens.peek().kind() {
            TokenKind::Colon => {
                self.tokens.advance();
                let nodes = self.parse_expr()?;
                Ok(Some(Block::with_nodes(nodes, location.clone())))
            }
            TokenKind::Indent(_) => self.block().map(Some),
            _ => Ok(None),
        }
    }

    fn mixin_definition(
        &mut self,
        name: String,
        args: Option<String>,
        location: Location,
    ) -> ParseResult<Node> {
        let (params, rest) = mixin_params(args.as_deref().unwrap_or_default())
            .map_err(|reason| ParseError::InvalidMixinParameters {
                reason,
                location: location.clone(),
            })?;

        self.mixin_depth += 1;
        let block = self.optional_block(&location);
        self.mixin_depth -= 1;

        Ok(Node::MixinDefinition(MixinDefinition {
            name,
            params,
            rest,
            block: block?,
            location,
        }))
    }

    fn mixin_call(
        &mut self,
        name: String,
        dynamic: bool,
        args: Option<String>,
        location: Location,
    ) -> ParseResult<Node> {
        let args: Vec<String> = match args.as_deref() {
            Some(args) => split_top_level(args, ',')
                .map_err(|err| ParseError::InvalidMixinParameters {
                    reason: err.to_string(),
                    location: location.clone(),
                })?
                .into_iter()
                .map(ToString::to_string)
                .collect(),
            None => Vec::new(),
        };
        let parts = self.tag_parts(&location)?;
        let name = if dynamic {
            MixinName::Interpolated(name)
        } else {
            MixinName::Static(name)
        };
        Ok(Node::MixinCall(MixinCall {
            name,
            args,
            attributes: parts.attributes,
            attribute_blocks: parts.attribute_blocks,
            block: (!parts.block.is_empty()).then_some(parts.block),
            location,
        }))
    }

    /// Parse a named block and merge it with the block of the same name
    /// from a template lower in the inheritance chain, if any.
    fn named_block(&mut self, name: String, mode: BlockMode, location: Location) -> ParseResult<Node> {
        let block = self.optional_block(&location)?;
        let current = NamedBlock {
            name: name.clone(),
            mode,
            block,
            location,
        };

        let merged = match self.ctx.blocks.remove(&name) {
            Some(stored) => match stored.mode {
                BlockMode::Replace => stored,
                BlockMode::Append => {
                    let mut nodes = current.block.nodes;
                    nodes.extend(stored.block.nodes);
                    NamedBlock {
                        block: Block::with_nodes(nodes, current.block.location),
                        ..current
                    }
                }
                BlockMode::Prepend => {
                    let mut nodes = stored.block.nodes;
                    nodes.extend(current.block.nodes);
                    NamedBlock {
                        block: Block::with_nodes(nodes, current.block.location),
                        ..current
                    }
                }
            },
            None => current,
        };

        self.ctx.blocks.insert(name, merged.clone());
        Ok(Node::NamedBlock(merged))
    }

    fn extends(&mut self, location: Location) -> ParseResult<()> {
        if self.extending.is_some() {
            return Err(ParseError::MultipleExtends { location }.into());
        }
        let path = self.path_argument()?;
        let (resolved, source) = self.load(&path, &location)?;
        let tokens = self.lex(&source, &resolved)?;
        self.extending = Some((resolved, tokens));
        Ok(())
    }

    fn include(&mut self, location: Location) -> ParseResult<Vec<Node>> {
        let mut filters = Vec::new();
        while self.peek_is(&TokenKind::Filter(String::new())) {
            let token = self.tokens.advance();
            let filter_location = token.location();
            let TokenKind::Filter(name) = token.into_kind() else {
                break;
            };
            let mut attributes = Vec::new();
            if self.peek_is(&TokenKind::StartAttributes) {
                self.attributes(&mut attributes)?;
            }
            filters.push((name, attributes, filter_location));
        }

        let path = self.path_argument()?;
        let (resolved, source) = self.load(&path, &location)?;

        let is_template = filters.is_empty()
            && resolved.extension() == Some(self.ctx.loader.extension());
        if !is_template {
            let mut node = if filters.is_empty() {
                Node::Literal(Literal {
                    value: source,
                    location: location.clone(),
                })
            } else {
                Node::Text(Text {
                    value: source,
                    html: false,
                    location: location.clone(),
                })
            };
            for (name, attributes, filter_location) in filters.into_iter().rev() {
                node = Node::Filter(Filter {
                    name,
                    attributes,
                    block: Block::with_nodes(vec![node], filter_location.clone()),
                    location: filter_location,
                });
            }
            return Ok(vec![node]);
        }

        tracing::debug!(template = %self.path, include = %resolved, "parsing included template");
        let tokens = self.lex(&source, &resolved)?;
        self.ctx.chain.push(resolved.clone());
        let included = Parser::new(tokens, resolved, &mut *self.ctx).parse();
        self.ctx.chain.pop();
        let mut included = included?;

        if self.peek_is(&TokenKind::Indent(0)) {
            let block = self.block()?;
            if let Err(nodes) = fill_yield(&mut included, block.nodes) {
                append_to_deepest(&mut included, nodes);
            }
        }
        Ok(included.nodes)
    }

    fn path_argument(&mut self) -> ParseResult<String> {
        let token = self.tokens.expect(&TokenKind::Path(String::new()))?;
        match token.into_kind() {
            TokenKind::Path(path) => Ok(path),
            _ => Err(self.unexpected("a path")),
        }
    }

    fn load(&self, referenced: &str, location: &Location) -> ParseResult<(Utf8PathBuf, String)> {
        let loader = self.ctx.loader;
        let resolved = loader
            .resolve(&self.path, referenced)
            .map_err(|_| ParseError::PathOutsideRoot {
                path: referenced.to_string(),
                location: location.clone(),
            })?;

        if self.ctx.chain.contains(&resolved) {
            return Err(ParseError::RecursiveInclude {
                path: resolved,
                location: location.clone(),
            }
            .into());
        }

        let source = loader
            .read(&resolved)
            .map_err(|err| ParseError::TemplateNotFound {
                path: resolved.clone(),
                reason: err.to_string(),
                location: location.clone(),
            })?;
        tracing::debug!(template = %self.path, path = %resolved, "loaded template");
        Ok((resolved, source))
    }

    fn lex(&self, source: &str, path: &Utf8Path) -> ParseResult<TokenStream> {
        let file: Arc<str> = Arc::from(path.as_str());
        let tokens = Lexer::new(source, Arc::clone(&file), self.ctx.syntax).tokenize()?;
        Ok(TokenStream::new(tokens, file))
    }

    fn filter(&mut self, name: String, location: Location) -> ParseResult<Node> {
        let mut attributes = Vec::new();
        if self.peek_is(&TokenKind::StartAttributes) {
            self.attributes(&mut attributes)?;
        }

        let mut block = Block::new(location.clone());
        match self.tokens.peek().kind() {
            TokenKind::Filter(_) => {
                let token = self.tokens.advance();
                let inner_location = token.location();
                if let TokenKind::Filter(inner) = token.into_kind() {
                    block.nodes.push(self.filter(inner, inner_location)?);
                }
            }
            TokenKind::StartPipelessText => block = self.text_block()?,
            TokenKind::Text(_) => block.nodes = self.text_nodes(Lines::Single)?,
            _ => {}
        }

        Ok(Node::Filter(Filter {
            name,
            attributes,
            block,
            location,
        }))
    }

    fn comment(&mut self, text: String, buffered: bool, location: Location) -> ParseResult<Node> {
        if self.peek_is(&TokenKind::StartPipelessText) {
            let block = self.text_block()?;
            return Ok(Node::BlockComment(BlockComment {
                text,
                buffered,
                block,
                location,
            }));
        }
        Ok(Node::Comment(Comment {
            text,
            buffered,
            location,
        }))
    }
}

fn push_text(pending: &mut Option<Text>, value: &str, location: Location) {
    match pending {
        Some(text) => text.value.push_str(value),
        None => {
            *pending = Some(Text {
                value: value.to_string(),
                html: false,
                location,
            });
        }
    }
}

fn add_attribute(
    attributes: &mut Vec<Attribute>,
    attribute: Attribute,
    location: Location,
) -> Result<(), ParseError> {
    if attribute.name != "class" && attributes.iter().any(|a| a.name == attribute.name) {
        return Err(ParseError::DuplicateAttribute {
            name: attribute.name,
            location,
        });
    }
    attributes.push(attribute);
    Ok(())
}

fn attribute_value(value: Option<String>) -> AttributeValue {
    let Some(value) = value else {
        return AttributeValue::Boolean(true);
    };
    match value.as_str() {
        "true" => AttributeValue::Boolean(true),
        "false" => AttributeValue::Boolean(false),
        _ => match string_literal(&value) {
            Some(text) if text.contains("#{") || text.contains("!{") => {
                AttributeValue::Interpolated(text)
            }
            Some(text) => AttributeValue::Literal(text),
            None => AttributeValue::Expression(value),
        },
    }
}

/// The decoded contents of `source` if it is exactly one quoted string.
fn string_literal(source: &str) -> Option<String> {
    let mut chars = source.chars();
    let quote = chars.next().filter(|ch| matches!(ch, '\'' | '"'))?;
    let mut decoded = String::new();
    let mut closed = false;

    while let Some(ch) = chars.next() {
        if closed {
            return None;
        }
        match ch {
            '\\' => match chars.next()? {
                'n' => decoded.push('\n'),
                't' => decoded.push('\t'),
                'r' => decoded.push('\r'),
                other => decoded.push(other),
            },
            ch if ch == quote => closed = true,
            ch => decoded.push(ch),
        }
    }
    closed.then_some(decoded)
}

/// Split a mixin parameter list into named parameters (with optional
/// default expressions) and a trailing `...rest` name.
fn mixin_params(args: &str) -> Result<(Vec<MixinParam>, Option<String>), String> {
    let pieces = split_top_level(args, ',').map_err(|err| err.to_string())?;
    let mut params = Vec::new();
    let mut rest = None;

    for (index, piece) in pieces.iter().enumerate() {
        if let Some(name) = piece.strip_prefix("...") {
            if index + 1 != pieces.len() {
                return Err("the rest parameter must be the last one".to_string());
            }
            rest = Some(identifier(name.trim())?);
            continue;
        }

        let (name, default) = match piece.find('=') {
            Some(eq) if !piece[eq + 1..].starts_with('=') => {
                (&piece[..eq], Some(piece[eq + 1..].trim().to_string()))
            }
            _ => (*piece, None),
        };
        params.push(MixinParam {
            name: identifier(name.trim())?,
            default,
        });
    }
    Ok((params, rest))
}

fn identifier(name: &str) -> Result<String, String> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_' || ch == '$')
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$');
    if valid {
        Ok(name.to_string())
    } else {
        Err(format!("`{name}` is not a valid parameter name"))
    }
}

/// Replace the first `yield` in `block` with `nodes`, handing the nodes
/// back if there is none.
fn fill_yield(block: &mut Block, mut nodes: Vec<Node>) -> Result<(), Vec<Node>> {
    if let Some(index) = block
        .nodes
        .iter()
        .position(|node| matches!(node, Node::Yield(_)))
    {
        block.nodes.splice(index..=index, nodes);
        return Ok(());
    }
    for node in &mut block.nodes {
        for child in node.blocks_mut() {
            nodes = match fill_yield(child, nodes) {
                Ok(()) => return Ok(()),
                Err(nodes) => nodes,
            };
        }
    }
    Err(nodes)
}

/// Append `nodes` to the last block of the last node, recursively.
fn append_to_deepest(block: &mut Block, nodes: Vec<Node>) {
    match block.nodes.last_mut().and_then(Node::last_block_mut) {
        Some(child) => append_to_deepest(child, nodes),
        None => block.nodes.extend(nodes),
    }
}

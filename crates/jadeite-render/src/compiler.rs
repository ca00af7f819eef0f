//! Walks a compiled node tree and writes markup.

use jadeite_expr::value;
use jadeite_expr::ExpressionHandler;
use jadeite_expr::Map;
use jadeite_expr::Value;
use jadeite_source::Location;
use jadeite_templates::ast::Attribute;
use jadeite_templates::ast::AttributeValue;
use jadeite_templates::ast::Block;
use jadeite_templates::ast::BlockComment;
use jadeite_templates::ast::Case;
use jadeite_templates::ast::Code;
use jadeite_templates::ast::Conditional;
use jadeite_templates::ast::Doctype;
use jadeite_templates::ast::Each;
use jadeite_templates::ast::Filter;
use jadeite_templates::ast::MixinCall;
use jadeite_templates::ast::MixinDefinition;
use jadeite_templates::ast::MixinName;
use jadeite_templates::ast::Node;
use jadeite_templates::ast::Tag;
use jadeite_templates::ast::TagName;
use jadeite_templates::ast::While;
use jadeite_templates::brackets::match_bracket;
use jadeite_templates::brackets::split_top_level;
use jadeite_templates::brackets::BracketState;

use crate::attrs;
use crate::attrs::AttributeSet;
use crate::doctype::doctype_string;
use crate::doctype::Mode;
use crate::error::RenderError;
use crate::error::RenderResult;
use crate::escape::escape_html;
use crate::model::ScopeModel;
use crate::writer::IndentWriter;
use crate::RenderOptions;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "menuitem",
    "meta", "param", "source", "track", "wbr",
];

const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "acronym", "b", "br", "code", "em", "font", "i", "img", "ins", "kbd", "map",
    "samp", "small", "span", "strong", "sub", "sup",
];

const WHITESPACE_SENSITIVE: &[&str] = &["pre", "textarea"];

/// Starts of an unbuffered line that continue the statement above it.
const CONTINUATIONS: &[&str] = &["}", ")", "]", ".", "?", ":", "&&", "||", "+"];
const CONTINUATION_KEYWORDS: &[&str] = &["else", "catch", "finally"];

/// Unbuffered lines collected until they form complete statements.
struct PendingCode {
    code: String,
    location: Location,
}

/// Header of an unbuffered statement that owns the indented block below it.
enum Header<'a> {
    If(&'a str),
    While(&'a str),
    For {
        init: &'a str,
        test: &'a str,
        update: &'a str,
    },
}

pub(crate) struct Renderer<'t, 'r> {
    model: &'r mut ScopeModel<'t>,
    syntax: &'r dyn ExpressionHandler,
    out: IndentWriter,
    mode: Mode,
    /// Blocks passed to the mixin calls being rendered, innermost last.
    call_blocks: Vec<Option<&'t Block>>,
    pending: Option<PendingCode>,
}

impl<'t, 'r> Renderer<'t, 'r> {
    pub(crate) fn new(
        model: &'r mut ScopeModel<'t>,
        syntax: &'r dyn ExpressionHandler,
        options: &RenderOptions,
    ) -> Self {
        Self {
            model,
            syntax,
            out: IndentWriter::new(options.pretty, options.indent),
            mode: options.mode,
            call_blocks: Vec::new(),
            pending: None,
        }
    }

    pub(crate) fn finish(self) -> String {
        self.out.into_string()
    }

    pub(crate) fn render_block(&mut self, block: &'t Block) -> RenderResult {
        let nodes = block.nodes.as_slice();
        if matches!(nodes.first(), Some(Node::Text(text)) if text.value.contains('\n')) {
            self.out.pretty_indent(1);
        }

        for (index, node) in nodes.iter().enumerate() {
            if let Node::Code(code) = node {
                if is_statement(code) {
                    self.queue_code(code, nodes.get(index + 1))?;
                    continue;
                }
            }
            self.flush_code()?;
            self.render_node(node)?;
        }
        self.flush_code()
    }

    fn render_node(&mut self, node: &'t Node) -> RenderResult {
        match node {
            Node::NamedBlock(named) => self.render_block(&named.block),
            Node::Tag(tag) => self.render_tag(tag),
            Node::Text(text) => {
                self.out.push_lines(&text.value);
                Ok(())
            }
            Node::Code(code) => self.render_code(code),
            Node::Each(each) => self.render_each(each),
            Node::While(node) => self.render_while(node),
            Node::Conditional(conditional) => self.render_conditional(conditional),
            Node::Case(case) => self.render_case(case),
            Node::MixinDefinition(definition) => {
                self.model.register_mixin(definition);
                Ok(())
            }
            Node::MixinCall(call) => self.render_call(call),
            Node::MixinBlock(_) => self.render_mixin_block(),
            Node::Yield(_) => Ok(()),
            Node::Filter(filter) => {
                let text = self.filter_text(filter)?;
                self.out.push(&text);
                Ok(())
            }
            Node::Comment(comment) => {
                if comment.buffered {
                    self.out.pretty_indent(1);
                    self.out.push("<!--");
                    self.out.push(&comment.text);
                    self.out.push("-->");
                }
                Ok(())
            }
            Node::BlockComment(comment) => self.render_block_comment(comment),
            Node::Doctype(doctype) => {
                self.render_doctype(doctype);
                Ok(())
            }
            Node::Literal(literal) => {
                self.out.push(&literal.value);
                Ok(())
            }
        }
    }

    fn value(&mut self, expression: &str, location: &Location) -> RenderResult<Value> {
        self.syntax
            .evaluate_value(expression, &mut *self.model)
            .map_err(|source| RenderError::expression(expression, source, location))
    }

    fn boolean(&mut self, expression: &str, location: &Location) -> RenderResult<bool> {
        self.syntax
            .evaluate_boolean(expression, &mut *self.model)
            .map_err(|source| RenderError::expression(expression, source, location))
    }

    fn string(&mut self, expression: &str, location: &Location) -> RenderResult<Option<String>> {
        self.syntax
            .evaluate_string(expression, &mut *self.model)
            .map_err(|source| RenderError::expression(expression, source, location))
    }

    fn execute(&mut self, code: &str, location: &Location) -> RenderResult {
        if code.trim().is_empty() {
            return Ok(());
        }
        self.syntax
            .execute(code, &mut *self.model)
            .map(drop)
            .map_err(|source| RenderError::expression(code, source, location))
    }

    /// Expand `#{}` and `!{}` inside a quoted attribute value.
    fn interpolate(&mut self, text: &str, location: &Location) -> RenderResult<String> {
        let mut out = String::with_capacity(text.len());
        let mut index = 0;
        while index < text.len() {
            let rest = &text[index..];
            if rest.starts_with("\\#{") || rest.starts_with("\\!{") {
                out.push_str(&rest[1..3]);
                index += 3;
                continue;
            }
            if rest.starts_with("#{") || rest.starts_with("!{") {
                if let Ok(found) = match_bracket(text, index + 1) {
                    if let Some(value) = self.string(found.inner, location)? {
                        out.push_str(&value);
                    }
                    index = found.end + 1;
                    continue;
                }
            }
            let Some(ch) = rest.chars().next() else {
                break;
            };
            out.push(ch);
            index += ch.len_utf8();
        }
        Ok(out)
    }

    fn render_tag(&mut self, tag: &'t Tag) -> RenderResult {
        let name = match &tag.name {
            TagName::Static(name) => name.clone(),
            TagName::Interpolated(expression) => self
                .string(expression, &tag.location)?
                .unwrap_or_default(),
        };
        let inline = INLINE_ELEMENTS.contains(&name.as_str());
        let sensitive = WHITESPACE_SENSITIVE.contains(&name.as_str());

        self.out.enter();
        if !inline {
            self.out.pretty_indent(0);
        }
        let verbatim = self.out.is_verbatim();
        self.out.set_verbatim(verbatim || sensitive);

        let mut attributes = String::new();
        self.attribute_set(&tag.attributes, &tag.attribute_blocks, &tag.location)?
            .write(&mut attributes, self.mode.is_terse());

        let self_closing =
            tag.self_closing || (!self.mode.is_xml() && VOID_ELEMENTS.contains(&name.as_str()));
        if self_closing {
            if has_content(&tag.block) {
                return Err(RenderError::VoidElementWithContent {
                    name,
                    location: tag.location.clone(),
                });
            }
            self.out.push(&format!("<{name}{attributes}"));
            self.out.push(if self.mode.is_terse() && !tag.self_closing {
                ">"
            } else {
                "/>"
            });
        } else {
            self.out.push(&format!("<{name}{attributes}>"));
            self.render_block(&tag.block)?;
            if !inline && !sensitive && !can_inline(&tag.block) {
                self.out.pretty_indent(0);
            }
            self.out.push(&format!("</{name}>"));
        }

        self.out.set_verbatim(verbatim);
        self.out.leave();
        Ok(())
    }

    fn attribute_set(
        &mut self,
        attributes: &[Attribute],
        blocks: &[String],
        location: &Location,
    ) -> RenderResult<AttributeSet> {
        let mut set = AttributeSet::default();
        for attribute in attributes {
            let value = match &attribute.value {
                AttributeValue::Boolean(flag) => Value::Bool(*flag),
                AttributeValue::Literal(text) => Value::String(text.clone()),
                AttributeValue::Interpolated(text) => {
                    Value::String(self.interpolate(text, location)?)
                }
                AttributeValue::Expression(expression) => self.value(expression, location)?,
            };
            if attribute.name == "class" {
                set.add_class(&value, attribute.escaped);
            } else {
                set.set(
                    &attribute.name,
                    attrs::prepare(&attribute.name, value, attribute.escaped),
                );
            }
        }

        for expression in blocks {
            match self.value(expression, location)? {
                Value::Object(map) => set.merge(&map),
                other => {
                    return Err(RenderError::AttributesNotMap {
                        expression: expression.clone(),
                        found: value::type_of(&other),
                        location: location.clone(),
                    })
                }
            }
        }
        Ok(set)
    }

    fn render_code(&mut self, code: &'t Code) -> RenderResult {
        if code.buffered {
            if let Some(text) = self.string(&code.code, &code.location)? {
                if code.escaped {
                    self.out.push(&escape_html(&text));
                } else {
                    self.out.push(&text);
                }
            }
            return Ok(());
        }

        let Some(block) = &code.block else {
            return self.execute(&code.code, &code.location);
        };
        match statement_header(&code.code) {
            Some(Header::If(condition)) => {
                if self.boolean(condition, &code.location)? {
                    self.render_block(block)?;
                }
            }
            Some(Header::While(condition)) => {
                while self.boolean(condition, &code.location)? {
                    self.render_block(block)?;
                }
            }
            Some(Header::For { init, test, update }) => {
                self.execute(init, &code.location)?;
                while test.is_empty() || self.boolean(test, &code.location)? {
                    self.render_block(block)?;
                    self.execute(update, &code.location)?;
                }
            }
            None => {
                self.execute(&code.code, &code.location)?;
                self.render_block(block)?;
            }
        }
        Ok(())
    }

    /// Add an unbuffered line to the pending statements, running them once
    /// they are complete.
    fn queue_code(&mut self, code: &Code, next: Option<&Node>) -> RenderResult {
        let pending = self.pending.get_or_insert_with(|| PendingCode {
            code: String::new(),
            location: code.location.clone(),
        });
        pending.code.push_str(&code.code);
        pending.code.push('\n');

        if is_complete(&pending.code) && !continues(next) {
            self.flush_code()?;
        }
        Ok(())
    }

    fn flush_code(&mut self) -> RenderResult {
        match self.pending.take() {
            Some(pending) => self.execute(&pending.code, &pending.location),
            None => Ok(()),
        }
    }

    fn render_each(&mut self, each: &'t Each) -> RenderResult {
        let items: Vec<(Value, Value)> = match self.value(&each.expression, &each.location)? {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (Value::from(index), item))
                .collect(),
            Value::Object(map) => map
                .into_iter()
                .map(|(key, item)| (Value::String(key), item))
                .collect(),
            Value::String(text) => text
                .chars()
                .enumerate()
                .map(|(index, ch)| (Value::from(index), Value::String(ch.to_string())))
                .collect(),
            _ => Vec::new(),
        };

        if items.is_empty() {
            if let Some(else_block) = &each.else_block {
                self.render_block(else_block)?;
            }
            return Ok(());
        }

        self.model.push();
        let result = self.each_items(each, items);
        self.model.pop();
        result
    }

    fn each_items(&mut self, each: &'t Each, items: Vec<(Value, Value)>) -> RenderResult {
        for (key, item) in items {
            self.model.declare(&each.value_name, item);
            if let Some(key_name) = &each.key_name {
                self.model.declare(key_name, key);
            }
            self.render_block(&each.block)?;
        }
        Ok(())
    }

    fn render_while(&mut self, node: &'t While) -> RenderResult {
        self.model.push();
        let result = self.while_body(node);
        self.model.pop();
        result
    }

    fn while_body(&mut self, node: &'t While) -> RenderResult {
        while self.boolean(&node.condition, &node.location)? {
            self.render_block(&node.block)?;
        }
        Ok(())
    }

    fn render_conditional(&mut self, conditional: &'t Conditional) -> RenderResult {
        for branch in &conditional.branches {
            let taken = match &branch.condition {
                Some(condition) => self.boolean(condition, &branch.location)?,
                None => true,
            };
            if taken {
                return self.render_block(&branch.block);
            }
        }
        Ok(())
    }

    fn render_case(&mut self, case: &'t Case) -> RenderResult {
        let subject = self.value(&case.subject, &case.location)?;
        let mut matched = false;
        for when in &case.branches {
            if !matched {
                matched = match &when.condition {
                    Some(condition) => {
                        let candidate = self.value(condition, &when.location)?;
                        value::strict_equals(&subject, &candidate)
                    }
                    None => true,
                };
            }
            if matched {
                if let Some(block) = &when.block {
                    return self.render_block(block);
                }
            }
        }
        Ok(())
    }

    fn render_call(&mut self, call: &'t MixinCall) -> RenderResult {
        let name = match &call.name {
            MixinName::Static(name) => name.clone(),
            MixinName::Interpolated(expression) => self
                .string(expression, &call.location)?
                .unwrap_or_default(),
        };
        let Some(mixin) = self.model.mixin(&name) else {
            return Err(RenderError::UndefinedMixin {
                name,
                location: call.location.clone(),
            });
        };
        tracing::trace!(mixin = %name, args = call.args.len(), "calling mixin");

        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.value(arg, &call.location)?);
        }
        let attributes = self
            .attribute_set(&call.attributes, &call.attribute_blocks, &call.location)?
            .into_map();

        self.model.push();
        let result = self.mixin_body(mixin, args, attributes, call);
        self.model.pop();
        result
    }

    fn mixin_body(
        &mut self,
        mixin: &'t MixinDefinition,
        args: Vec<Value>,
        attributes: Map<String, Value>,
        call: &'t MixinCall,
    ) -> RenderResult {
        let mut args = args.into_iter();
        for param in &mixin.params {
            let value = match (args.next(), &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.value(default, &mixin.location)?,
                (None, None) => Value::Null,
            };
            self.model.declare(&param.name, value);
        }
        if let Some(rest) = &mixin.rest {
            self.model.declare(rest, Value::Array(args.collect()));
        }
        self.model.declare("attributes", Value::Object(attributes));

        self.call_blocks.push(call.block.as_ref());
        let result = self.render_block(&mixin.block);
        self.call_blocks.pop();
        result
    }

    fn render_mixin_block(&mut self) -> RenderResult {
        let Some(current) = self.call_blocks.pop() else {
            return Ok(());
        };
        let result = match current {
            Some(block) => self.render_block(block),
            None => Ok(()),
        };
        self.call_blocks.push(current);
        result
    }

    /// Apply a filter to its text, innermost filter first.
    fn filter_text(&mut self, filter: &'t Filter) -> RenderResult<String> {
        let text = match filter.block.nodes.as_slice() {
            [Node::Filter(inner)] => self.filter_text(inner)?,
            nodes => nodes
                .iter()
                .filter_map(|node| match node {
                    Node::Text(text) => Some(text.value.as_str()),
                    _ => None,
                })
                .collect(),
        };

        let Some(registered) = self.model.filter(&filter.name) else {
            tracing::debug!(filter = %filter.name, "unknown filter, writing text unchanged");
            return Ok(text);
        };

        let mut options = Map::new();
        for attribute in &filter.attributes {
            let value = match &attribute.value {
                AttributeValue::Boolean(flag) => Value::Bool(*flag),
                AttributeValue::Literal(text) => Value::String(text.clone()),
                AttributeValue::Interpolated(text) => {
                    Value::String(self.interpolate(text, &filter.location)?)
                }
                AttributeValue::Expression(expression) => {
                    self.value(expression, &filter.location)?
                }
            };
            options.insert(attribute.name.clone(), value);
        }
        Ok(registered.apply(&text, &options))
    }

    fn render_block_comment(&mut self, comment: &'t BlockComment) -> RenderResult {
        if !comment.buffered {
            return Ok(());
        }
        self.out.pretty_indent(1);
        self.out.push("<!--");
        self.out.push(&comment.text);
        self.render_block(&comment.block)?;
        self.out.pretty_indent(1);
        self.out.push("-->");
        Ok(())
    }

    fn render_doctype(&mut self, doctype: &Doctype) {
        let name = if doctype.value.is_empty() {
            self.mode.default_doctype()
        } else {
            doctype.value.as_str()
        };
        let declaration = doctype_string(name);
        self.mode = Mode::for_doctype(&declaration);
        self.out.push(&declaration);
    }
}

fn is_statement(code: &Code) -> bool {
    !code.buffered && !code.inline && code.block.is_none()
}

/// Whether the collected lines close every bracket and string they open.
fn is_complete(code: &str) -> bool {
    let mut state = BracketState::new();
    for (offset, ch) in code.char_indices() {
        if state.feed(ch, offset).is_err() {
            return true;
        }
    }
    !state.is_nesting() && !state.is_string()
}

fn continues(next: Option<&Node>) -> bool {
    let Some(Node::Code(code)) = next else {
        return false;
    };
    if !is_statement(code) {
        return false;
    }
    let line = code.code.trim_start();
    CONTINUATIONS.iter().any(|start| line.starts_with(start))
        || CONTINUATION_KEYWORDS.iter().any(|keyword| {
            line.strip_prefix(keyword).is_some_and(|rest| {
                !rest.starts_with(|ch: char| ch.is_alphanumeric() || ch == '_' || ch == '$')
            })
        })
}

fn statement_header(code: &str) -> Option<Header<'_>> {
    let code = code.trim();
    let (keyword, rest) = ["if", "while", "for"]
        .iter()
        .find_map(|keyword| code.strip_prefix(*keyword).map(|rest| (*keyword, rest)))?;
    let rest = rest.trim_start();
    if !rest.starts_with('(') {
        return None;
    }
    let found = match_bracket(rest, 0).ok()?;
    let trailing = rest[found.end + 1..].trim();
    if !(trailing.is_empty() || trailing == "{") {
        return None;
    }

    match keyword {
        "if" => Some(Header::If(found.inner)),
        "while" => Some(Header::While(found.inner)),
        _ => match split_top_level(found.inner, ';').ok()?.as_slice() {
            [init, test] => Some(Header::For {
                init: *init,
                test: *test,
                update: "",
            }),
            [init, test, update] => Some(Header::For {
                init: *init,
                test: *test,
                update: *update,
            }),
            _ => None,
        },
    }
}

fn has_content(block: &Block) -> bool {
    block.nodes.iter().any(|node| match node {
        Node::Text(text) => !text.value.trim().is_empty(),
        _ => true,
    })
}

/// Whether a tag's children can share its line when pretty-printing.
fn can_inline(block: &Block) -> bool {
    block.nodes.iter().all(|node| match node {
        Node::Text(text) => !text.value.contains('\n'),
        Node::Tag(tag) => tag
            .static_name()
            .is_some_and(|name| INLINE_ELEMENTS.contains(&name)),
        Node::Code(code) => code.inline,
        Node::NamedBlock(named) => can_inline(&named.block),
        Node::Yield(_) => true,
        _ => false,
    })
}

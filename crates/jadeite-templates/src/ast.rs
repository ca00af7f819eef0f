use jadeite_source::Location;

use crate::tokens::BlockMode;

/// An ordered list of nodes, the body of a tag, branch, loop or template.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub nodes: Vec<Node>,
    pub location: Location,
}

impl Block {
    #[must_use]
    pub fn new(location: Location) -> Self {
        Self {
            nodes: Vec::new(),
            location,
        }
    }

    #[must_use]
    pub fn with_nodes(nodes: Vec<Node>, location: Location) -> Self {
        Self { nodes, location }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    NamedBlock(NamedBlock),
    Tag(Tag),
    Text(Text),
    Code(Code),
    Each(Each),
    While(While),
    Conditional(Conditional),
    Case(Case),
    MixinDefinition(MixinDefinition),
    MixinCall(MixinCall),
    /// Where the block passed to a mixin call is rendered.
    MixinBlock(Location),
    /// Where the block nested under an `include` is placed.
    Yield(Location),
    Filter(Filter),
    Comment(Comment),
    BlockComment(BlockComment),
    Doctype(Doctype),
    /// Raw text of an included non-template file.
    Literal(Literal),
}

impl Node {
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            Node::NamedBlock(node) => &node.location,
            Node::Tag(node) => &node.location,
            Node::Text(node) => &node.location,
            Node::Code(node) => &node.location,
            Node::Each(node) => &node.location,
            Node::While(node) => &node.location,
            Node::Conditional(node) => &node.location,
            Node::Case(node) => &node.location,
            Node::MixinDefinition(node) => &node.location,
            Node::MixinCall(node) => &node.location,
            Node::MixinBlock(location) | Node::Yield(location) => location,
            Node::Filter(node) => &node.location,
            Node::Comment(node) => &node.location,
            Node::BlockComment(node) => &node.location,
            Node::Doctype(node) => &node.location,
            Node::Literal(node) => &node.location,
        }
    }

    /// Every child block, in source order.
    pub fn blocks_mut(&mut self) -> Vec<&mut Block> {
        match self {
            Node::NamedBlock(node) => vec![&mut node.block],
            Node::Tag(node) => vec![&mut node.block],
            Node::Code(node) => node.block.iter_mut().collect(),
            Node::Each(node) => std::iter::once(&mut node.block)
                .chain(node.else_block.iter_mut())
                .collect(),
            Node::While(node) => vec![&mut node.block],
            Node::Conditional(node) => node
                .branches
                .iter_mut()
                .map(|branch| &mut branch.block)
                .collect(),
            Node::Case(node) => node
                .branches
                .iter_mut()
                .filter_map(|branch| branch.block.as_mut())
                .collect(),
            Node::MixinDefinition(node) => vec![&mut node.block],
            Node::MixinCall(node) => node.block.iter_mut().collect(),
            Node::Filter(node) => vec![&mut node.block],
            Node::BlockComment(node) => vec![&mut node.block],
            Node::Text(_)
            | Node::MixinBlock(_)
            | Node::Yield(_)
            | Node::Comment(_)
            | Node::Doctype(_)
            | Node::Literal(_) => Vec::new(),
        }
    }

    /// The last child block, if the node has any.
    pub fn last_block_mut(&mut self) -> Option<&mut Block> {
        self.blocks_mut().pop()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NamedBlock {
    pub name: String,
    pub mode: BlockMode,
    pub block: Block,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagName {
    Static(String),
    /// `#{expression}`, evaluated at render time.
    Interpolated(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    pub name: TagName,
    pub attributes: Vec<Attribute>,
    /// `&attributes(...)` expressions, in source order.
    pub attribute_blocks: Vec<String>,
    pub block: Block,
    /// Closed with an explicit trailing `/`.
    pub self_closing: bool,
    /// Body given as a `.` text block.
    pub text_only: bool,
    pub location: Location,
}

impl Tag {
    /// The tag name when it is known at compile time.
    #[must_use]
    pub fn static_name(&self) -> Option<&str> {
        match &self.name {
            TagName::Static(name) => Some(name),
            TagName::Interpolated(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
    pub escaped: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    Boolean(bool),
    /// A string known at compile time.
    Literal(String),
    /// A quoted string containing `#{}` or `!{}` interpolations.
    Interpolated(String),
    Expression(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Text {
    pub value: String,
    /// Inline HTML (a line starting with `<`).
    pub html: bool,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Code {
    pub code: String,
    /// Output the value (`=`, `!=`, `#{}`), as opposed to running it (`-`).
    pub buffered: bool,
    pub escaped: bool,
    /// Interpolated into text rather than on its own line.
    pub inline: bool,
    pub block: Option<Block>,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Each {
    pub value_name: String,
    pub key_name: Option<String>,
    pub expression: String,
    pub block: Block,
    pub else_block: Option<Block>,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub struct While {
    pub condition: String,
    pub block: Block,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Conditional {
    pub branches: Vec<Branch>,
    pub location: Location,
}

/// One guarded branch; `condition` is `None` for `else`.
#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    pub condition: Option<String>,
    pub block: Block,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Case {
    pub subject: String,
    pub branches: Vec<When>,
    pub location: Location,
}

/// A `when` branch, or `default` when `condition` is `None`.
///
/// A branch without a block falls through to the next one.
#[derive(Clone, Debug, PartialEq)]
pub struct When {
    pub condition: Option<String>,
    pub block: Option<Block>,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MixinDefinition {
    pub name: String,
    pub params: Vec<MixinParam>,
    /// Name of the `...rest` parameter.
    pub rest: Option<String>,
    pub block: Block,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MixinParam {
    pub name: String,
    pub default: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MixinName {
    Static(String),
    Interpolated(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MixinCall {
    pub name: MixinName,
    pub args: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub attribute_blocks: Vec<String>,
    pub block: Option<Block>,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Text, or a single nested filter.
    pub block: Block,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub buffered: bool,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockComment {
    pub text: String,
    pub buffered: bool,
    pub block: Block,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Doctype {
    /// Empty for a bare `doctype`.
    pub value: String,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Literal {
    pub value: String,
    pub location: Location,
}

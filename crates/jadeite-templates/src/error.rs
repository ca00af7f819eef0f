use camino::Utf8PathBuf;
use jadeite_source::Location;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("`{opening}` is never closed")]
    UnterminatedBracket { opening: char, location: Location },
    #[error("expected `{expected}` but found `{found}`")]
    MismatchedBracket {
        expected: char,
        found: char,
        location: Location,
    },
    #[error("invalid indentation: {reason}")]
    InvalidIndentation { reason: String, location: Location },
    #[error("`#{name}` is not a valid id")]
    InvalidId { name: String, location: Location },
    #[error(
        "`.{name}` is not a valid class name; class names may only contain `_`, `-`, a-z and 0-9, and must contain at least one of `_` or a-z"
    )]
    InvalidClassName { name: String, location: Location },
    #[error("malformed `{keyword}`: {reason}")]
    MalformedKeyword {
        keyword: &'static str,
        reason: &'static str,
        location: Location,
    },
    #[error("invalid expression `{expression}`: {message}")]
    InvalidExpression {
        expression: String,
        message: String,
        location: Location,
    },
    #[error("unexpected text `{text}`")]
    UnexpectedText { text: String, location: Location },
}

impl LexError {
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            LexError::UnterminatedBracket { location, .. }
            | LexError::MismatchedBracket { location, .. }
            | LexError::InvalidIndentation { location, .. }
            | LexError::InvalidId { location, .. }
            | LexError::InvalidClassName { location, .. }
            | LexError::MalformedKeyword { location, .. }
            | LexError::InvalidExpression { location, .. }
            | LexError::UnexpectedText { location, .. } => location,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            LexError::UnterminatedBracket { .. } => "J101",
            LexError::MismatchedBracket { .. } => "J102",
            LexError::InvalidIndentation { .. } => "J103",
            LexError::InvalidId { .. } => "J104",
            LexError::InvalidClassName { .. } => "J105",
            LexError::MalformedKeyword { .. } => "J106",
            LexError::InvalidExpression { .. } => "J107",
            LexError::UnexpectedText { .. } => "J108",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken {
        expected: String,
        found: &'static str,
        location: Location,
    },
    #[error("duplicate attribute `{name}`")]
    DuplicateAttribute { name: String, location: Location },
    #[error("anonymous blocks are only allowed inside a mixin")]
    AnonymousBlockOutsideMixin { location: Location },
    #[error("cannot load template `{path}`: {reason}")]
    TemplateNotFound {
        path: Utf8PathBuf,
        reason: String,
        location: Location,
    },
    #[error("`{path}` resolves outside of the template root")]
    PathOutsideRoot { path: String, location: Location },
    #[error("`{path}` includes or extends itself")]
    RecursiveInclude {
        path: Utf8PathBuf,
        location: Location,
    },
    #[error("a template can only extend one parent")]
    MultipleExtends { location: Location },
    #[error("buffered code cannot have a nested block")]
    BufferedCodeWithBlock { location: Location },
    #[error("`{keyword}` without a preceding `{expected}`")]
    OrphanedBranch {
        keyword: &'static str,
        expected: &'static str,
        location: Location,
    },
    #[error("invalid mixin parameters: {reason}")]
    InvalidMixinParameters { reason: String, location: Location },
}

impl ParseError {
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            ParseError::UnexpectedToken { location, .. }
            | ParseError::DuplicateAttribute { location, .. }
            | ParseError::AnonymousBlockOutsideMixin { location }
            | ParseError::TemplateNotFound { location, .. }
            | ParseError::PathOutsideRoot { location, .. }
            | ParseError::RecursiveInclude { location, .. }
            | ParseError::MultipleExtends { location }
            | ParseError::BufferedCodeWithBlock { location }
            | ParseError::OrphanedBranch { location, .. }
            | ParseError::InvalidMixinParameters { location, .. } => location,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::UnexpectedToken { .. } => "J201",
            ParseError::DuplicateAttribute { .. } => "J202",
            ParseError::AnonymousBlockOutsideMixin { .. } => "J203",
            ParseError::TemplateNotFound { .. } => "J204",
            ParseError::PathOutsideRoot { .. } => "J205",
            ParseError::RecursiveInclude { .. } => "J206",
            ParseError::MultipleExtends { .. } => "J207",
            ParseError::BufferedCodeWithBlock { .. } => "J208",
            ParseError::OrphanedBranch { .. } => "J209",
            ParseError::InvalidMixinParameters { .. } => "J210",
        }
    }
}

/// Anything that stops a template from compiling.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl TemplateError {
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            TemplateError::Lex(err) => err.location(),
            TemplateError::Parse(err) => err.location(),
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            TemplateError::Lex(err) => err.code(),
            TemplateError::Parse(err) => err.code(),
        }
    }
}

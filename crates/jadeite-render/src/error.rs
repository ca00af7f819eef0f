use std::fmt;

use jadeite_expr::ExpressionError;
use jadeite_source::Location;
use thiserror::Error;

/// Anything that stops a compiled template from rendering.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("failed to evaluate `{expression}`: {source}")]
    Expression {
        expression: String,
        #[source]
        source: ExpressionError,
        location: Location,
    },
    #[error("mixin `{name}` is not defined")]
    UndefinedMixin { name: String, location: Location },
    #[error("`&attributes({expression})` must be a map, found {found}")]
    AttributesNotMap {
        expression: String,
        found: &'static str,
        location: Location,
    },
    #[error("`{name}` is self-closing and cannot have content")]
    VoidElementWithContent { name: String, location: Location },
    #[error("failed to write output")]
    Write {
        #[source]
        source: fmt::Error,
        location: Location,
    },
}

impl RenderError {
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            RenderError::Expression { location, .. }
            | RenderError::UndefinedMixin { location, .. }
            | RenderError::AttributesNotMap { location, .. }
            | RenderError::VoidElementWithContent { location, .. }
            | RenderError::Write { location, .. } => location,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            RenderError::Expression { .. } => "J301",
            RenderError::UndefinedMixin { .. } => "J302",
            RenderError::AttributesNotMap { .. } => "J303",
            RenderError::VoidElementWithContent { .. } => "J304",
            RenderError::Write { .. } => "J305",
        }
    }

    pub(crate) fn expression(expression: &str, source: ExpressionError, location: &Location) -> Self {
        Self::Expression {
            expression: expression.trim().to_string(),
            source,
            location: location.clone(),
        }
    }
}

pub type RenderResult<T = ()> = Result<T, RenderError>;

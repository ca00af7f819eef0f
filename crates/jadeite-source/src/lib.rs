mod collections;
pub mod path;
mod position;
mod render;

pub use collections::FxDashMap;
pub use collections::FxDashSet;
pub use position::LineCol;
pub use position::LineIndex;
pub use position::Location;
pub use position::Span;
pub use render::Diagnostic;
pub use render::DiagnosticRenderer;

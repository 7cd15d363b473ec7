//! tir-error - Diagnostics for the trace-time expression IR
//!
//! Contract violations while building the graph are fatal and panic. Everything
//! the type-check pass finds wrong with a finished graph is reported through
//! the types in this crate instead, so a host can show all of them at once.
//!
//! # Example
//!
//! ```rust
//! use tir_error::{Diagnostic, DiagnosticRenderer, ErrorCode};
//!
//! let diagnostic = Diagnostic::error("identifier `@x` was never declared")
//!     .with_code(ErrorCode::UNDECLARED_IDENTIFIER)
//!     .with_source_tag("kernel.py:4 in main");
//!
//! let renderer = DiagnosticRenderer::new().without_colors();
//! println!("{}", renderer.render(&diagnostic));
//! ```

pub mod diagnostic;

pub use diagnostic::{Diagnostic, DiagnosticRenderer, ErrorCode, Level};

/// Default Result type for operations that may fail with diagnostics
pub type Result<T> = std::result::Result<T, Diagnostic>;

/// Collection of diagnostics accumulated during type checking
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.level == Level::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Renders all diagnostics
    pub fn render(&self, renderer: &DiagnosticRenderer) -> String {
        self.items
            .iter()
            .map(|d| renderer.render(d))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

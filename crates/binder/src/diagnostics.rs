//! Non-fatal hazard reporting.
//!
//! Hazards are delivered through listeners the host registers (see
//! [`crate::BoundNode::on_diagnostic`]) and echoed through `tracing` so
//! hosts without a listener still see them. Diagnostics raised before any
//! listener exists are buffered and flushed to the first listener.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The value handed to `bind` is already the root of a live binding;
    /// a second, independent binding over aliased state was created.
    AlreadyBound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

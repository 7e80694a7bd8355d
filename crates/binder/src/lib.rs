//! state-binder - Reactive mutation-tracking state binder.
//!
//! [`bind`] wraps a value graph in a [`BoundNode`]: a view whose field
//! writes, bulk updates, and merges are transparently batched into
//! immutable snapshots and delivered to an external store through a commit
//! function. Snapshot isolation rests on the cycle-safe structural clone
//! engine in `state-binder-graph`.
//!
//! Execution is single-threaded and cooperative: nodes share one binding
//! context through `Rc`, suspension happens only inside an
//! [`BoundNode::update_async`] mutator or between a commit and its
//! acknowledgement, and overlapping bulk updates on one context are
//! deliberately not serialized — callers serialize logically-overlapping
//! updates themselves.

pub mod context;
pub mod diagnostics;
pub mod error;
pub mod node;
pub mod options;
pub mod path;

mod dispatcher;

// Re-exports for convenience
pub use context::Ack;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::BindError;
pub use node::{bind, bind_with_defaults, is_bound, BoundNode, BoundValue};
pub use options::{BindingOptions, ChangePolicy, ClonePolicy};
pub use path::{value_at_path, PathStep};

pub use state_binder_graph as graph;
pub use state_binder_graph::{deep_clone, deep_equal, from_json, shallow_clone, to_json, Value};

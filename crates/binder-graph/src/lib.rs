//! state-binder-graph - Cycle-safe value graph for the state binder.
//!
//! This crate provides the data model underneath the binder: a tagged value
//! graph with reference identity ([`Value`], [`CompositeRef`]), a
//! structural clone engine that preserves cycles and shared substructure
//! ([`deep_clone`], [`shallow_clone`]), cycle-safe structural equality
//! ([`deep_equal`]), weak-reference containers with best-effort clone
//! facades ([`weak`]), JSON interop ([`json`]), and diagnostic rendering
//! ([`print`]).

pub mod clone;
pub mod equal;
pub mod json;
pub mod print;
pub mod value;
pub mod weak;

// Re-exports for convenience
pub use clone::{deep_clone, shallow_clone};
pub use equal::deep_equal;
pub use json::{from_json, to_json, GraphError};
pub use value::{Atom, Composite, CompositeRef, Value};
pub use weak::{WeakKey, WeakMap, WeakSet};

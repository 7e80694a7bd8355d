use state_binder_graph::{deep_clone, shallow_clone, Value};

/// Whether a write whose new value equals the current value still commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangePolicy {
    Always,
    #[default]
    OnlyOnChanges,
}

/// Copy depth used for every working/safe copy and every commit snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClonePolicy {
    Deep,
    #[default]
    Shallow,
}

impl ClonePolicy {
    /// The clone function a context fixes at creation.
    pub(crate) fn copy_fn(self) -> fn(&Value) -> Value {
        match self {
            ClonePolicy::Deep => deep_clone,
            ClonePolicy::Shallow => shallow_clone,
        }
    }
}

/// Options for one binding root. Immutable once the context is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindingOptions {
    pub change_policy: ChangePolicy,
    pub clone_policy: ClonePolicy,
}

//! The recursive binder: bound nodes over a shared binding context.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use state_binder_graph::{CompositeRef, Value, WeakKey};

use crate::context::{self, Ack, ContextInner};
use crate::diagnostics::DiagnosticKind;
use crate::error::BindError;
use crate::options::{BindingOptions, ChangePolicy};
use crate::path::{composite_at_path, value_at_path, PathStep};

/// Binds `initial` to an external store.
///
/// The context clones `initial` on entry (at the depth the clone policy
/// selects) and from then on every mutation made through the returned node
/// funnels into `commit` as an immutable snapshot. `commit` must make the
/// snapshot authoritative and call [`Ack::apply`] once it has; the context
/// uses the acknowledgement to resynchronize with what the store holds.
///
/// Binding a value that is already bound is a hazard, not a failure: a
/// diagnostic is emitted and a second, independent binding is created over
/// aliased internal state.
pub fn bind<C>(initial: Value, commit: C, options: BindingOptions) -> BoundNode
where
    C: FnMut(Value, Ack) + 'static,
{
    let ctx = ContextInner::create(&initial, commit, options);
    if let Some(raw_root) = initial.as_composite() {
        if context::root_already_bound(raw_root) {
            ctx.emit_diagnostic(
                DiagnosticKind::AlreadyBound,
                "value is already bound; creating a second independent binding over aliased state"
                    .to_string(),
            );
        }
        context::register_root(raw_root, &ctx);
    }
    let inner = Rc::new(NodeInner {
        ctx,
        path: Vec::new(),
    });
    if let Some(root) = inner.ctx.state.borrow().as_composite() {
        inner
            .ctx
            .nodes
            .borrow_mut()
            .insert(root.id(), (WeakKey::new(root), Rc::downgrade(&inner)));
    }
    BoundNode { inner }
}

/// [`bind`] with default options (`OnlyOnChanges`, shallow clones).
pub fn bind_with_defaults<C>(initial: Value, commit: C) -> BoundNode
where
    C: FnMut(Value, Ack) + 'static,
{
    bind(initial, commit, BindingOptions::default())
}

/// True exactly for values produced by a binder.
pub fn is_bound(value: &BoundValue) -> bool {
    value.is_bound()
}

/// What navigation hands back: scalars verbatim, composites as bound nodes.
#[derive(Clone)]
pub enum BoundValue {
    Scalar(Value),
    Node(BoundNode),
}

impl BoundValue {
    pub fn is_bound(&self) -> bool {
        matches!(self, BoundValue::Node(_))
    }

    pub fn as_node(&self) -> Option<&BoundNode> {
        match self {
            BoundValue::Node(node) => Some(node),
            BoundValue::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            BoundValue::Scalar(value) => Some(value),
            BoundValue::Node(_) => None,
        }
    }
}

/// A node's state is its context plus the path from the root; the value it
/// wraps is resolved against the context's current snapshot on every
/// operation. A node whose path no longer resolves (its subtree was
/// replaced wholesale) answers `None`/`PathNotFound` rather than going
/// stale silently.
pub(crate) struct NodeInner {
    pub(crate) ctx: Rc<ContextInner>,
    pub(crate) path: Vec<PathStep>,
}

/// Wrapper over a composite inside a binding root. Cheap to clone; clones
/// share identity. See [`bind`].
#[derive(Clone)]
pub struct BoundNode {
    inner: Rc<NodeInner>,
}

/// Identity comparison: two handles are equal when they are the same node.
impl PartialEq for BoundNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for BoundNode {}

impl fmt::Debug for BoundNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundNode")
            .field("path", &self.inner.path)
            .finish()
    }
}

impl BoundNode {
    /// An inert binder: operations work over an empty object and commits go
    /// nowhere.
    pub fn empty() -> BoundNode {
        bind(Value::obj(), |_next, _ack| {}, BindingOptions::default())
    }

    /// Reads the raw value at this node's path.
    pub fn read(&self) -> Option<Value> {
        let current = self.inner.ctx.state.borrow();
        value_at_path(&current, &self.inner.path)
    }

    /// Navigates into a field. Scalars come back verbatim; a composite
    /// comes back as a bound node, cached by identity so repeated
    /// navigation returns the same node.
    pub fn get(&self, key: &str) -> Option<BoundValue> {
        self.child(PathStep::Key(key.to_string()))
    }

    pub fn get_index(&self, index: usize) -> Option<BoundValue> {
        self.child(PathStep::Index(index))
    }

    /// Multi-step navigation relative to this node.
    pub fn at(&self, path: &[PathStep]) -> Option<BoundValue> {
        let mut cur = BoundValue::Node(self.clone());
        for step in path {
            let node = cur.as_node()?;
            cur = node.child(step.clone())?;
        }
        Some(cur)
    }

    fn child(&self, step: PathStep) -> Option<BoundValue> {
        let ctx = &self.inner.ctx;
        let mut path = self.inner.path.clone();
        path.push(step);
        let value = {
            let current = ctx.state.borrow();
            value_at_path(&current, &path)?
        };
        match value {
            Value::Composite(target) => Some(BoundValue::Node(node_for(ctx, &target, path))),
            scalar => Some(BoundValue::Scalar(scalar)),
        }
    }

    /// Direct field write. Under `OnlyOnChanges`, assigning a value that is
    /// `same` as the current one is a complete no-op: no mutation, no
    /// commit. Otherwise the snapshot is updated in place — the change is
    /// visible at every level up to the root through the shared handles —
    /// and exactly one commit fires.
    pub fn set_key(&self, key: &str, value: impl Into<Value>) -> Result<(), BindError> {
        let value = value.into();
        let ctx = &self.inner.ctx;
        let target = {
            let current = ctx.state.borrow();
            composite_at_path(&current, &self.inner.path).ok_or(BindError::PathNotFound)?
        };
        {
            let mut guard = target.borrow_mut();
            let map = guard.as_obj_mut().ok_or(BindError::NotAnObject)?;
            if ctx.options.change_policy == ChangePolicy::OnlyOnChanges {
                let existing = map.get(key).cloned().unwrap_or(Value::Undefined);
                if existing.same(&value) {
                    return Ok(());
                }
            }
            map.insert(key.to_string(), value);
        }
        ctx.on_change();
        Ok(())
    }

    /// Direct element write; the index must be in range.
    pub fn set_index(&self, index: usize, value: impl Into<Value>) -> Result<(), BindError> {
        let value = value.into();
        let ctx = &self.inner.ctx;
        let target = {
            let current = ctx.state.borrow();
            composite_at_path(&current, &self.inner.path).ok_or(BindError::PathNotFound)?
        };
        {
            let mut guard = target.borrow_mut();
            let items = guard.as_arr_mut().ok_or(BindError::NotAnArray)?;
            let Some(slot) = items.get_mut(index) else {
                return Err(BindError::PathNotFound);
            };
            if ctx.options.change_policy == ChangePolicy::OnlyOnChanges && slot.same(&value) {
                return Ok(());
            }
            *slot = value;
        }
        ctx.on_change();
        Ok(())
    }

    /// Bulk update against the context's current snapshot.
    ///
    /// The snapshot is cloned into a working copy, `f` edits it freely, and
    /// the result is cloned once more into a safe copy — severing aliasing
    /// with any handle the caller kept — before being installed and
    /// committed. Exactly one commit fires no matter how many fields `f`
    /// edits; if `f` errs, nothing is installed and no commit fires.
    pub fn update<E, F>(&self, f: F) -> Result<(), E>
    where
        F: FnOnce(Value) -> Result<(), E>,
    {
        let ctx = &self.inner.ctx;
        let working = {
            let current = ctx.state.borrow();
            (ctx.copy)(&current)
        };
        f(working.clone())?;
        let safe = (ctx.copy)(&working);
        *ctx.state.borrow_mut() = safe;
        ctx.on_change();
        Ok(())
    }

    /// [`BoundNode::update`] with a mutator that may suspend mid-edit.
    ///
    /// The working copy is captured at call time and owned exclusively by
    /// this call while suspended; the returned future resolves only after
    /// the single commit is issued. Overlapping calls on one context are
    /// not serialized — whichever commits last wins.
    pub async fn update_async<E, F, Fut>(&self, f: F) -> Result<(), E>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let ctx = Rc::clone(&self.inner.ctx);
        let working = {
            let current = ctx.state.borrow();
            (ctx.copy)(&current)
        };
        f(working.clone()).await?;
        let safe = (ctx.copy)(&working);
        *ctx.state.borrow_mut() = safe;
        ctx.on_change();
        Ok(())
    }

    /// Shallow-merges the top-level fields of `partial` into the current
    /// snapshot, leaving other keys untouched, with exactly one commit.
    pub fn set(&self, partial: Value) -> Result<(), BindError> {
        let fields: Vec<(String, Value)> = {
            let composite = partial.as_composite().ok_or(BindError::NotAnObject)?;
            let guard = composite.borrow();
            let map = guard.as_obj().ok_or(BindError::NotAnObject)?;
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        self.update(move |working| {
            let root = working.as_composite().ok_or(BindError::NotAnObject)?;
            let mut guard = root.borrow_mut();
            let map = guard.as_obj_mut().ok_or(BindError::NotAnObject)?;
            for (key, value) in fields {
                map.insert(key, value);
            }
            Ok(())
        })
    }

    /// Registers a listener for non-fatal hazard diagnostics on this
    /// binding root. Diagnostics raised before the first listener existed
    /// (notably the already-bound hazard raised inside [`bind`]) are
    /// flushed to it immediately.
    pub fn on_diagnostic<F>(&self, listener: F) -> u64
    where
        F: FnMut(crate::diagnostics::Diagnostic) + 'static,
    {
        self.inner.ctx.on_diagnostic(listener)
    }

    pub fn off_diagnostic(&self, listener_id: u64) -> bool {
        self.inner.ctx.off_diagnostic(listener_id)
    }
}

/// Renders the current snapshot of the whole binding root in structured
/// textual form for diagnostics.
impl fmt::Display for BoundNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.ctx.state.borrow())
    }
}

/// Returns the cached node for `target`'s identity, or creates and caches
/// one. Guarantees at most one live bound node per composite identity per
/// context. A hit counts only if the cached entry's composite is still the
/// same allocation; an entry whose composite died (its address may since
/// have been reused) is discarded.
fn node_for(ctx: &Rc<ContextInner>, target: &CompositeRef, path: Vec<PathStep>) -> BoundNode {
    let mut nodes = ctx.nodes.borrow_mut();
    if let Some((key, node)) = nodes.get(&target.id()) {
        if key.matches(target) {
            if let Some(existing) = node.upgrade() {
                return BoundNode { inner: existing };
            }
        }
    }
    nodes.retain(|_, (key, node)| key.is_alive() && node.strong_count() > 0);
    let inner = Rc::new(NodeInner {
        ctx: Rc::clone(ctx),
        path,
    });
    nodes.insert(target.id(), (WeakKey::new(target), Rc::downgrade(&inner)));
    BoundNode { inner }
}

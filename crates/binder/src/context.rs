//! The shared mutable record underlying one binding root.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::{Rc, Weak};

use state_binder_graph::{CompositeRef, Value, WeakKey};

use crate::diagnostics::Diagnostic;
use crate::node::NodeInner;
use crate::options::BindingOptions;

/// Single-shot acknowledgement handed to the commit function alongside each
/// snapshot. The store calls [`Ack::apply`] once the snapshot is
/// authoritative; the context then resynchronizes its notion of "current"
/// with exactly the delivered value. Dropping the handle without applying
/// it leaves the context on its pre-commit snapshot.
pub struct Ack {
    apply: Option<Box<dyn FnOnce()>>,
}

impl Ack {
    pub(crate) fn new(apply: impl FnOnce() + 'static) -> Self {
        Self {
            apply: Some(Box::new(apply)),
        }
    }

    pub fn apply(mut self) {
        if let Some(apply) = self.apply.take() {
            apply();
        }
    }
}

pub(crate) type CommitFn = Box<dyn FnMut(Value, Ack)>;
pub(crate) type DiagnosticListener = Box<dyn FnMut(Diagnostic)>;

/// One per independent binding root; every bound node derived from the root
/// holds the same `Rc`, never a private copy. Dropped with its last node.
pub(crate) struct ContextInner {
    /// Current raw snapshot.
    pub(crate) state: RefCell<Value>,
    /// Sole conduit to the external store.
    pub(crate) commit: RefCell<CommitFn>,
    /// Clone function, fixed at creation by the clone policy.
    pub(crate) copy: fn(&Value) -> Value,
    pub(crate) options: BindingOptions,
    /// Identity cache: at most one live bound node per composite identity.
    /// The weak key guards against a freed composite's address being reused
    /// by a later allocation.
    pub(crate) nodes: RefCell<HashMap<usize, (WeakKey, Weak<NodeInner>)>>,
    pub(crate) listeners: RefCell<BTreeMap<u64, DiagnosticListener>>,
    pub(crate) next_listener_id: Cell<u64>,
    /// Diagnostics raised before any listener registered.
    pub(crate) pending: RefCell<Vec<Diagnostic>>,
    /// Commits queued while one is being delivered; drained in order by the
    /// outermost dispatch.
    pub(crate) commit_queue: RefCell<VecDeque<(Value, Ack)>>,
    pub(crate) dispatching: Cell<bool>,
    /// Listener id currently being notified, if any, and whether it
    /// unregistered itself mid-notification.
    pub(crate) notifying: Cell<Option<u64>>,
    pub(crate) notifying_removed: Cell<bool>,
}

impl ContextInner {
    pub(crate) fn create<C>(initial: &Value, commit: C, options: BindingOptions) -> Rc<Self>
    where
        C: FnMut(Value, Ack) + 'static,
    {
        let copy = options.clone_policy.copy_fn();
        Rc::new(Self {
            state: RefCell::new(copy(initial)),
            commit: RefCell::new(Box::new(commit)),
            copy,
            options,
            nodes: RefCell::new(HashMap::new()),
            listeners: RefCell::new(BTreeMap::new()),
            next_listener_id: Cell::new(1),
            pending: RefCell::new(Vec::new()),
            commit_queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
            notifying: Cell::new(None),
            notifying_removed: Cell::new(false),
        })
    }

    pub(crate) fn on_diagnostic<F>(&self, mut listener: F) -> u64
    where
        F: FnMut(Diagnostic) + 'static,
    {
        // Drained up front so a listener that re-registers during the flush
        // does not hit the backlog cell while it is borrowed.
        let backlog: Vec<Diagnostic> = self.pending.borrow_mut().drain(..).collect();
        for diagnostic in backlog {
            listener(diagnostic);
        }
        let id = self.next_listener_id.get();
        self.next_listener_id.set(id.saturating_add(1));
        self.listeners.borrow_mut().insert(id, Box::new(listener));
        id
    }

    pub(crate) fn off_diagnostic(&self, listener_id: u64) -> bool {
        if self.listeners.borrow_mut().remove(&listener_id).is_some() {
            return true;
        }
        // The listener may be the one currently out of the map being
        // notified; mark it so the dispatcher does not reinsert it.
        if self.notifying.get() == Some(listener_id) {
            self.notifying_removed.set(true);
            return true;
        }
        false
    }
}

thread_local! {
    /// Live binding roots by raw root identity, used to detect re-binding.
    /// The weak key pins the identity to the original allocation, so an
    /// address reused after the raw root dies never matches.
    static BOUND_ROOTS: RefCell<HashMap<usize, (WeakKey, Weak<ContextInner>)>> =
        RefCell::new(HashMap::new());
}

pub(crate) fn root_already_bound(root: &CompositeRef) -> bool {
    BOUND_ROOTS.with(|roots| {
        let mut roots = roots.borrow_mut();
        roots.retain(|_, (key, ctx)| key.is_alive() && ctx.strong_count() > 0);
        roots
            .get(&root.id())
            .is_some_and(|(key, _)| key.matches(root))
    })
}

pub(crate) fn register_root(root: &CompositeRef, ctx: &Rc<ContextInner>) {
    BOUND_ROOTS.with(|roots| {
        roots
            .borrow_mut()
            .insert(root.id(), (WeakKey::new(root), Rc::downgrade(ctx)));
    });
}

//! Commit dispatch: the one path every mutation funnels through on its way
//! to the external store.

use std::rc::Rc;

use crate::context::{Ack, ContextInner};
use crate::diagnostics::{Diagnostic, DiagnosticKind};

impl ContextInner {
    /// Clones the current snapshot through the configured clone function
    /// (so the store can never alias live binder state) and hands it to the
    /// commit function. On acknowledgement the context's current snapshot
    /// becomes the delivered value, so subsequent writes diff against what
    /// the store actually holds.
    ///
    /// A write performed by the store while it handles a commit fires this
    /// re-entrantly; the snapshot is captured immediately but delivery is
    /// queued behind the commit in flight, preserving fire order.
    pub(crate) fn on_change(self: &Rc<Self>) {
        let next = {
            let current = self.state.borrow();
            (self.copy)(&current)
        };
        let ctx = Rc::downgrade(self);
        let delivered = next.clone();
        let ack = Ack::new(move || {
            if let Some(ctx) = ctx.upgrade() {
                *ctx.state.borrow_mut() = delivered;
            }
        });
        self.commit_queue.borrow_mut().push_back((next, ack));
        if self.dispatching.get() {
            return;
        }
        self.dispatching.set(true);
        loop {
            let queued = self.commit_queue.borrow_mut().pop_front();
            let Some((next, ack)) = queued else { break };
            (self.commit.borrow_mut())(next, ack);
        }
        self.dispatching.set(false);
    }

    pub(crate) fn emit_diagnostic(&self, kind: DiagnosticKind, message: String) {
        tracing::warn!(target: "state_binder", ?kind, "{message}");
        let diagnostic = Diagnostic { kind, message };
        if self.listeners.borrow().is_empty() {
            self.pending.borrow_mut().push(diagnostic);
            return;
        }
        // Each listener is lifted out of the map for the duration of its
        // call, so a listener may register or unregister listeners without
        // hitting an outstanding borrow. Listeners registered during
        // dispatch only see later diagnostics.
        let ids: Vec<u64> = self.listeners.borrow().keys().copied().collect();
        for id in ids {
            let entry = self.listeners.borrow_mut().remove(&id);
            let Some(mut listener) = entry else { continue };
            self.notifying.set(Some(id));
            self.notifying_removed.set(false);
            listener(diagnostic.clone());
            self.notifying.set(None);
            if !self.notifying_removed.get() {
                self.listeners.borrow_mut().insert(id, listener);
            }
        }
    }
}

//! Owning Scopes
//!
//! A scope models the lifetime of a consumer, such as a component. Work
//! registered while a scope is current can ask to be torn down when the
//! scope stops; action subscriptions use this to unsubscribe themselves.
//!
//! ```rust,ignore
//! let scope = Scope::new();
//! scope.run(|| {
//!     store.on_action(|ctx| println!("{}", ctx.name()));
//! });
//! scope.stop(); // the subscription above is removed
//! ```

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::subscriber::SubscriberId;

type Teardown = Box<dyn FnOnce() + Send>;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

struct ScopeInner {
    id: SubscriberId,
    active: AtomicBool,
    teardowns: Mutex<Vec<Teardown>>,
}

/// A consumer lifetime that runs registered teardowns when stopped.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

/// Pops the scope stack when dropped.
struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl Scope {
    /// Create a new, active scope.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: SubscriberId::new(),
                active: AtomicBool::new(true),
                teardowns: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Id of this scope.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// The innermost scope currently running on this thread.
    pub fn current() -> Option<Scope> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Run `f` with this scope as the current scope.
    ///
    /// A stopped scope still runs `f`, but is not made current.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        if !self.is_active() {
            return f();
        }
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        let _guard = ScopeGuard;
        f()
    }

    /// Whether the scope has not been stopped yet.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Register a teardown to run when this scope stops.
    ///
    /// On a stopped scope the teardown runs immediately.
    pub fn on_dispose(&self, teardown: impl FnOnce() + Send + 'static) {
        if self.is_active() {
            self.inner.teardowns.lock().push(Box::new(teardown));
        } else {
            teardown();
        }
    }

    /// Stop the scope, running its teardowns once in registration order.
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let teardowns = std::mem::take(&mut *self.inner.teardowns.lock());
        tracing::debug!(scope = self.inner.id.raw(), count = teardowns.len(), "stopping scope");
        for teardown in teardowns {
            teardown();
        }
    }

    /// Number of teardowns waiting for [`Scope::stop`].
    pub fn pending_teardowns(&self) -> usize {
        self.inner.teardowns.lock().len()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("pending_teardowns", &self.pending_teardowns())
            .finish()
    }
}

/// Register a teardown on the current scope.
///
/// Returns `false`, without running the teardown, when no scope is current.
pub fn on_scope_dispose(teardown: impl FnOnce() + Send + 'static) -> bool {
    match Scope::current() {
        Some(scope) => {
            scope.on_dispose(teardown);
            true
        }
        None => false,
    }
}

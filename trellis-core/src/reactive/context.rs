//! Reactive Context
//!
//! The reactive context records which reactive sources a computation reads
//! while it runs. A source is anything with a version in the
//! [`Runtime`](super::Runtime) ledger: a store's state cell or a
//! [`Signal`](super::Signal).
//!
//! # Implementation
//!
//! A thread-local stack holds one entry per running computation. Reading a
//! source appends its id to the top entry only, so a computed value that
//! reads another computed value sees just its own reads. The inner value
//! re-reports its sources to the outer entry after it returns (see
//! [`Computed::get`](super::Computed::get)).

use std::cell::RefCell;

use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    subscriber_id: SubscriberId,
    /// Source ids read so far, first-read order, no duplicates.
    sources: Vec<u64>,
}

/// Guard that pops the context when dropped.
///
/// The stack stays balanced even if the computation returns early with an
/// error or unwinds.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// The context is exited when the returned guard is dropped.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                sources: Vec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.subscriber_id))
    }

    /// Record a read of the given source in the innermost context.
    ///
    /// Does nothing outside a reactive context.
    pub fn track_dependency(source_id: u64) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if !entry.sources.contains(&source_id) {
                    entry.sources.push(source_id);
                }
            }
        });
    }

    /// Get the sources collected in the current context.
    pub fn get_dependencies() -> Vec<u64> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.sources.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_subscriber() {
        let id = SubscriberId::new();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(id);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn context_dedupes_sources() {
        let id = SubscriberId::new();
        let _ctx = ReactiveContext::enter(id);

        ReactiveContext::track_dependency(1);
        ReactiveContext::track_dependency(2);
        ReactiveContext::track_dependency(1);
        ReactiveContext::track_dependency(3);

        assert_eq!(ReactiveContext::get_dependencies(), vec![1, 2, 3]);
    }

    #[test]
    fn tracking_outside_a_context_is_ignored() {
        ReactiveContext::track_dependency(7);
        assert!(ReactiveContext::get_dependencies().is_empty());
    }

    #[test]
    fn nested_contexts_keep_separate_sources() {
        let outer = SubscriberId::new();
        let inner = SubscriberId::new();

        let _outer_ctx = ReactiveContext::enter(outer);
        ReactiveContext::track_dependency(10);

        {
            let _inner_ctx = ReactiveContext::enter(inner);
            ReactiveContext::track_dependency(20);
            assert_eq!(ReactiveContext::current_subscriber(), Some(inner));
            assert_eq!(ReactiveContext::get_dependencies(), vec![20]);
        }

        assert_eq!(ReactiveContext::current_subscriber(), Some(outer));
        assert_eq!(ReactiveContext::get_dependencies(), vec![10]);
    }
}

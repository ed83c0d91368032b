//! gitcmd::context
//!
//! Cancellation scopes for git subprocesses.
//!
//! A [`Context`] is a cloneable cancellation handle with an optional
//! deadline and a recorded [`CancelCause`]. Child contexts are canceled
//! together with their parent and never outlive its deadline. A command
//! runs under a child of the caller's context; canceling that child kills
//! the subprocess, and the recorded cause lets `wait` tell a deliberate
//! early stop apart from a failure.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

/// Why a context was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelCause {
    /// Explicit cancellation.
    Canceled,
    /// The deadline passed.
    DeadlineExceeded,
    /// A pipeline callback stopped the command on purpose.
    PipelineStop,
    /// The owning command finished and released its resources.
    Finished,
}

impl std::fmt::Display for CancelCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CancelCause::Canceled => "context canceled",
            CancelCause::DeadlineExceeded => "context deadline exceeded",
            CancelCause::PipelineStop => "pipeline stopped the command",
            CancelCause::Finished => "command finished",
        })
    }
}

#[derive(Debug, Default)]
struct State {
    cause: Option<CancelCause>,
    children: Vec<Weak<Inner>>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    cond: Condvar,
    deadline: Option<Instant>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A cancellation scope with an optional deadline.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A root context that is never canceled on its own.
    pub fn background() -> Self {
        Self::with_deadline_inner(None)
    }

    fn with_deadline_inner(deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                cond: Condvar::new(),
                deadline,
            }),
        }
    }

    /// A child context canceled together with `self`.
    pub fn child(&self) -> Self {
        self.child_with_deadline(self.inner.deadline)
    }

    /// A child context that also expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) => parent.min(own),
            None => own,
        };
        self.child_with_deadline(Some(deadline))
    }

    fn child_with_deadline(&self, deadline: Option<Instant>) -> Self {
        let child = Self::with_deadline_inner(deadline);

        let parent_cause = {
            let mut state = self.inner.lock();
            if state.cause.is_none() {
                state.children.retain(|weak| weak.strong_count() > 0);
                state.children.push(Arc::downgrade(&child.inner));
            }
            state.cause
        };
        if let Some(cause) = parent_cause {
            child.cancel_with_cause(cause);
        }
        child
    }

    /// Cancel with [`CancelCause::Canceled`].
    pub fn cancel(&self) -> bool {
        self.cancel_with_cause(CancelCause::Canceled)
    }

    /// Cancel this context and its children with `cause`.
    ///
    /// Only the first cause is recorded; returns whether this call set it.
    pub fn cancel_with_cause(&self, cause: CancelCause) -> bool {
        let children = {
            let mut state = self.inner.lock();
            if state.cause.is_some() {
                return false;
            }
            state.cause = Some(cause);
            self.inner.cond.notify_all();
            std::mem::take(&mut state.children)
        };

        for child in children.iter().filter_map(Weak::upgrade) {
            Context { inner: child }.cancel_with_cause(cause);
        }
        true
    }

    /// The recorded cause, if the context is done.
    ///
    /// A passed deadline is recorded lazily as
    /// [`CancelCause::DeadlineExceeded`].
    pub fn cause(&self) -> Option<CancelCause> {
        if let Some(cause) = self.inner.lock().cause {
            return Some(cause);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel_with_cause(CancelCause::DeadlineExceeded);
                self.inner.lock().cause
            }
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Block until the context is done.
    pub fn wait(&self) -> CancelCause {
        loop {
            if let Some(cause) = self.wait_timeout(Duration::from_secs(3600)) {
                return cause;
            }
        }
    }

    /// Block until the context is done or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CancelCause> {
        let until = Instant::now() + timeout;
        let mut state = self.inner.lock();
        loop {
            if let Some(cause) = state.cause {
                return Some(cause);
            }

            let now = Instant::now();
            if let Some(deadline) = self.inner.deadline {
                if now >= deadline {
                    drop(state);
                    self.cancel_with_cause(CancelCause::DeadlineExceeded);
                    return self.inner.lock().cause;
                }
            }
            if now >= until {
                return None;
            }

            let limit = match self.inner.deadline {
                Some(deadline) => deadline.min(until),
                None => until,
            };
            state = self
                .inner
                .cond
                .wait_timeout(state, limit - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn background_is_not_done() {
        let ctx = Context::background();
        assert!(!ctx.is_done());
        assert_eq!(ctx.deadline(), None);
    }

    #[test]
    fn first_cause_wins() {
        let ctx = Context::background();
        assert!(ctx.cancel_with_cause(CancelCause::PipelineStop));
        assert!(!ctx.cancel());
        assert_eq!(ctx.cause(), Some(CancelCause::PipelineStop));
    }

    #[test]
    fn cancel_propagates_to_children() {
        let parent = Context::background();
        let child = parent.child();
        let grandchild = child.with_timeout(Duration::from_secs(60));

        parent.cancel();
        assert_eq!(child.cause(), Some(CancelCause::Canceled));
        assert_eq!(grandchild.cause(), Some(CancelCause::Canceled));
    }

    #[test]
    fn child_cancel_leaves_parent() {
        let parent = Context::background();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_done());
    }

    #[test]
    fn child_of_canceled_parent_starts_canceled() {
        let parent = Context::background();
        parent.cancel_with_cause(CancelCause::DeadlineExceeded);
        assert_eq!(
            parent.child().cause(),
            Some(CancelCause::DeadlineExceeded)
        );
    }

    #[test]
    fn deadline_is_inherited() {
        let parent = Context::background().with_timeout(Duration::from_millis(10));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        assert_eq!(ctx.wait(), CancelCause::DeadlineExceeded);
        assert_eq!(ctx.cause(), Some(CancelCause::DeadlineExceeded));
    }

    #[test]
    fn wait_wakes_on_cancel_from_other_thread() {
        let ctx = Context::background();
        let remote = ctx.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        assert_eq!(ctx.wait(), CancelCause::Canceled);
        handle.join().unwrap();
    }

    #[test]
    fn wait_timeout_returns_none_when_idle() {
        let ctx = Context::background();
        assert_eq!(ctx.wait_timeout(Duration::from_millis(5)), None);
    }
}

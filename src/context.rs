use std::{fmt, future, sync::Arc, time::Duration};

use tokio::{sync::watch, time::Instant};

use crate::WellKnownKey;

/// Why a call context stopped accepting work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CancelReason {
    /// The caller fired the context's [`CancelToken`].
    #[error("context cancelled")]
    Cancelled,
    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Caller-owned cancellation signal shared by every clone.
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Fires the signal. Idempotent.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called on any clone.
    pub async fn cancelled(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns once fired.
        let _ = receiver.wait_for(|fired| *fired).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

struct Binding {
    key: WellKnownKey,
    value: String,
    parent: Option<Arc<Binding>>,
}

/// Immutable per-call carrier for identity/tracing values and the
/// cancellation signal.
///
/// Every `with_*` method returns a new context layered on top of `self`;
/// the receiver is never changed. Attaching a key that is already bound
/// shadows the older binding.
#[derive(Clone, Default)]
pub struct RequestContext {
    bindings: Option<Arc<Binding>>,
    cancel: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Empty context: no values, never cancelled, no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_value(&self, key: WellKnownKey, value: impl Into<String>) -> Self {
        Self {
            bindings: Some(Arc::new(Binding {
                key,
                value: value.into(),
                parent: self.bindings.clone(),
            })),
            ..self.clone()
        }
    }

    /// Returns the most recently attached value for `key`.
    pub fn value(&self, key: WellKnownKey) -> Option<&str> {
        let mut cursor = self.bindings.as_deref();
        while let Some(binding) = cursor {
            if binding.key == key {
                return Some(binding.value.as_str());
            }
            cursor = binding.parent.as_deref();
        }
        None
    }

    pub fn with_cancel_token(&self, token: CancelToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    /// Attaches a deadline. An earlier deadline already on the context wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    /// Attaches a deadline `timeout` from now. A timeout too large to
    /// represent as an instant leaves the context without a new deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check of the cancellation state.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the context is cancelled or its deadline passes,
    /// whichever happens first. Pends forever for a context with neither.
    pub async fn done(&self) -> CancelReason {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => CancelReason::Cancelled,
            _ = expired => CancelReason::DeadlineExceeded,
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = Vec::new();
        let mut cursor = self.bindings.as_deref();
        while let Some(binding) = cursor {
            keys.push(binding.key.header_name());
            cursor = binding.parent.as_deref();
        }
        f.debug_struct("RequestContext")
            .field("keys", &keys)
            .field("cancel", &self.cancel)
            .field("deadline", &self.deadline)
            .finish()
    }
}

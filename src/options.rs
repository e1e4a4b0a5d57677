use std::time::Duration;

use crate::{RequestContext, RetryPolicy};

/// Configures call timeout and retry behavior.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Upper bound for a whole call, retries and waits included.
    /// `Duration::ZERO` means no call deadline.
    pub timeout: Duration,
    /// Retry policy; `None` sends every request exactly once.
    pub retry: Option<RetryPolicy>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: None,
        }
    }
}

impl ClientOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Derives the context a call runs under: `ctx` plus the call timeout.
    pub(crate) fn call_context(&self, ctx: &RequestContext) -> RequestContext {
        if self.timeout.is_zero() {
            ctx.clone()
        } else {
            ctx.with_timeout(self.timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ClientOptions;
    use crate::RequestContext;

    #[test]
    fn zero_timeout_leaves_the_call_without_deadline() {
        let options = ClientOptions::default().with_timeout(Duration::ZERO);
        let ctx = options.call_context(&RequestContext::background());
        assert_eq!(ctx.deadline(), None);
        assert_eq!(ctx.cancel_reason(), None);
    }

    #[test]
    fn zero_timeout_keeps_an_inherited_deadline() {
        let parent = RequestContext::background().with_timeout(Duration::from_secs(2));
        let options = ClientOptions::default().with_timeout(Duration::ZERO);
        assert_eq!(options.call_context(&parent).deadline(), parent.deadline());
    }

    #[test]
    fn positive_timeout_sets_a_deadline() {
        let options = ClientOptions::default().with_timeout(Duration::from_millis(250));
        let ctx = options.call_context(&RequestContext::background());
        assert!(ctx.deadline().is_some());
    }
}

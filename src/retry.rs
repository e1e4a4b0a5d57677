use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{HttpResponse, OutgoingRequest, Transport, TransportError};

type AcceptFn = dyn Fn(u16) -> bool + Send + Sync;

/// Bounded retry configuration.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    delay: Duration,
    accept: Arc<AcceptFn>,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try and is clamped to at least 1.
    /// `accept` decides from the status code alone whether to stop retrying.
    pub fn new<F>(max_attempts: usize, delay: Duration, accept: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            accept: Arc::new(accept),
        }
    }

    /// Accepts any 2xx status.
    pub fn on_success_status(max_attempts: usize, delay: Duration) -> Self {
        Self::new(max_attempts, delay, |status| (200..300).contains(&status))
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn accepts(&self, status: u16) -> bool {
        (self.accept)(status)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// Decorator that re-sends a request until the policy accepts the outcome,
/// the attempt bound is reached, or the call context fires during a wait.
///
/// Attempts are strictly sequential. The bound is checked before the
/// acceptance predicate, so the last attempt is returned as-is and never
/// followed by a wait. An attempt already handed to the inner transport is
/// not interrupted here; when the inner transport reports the context fired
/// mid-send ([`TransportError::Interrupted`]) that error ends the loop as-is.
pub struct RetryTransport {
    inner: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryTransport {
    pub fn new(inner: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Transport for RetryTransport {
    async fn send(&self, request: &OutgoingRequest) -> Result<HttpResponse, TransportError> {
        let mut attempts = 0usize;
        loop {
            let outcome = self.inner.send(request).await;
            attempts += 1;

            if attempts == self.policy.max_attempts {
                return outcome;
            }

            match &outcome {
                Ok(response) if self.policy.accepts(response.status.as_u16()) => return outcome,
                Err(TransportError::Interrupted(_)) => return outcome,
                _ => {}
            }

            tracing::debug!(
                attempt = attempts,
                max_attempts = self.policy.max_attempts,
                delay_ms = u64::try_from(self.policy.delay.as_millis()).unwrap_or(u64::MAX),
                "retrying request"
            );

            tokio::select! {
                biased;
                reason = request.context().done() => {
                    tracing::debug!(attempt = attempts, %reason, "retry wait cancelled");
                    return Err(TransportError::Cancelled {
                        reason,
                        last_response: outcome.ok().map(Box::new),
                    });
                }
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use reqwest::{Method, StatusCode};
    use tokio::time::Instant;

    use super::{RetryPolicy, RetryTransport};
    use crate::{
        CancelReason, CancelToken, HttpResponse, OutgoingRequest, RequestContext, Transport,
        TransportError,
    };

    enum Step {
        Status(StatusCode),
        Fail,
        Interrupted,
    }

    struct Scripted {
        steps: Mutex<VecDeque<Step>>,
        hits: AtomicUsize,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                hits: AtomicUsize::new(0),
            })
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, _request: &OutgoingRequest) -> Result<HttpResponse, TransportError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            let step = self
                .steps
                .lock()
                .expect("script lock")
                .pop_front()
                .unwrap_or(Step::Fail);
            match step {
                Step::Status(status) => Ok(HttpResponse::new(status, "{}")),
                Step::Fail => Err(TransportError::Other("connection reset".to_owned())),
                Step::Interrupted => Err(TransportError::Interrupted(
                    CancelReason::DeadlineExceeded,
                )),
            }
        }
    }

    fn request(ctx: RequestContext) -> OutgoingRequest {
        OutgoingRequest::new(
            Method::GET,
            "http://svc.local/health".parse().expect("valid url"),
            ctx,
        )
    }

    fn only_200(max_attempts: usize, delay: Duration) -> RetryPolicy {
        RetryPolicy::new(max_attempts, delay, |status| status == 200)
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_failures_waiting_between_attempts() {
        let inner = Scripted::new(vec![
            Step::Fail,
            Step::Status(StatusCode::SERVICE_UNAVAILABLE),
            Step::Status(StatusCode::OK),
        ]);
        let delay = Duration::from_millis(200);
        let retry = RetryTransport::new(inner.clone(), only_200(3, delay));

        let started = Instant::now();
        let response = retry
            .send(&request(RequestContext::background()))
            .await
            .expect("third attempt must succeed");

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(inner.hits(), 3);
        let waited = started.elapsed();
        assert!(waited >= delay * 2, "waited {waited:?}");
        assert!(waited < delay * 3, "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_never_waits() {
        let inner = Scripted::new(vec![Step::Status(StatusCode::BAD_GATEWAY)]);
        let retry = RetryTransport::new(inner.clone(), only_200(1, Duration::from_secs(30)));

        let started = Instant::now();
        let response = retry
            .send(&request(RequestContext::background()))
            .await
            .expect("response must pass through");

        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
        assert_eq!(inner.hits(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn last_attempt_error_is_returned_as_is() {
        let inner = Scripted::new(vec![Step::Fail, Step::Fail]);
        let retry = RetryTransport::new(inner.clone(), only_200(2, Duration::from_millis(5)));

        let err = retry
            .send(&request(RequestContext::background()))
            .await
            .expect_err("both attempts fail");

        assert!(matches!(err, TransportError::Other(_)));
        assert_eq!(inner.hits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_status_stops_immediately() {
        let inner = Scripted::new(vec![Step::Status(StatusCode::NOT_FOUND)]);
        let policy = RetryPolicy::new(5, Duration::from_secs(1), |status| status < 500);
        let retry = RetryTransport::new(inner.clone(), policy);

        let response = retry
            .send(&request(RequestContext::background()))
            .await
            .expect("404 is accepted by the predicate");

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(inner.hits(), 1);
    }

    #[tokio::test]
    async fn cancellation_during_wait_returns_promptly_with_last_response() {
        let inner = Scripted::new(vec![Step::Status(StatusCode::INTERNAL_SERVER_ERROR)]);
        let retry = RetryTransport::new(inner.clone(), only_200(5, Duration::from_secs(30)));
        let token = CancelToken::new();
        let ctx = RequestContext::background().with_cancel_token(token.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let started = std::time::Instant::now();
        let err = retry
            .send(&request(ctx))
            .await
            .expect_err("cancelled wait must fail");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(inner.hits(), 1);
        match err {
            TransportError::Cancelled {
                reason,
                last_response,
            } => {
                assert_eq!(reason, CancelReason::Cancelled);
                let last = last_response.expect("first attempt produced a response");
                assert_eq!(last.status, StatusCode::INTERNAL_SERVER_ERROR);
            }
            other => panic!("expected cancelled, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_wait_is_reported_as_deadline_exceeded() {
        let inner = Scripted::new(vec![Step::Fail]);
        let retry = RetryTransport::new(inner.clone(), only_200(4, Duration::from_secs(10)));
        let ctx = RequestContext::background().with_timeout(Duration::from_secs(1));

        let err = retry.send(&request(ctx)).await.expect_err("deadline");

        match err {
            TransportError::Cancelled {
                reason,
                last_response,
            } => {
                assert_eq!(reason, CancelReason::DeadlineExceeded);
                assert!(last_response.is_none());
            }
            other => panic!("expected cancelled, got {other:?}"),
        }
        assert_eq!(inner.hits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_attempt_ends_the_loop_unchanged() {
        let inner = Scripted::new(vec![
            Step::Interrupted,
            Step::Status(StatusCode::OK),
            Step::Status(StatusCode::OK),
        ]);
        let retry = RetryTransport::new(inner.clone(), only_200(3, Duration::from_secs(1)));

        let started = Instant::now();
        let err = retry
            .send(&request(RequestContext::background()))
            .await
            .expect_err("interrupted attempt must not be retried");

        assert!(matches!(
            err,
            TransportError::Interrupted(CancelReason::DeadlineExceeded)
        ));
        assert_eq!(inner.hits(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let policy = RetryPolicy::on_success_status(0, Duration::from_millis(1));
        assert_eq!(policy.max_attempts(), 1);
        assert!(policy.accepts(204));
        assert!(!policy.accepts(302));
    }
}

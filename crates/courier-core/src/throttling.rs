use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Outbound request quota: at most `limit` calls per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub window: Duration,
    pub limit: NonZeroU32,
}

impl ThrottleConfig {
    pub fn per_second(limit: NonZeroU32) -> Self {
        Self {
            window: Duration::from_secs(1),
            limit,
        }
    }

    fn quota(self) -> Quota {
        let seconds_per_cell =
            (self.window.as_secs_f64() / f64::from(self.limit.get())).max(0.001);
        let period = Duration::from_secs_f64(seconds_per_cell);

        // `period` is at least 1ms, so `with_period` cannot return `None`.
        Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(self.limit))
            .allow_burst(self.limit)
    }
}

/// Decorator that waits for quota before every outbound call.
pub struct ThrottledHttpClient {
    inner: Arc<dyn HttpClient>,
    limiter: Arc<DirectRateLimiter>,
}

impl ThrottledHttpClient {
    pub fn new(inner: Arc<dyn HttpClient>, config: ThrottleConfig) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(config.quota())),
        }
    }
}

impl HttpClient for ThrottledHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            self.limiter.until_ready().await;
            self.inner.execute(request).await
        })
    }

    fn close(&self) {
        self.inner.close();
    }
}

use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::Middleware;
use crate::dispatcher::HandlerRequest;
use crate::response::HttpResponse;

/// Request counters kept with relaxed atomics, rendered in the Prometheus
/// text format for the embedding server to expose.
///
/// Collected:
/// - total requests and cumulative latency
/// - responses by status class (`2xx` .. `5xx`)
/// - handler timeouts (`504`)
/// - the coroutine stack size requests ran with
#[derive(Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    /// Indexed by status class: 0 → 1xx .. 4 → 5xx
    status_classes: [AtomicUsize; 5],
    timeouts: AtomicUsize,
    stack_size: AtomicUsize,
}

impl MetricsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean latency over every completed request; zero before the first.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Responses whose status falls in `class` (2 for `2xx`, and so on).
    pub fn status_class_count(&self, class: u16) -> usize {
        class
            .checked_sub(1)
            .and_then(|i| self.status_classes.get(usize::from(i)))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    pub fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size.load(Ordering::Relaxed)
    }

    /// Prometheus text exposition of every counter.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        if self.write_prometheus(&mut out).is_err() {
            out.clear();
        }
        out
    }

    fn write_prometheus(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "# HELP mediaroute_requests_total Requests dispatched to an action")?;
        writeln!(out, "# TYPE mediaroute_requests_total counter")?;
        writeln!(out, "mediaroute_requests_total {}", self.request_count())?;

        writeln!(out, "# HELP mediaroute_request_latency_seconds Mean request latency")?;
        writeln!(out, "# TYPE mediaroute_request_latency_seconds gauge")?;
        writeln!(
            out,
            "mediaroute_request_latency_seconds {:.6}",
            self.average_latency().as_secs_f64()
        )?;

        writeln!(out, "# HELP mediaroute_responses_total Responses by status class")?;
        writeln!(out, "# TYPE mediaroute_responses_total counter")?;
        for class in 1..=5u16 {
            writeln!(
                out,
                "mediaroute_responses_total{{class=\"{class}xx\"}} {}",
                self.status_class_count(class)
            )?;
        }

        writeln!(out, "# HELP mediaroute_handler_timeouts_total Handlers that timed out")?;
        writeln!(out, "# TYPE mediaroute_handler_timeouts_total counter")?;
        writeln!(out, "mediaroute_handler_timeouts_total {}", self.timeouts())?;

        writeln!(out, "# HELP mediaroute_coroutine_stack_bytes Coroutine stack size")?;
        writeln!(out, "# TYPE mediaroute_coroutine_stack_bytes gauge")?;
        writeln!(out, "mediaroute_coroutine_stack_bytes {}", self.stack_size())
    }
}

impl Middleware for MetricsMiddleware {
    fn before(&self, _req: &HandlerRequest) -> Option<HttpResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn after(&self, _req: &HandlerRequest, res: &mut HttpResponse, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        if let Some(counter) = (res.status / 100)
            .checked_sub(1)
            .and_then(|i| self.status_classes.get(usize::from(i)))
        {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        if res.status == 504 {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
        let stack = if may::coroutine::is_coroutine() {
            may::coroutine::current().stack_size()
        } else {
            may::config().get_stack_size()
        };
        self.stack_size.store(stack, Ordering::Relaxed);
    }
}

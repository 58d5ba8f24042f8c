//! Handler invocation on `may` coroutines.
//!
//! Every call runs on its own coroutine and replies over a one-shot channel,
//! which lets the dispatcher stop waiting when an action's timeout elapses.
//! An expired call is cancelled: the coroutine unwinds at its next yield
//! point (a `may` sleep, channel or socket wait) and never replies. A handler
//! spinning without yielding runs on until it does.

use may::coroutine::{self, JoinHandle};
use may::sync::mpsc;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::request::HandlerResult;
use crate::ids::RequestId;
use crate::response::Completion;

/// Polling interval while waiting on a call with a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A handler call in flight.
pub(crate) struct Call {
    rx: Option<mpsc::Receiver<Completion>>,
    handle: Option<JoinHandle<()>>,
    abandoned: Arc<AtomicBool>,
    request_id: RequestId,
    handler_name: String,
    spawn_error: Option<String>,
}

/// Start `work` on a fresh coroutine.
pub(crate) fn spawn_call<F>(
    handler_name: &str,
    request_id: RequestId,
    stack_size: usize,
    work: F,
) -> Call
where
    F: FnOnce() -> HandlerResult + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let name = handler_name.to_string();
    let abandoned = Arc::new(AtomicBool::new(false));
    let gave_up = Arc::clone(&abandoned);

    // SAFETY: `Builder::spawn` is unsafe because coroutines must not touch
    // thread-local storage across yields. `work` is an application handler
    // that only borrows data it owns (`Send + 'static`), and every outcome,
    // panics included, goes back through the channel.
    let spawned = unsafe {
        coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || {
                debug!(
                    request_id = %request_id,
                    handler_name = %name,
                    stack_size = stack_size,
                    "Handler execution start"
                );
                let started = Instant::now();
                let completion = match catch_unwind(AssertUnwindSafe(work)) {
                    Ok(result) => {
                        info!(
                            request_id = %request_id,
                            handler_name = %name,
                            execution_time_ms = started.elapsed().as_millis() as u64,
                            ok = result.is_ok(),
                            "Handler execution complete"
                        );
                        Completion::Returned(result)
                    }
                    Err(_) if gave_up.load(Ordering::Acquire) => {
                        debug!(
                            request_id = %request_id,
                            handler_name = %name,
                            "Handler cancelled after its deadline"
                        );
                        return;
                    }
                    Err(panic) => {
                        let panic_message = panic_message(panic.as_ref());
                        error!(
                            request_id = %request_id,
                            handler_name = %name,
                            panic_message = %panic_message,
                            "Handler panicked"
                        );
                        Completion::Panicked(panic_message)
                    }
                };
                if tx.send(completion).is_err() {
                    debug!(
                        request_id = %request_id,
                        handler_name = %name,
                        "Dispatcher stopped waiting; reply dropped"
                    );
                }
            })
    };

    match spawned {
        Ok(handle) => Call {
            rx: Some(rx),
            handle: Some(handle),
            abandoned,
            request_id,
            handler_name: handler_name.to_string(),
            spawn_error: None,
        },
        Err(e) => {
            error!(
                request_id = %request_id,
                handler_name = %handler_name,
                error = %e,
                stack_size = stack_size,
                "Failed to spawn handler coroutine"
            );
            Call {
                rx: None,
                handle: None,
                abandoned,
                request_id,
                handler_name: handler_name.to_string(),
                spawn_error: Some(format!("failed to spawn handler coroutine: {e}")),
            }
        }
    }
}

impl Call {
    /// Wait for the reply, cancelling the coroutine at `deadline`.
    pub(crate) fn wait(mut self, deadline: Option<Instant>) -> Completion {
        let Some(rx) = self.rx.take() else {
            return Completion::Panicked(self.spawn_error.unwrap_or_default());
        };
        let Some(deadline) = deadline else {
            return rx.recv().unwrap_or_else(|_| {
                Completion::Panicked("handler coroutine exited without replying".to_string())
            });
        };
        // may's channel has no recv_timeout; poll until the deadline
        loop {
            if let Ok(completion) = rx.try_recv() {
                return completion;
            }
            if Instant::now() >= deadline {
                self.cancel();
                return Completion::TimedOut;
            }
            coroutine::sleep(POLL_INTERVAL);
        }
    }
}

impl Call {
    fn cancel(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.is_done() {
            return;
        }
        self.abandoned.store(true, Ordering::Release);
        info!(
            request_id = %self.request_id,
            handler_name = %self.handler_name,
            "Cancelling handler coroutine past its deadline"
        );
        // SAFETY: may marks `cancel` unsafe because the target unwinds at its
        // next yield point. The coroutine owns everything it touches, and the
        // `abandoned` flag turns that unwind into a silent exit without a reply.
        unsafe {
            handle.coroutine().cancel();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked with a non-string payload".to_string()
    }
}

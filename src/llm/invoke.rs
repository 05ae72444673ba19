use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use crate::error::InvokeError;
use crate::llm::backend::Backend;
use crate::llm::prompt::PromptRequest;

/// Sends prompts to a backend under a hard deadline.
#[derive(Clone)]
pub struct ModelInvoker {
    backend: Arc<dyn Backend>,
    timeout: Duration,
}

impl ModelInvoker {
    pub fn new(backend: Arc<dyn Backend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Raw response text, exactly as the backend returned it.
    pub fn invoke(&self, prompt: &PromptRequest) -> Result<String, InvokeError> {
        let backend = Arc::clone(&self.backend);
        let text = prompt.text.clone();
        let timeout = self.timeout;

        with_deadline(timeout, move || backend.complete(&text, timeout))?
    }
}

/// Fast-fail gate run once before any file is processed.
pub fn check_backend(backend: &Arc<dyn Backend>, timeout: Duration) -> bool {
    let b = Arc::clone(backend);
    with_deadline(timeout, move || b.probe(timeout)).unwrap_or(false)
}

/// Run `f` on a worker thread and stop waiting once `timeout` elapses.
/// A worker that overruns is left detached; its result is dropped.
fn with_deadline<T, F>(timeout: Duration, f: F) -> Result<T, InvokeError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("osmotest-backend".into())
        .spawn(move || {
            let _ = tx.send(f());
        })
        .map_err(|e| InvokeError::Transport(format!("cannot spawn backend worker: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(v) => Ok(v),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(InvokeError::Timeout(timeout)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(InvokeError::Disconnected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sleepy {
        delay: Duration,
    }

    impl Backend for Sleepy {
        fn label(&self) -> String {
            "sleepy".into()
        }

        fn probe(&self, _timeout: Duration) -> bool {
            thread::sleep(self.delay);
            true
        }

        fn complete(&self, prompt: &str, _timeout: Duration) -> Result<String, InvokeError> {
            thread::sleep(self.delay);
            Ok(format!("  echo: {prompt}\n"))
        }
    }

    struct Panicky;

    impl Backend for Panicky {
        fn label(&self) -> String {
            "panicky".into()
        }

        fn probe(&self, _timeout: Duration) -> bool {
            panic!("probe exploded")
        }

        fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, InvokeError> {
            panic!("complete exploded")
        }
    }

    fn prompt() -> PromptRequest {
        PromptRequest {
            filepath: "app/a.py".into(),
            excerpt: String::new(),
            text: "hi".into(),
        }
    }

    #[test]
    fn returns_raw_text_untouched() {
        let inv = ModelInvoker::new(
            Arc::new(Sleepy { delay: Duration::ZERO }),
            Duration::from_secs(5),
        );
        assert_eq!(inv.invoke(&prompt()).unwrap(), "  echo: hi\n");
    }

    #[test]
    fn slow_backend_times_out() {
        let inv = ModelInvoker::new(
            Arc::new(Sleepy { delay: Duration::from_secs(2) }),
            Duration::from_millis(50),
        );
        assert!(matches!(inv.invoke(&prompt()), Err(InvokeError::Timeout(_))));
    }

    #[test]
    fn crashed_worker_is_disconnected() {
        let inv = ModelInvoker::new(Arc::new(Panicky), Duration::from_secs(5));
        assert!(matches!(inv.invoke(&prompt()), Err(InvokeError::Disconnected)));
    }

    #[test]
    fn probe_respects_deadline() {
        let slow: Arc<dyn Backend> = Arc::new(Sleepy { delay: Duration::from_secs(2) });
        assert!(!check_backend(&slow, Duration::from_millis(50)));

        let fast: Arc<dyn Backend> = Arc::new(Sleepy { delay: Duration::ZERO });
        assert!(check_backend(&fast, Duration::from_secs(5)));
    }
}

use std::sync::atomic::{AtomicBool, Ordering};

/// Set once by the Ctrl-C handler; polled by the scan and dump loops.
pub struct ShutdownSignal {
    shutdown: AtomicBool,
}

impl ShutdownSignal {
    /// Create a new shutdown signal in the non-shutdown state.
    pub fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Check if shutdown has been triggered.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// The underlying flag, as taken by the library's long-running loops.
    pub fn as_atomic(&self) -> &AtomicBool {
        &self.shutdown
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_initial_state() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown());
    }

    #[test]
    fn test_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        assert!(signal.is_shutdown());
    }

    #[test]
    fn test_trigger_from_other_thread() {
        let signal = Arc::new(ShutdownSignal::new());
        let signal_clone = Arc::clone(&signal);

        thread::spawn(move || signal_clone.trigger()).join().unwrap();
        assert!(signal.is_shutdown());
    }

    #[test]
    fn test_as_atomic() {
        let signal = ShutdownSignal::new();
        let atomic = signal.as_atomic();

        assert!(!atomic.load(Ordering::SeqCst));
        signal.trigger();
        assert!(atomic.load(Ordering::SeqCst));
    }
}

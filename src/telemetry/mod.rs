//! Logging infrastructure
//!
//! Structured logging with tracing, configured from settings and environment.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogGuard};

#[cfg(test)]
pub(crate) mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    /// In-memory sink for formatted events
    #[derive(Clone, Default)]
    pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        /// Lines logged at WARN level
        pub(crate) fn warnings(&self) -> Vec<String> {
            self.contents()
                .lines()
                .filter(|line| line.contains(" WARN "))
                .map(str::to_string)
                .collect()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` on this thread with its events recorded
    pub(crate) fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, CapturedLogs) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs)
    }

    #[test]
    fn test_captures_only_inside_scope() {
        let ((), logs) = with_captured_logs(|| {
            tracing::warn!("disk almost full");
            tracing::info!("still running");
        });
        tracing::warn!("outside the scope");

        let warnings = logs.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("disk almost full"));
        assert!(logs.contents().contains("still running"));
        assert!(!logs.contents().contains("outside the scope"));
    }
}

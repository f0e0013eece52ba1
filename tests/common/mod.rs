#![allow(dead_code)]

use promise_chain::{Reason, Resolve};
use std::env;
use std::process::{Command, Output};
use std::sync::Once;
use std::thread;
use std::time::Duration;

use thiserror::Error;

pub const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
#[error("{0}")]
pub struct TestError(pub String);

pub fn test_error(message: &str) -> Reason {
    TestError(message.to_owned()).into()
}

pub fn message(reason: &Reason) -> String {
    reason
        .downcast_ref::<TestError>()
        .map(|e| e.0.clone())
        .unwrap_or_else(|| panic!("not a TestError: {reason:?}"))
}

pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Resolves `value` from another thread after `millis`.
pub fn delay<T: Send + 'static>(resolve: Resolve<T>, value: T, millis: u64) {
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(millis));
        resolve(value);
    });
}

const CHILD: &str = "PROMISE_CHAIN_FATAL_CHILD";

/// Asserts that `body` takes the process down with `diagnostic` on stderr.
///
/// The parent re-runs only `test` from this test binary in a child process.
/// Inside the child, `body` runs and the test then lingers long enough for a
/// pending abort to land. Returns the child's output to the parent only.
pub fn expect_abort<F: FnOnce()>(test: &str, diagnostic: &str, body: F) -> Option<Output> {
    if env::var_os(CHILD).is_some() {
        init();
        body();
        thread::sleep(TIMEOUT);
        return None;
    }
    let output = Command::new(env::current_exe().expect("test binary path"))
        .args([test, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD, "1")
        .output()
        .expect("failed to start the child test process");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "child survived, stderr:\n{stderr}");
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(output.status.signal(), Some(6), "child was not aborted, stderr:\n{stderr}");
    }
    assert!(stderr.contains(diagnostic), "missing {diagnostic:?} in stderr:\n{stderr}");
    Some(output)
}

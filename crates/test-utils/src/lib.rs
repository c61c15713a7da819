pub mod builders;
pub mod fake_executor;

use std::future::Future;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use phasegraph::logging::LOG_ENV_VAR;
use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound for any single test that spawns real processes.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Logs go through `with_test_writer()`, so they only show up for failing
/// tests (or with `-- --nocapture`). The filter comes from `PHASEGRAPH_LOG`,
/// then `RUST_LOG`, and defaults to `phasegraph=info`:
/// `PHASEGRAPH_LOG=phasegraph=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("phasegraph=info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future, failing the test if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("test timed out after {:?}", TEST_TIMEOUT),
    }
}

/// Wait `window`, then assert that nothing created `path` in the meantime.
///
/// Used to check that a cancelled operation left no process behind that
/// could still write to the workspace.
pub async fn assert_stays_absent(path: &Path, window: Duration) {
    tokio::time::sleep(window).await;
    assert!(
        !path.exists(),
        "{} appeared within {:?} after cancellation",
        path.display(),
        window
    );
}

//! Access to the process-wide embedded PostgreSQL cluster.
//!
//! The cluster is started once per test binary and reused. Bootstrap is
//! serialised and retried because binary downloads fail intermittently when
//! suites run in parallel.

use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use pg_embedded_setup_unpriv::ClusterHandle;

static BOOTSTRAP_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const MAX_ATTEMPTS: u32 = 4;
const RETRY_DELAY_MS: u64 = 500;

/// Returns the shared cluster handle, starting the cluster on first use.
pub fn shared_cluster() -> Result<&'static ClusterHandle, String> {
    let _guard = BOOTSTRAP_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|err| err.into_inner());
    ensure_stable_password();

    let mut last_error = String::new();
    for attempt in 0..MAX_ATTEMPTS {
        match pg_embedded_setup_unpriv::test_support::shared_cluster_handle() {
            Ok(handle) => return Ok(handle),
            Err(err) => {
                last_error = format!("{err:?}");
                let delay = Duration::from_millis(RETRY_DELAY_MS * (1 << attempt));
                eprintln!(
                    "pg-embed: attempt {}/{MAX_ATTEMPTS} failed, retrying in {delay:?}: {last_error}",
                    attempt + 1
                );
                std::thread::sleep(delay);
            }
        }
    }
    Err(last_error)
}

/// Pin `PG_PASSWORD` so a reused data directory keeps accepting the
/// password it was initialised with.
fn ensure_stable_password() {
    if std::env::var_os("PG_PASSWORD").is_none() {
        // SAFETY: runs under `BOOTSTRAP_LOCK` before the cluster spawns any
        // threads.
        unsafe {
            std::env::set_var("PG_PASSWORD", "registry_embedded_test");
        }
    }
}

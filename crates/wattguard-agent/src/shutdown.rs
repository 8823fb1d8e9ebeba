//! OS shutdown execution, invoked only after the command result has been
//! reported (best-effort) and a short grace delay has elapsed.

use std::process::Command;

/// Issue the platform shutdown command. Logs and returns on failure to spawn
/// — there is nothing further to retry once local idle re-validation has
/// already passed.
pub fn perform_shutdown() {
    tracing::warn!("executing system shutdown per WattGuard command");

    let result = if cfg!(target_os = "windows") {
        Command::new("shutdown").args(["/s", "/f", "/t", "0"]).status()
    } else {
        Command::new("shutdown").args(["-h", "now"]).status()
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "failed to invoke shutdown command");
    }
}

//! Shared child-process teardown helper used by both the wallet-creation CLI
//! (`factory`) and the wallet-RPC launcher (`launcher`): politely wait for
//! exit, escalate to a kill after a bounded window. The wrapped binaries
//! must be terminable by SIGTERM within ~10s; otherwise we SIGKILL.

use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;

pub const POLITE_WINDOW: Duration = Duration::from_secs(10);

/// Waits for `child` to exit on its own within `window`; kills it if it
/// hasn't. Returns the exit status if one was observed.
pub async fn wait_then_kill(child: &mut Child, window: Duration) -> Option<std::process::ExitStatus> {
    match timeout(window, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(_)) | Err(_) => {
            let _ = child.start_kill();
            child.wait().await.ok()
        }
    }
}

/// Sends a polite termination request (SIGTERM on unix, via `Child::start_kill`
/// equivalent is not polite — we shell out to `libc`-free `kill` via tokio's
/// process group is unavailable without extra deps, so on unix we send
/// SIGTERM directly through the child's pid).
#[cfg(unix)]
pub fn terminate(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: sending a signal to a pid we own; failure (e.g. the
        // process already exited) is not actionable here.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
pub fn terminate(child: &Child) {
    let _ = child;
}

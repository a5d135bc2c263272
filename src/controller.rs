//! WalletController: the per-wallet lifecycle state machine and control
//! task — spawn, connect, sync, ready, close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::address::Address;
use crate::error::PoolError;
use crate::factory::WalletFactory;
use crate::launcher::{ChildProcess, Launcher};
use crate::rpc::{DaemonRpcClient, WalletRpcClient};

/// Total order of normal progress, with a terminal failure branch reachable
/// from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Starting,
    Creating,
    Syncing,
    Synced,
    Closing,
    Closed,
    Failed,
}

impl ControllerState {
    /// Index in the normal progress order, used only to assert invariant 3
    /// (monotonic transitions except into FAILED) in tests — not consulted
    /// by the Controller itself, which only ever moves forward by
    /// construction.
    fn progress_index(self) -> u8 {
        match self {
            ControllerState::Starting => 0,
            ControllerState::Creating => 1,
            ControllerState::Syncing => 2,
            ControllerState::Synced => 3,
            ControllerState::Closing => 4,
            ControllerState::Closed => 5,
            ControllerState::Failed => u8::MAX,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ControllerState::Closed | ControllerState::Failed)
    }
}

/// A transition is legal iff it moves to FAILED or strictly forward in the
/// progress order.
pub fn is_legal_transition(from: ControllerState, to: ControllerState) -> bool {
    to == ControllerState::Failed || to.progress_index() > from.progress_index()
}

/// Optional key material for an uninitialised wallet.
#[derive(Debug, Clone, Default)]
pub struct WalletKeys {
    pub view_key: Option<String>,
    pub spend_key: Option<String>,
}

impl WalletKeys {
    pub fn is_empty(&self) -> bool {
        self.view_key.is_none() && self.spend_key.is_none()
    }
}

/// Cheaply-cloneable shared view onto a running Controller's state: what
/// the Pool and hooks observe. The owning task is the sole writer of every
/// field.
#[derive(Clone)]
pub struct ControllerHandle {
    pub address: Address,
    pub rpc_port: u16,
    state: Arc<RwLock<ControllerState>>,
    shutdown_requested: Arc<AtomicBool>,
    wallet_client: Arc<tokio::sync::OnceCell<Arc<dyn WalletRpcClient>>>,
    start_time: Instant,
    running_duration: Arc<RwLock<Option<Duration>>>,
    failure_reason: Arc<RwLock<Option<String>>>,
}

impl ControllerHandle {
    pub fn state(&self) -> ControllerState {
        *self.state.read().expect("state lock poisoned")
    }

    /// Single-writer (the Pool), single-reader (the owning Controller task)
    /// signal requesting graceful shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn wallet_client(&self) -> Option<Arc<dyn WalletRpcClient>> {
        self.wallet_client.get().cloned()
    }

    pub fn running_duration(&self) -> Option<Duration> {
        *self.running_duration.read().expect("running_duration lock poisoned")
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.failure_reason.read().expect("failure_reason lock poisoned").clone()
    }

    fn set_state(&self, state: ControllerState) {
        let mut guard = self.state.write().expect("state lock poisoned");
        debug_assert!(
            is_legal_transition(*guard, state),
            "illegal transition {:?} -> {:?}",
            *guard,
            state
        );
        tracing::debug!(address = %self.address, from = ?*guard, to = ?state, "controller state transition");
        *guard = state;
    }

    fn publish_wallet_client(&self, client: Arc<dyn WalletRpcClient>) {
        let _ = self.wallet_client.set(client);
    }

    fn finish(&self, duration: Duration) {
        *self.running_duration.write().expect("running_duration lock poisoned") = Some(duration);
    }

    fn set_failure(&self, reason: String) {
        tracing::warn!(address = %self.address, %reason, "controller failed");
        *self.failure_reason.write().expect("failure_reason lock poisoned") = Some(reason);
    }
}

/// Everything about one wallet the Controller needs to drive it through its
/// lifecycle.
pub struct ControllerParams {
    pub address: Address,
    pub initialised: bool,
    pub rpc_port: u16,
    pub keys: WalletKeys,
}

/// The external collaborators and tuning knobs a Controller is built with.
/// The launcher/daemon client/wallet-client factory are trait objects so
/// tests can substitute fakes.
pub struct ControllerDeps {
    pub launcher: Arc<dyn Launcher>,
    pub factory: Arc<WalletFactory>,
    pub daemon: Arc<dyn DaemonRpcClient>,
    pub wallet_client_for_port: Arc<dyn Fn(u16) -> Arc<dyn WalletRpcClient> + Send + Sync>,
    pub init_retries: u32,
    pub init_sleep: Duration,
    pub height_tolerance: u64,
    pub sync_poll_interval: Duration,
    pub synced_poll_interval: Duration,
    pub close_window: Duration,
}

impl ControllerDeps {
    /// Reasonable defaults (10s sync poll, 1s synced
    /// cadence, 1 block tolerance, 10s close window).
    pub fn with_defaults(
        launcher: Arc<dyn Launcher>,
        factory: Arc<WalletFactory>,
        daemon: Arc<dyn DaemonRpcClient>,
        wallet_client_for_port: Arc<dyn Fn(u16) -> Arc<dyn WalletRpcClient> + Send + Sync>,
    ) -> Self {
        Self {
            launcher,
            factory,
            daemon,
            wallet_client_for_port,
            init_retries: 30,
            init_sleep: Duration::from_secs(1),
            height_tolerance: 1,
            sync_poll_interval: Duration::from_secs(10),
            synced_poll_interval: Duration::from_secs(1),
            close_window: crate::childproc::POLITE_WINDOW,
        }
    }
}

/// Spawns a Controller task and returns a handle to observe/control it plus
/// its `JoinHandle` for reaping.
pub fn spawn(
    params: ControllerParams,
    deps: ControllerDeps,
) -> (ControllerHandle, tokio::task::JoinHandle<()>) {
    let handle = ControllerHandle {
        address: params.address.clone(),
        rpc_port: params.rpc_port,
        state: Arc::new(RwLock::new(ControllerState::Starting)),
        shutdown_requested: Arc::new(AtomicBool::new(false)),
        wallet_client: Arc::new(tokio::sync::OnceCell::new()),
        start_time: Instant::now(),
        running_duration: Arc::new(RwLock::new(None)),
        failure_reason: Arc::new(RwLock::new(None)),
    };

    let task_handle = handle.clone();
    let join = tokio::spawn(async move { run(task_handle, params, deps).await });

    (handle, join)
}

async fn run(handle: ControllerHandle, params: ControllerParams, deps: ControllerDeps) {
    let mut child: Option<Box<dyn ChildProcess>> = None;

    let outcome = drive(&handle, &params, &deps, &mut child).await;

    if let Some(child) = child.as_mut() {
        child.terminate();
        child.wait_with_timeout(deps.close_window).await;
    }

    handle.finish(handle.start_time.elapsed());
    match outcome {
        Ok(()) => handle.set_state(ControllerState::Closed),
        Err(reason) => {
            handle.set_failure(reason);
            handle.set_state(ControllerState::Failed);
        }
    }
}

async fn drive(
    handle: &ControllerHandle,
    params: &ControllerParams,
    deps: &ControllerDeps,
    child: &mut Option<Box<dyn ChildProcess>>,
) -> Result<(), String> {
    // STARTING -> (CREATING)?
    if !params.initialised {
        if params.keys.is_empty() {
            return Err(format!(
                "wallet {} is uninitialised and no keys were provided",
                params.address
            ));
        }
        handle.set_state(ControllerState::Creating);
        deps.factory
            .create(
                &params.address,
                params.keys.view_key.as_deref(),
                params.keys.spend_key.as_deref(),
                false,
            )
            .await
            .map_err(|e| format!("wallet creation failed: {e}"))?;
        // The wallet file now exists on disk, so the work that follows
        // (open child, wait for RPC, verify address) runs while the
        // externally visible state stays CREATING rather than bouncing
        // back to STARTING — observed state only ever moves forward.
    }

    // open child, wait for RPC, verify address
    let opened = deps
        .launcher
        .open(&params.address, params.rpc_port)
        .map_err(|e| format!("failed to launch wallet-rpc: {e}"))?;
    *child = Some(opened);

    let wallet_client = (deps.wallet_client_for_port)(params.rpc_port);

    let mut ready = false;
    for attempt in 0..deps.init_retries {
        if handle.is_shutdown_requested() {
            return Err("shutdown requested during startup".to_string());
        }
        if let Some(c) = child.as_mut() {
            if !c.is_alive() {
                let code = c.exit_code();
                let (stdout, stderr) = c.take_diagnostics().await;
                return Err(PoolError::ChildExit {
                    exit_code: code,
                    stdout,
                    stderr,
                }
                .to_string());
            }
        }

        match wallet_client.address().await {
            Ok(reported) => {
                if reported.to_string() != params.address.to_string() {
                    return Err(format!(
                        "address mismatch: rpc reported {reported}, expected {}",
                        params.address
                    ));
                }
                ready = true;
                break;
            }
            Err(e) => {
                tracing::warn!(address = %params.address, attempt, error = %e, "wallet-rpc not ready yet");
                tokio::time::sleep(deps.init_sleep).await;
            }
        }
    }
    if !ready {
        return Err(format!(
            "wallet-rpc did not become ready within {} attempts",
            deps.init_retries
        ));
    }

    handle.publish_wallet_client(wallet_client.clone());
    handle.set_state(ControllerState::Syncing);

    // SYNCING -> SYNCED
    loop {
        if handle.is_shutdown_requested() {
            handle.set_state(ControllerState::Closing);
            return Ok(());
        }

        let daemon_height = deps
            .daemon
            .height()
            .await
            .map_err(|e| format!("failed to query daemon height: {e}"))?;
        let wallet_height = wallet_client
            .height()
            .await
            .map_err(|e| format!("failed to query wallet height: {e}"))?;

        if daemon_height <= wallet_height.saturating_add(deps.height_tolerance) {
            break;
        }
        tokio::time::sleep(deps.sync_poll_interval).await;
    }
    handle.set_state(ControllerState::Synced);

    // SYNCED hold: observe shutdownRequested at a short cadence.
    loop {
        if handle.is_shutdown_requested() {
            break;
        }
        tokio::time::sleep(deps.synced_poll_interval).await;
    }
    handle.set_state(ControllerState::Closing);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_order_is_monotonic() {
        use ControllerState::*;
        let order = [Starting, Creating, Syncing, Synced, Closing, Closed];
        for window in order.windows(2) {
            assert!(is_legal_transition(window[0], window[1]));
            assert!(!is_legal_transition(window[1], window[0]));
        }
    }

    #[test]
    fn failed_is_reachable_from_any_state() {
        use ControllerState::*;
        for state in [Starting, Creating, Syncing, Synced, Closing] {
            assert!(is_legal_transition(state, Failed));
        }
    }
}

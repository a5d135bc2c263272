//! WalletLauncher: spawns the `monero-wallet-rpc` binary bound to an
//! allocated port, with RPC login disabled.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::address::{Address, Network};
use crate::childproc;
use crate::error::{PoolError, Result};

/// Capability surface a Controller needs from a launched wallet-RPC child.
/// A trait so tests can substitute a fake process instead of spawning a
/// real `monero-wallet-rpc` binary.
#[async_trait]
pub trait ChildProcess: Send {
    fn port(&self) -> u16;
    fn is_alive(&mut self) -> bool;
    fn terminate(&self);
    async fn kill(&mut self);
    async fn wait_with_timeout(&mut self, window: Duration) -> Option<std::process::ExitStatus>;
    async fn take_diagnostics(&mut self) -> (String, String);
    fn exit_code(&mut self) -> Option<i32>;
}

/// Capability surface for opening a wallet-RPC child, abstracted the same
/// way so Controllers under test don't need a real binary on `PATH`.
pub trait Launcher: Send + Sync {
    fn open(&self, address: &Address, port: u16) -> Result<Box<dyn ChildProcess>>;
}

#[derive(Debug, Clone)]
pub struct WalletLauncher {
    pub cmd_rpc: PathBuf,
    pub directory: PathBuf,
    pub daemon_host: String,
    pub daemon_port: u16,
    pub net: Network,
}

impl WalletLauncher {
    pub fn new(
        cmd_rpc: impl Into<PathBuf>,
        directory: impl Into<PathBuf>,
        daemon_host: impl Into<String>,
        daemon_port: u16,
        net: Network,
    ) -> Self {
        Self {
            cmd_rpc: cmd_rpc.into(),
            directory: directory.into(),
            daemon_host: daemon_host.into(),
            daemon_port,
            net,
        }
    }

    /// Spawns the wallet-RPC binary for `address` on `port`. Does not wait
    /// for RPC readiness — that is the Controller's concern.
    pub fn open(&self, address: &Address, port: u16) -> Result<ChildHandle> {
        let wallet_path = self.directory.join(address.to_string());

        let mut args = vec![
            "--wallet-file".to_string(),
            wallet_path.display().to_string(),
            "--rpc-bind-port".to_string(),
            port.to_string(),
            "--disable-rpc-login".to_string(),
            "--password".to_string(),
            "".to_string(),
            "--daemon-address".to_string(),
            format!("{}:{}", self.daemon_host, self.daemon_port),
            "--trusted-daemon".to_string(),
            "--log-file".to_string(),
            "/dev/null".to_string(),
        ];
        match self.net {
            Network::Stagenet => args.push("--stagenet".to_string()),
            Network::Testnet => args.push("--testnet".to_string()),
            Network::Mainnet => {}
        }

        tracing::debug!(cmd = %self.cmd_rpc.display(), ?args, port, "spawning wallet-rpc");

        let child = Command::new(&self.cmd_rpc)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PoolError::Io {
                path: self.cmd_rpc.clone(),
                source,
            })?;

        Ok(ChildHandle { child, port })
    }
}

impl Launcher for WalletLauncher {
    fn open(&self, address: &Address, port: u16) -> Result<Box<dyn ChildProcess>> {
        WalletLauncher::open(self, address, port).map(|h| Box::new(h) as Box<dyn ChildProcess>)
    }
}

/// A handle to a spawned wallet-RPC child process.
pub struct ChildHandle {
    child: Child,
    port: u16,
}

impl ChildHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `true` if the child has not yet exited.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Polite termination request (SIGTERM on unix).
    pub fn terminate(&self) {
        childproc::terminate(&self.child);
    }

    /// Forceful termination (SIGKILL).
    pub async fn kill(&mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }

    /// Waits up to `window` for the child to exit after `terminate`,
    /// escalating to `kill` if it's still alive. Returns the exit status and
    /// captured stdout/stderr, draining the pipes so they don't fill up.
    pub async fn wait_with_timeout(
        &mut self,
        window: std::time::Duration,
    ) -> Option<std::process::ExitStatus> {
        childproc::wait_then_kill(&mut self.child, window).await
    }

    pub async fn take_diagnostics(&mut self) -> (String, String) {
        use tokio::io::AsyncReadExt;
        let mut out = String::new();
        let mut err = String::new();
        if let Some(mut stdout) = self.child.stdout.take() {
            let _ = stdout.read_to_string(&mut out).await;
        }
        if let Some(mut stderr) = self.child.stderr.take() {
            let _ = stderr.read_to_string(&mut err).await;
        }
        (out, err)
    }

    pub fn exit_code(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => status.code(),
            _ => None,
        }
    }
}

#[async_trait]
impl ChildProcess for ChildHandle {
    fn port(&self) -> u16 {
        ChildHandle::port(self)
    }

    fn is_alive(&mut self) -> bool {
        ChildHandle::is_alive(self)
    }

    fn terminate(&self) {
        ChildHandle::terminate(self)
    }

    async fn kill(&mut self) {
        ChildHandle::kill(self).await
    }

    async fn wait_with_timeout(&mut self, window: Duration) -> Option<std::process::ExitStatus> {
        ChildHandle::wait_with_timeout(self, window).await
    }

    async fn take_diagnostics(&mut self) -> (String, String) {
        ChildHandle::take_diagnostics(self).await
    }

    fn exit_code(&mut self) -> Option<i32> {
        ChildHandle::exit_code(self)
    }
}

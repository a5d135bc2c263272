//! Controller lifecycle tests against fake launcher/RPC clients, so no real
//! `monero-wallet-cli`/`monero-wallet-rpc` binary is needed to exercise the
//! state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use monero_wallet_pool::address::{parse_unchecked, Address};
use monero_wallet_pool::controller::{
    self, ControllerDeps, ControllerParams, ControllerState, WalletKeys,
};
use monero_wallet_pool::error::Result as PoolResult;
use monero_wallet_pool::launcher::{ChildProcess, Launcher};
use monero_wallet_pool::rpc::{DaemonRpcClient, Transfer, WalletRpcClient};
use monero_wallet_pool::WalletFactory;

const MAINNET_ADDR: &str =
    "44Ato7HveWidJYUAVw5QffEcEtSH1DwzSP3FPPkHxNAS4LX9CqgucphTisH978FLHE34YNEx7FcbBfQLQUU8m3NUC4VqsRa";
const OTHER_MAINNET_ADDR: &str =
    "49LEH26DJGuCyr8xzRAzWPUryzp7bpccC7Hie1DiwyfJEyUKvMFAethRLybDYrFdU1eHaMkKQpUPebY4WT3cSjEvThmpjPa";

struct FakeChild;

#[async_trait]
impl ChildProcess for FakeChild {
    fn port(&self) -> u16 {
        0
    }
    fn is_alive(&mut self) -> bool {
        true
    }
    fn terminate(&self) {}
    async fn kill(&mut self) {}
    async fn wait_with_timeout(&mut self, _window: Duration) -> Option<std::process::ExitStatus> {
        None
    }
    async fn take_diagnostics(&mut self) -> (String, String) {
        (String::new(), String::new())
    }
    fn exit_code(&mut self) -> Option<i32> {
        None
    }
}

struct FakeLauncher;

impl Launcher for FakeLauncher {
    fn open(&self, _address: &Address, _port: u16) -> PoolResult<Box<dyn ChildProcess>> {
        Ok(Box::new(FakeChild))
    }
}

struct FakeWalletRpc {
    reported_address: Address,
    height: u64,
}

#[async_trait]
impl WalletRpcClient for FakeWalletRpc {
    async fn height(&self) -> anyhow::Result<u64> {
        Ok(self.height)
    }
    async fn address(&self) -> anyhow::Result<Address> {
        Ok(self.reported_address.clone())
    }
    async fn incoming(&self) -> anyhow::Result<Vec<Transfer>> {
        Ok(Vec::new())
    }
    async fn outgoing(&self) -> anyhow::Result<Vec<Transfer>> {
        Ok(Vec::new())
    }
}

struct FakeDaemon {
    height: u64,
}

#[async_trait]
impl DaemonRpcClient for FakeDaemon {
    async fn height(&self) -> anyhow::Result<u64> {
        Ok(self.height)
    }
}

fn fast_deps(
    reported_address: Address,
    wallet_height: u64,
    daemon_height: u64,
) -> ControllerDeps {
    let wallet_client: Arc<dyn WalletRpcClient> = Arc::new(FakeWalletRpc {
        reported_address,
        height: wallet_height,
    });
    let mut deps = ControllerDeps::with_defaults(
        Arc::new(FakeLauncher),
        Arc::new(WalletFactory::new(
            ".",
            "monero-wallet-cli",
            "127.0.0.1",
            18081,
            monero_wallet_pool::Network::Mainnet,
        )),
        Arc::new(FakeDaemon { height: daemon_height }),
        Arc::new(move |_port| wallet_client.clone()),
    );
    deps.init_sleep = Duration::from_millis(5);
    deps.sync_poll_interval = Duration::from_millis(5);
    deps.synced_poll_interval = Duration::from_millis(5);
    deps.close_window = Duration::from_millis(50);
    deps
}

#[tokio::test]
async fn initialised_wallet_syncs_then_closes_on_shutdown_request() {
    let address = parse_unchecked(MAINNET_ADDR).unwrap();
    let deps = fast_deps(address.clone(), 100, 100);
    let params = ControllerParams {
        address: address.clone(),
        initialised: true,
        rpc_port: 18090,
        keys: WalletKeys::default(),
    };

    let (handle, join) = controller::spawn(params, deps);

    for _ in 0..200 {
        if handle.state() == ControllerState::Synced {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(handle.state(), ControllerState::Synced);
    assert!(handle.wallet_client().is_some());

    handle.request_shutdown();
    join.await.unwrap();

    assert_eq!(handle.state(), ControllerState::Closed);
    assert!(handle.running_duration().is_some());
}

#[tokio::test]
async fn address_mismatch_is_fatal() {
    let address = parse_unchecked(MAINNET_ADDR).unwrap();
    let wrong = parse_unchecked(OTHER_MAINNET_ADDR).unwrap();
    let deps = fast_deps(wrong, 100, 100);
    let params = ControllerParams {
        address,
        initialised: true,
        rpc_port: 18091,
        keys: WalletKeys::default(),
    };

    let (handle, join) = controller::spawn(params, deps);
    join.await.unwrap();

    assert_eq!(handle.state(), ControllerState::Failed);
    assert!(handle
        .failure_reason()
        .unwrap_or_default()
        .contains("address mismatch"));
}

#[tokio::test]
async fn uninitialised_wallet_without_keys_fails_fast() {
    let address = parse_unchecked(MAINNET_ADDR).unwrap();
    let deps = fast_deps(address.clone(), 100, 100);
    let params = ControllerParams {
        address,
        initialised: false,
        rpc_port: 18092,
        keys: WalletKeys::default(),
    };

    let (handle, join) = controller::spawn(params, deps);
    join.await.unwrap();

    assert_eq!(handle.state(), ControllerState::Failed);
    assert!(handle
        .failure_reason()
        .unwrap_or_default()
        .contains("uninitialised"));
}

#[tokio::test]
async fn sync_waits_for_daemon_height_within_tolerance() {
    let address = parse_unchecked(MAINNET_ADDR).unwrap();
    let reached = Arc::new(AtomicBool::new(false));
    let reached_writer = reached.clone();

    let wallet_client: Arc<dyn WalletRpcClient> = Arc::new(FakeWalletRpc {
        reported_address: address.clone(),
        height: 90,
    });
    let mut deps = ControllerDeps::with_defaults(
        Arc::new(FakeLauncher),
        Arc::new(WalletFactory::new(
            ".",
            "monero-wallet-cli",
            "127.0.0.1",
            18081,
            monero_wallet_pool::Network::Mainnet,
        )),
        Arc::new(FakeDaemon { height: 100 }),
        Arc::new(move |_port| wallet_client.clone()),
    );
    deps.init_sleep = Duration::from_millis(5);
    deps.sync_poll_interval = Duration::from_millis(5);
    deps.synced_poll_interval = Duration::from_millis(5);
    deps.height_tolerance = 0;

    let params = ControllerParams {
        address,
        initialised: true,
        rpc_port: 18093,
        keys: WalletKeys::default(),
    };
    let (handle, _join) = controller::spawn(params, deps);

    for _ in 0..10 {
        if handle.state() == ControllerState::Synced {
            reached_writer.store(true, Ordering::SeqCst);
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // Wallet height (90) never catches up to daemon height (100) with zero
    // tolerance in this fake, so the controller should still be SYNCING.
    assert!(!reached.load(Ordering::SeqCst));
    assert_eq!(handle.state(), ControllerState::Syncing);
    handle.request_shutdown();
}

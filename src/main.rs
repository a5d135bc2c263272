//! CLI entry point: wires a [`Pool`] over a wallet directory with a simple
//! cyclic address feed, and runs it until interrupted. Cycles the
//! directory's addresses, asking each synced wallet to report its incoming
//! transfers before closing. Also exposes the wallet-creation CLI's
//! `generate` flow (spec.md §4.2, a supplemental feature carried over from
//! `original_source`'s `generate_wallet`) as a standalone subcommand.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use monero_wallet_pool::{
    config::parse_network, controller::ControllerHandle, factory::WalletFactory, hooks::PoolHooks,
    launcher::WalletLauncher, pool::PoolDeps, registry, rpc::JsonRpcDaemonClient,
    rpc::JsonRpcWalletClient, Address, Config, Network, Pool,
};

#[derive(Parser, Debug)]
#[command(about = "Bounded-concurrency supervisor for a directory of Monero wallet-RPC processes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Supervise a directory of wallets, launching and syncing each in turn.
    Run(RunArgs),
    /// Generate a brand-new wallet file via the wallet-creation CLI and exit.
    GenerateWallet(GenerateArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Directory containing wallet body/`.keys` file pairs.
    directory: PathBuf,

    #[arg(long, default_value = "127.0.0.1")]
    daemon_host: String,

    #[arg(long, default_value_t = 18081)]
    daemon_port: u16,

    #[arg(long, default_value = "mainnet")]
    network: String,

    #[arg(long, default_value_t = 4)]
    max_concurrent: usize,

    #[arg(long, default_value_t = 18090)]
    rpc_port_lo: u16,

    #[arg(long, default_value_t = 18190)]
    rpc_port_hi: u16,

    #[arg(long, default_value = "monero-wallet-cli")]
    wallet_cli: PathBuf,

    #[arg(long, default_value = "monero-wallet-rpc")]
    wallet_rpc: PathBuf,

    #[arg(long, default_value_t = 5)]
    main_loop_sleep_secs: u64,

    #[arg(long)]
    verbose: bool,
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Directory the new wallet pair is materialised into.
    directory: PathBuf,

    #[arg(long, default_value = "127.0.0.1")]
    daemon_host: String,

    #[arg(long, default_value_t = 18081)]
    daemon_port: u16,

    #[arg(long, default_value = "mainnet")]
    network: String,

    #[arg(long, default_value = "monero-wallet-cli")]
    wallet_cli: PathBuf,

    #[arg(long)]
    verbose: bool,
}

impl From<RunArgs> for Config {
    fn from(args: RunArgs) -> Self {
        Config {
            directory: args.directory,
            network: args.network,
            daemon_host: args.daemon_host,
            daemon_port: args.daemon_port,
            max_concurrent: args.max_concurrent,
            rpc_port_lo: args.rpc_port_lo,
            rpc_port_hi: args.rpc_port_hi,
            cmd_cli: args.wallet_cli,
            cmd_rpc: args.wallet_rpc,
            main_loop_sleep_secs: args.main_loop_sleep_secs,
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

/// Cycles through a directory's addresses, requesting each wallet close
/// itself once synced.
struct DirPool {
    addresses: Vec<Address>,
    next: Mutex<usize>,
}

impl DirPool {
    fn new(addresses: Vec<Address>) -> Self {
        Self {
            addresses,
            next: Mutex::new(0),
        }
    }
}

#[async_trait]
impl PoolHooks for DirPool {
    async fn next_address(&self) -> Option<Address> {
        if self.addresses.is_empty() {
            return None;
        }
        let mut idx = self.next.lock().expect("lock poisoned");
        let address = self.addresses[*idx % self.addresses.len()].clone();
        *idx += 1;
        Some(address)
    }

    async fn on_synced(&self, ctrl: &ControllerHandle) {
        if let Some(client) = ctrl.wallet_client() {
            match client.incoming().await {
                Ok(transfers) => {
                    tracing::info!(address = %ctrl.address, count = transfers.len(), "incoming transfers");
                }
                Err(e) => tracing::warn!(address = %ctrl.address, error = %e, "failed to list incoming transfers"),
            }
        }
        ctrl.request_shutdown();
    }

    async fn on_closed(&self, ctrl: &ControllerHandle) {
        tracing::info!(address = %ctrl.address, duration = ?ctrl.running_duration(), "wallet closed");
    }

    async fn on_failed(&self, ctrl: &ControllerHandle) {
        tracing::error!(address = %ctrl.address, reason = ?ctrl.failure_reason(), "wallet failed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::GenerateWallet(args) => generate_wallet(args).await,
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    init_tracing(args.verbose);
    let config = Config::from(args);

    let network: Network = config.network()?;

    let records = registry::list_wallets(&config.directory, network)?;
    let addresses: Vec<Address> = records.into_iter().map(|r| r.address).collect();
    tracing::info!(count = addresses.len(), directory = %config.directory.display(), "discovered wallets");

    let launcher = Arc::new(WalletLauncher::new(
        &config.cmd_rpc,
        &config.directory,
        &config.daemon_host,
        config.daemon_port,
        network,
    ));
    let factory = Arc::new(WalletFactory::new(
        &config.directory,
        &config.cmd_cli,
        &config.daemon_host,
        config.daemon_port,
        network,
    ));
    let daemon = Arc::new(JsonRpcDaemonClient::new(&config.daemon_host, config.daemon_port));
    let wallet_client_for_port: Arc<dyn Fn(u16) -> Arc<dyn monero_wallet_pool::rpc::WalletRpcClient> + Send + Sync> =
        Arc::new(|port| Arc::new(JsonRpcWalletClient::new(port)) as Arc<dyn monero_wallet_pool::rpc::WalletRpcClient>);

    let hooks = Arc::new(DirPool::new(addresses));
    let deps = PoolDeps {
        launcher,
        factory,
        daemon,
        wallet_client_for_port,
    };

    let mut pool = Pool::new(
        &config.directory,
        network,
        config.max_concurrent,
        config.rpc_port_range(),
        config.main_loop_sleep(),
        deps,
        hooks,
    )?;

    tokio::select! {
        _ = pool.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested, draining live wallets");
            pool.request_shutdown();
            pool.run().await;
        }
    }

    Ok(())
}

async fn generate_wallet(args: GenerateArgs) -> anyhow::Result<()> {
    init_tracing(args.verbose);
    let network = parse_network(&args.network)?;
    monero_wallet_pool::config::validate_directory(&args.directory)?;

    let factory = WalletFactory::new(
        &args.directory,
        &args.wallet_cli,
        &args.daemon_host,
        args.daemon_port,
        network,
    );
    let address = factory.generate().await?;
    tracing::info!(%address, directory = %args.directory.display(), "generated new wallet");
    println!("{address}");
    Ok(())
}

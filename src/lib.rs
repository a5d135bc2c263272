//! A bounded-concurrency supervisor for a directory of Monero wallet-RPC
//! processes: enumerate a directory of wallet files, and for each one drive
//! a child `monero-wallet-rpc` through creation (if needed), startup, sync,
//! a steady "synced" hold, and graceful teardown, subject to a concurrency
//! cap and a pluggable address feed.

pub mod address;
pub mod childproc;
pub mod config;
pub mod controller;
pub mod error;
pub mod factory;
pub mod hooks;
pub mod launcher;
pub mod pool;
pub mod port;
pub mod registry;
pub mod rpc;

pub use address::{Address, Network, WalletRecord};
pub use config::Config;
pub use controller::{ControllerDeps, ControllerHandle, ControllerParams, ControllerState, WalletKeys};
pub use error::{PoolError, Result};
pub use factory::WalletFactory;
pub use hooks::PoolHooks;
pub use launcher::WalletLauncher;
pub use pool::{Pool, PoolDeps};
pub use port::PortAllocator;

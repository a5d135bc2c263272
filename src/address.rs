//! Address value type and wallet-directory record.
//!
//! Address parsing and network classification are treated as an external
//! collaborator: we depend on `monero-address` for the canonical string
//! form and network tag rather than reimplementing a parser.

pub use monero_address::{MoneroAddress as Address, Network};

/// Parse `s` as an `Address`, inferring its network from the address's own
/// prefix rather than requiring the caller to already know it. Thin wrapper
/// over `monero_address::MoneroAddress::from_str_with_unchecked_network`.
pub fn parse_unchecked(s: &str) -> anyhow::Result<Address> {
    Address::from_str_with_unchecked_network(s)
        .map_err(|e| anyhow::anyhow!("invalid monero address: {e:?}"))
}

/// Returns the canonical string form used for equality and as the
/// `.keys`/body filenames on disk.
pub fn canonical(address: &Address) -> String {
    address.to_string()
}

/// Output of [`crate::registry::list_wallets`]: an address paired with
/// whether both its body and key files are present on disk.
#[derive(Debug, Clone)]
pub struct WalletRecord {
    pub address: Address,
    pub initialised: bool,
}

//! AddressRegistry: enumerates a wallet directory and classifies entries as
//! initialised (body + key file) or key-only, filtered by network.

use std::path::Path;

use crate::address::{parse_unchecked, Network, WalletRecord};

/// Enumerate `directory` for `.keys` files, parse each stem as an `Address`,
/// discard parse failures and network mismatches, and return uninitialised
/// records before initialised ones so a caller scheduling in order sees
/// them first. Pure and read-only: never mutates the directory, and two
/// calls against an unchanged directory yield the same multiset of records.
pub fn list_wallets(directory: &Path, network: Network) -> std::io::Result<Vec<WalletRecord>> {
    let mut uninitialised = Vec::new();
    let mut initialised = Vec::new();

    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(stem) = name.strip_suffix(".keys") else {
            continue;
        };

        let address = match parse_unchecked(stem) {
            Ok(address) => address,
            Err(_) => continue,
        };
        if address.network() != network {
            continue;
        }

        let body_path = directory.join(stem);
        if body_path.exists() {
            initialised.push(WalletRecord {
                address,
                initialised: true,
            });
        } else {
            uninitialised.push(WalletRecord {
                address,
                initialised: false,
            });
        }
    }

    uninitialised.extend(initialised);
    Ok(uninitialised)
}

/// Whether `address`'s body file is present in `directory`, independent of
/// a full listing. Used by the Pool to classify a freshly-fed address
/// without re-scanning the whole directory on every admission.
pub fn is_initialised(directory: &Path, address: &crate::address::Address) -> bool {
    directory.join(address.to_string()).exists()
}

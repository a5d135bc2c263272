//! WalletFactory: spawns `monero-wallet-cli` to materialise a wallet file
//! from (address, view-key, optional spend-key), screen-scraping its
//! stdin/stdout protocol. Also supports generating a brand-new wallet from
//! scratch when no address is supplied up front.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::address::{parse_unchecked, Address, Network};
use crate::childproc;
use crate::error::{PoolError, Result};

/// Small, versioned table of stdout tokens the wrapped CLI is known to emit.
/// Treated as a brittle contract with the external binary: callers can swap
/// this out behind a different strategy if the binary's output changes
/// across versions.
#[derive(Debug, Clone)]
pub struct TokenTable {
    pub language_prompt: &'static str,
    pub generated: &'static str,
    pub logging_started: &'static str,
    pub refresh_done: &'static str,
    pub error_prefix: &'static str,
}

impl Default for TokenTable {
    fn default() -> Self {
        Self {
            language_prompt: "English",
            generated: "Generated",
            logging_started: "Logging",
            refresh_done: "Refresh done",
            error_prefix: "Error:",
        }
    }
}

/// Bounds how many stdout lines we will read while waiting for a single
/// token before giving up.
const MAX_SCAN_LINES: usize = 2000;

#[derive(Debug, Clone)]
pub struct WalletFactory {
    pub directory: PathBuf,
    pub cmd_cli: PathBuf,
    pub daemon_host: String,
    pub daemon_port: u16,
    pub net: Network,
    pub tokens: TokenTable,
}

impl WalletFactory {
    pub fn new(
        directory: impl Into<PathBuf>,
        cmd_cli: impl Into<PathBuf>,
        daemon_host: impl Into<String>,
        daemon_port: u16,
        net: Network,
    ) -> Self {
        Self {
            directory: directory.into(),
            cmd_cli: cmd_cli.into(),
            daemon_host: daemon_host.into(),
            daemon_port,
            net,
            tokens: TokenTable::default(),
        }
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "--password".to_string(),
            "".to_string(),
            "--daemon-address".to_string(),
            format!("{}:{}", self.daemon_host, self.daemon_port),
            "--log-file".to_string(),
            "/dev/null".to_string(),
        ];
        match self.net {
            Network::Stagenet => args.push("--stagenet".to_string()),
            Network::Testnet => args.push("--testnet".to_string()),
            Network::Mainnet => {}
        }
        args
    }

    /// Materialise a wallet file for `address` from its key material. At
    /// least one of `view_key`/`spend_key` must be supplied; presence of
    /// `spend_key` produces a full (non-view-only) wallet. Blocks (from the
    /// caller's async perspective — the returned future does not resolve)
    /// until the files exist, and, if `wait_for_sync` is set, until the CLI
    /// signals refresh completion.
    pub async fn create(
        &self,
        address: &Address,
        view_key: Option<&str>,
        spend_key: Option<&str>,
        wait_for_sync: bool,
    ) -> Result<Address> {
        if view_key.is_none() && spend_key.is_none() {
            return Err(PoolError::Configuration(
                "at least one of view_key or spend_key must be supplied".into(),
            ));
        }

        // Scratch dir lives inside the target directory, not the OS temp dir,
        // so the final move is a same-filesystem rename and genuinely atomic.
        let tmp_dir = tempfile::tempdir_in(&self.directory).map_err(|source| PoolError::Io {
            path: self.directory.clone(),
            source,
        })?;
        let wallet_file = tmp_dir.path().join("wallet");

        let mode_flag = if spend_key.is_some() {
            "--generate-from-spend-key"
        } else {
            "--generate-from-view-key"
        };

        let mut args = vec![mode_flag.to_string(), wallet_file.display().to_string()];
        args.extend(self.common_args());

        tracing::debug!(cmd = %self.cmd_cli.display(), ?args, "spawning wallet-creation CLI");

        let mut child = Command::new(&self.cmd_cli)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PoolError::Io {
                path: self.cmd_cli.clone(),
                source,
            })?;

        let mut stdout = BufReader::new(child.stdout.take().expect("stdout piped")).lines();
        let mut stdin = child.stdin.take().expect("stdin piped");
        let mut transcript = String::new();

        scan_for_token(&mut stdout, &self.tokens.logging_started, &mut transcript).await?;

        let address_str = address.to_string();
        stdin
            .write_all(format!("{address_str}\n").as_bytes())
            .await
            .ok();
        if let Some(key) = spend_key {
            stdin.write_all(format!("{key}\n").as_bytes()).await.ok();
        }
        if let Some(key) = view_key {
            stdin.write_all(format!("{key}\n").as_bytes()).await.ok();
        }
        stdin.write_all(b"\n\n").await.ok();
        stdin.write_all(b"0\n").await.ok();

        if wait_for_sync {
            let _ = scan_for_token(&mut stdout, &self.tokens.refresh_done, &mut transcript).await;
        }
        drain_remaining(&mut stdout, &mut transcript).await;
        drop(stdin);

        childproc::wait_then_kill(&mut child, childproc::POLITE_WINDOW).await;

        if !wallet_file.exists() {
            return Err(self.extract_creation_error(&transcript));
        }

        let key_file = format!("{}.keys", wallet_file.display());
        let dest_body = self.directory.join(&address_str);
        let dest_keys = self.directory.join(format!("{address_str}.keys"));
        move_file(&wallet_file, &dest_body)?;
        move_file(Path::new(&key_file), &dest_keys)?;

        tracing::debug!(address = %address_str, "wallet created");
        Ok(address.clone())
    }

    /// Generates a brand-new wallet with no pre-existing key material,
    /// mirroring `monerowalletpool`'s `generate_wallet` flow: a bootstrap
    /// operation for standing up a fresh wallet before it ever needs this
    /// pool's supervision.
    pub async fn generate(&self) -> Result<Address> {
        let tmp_dir = tempfile::tempdir_in(&self.directory).map_err(|source| PoolError::Io {
            path: self.directory.clone(),
            source,
        })?;
        let wallet_file = tmp_dir.path().join("wallet");

        let mut args = vec![
            "--use-english-language-names".to_string(),
            "--generate-new-wallet".to_string(),
            wallet_file.display().to_string(),
        ];
        args.extend(self.common_args());

        let mut child = Command::new(&self.cmd_cli)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PoolError::Io {
                path: self.cmd_cli.clone(),
                source,
            })?;

        let mut stdout = BufReader::new(child.stdout.take().expect("stdout piped")).lines();
        let mut stdin = child.stdin.take().expect("stdin piped");
        let mut transcript = String::new();

        scan_for_token(&mut stdout, &self.tokens.language_prompt, &mut transcript).await?;
        stdin.write_all(b"1\n").await.ok();

        let generated_line =
            scan_for_token(&mut stdout, &self.tokens.generated, &mut transcript).await?;
        drain_remaining(&mut stdout, &mut transcript).await;
        drop(stdin);

        childproc::wait_then_kill(&mut child, childproc::POLITE_WINDOW).await;

        let address_str = extract_generated_address(&generated_line).ok_or_else(|| {
            PoolError::Communication("could not find generated address in CLI output".into())
        })?;
        let address = parse_unchecked(&address_str)
            .map_err(|e| PoolError::Communication(format!("invalid generated address: {e}")))?;

        let key_file = format!("{}.keys", wallet_file.display());
        let dest_body = self.directory.join(&address_str);
        let dest_keys = self.directory.join(format!("{address_str}.keys"));
        move_file(&wallet_file, &dest_body)?;
        move_file(Path::new(&key_file), &dest_keys)?;

        Ok(address)
    }

    fn extract_creation_error(&self, transcript: &str) -> PoolError {
        let re = regex::Regex::new(r"(Error:.*)").expect("static regex");
        match re.captures(transcript) {
            Some(caps) => PoolError::WalletCreation(caps[1].trim().to_string()),
            None => PoolError::WalletCreation("Unknown error".to_string()),
        }
    }
}

async fn scan_for_token<R>(
    lines: &mut tokio::io::Lines<BufReader<R>>,
    token: &str,
    transcript: &mut String,
) -> Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    for _ in 0..MAX_SCAN_LINES {
        match lines.next_line().await {
            Ok(Some(line)) => {
                transcript.push_str(&line);
                transcript.push('\n');
                if line.contains(token) {
                    return Ok(line);
                }
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }
    Err(PoolError::Communication(format!(
        "wallet-creation CLI did not emit expected token '{token}' within {MAX_SCAN_LINES} lines"
    )))
}

async fn drain_remaining<R>(lines: &mut tokio::io::Lines<BufReader<R>>, transcript: &mut String)
where
    R: tokio::io::AsyncRead + Unpin,
{
    while let Ok(Some(line)) = lines.next_line().await {
        transcript.push_str(&line);
        transcript.push('\n');
    }
}

fn extract_generated_address(line: &str) -> Option<String> {
    let re = regex::Regex::new(r"Generated new wallet:\s+(\S+)").expect("static regex");
    re.captures(line).map(|c| c[1].to_string())
}

fn move_file(src: &Path, dest: &Path) -> Result<()> {
    std::fs::rename(src, dest).map_err(|source| PoolError::Io {
        path: src.to_path_buf(),
        source,
    })
}

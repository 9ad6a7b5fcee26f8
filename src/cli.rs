//! CLI surface (spec §6): `--wallet` declares the managed wallets, the
//! remaining flags are HUD-follower plumbing that a foreground renderer
//! would read but that the core daemon itself mostly just threads through.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use crate::types::WalletSpec;

/// `warchest-core` — autonomous trade-management daemon.
#[derive(Parser, Debug)]
#[command(name = "warchest-core")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Declare a managed wallet as `alias:pubkey[:color]`. Repeatable.
    #[arg(long = "wallet", value_parser = parse_wallet_spec)]
    pub wallets: Vec<WalletSpec>,

    /// Path to the daemon config JSON file.
    #[arg(long, env = "WARCHEST_CONFIG_PATH", default_value = "daemon.json")]
    pub config: PathBuf,

    /// Path to the directory holding strategy documents
    /// (`flash.json`/`hybrid.json`/`campaign.json`).
    #[arg(long, env = "WARCHEST_STRATEGY_DIR", default_value = "strategies")]
    pub strategy_dir: PathBuf,

    /// Enable foreground renderer mode. The core writes the same HUD events
    /// either way; this only changes whether the process also renders them.
    #[arg(long = "hud")]
    pub hud: bool,

    /// Follow the hub's HUD event log (default on). `--no-follow-hub`
    /// disables it.
    #[arg(long = "follow-hub", default_value_t = true)]
    pub follow_hub: bool,

    /// Disable `--follow-hub`. Applied in [`Cli::parse_args`] after parsing
    /// since clap derive has no direct "negatable flag" action.
    #[arg(long = "no-follow-hub", action = clap::ArgAction::SetTrue, hide = true)]
    no_follow_hub: bool,

    /// Path to the HUD event log file.
    #[arg(long, env = "WARCHEST_HUB_EVENTS_PATH", default_value = "tx-events.json")]
    pub hub_events: PathBuf,

    /// Path to the HUD status snapshot file.
    #[arg(long, env = "WARCHEST_HUD_STATE_PATH", default_value = "status.json")]
    pub hud_state: PathBuf,
}

/// Parse `alias:pubkey[:color]` into a [`WalletSpec`]. `wallet_id` is left
/// unset here; it is reconciled against the store's registry at startup.
fn parse_wallet_spec(raw: &str) -> Result<WalletSpec, String> {
    let parts: Vec<&str> = raw.splitn(3, ':').collect();
    let (alias, pubkey) = match parts.as_slice() {
        [alias, pubkey] => (*alias, *pubkey),
        [alias, pubkey, _color] => (*alias, *pubkey),
        _ => return Err(format!("invalid --wallet spec {raw:?}, expected alias:pubkey[:color]")),
    };
    if alias.is_empty() || pubkey.is_empty() {
        return Err(format!("invalid --wallet spec {raw:?}: alias and pubkey must be non-empty"));
    }
    let color = match parts.as_slice() {
        [_, _, color] => Some(color.to_string()),
        _ => None,
    };
    Ok(WalletSpec {
        alias: alias.to_string(),
        pubkey: pubkey.to_string(),
        wallet_id: None,
        color,
    })
}

impl Cli {
    /// Validate the fully parsed CLI: at least one wallet must be declared,
    /// and aliases must be unique.
    pub fn validate(&self) -> Result<()> {
        if self.wallets.is_empty() {
            return Err(anyhow!("at least one --wallet alias:pubkey must be declared"));
        }
        let mut seen = std::collections::HashSet::new();
        for wallet in &self.wallets {
            if !seen.insert(wallet.alias.clone()) {
                return Err(anyhow!("duplicate --wallet alias {:?}", wallet.alias));
            }
        }
        Ok(())
    }

    pub fn parse_args() -> Result<Self> {
        let mut cli = <Self as Parser>::try_parse().context("failed to parse CLI arguments")?;
        if cli.no_follow_hub {
            cli.follow_hub = false;
        }
        cli.validate()?;
        Ok(cli)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_alias_pubkey_pair() {
        let spec = parse_wallet_spec("main:Abc123").unwrap();
        assert_eq!(spec.alias, "main");
        assert_eq!(spec.pubkey, "Abc123");
        assert_eq!(spec.color, None);
    }

    #[test]
    fn parses_alias_pubkey_color_triple() {
        let spec = parse_wallet_spec("main:Abc123:cyan").unwrap();
        assert_eq!(spec.color.as_deref(), Some("cyan"));
    }

    #[test]
    fn rejects_missing_pubkey() {
        assert!(parse_wallet_spec("main").is_err());
    }

    #[test]
    fn rejects_empty_alias() {
        assert!(parse_wallet_spec(":Abc123").is_err());
    }

    #[test]
    fn validate_rejects_empty_wallet_list() {
        let cli = Cli {
            wallets: Vec::new(),
            config: PathBuf::from("daemon.json"),
            strategy_dir: PathBuf::from("strategies"),
            hud: false,
            follow_hub: true,
            no_follow_hub: false,
            hub_events: PathBuf::from("tx-events.json"),
            hud_state: PathBuf::from("status.json"),
        };
        assert!(cli.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_aliases() {
        let cli = Cli {
            wallets: vec![
                WalletSpec { alias: "main".to_string(), pubkey: "A".to_string(), wallet_id: None, color: None },
                WalletSpec { alias: "main".to_string(), pubkey: "B".to_string(), wallet_id: None, color: None },
            ],
            config: PathBuf::from("daemon.json"),
            strategy_dir: PathBuf::from("strategies"),
            hud: false,
            follow_hub: true,
            no_follow_hub: false,
            hub_events: PathBuf::from("tx-events.json"),
            hud_state: PathBuf::from("status.json"),
        };
        assert!(cli.validate().is_err());
    }
}

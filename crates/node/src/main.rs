//! Node binary: `sync` and `mana` entry points.
//!
//! ```text
//! node sync --chain {foundation|ropsten} --provider-url <url> [--debug]
//! node mana --chain <chain> --bootnodes a,b,c|from_chain [--no-discovery] [--no-sync] [--debug]
//! ```
//!
//! Exit code `0` on clean shutdown (Ctrl+C), `1` on an unrecoverable error.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use node::{Chain, GenesisBuilder};
use sync::{ChannelBlockSource, HttpBlockSource, SyncConfig, SyncLoop};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// How long to wait between polls once a source reports no new blocks.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

struct SyncArgs {
    chain: Chain,
    provider_url: String,
    debug: bool,
}

enum Bootnodes {
    FromChain,
    Explicit(Vec<String>),
}

struct ManaArgs {
    chain: Chain,
    bootnodes: Bootnodes,
    no_discovery: bool,
    no_sync: bool,
    debug: bool,
}

fn parse_sync_args(args: &[String]) -> Result<SyncArgs> {
    let mut chain = None;
    let mut provider_url = None;
    let mut debug = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--chain" => {
                let value = args.get(i + 1).ok_or_else(|| anyhow!("--chain requires a value"))?;
                chain = Some(Chain::parse(value).ok_or_else(|| anyhow!("unknown chain: {value}"))?);
                i += 2;
            }
            "--provider-url" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("--provider-url requires a value"))?;
                provider_url = Some(value.clone());
                i += 2;
            }
            "--debug" => {
                debug = true;
                i += 1;
            }
            other => bail!("unrecognized argument to `sync`: {other}"),
        }
    }

    Ok(SyncArgs {
        chain: chain.ok_or_else(|| anyhow!("`sync` requires --chain"))?,
        provider_url: provider_url.ok_or_else(|| anyhow!("`sync` requires --provider-url"))?,
        debug,
    })
}

fn parse_mana_args(args: &[String]) -> Result<ManaArgs> {
    let mut chain = None;
    let mut bootnodes = None;
    let mut no_discovery = false;
    let mut no_sync = false;
    let mut debug = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--chain" => {
                let value = args.get(i + 1).ok_or_else(|| anyhow!("--chain requires a value"))?;
                chain = Some(Chain::parse(value).ok_or_else(|| anyhow!("unknown chain: {value}"))?);
                i += 2;
            }
            "--bootnodes" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("--bootnodes requires a value"))?;
                bootnodes = Some(if value == "from_chain" {
                    Bootnodes::FromChain
                } else {
                    Bootnodes::Explicit(value.split(',').map(str::to_string).collect())
                });
                i += 2;
            }
            "--no-discovery" => {
                no_discovery = true;
                i += 1;
            }
            "--no-sync" => {
                no_sync = true;
                i += 1;
            }
            "--debug" => {
                debug = true;
                i += 1;
            }
            other => bail!("unrecognized argument to `mana`: {other}"),
        }
    }

    Ok(ManaArgs {
        chain: chain.ok_or_else(|| anyhow!("`mana` requires --chain"))?,
        bootnodes: bootnodes.ok_or_else(|| anyhow!("`mana` requires --bootnodes"))?,
        no_discovery,
        no_sync,
        debug,
    })
}

fn init_logging(debug: bool) -> Result<()> {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// `sync`: follow a single chain from a provider URL, validating every
/// header against its parent and applying its transactions as it arrives.
/// Chain selection and genesis construction happen here; everything from
/// fetching a block onward is `sync::SyncLoop`'s job.
async fn run_sync(args: SyncArgs) -> Result<()> {
    info!(chain = ?args.chain, provider_url = %args.provider_url, "starting sync");

    let genesis = GenesisBuilder::new(args.chain.genesis_config()).build()?;
    info!(genesis_hash = %hex::encode(genesis.hash()), "genesis constructed");

    let config = SyncConfig {
        chain_id: args.chain.network_id(),
        provider_url: Some(args.provider_url.clone()),
        ..SyncConfig::default()
    };
    let source = HttpBlockSource::new(args.provider_url.clone());
    let sync = SyncLoop::new(source, genesis, config.chain_id, config.checkpoint_interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("sync shutting down");
                sync.shutdown().await.map_err(|e| anyhow!("final checkpoint failed: {e}"))?;
                return Ok(());
            }
            result = sync.catch_up() => {
                result.map_err(|e| anyhow!("sync loop failed: {e}"))?;
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

/// `mana`: run a full node - discovery, sync, and RPC - unless explicitly
/// disabled. Peer handshake and multi-peer block selection are a
/// different crate's concern (`peer-transport`/`peer-discovery`); this
/// entry point owns the channel those peers would feed blocks into, and
/// drives whatever arrives through the same validate/apply/checkpoint
/// loop `sync` uses.
async fn run_mana(args: ManaArgs) -> Result<()> {
    info!(chain = ?args.chain, no_discovery = args.no_discovery, no_sync = args.no_sync, "starting mana");

    let genesis = GenesisBuilder::new(args.chain.genesis_config()).build()?;
    info!(genesis_hash = %hex::encode(genesis.hash()), "genesis constructed");

    let bootnode_count = match &args.bootnodes {
        Bootnodes::FromChain => {
            info!("using the chain's built-in bootnode list");
            0
        }
        Bootnodes::Explicit(nodes) => {
            info!(count = nodes.len(), "using explicit bootnode list");
            nodes.len()
        }
    };

    if args.no_discovery {
        info!("peer discovery disabled");
    } else {
        info!(bootnode_count, "peer discovery would start here");
    }

    if args.no_sync {
        info!("block sync disabled");
        tokio::signal::ctrl_c().await?;
        info!("mana shutting down");
        return Ok(());
    }

    let (_block_feed, block_rx) = tokio::sync::mpsc::channel(64);
    let source = ChannelBlockSource::new(block_rx);
    let config = SyncConfig { chain_id: args.chain.network_id(), ..SyncConfig::default() };
    let sync = SyncLoop::new(source, genesis, config.chain_id, config.checkpoint_interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("mana shutting down");
                sync.shutdown().await.map_err(|e| anyhow!("final checkpoint failed: {e}"))?;
                return Ok(());
            }
            result = sync.catch_up() => {
                result.map_err(|e| anyhow!("sync loop failed: {e}"))?;
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let Some(command) = args.first() else {
        eprintln!("usage: node <sync|mana> [args...]");
        return std::process::ExitCode::FAILURE;
    };
    let rest = &args[1..];

    let result = match command.as_str() {
        "sync" => match parse_sync_args(rest) {
            Ok(parsed) => {
                if init_logging(parsed.debug).is_err() {
                    eprintln!("failed to initialize logging");
                }
                run_sync(parsed).await
            }
            Err(e) => Err(e),
        },
        "mana" => match parse_mana_args(rest) {
            Ok(parsed) => {
                if init_logging(parsed.debug).is_err() {
                    eprintln!("failed to initialize logging");
                }
                run_mana(parsed).await
            }
            Err(e) => Err(e),
        },
        other => Err(anyhow!("unknown command: {other} (expected `sync` or `mana`)")),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

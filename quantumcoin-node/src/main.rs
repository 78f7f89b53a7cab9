//! QuantumCoin full node daemon
//!
//! Subcommands cover the whole node lifecycle: running the gossip listener
//! with the HTTP control plane, continuous mining, one-shot mining, sending
//! coins and inspecting the chain. Configuration resolves defaults ←
//! `config.json` ← environment.

mod api;
mod context;
mod dto;
mod miner;
mod webmine;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use context::NodeContext;
use miner::Miner;
use quantumcoin_core::transaction::new_transaction;
use quantumcoin_core::{storage, Blockchain, Config, WalletStore};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quantumcoin-node", about = "QuantumCoin full node", version)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node: p2p listener, HTTP control plane, autosave
    Run {
        /// P2P port, overriding the configured one
        port: Option<u16>,
    },
    /// Run the node and mine continuously
    RunMine {
        /// Miner reward address, overriding the configured one
        miner: Option<String>,
    },
    /// HTTP control plane only
    Api,
    /// Start a local listener and dial a remote peer
    Connect { port: u16, remote: String },
    /// Build, admit and gossip one transaction
    Send {
        from: String,
        to: String,
        amount: u64,
    },
    /// Mine a single block
    Mine { miner: Option<String> },
    /// Mine continuously without the HTTP surface
    MineForever { miner: Option<String> },
    /// Dump the chain to stdout
    Print,
    /// Generate a new wallet address
    Newaddr,
    /// Import a raw 32-byte private key (hex) into the wallet store
    ImportKey { secret_hex: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(Some(&cli.config)).context("loading configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let chain = load_or_create_chain(&config)?;
    let ctx = NodeContext::new(config, chain);

    match cli.command {
        Command::Run { port } => {
            let port = match port {
                Some(port) => port,
                None => ctx.config.p2p_port_number()?,
            };
            run_node(ctx, Some(port), true, None).await
        }
        Command::RunMine { miner } => {
            let address = resolve_miner_address(&ctx.config, miner)?;
            let port = ctx.config.p2p_port_number()?;
            run_node(ctx, Some(port), true, Some(address)).await
        }
        Command::Api => run_node(ctx, None, true, None).await,
        Command::Connect { port, remote } => {
            ctx.network.start_listener(port).await?;
            ctx.network
                .connect_to_peer(&remote)
                .await
                .with_context(|| format!("dialing {remote}"))?;
            run_node(ctx, None, false, None).await
        }
        Command::Send { from, to, amount } => send_once(ctx, &from, &to, amount).await,
        Command::Mine { miner } => {
            let address = resolve_miner_address(&ctx.config, miner)?;
            let block =
                miner::mine_and_announce(&ctx, &address, ctx.config.default_difficulty_bits)
                    .await?;
            info!(height = block.index, hash = %block.hash_hex(), "mined one block");
            Ok(())
        }
        Command::MineForever { miner } => {
            let address = resolve_miner_address(&ctx.config, miner)?;
            let port = ctx.config.p2p_port_number()?;
            run_node(ctx, Some(port), false, Some(address)).await
        }
        Command::Print => print_chain(&ctx).await,
        Command::Newaddr => {
            let path = ctx.wallet_path();
            let mut store = WalletStore::load(&path)?;
            let wallet = quantumcoin_core::Wallet::new();
            store.insert(&wallet);
            store.save(&path)?;
            println!("New wallet address: {}", wallet.address());
            Ok(())
        }
        Command::ImportKey { secret_hex } => {
            let path = ctx.wallet_path();
            let mut store = WalletStore::load(&path)?;
            let wallet = quantumcoin_core::Wallet::from_secret_hex(secret_hex.trim())
                .context("importing private key")?;
            store.insert(&wallet);
            store.save(&path)?;
            println!("Imported wallet address: {}", wallet.address());
            Ok(())
        }
    }
}

/// Load the persisted chain or derive a fresh genesis; the configured
/// coinbase maturity always wins over the stored one
fn load_or_create_chain(config: &Config) -> anyhow::Result<Blockchain> {
    let path = PathBuf::from(&config.chain_file);
    let chain = match storage::load_chain(&path, config.chain_params(), 0)
        .context("loading chain file")?
    {
        Some(mut chain) => {
            chain.set_coinbase_maturity(config.coinbase_maturity);
            info!(height = chain.best_height(), "chain loaded from disk");
            chain
        }
        None => {
            info!("no chain file, creating genesis");
            Blockchain::new(
                config.chain_params(),
                config.total_supply,
                config.coinbase_maturity,
                0,
            )?
        }
    };
    Ok(chain)
}

/// Explicit argument, then config, then the default wallet
fn resolve_miner_address(config: &Config, requested: Option<String>) -> anyhow::Result<String> {
    if let Some(address) = requested.filter(|a| !a.trim().is_empty()) {
        return Ok(address);
    }
    if !config.miner_address.is_empty() {
        return Ok(config.miner_address.clone());
    }
    let (_, wallet) = WalletStore::ensure_default(&PathBuf::from(&config.wallet_file))?;
    Ok(wallet.address())
}

/// Shared orchestration: optional p2p listener + boot peers, optional
/// miner, optional HTTP, a 10 s autosave ticker, and a Ctrl-C handler that
/// stops the miner, drains HTTP within three seconds and persists the chain
async fn run_node(
    ctx: Arc<NodeContext>,
    p2p_port: Option<u16>,
    http: bool,
    miner_address: Option<String>,
) -> anyhow::Result<()> {
    if let Some(port) = p2p_port {
        ctx.network.start_listener(port).await?;
        for peer in ctx.config.boot_peers.clone() {
            if let Err(e) = ctx.network.connect_to_peer(&peer).await {
                warn!(peer = %peer, error = %e, "boot peer dial failed");
            }
        }
    }

    let autosave_ctx = Arc::clone(&ctx);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(10));
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            autosave_ctx.persist_chain().await;
        }
    });

    let miner_stop = miner_address.map(|address| {
        let miner = Miner::new(Arc::clone(&ctx), address);
        let stop = miner.stop_flag();
        miner.spawn();
        stop
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let http_task = if http {
        let port = ctx.config.http_port_number()?;
        let http_ctx = Arc::clone(&ctx);
        Some(tokio::spawn(async move {
            let result = api::serve(http_ctx, port, async {
                let _ = shutdown_rx.await;
            })
            .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "http server failed");
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    if let Some(stop) = miner_stop {
        stop.store(true, Ordering::SeqCst);
    }
    let _ = shutdown_tx.send(());
    if let Some(task) = http_task {
        if tokio::time::timeout(Duration::from_secs(3), task).await.is_err() {
            warn!("http server did not drain within deadline");
        }
    }
    ctx.persist_chain().await;
    info!("node stopped");
    Ok(())
}

/// Build, sign, admit and gossip one transaction, then persist
async fn send_once(
    ctx: Arc<NodeContext>,
    from: &str,
    to: &str,
    amount: u64,
) -> anyhow::Result<()> {
    let store = WalletStore::load(&ctx.wallet_path())?;
    let wallet = store
        .get(from)
        .with_context(|| format!("no local wallet for {from}"))?;

    let mut tx = {
        let chain = ctx.chain.read().await;
        new_transaction(from, to, amount, &chain)?
    };
    wallet.sign_transaction(&mut tx)?;

    {
        let mut chain = ctx.chain.write().await;
        chain.add_transaction(tx.clone())?;
    }

    for peer in ctx.config.boot_peers.clone() {
        if let Err(e) = ctx.network.connect_to_peer(&peer).await {
            warn!(peer = %peer, error = %e, "boot peer dial failed");
        }
    }
    if !ctx.network.peers().is_empty().await {
        ctx.network.broadcast_transaction(&tx).await?;
        // give the frames a moment to flush before the process exits
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    ctx.persist_chain().await;
    println!("Transaction {} admitted to the pool", tx.id_hex());
    Ok(())
}

async fn print_chain(ctx: &Arc<NodeContext>) -> anyhow::Result<()> {
    let chain = ctx.chain.read().await;
    for block in chain.blocks() {
        println!("Block #{}", block.index);
        println!("  miner      : {}", block.miner);
        println!("  hash       : {}", hex::encode(block.hash));
        println!("  prev hash  : {}", hex::encode(block.prev_hash));
        println!("  difficulty : {} bits, nonce {}", block.difficulty, block.nonce);
        println!("  transactions:");
        for tx in &block.transactions {
            println!("    {} ({})", tx.id_hex(), tx.sender);
            for output in &tx.outputs {
                println!("      -> {} {}", output.amount, ctx.config.symbol);
            }
        }
        println!("----------------------------------------");
    }
    Ok(())
}

use anyhow::{bail, Result};
use cashfusion::session::{ClientConfig, FusionClient, FusionOutcome, SkipPolicy};
use cashfusion::types::{short_hex, FusionStatus};
use cashfusion::wallet::{FileWallet, WalletBackend};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn default_wallet_path() -> PathBuf {
    PathBuf::from("fusion.wallet")
}

#[derive(Parser)]
#[command(name = "cashfusion")]
#[command(about = "CashFusion protocol client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a fusion session to completion
    Fuse {
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        /// SOCKS5 proxy (pass "none" to connect directly)
        #[arg(long, default_value = "127.0.0.1:9050")]
        proxy: String,
        /// Skip TLS on the coordinator connection
        #[arg(long)]
        no_tls: bool,
        /// Keep waiting when the server skips a round's signature phase
        #[arg(long)]
        tolerate_skips: bool,
        #[arg(long, default_value_os_t = default_wallet_path())]
        wallet: PathBuf,
    },

    /// Handshake only: print the tiers this wallet could join
    Tiers {
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long, default_value = "127.0.0.1:9050")]
        proxy: String,
        #[arg(long)]
        no_tls: bool,
        #[arg(long, default_value_os_t = default_wallet_path())]
        wallet: PathBuf,
    },

    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
}

#[derive(Subcommand)]
enum WalletAction {
    Create {
        #[arg(long, default_value_os_t = default_wallet_path())]
        path: PathBuf,
        #[arg(long, default_value = "mainnet")]
        network: String,
    },
    /// Generate a fresh receiving key
    Receive {
        #[arg(long, default_value_os_t = default_wallet_path())]
        path: PathBuf,
    },
    /// Import a spendable coin
    Import {
        #[arg(long, default_value_os_t = default_wallet_path())]
        path: PathBuf,
        /// Funding txid (hex)
        #[arg(long)]
        txid: String,
        #[arg(long)]
        index: u32,
        #[arg(long)]
        value: u64,
        /// Key seed (hex)
        #[arg(long)]
        seed: String,
    },
    List {
        #[arg(long, default_value_os_t = default_wallet_path())]
        path: PathBuf,
    },
}

fn parse_hex32(s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        bail!("expected 32 bytes, got {}", bytes.len());
    }
    Ok(<[u8; 32]>::try_from(bytes).unwrap())
}

fn parse_proxy(s: &str) -> Result<Option<SocketAddr>> {
    if s == "none" {
        return Ok(None);
    }
    Ok(Some(s.parse()?))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cashfusion=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Fuse {
            host,
            port,
            proxy,
            no_tls,
            tolerate_skips,
            wallet,
        } => {
            let config = ClientConfig {
                proxy: parse_proxy(&proxy)?,
                tls: !no_tls,
                skip_policy: if tolerate_skips {
                    SkipPolicy::Neutral
                } else {
                    SkipPolicy::Quit
                },
                ..ClientConfig::default()
            };
            run_fusion(&host, port, wallet, config).await
        }
        Command::Tiers {
            host,
            port,
            proxy,
            no_tls,
            wallet,
        } => {
            let config = ClientConfig {
                proxy: parse_proxy(&proxy)?,
                tls: !no_tls,
                ..ClientConfig::default()
            };
            let wallet = FileWallet::open(&wallet)?;
            let coins = wallet.spendable_coins();
            let client = FusionClient::connect(&host, port, coins, wallet, config).await?;
            if client.feasible_tiers().is_empty() {
                println!("no feasible tiers for this coin selection");
            } else {
                for tier in client.feasible_tiers() {
                    println!("{}", tier);
                }
            }
            Ok(())
        }
        Command::Wallet { action } => handle_wallet(action),
    }
}

async fn run_fusion(host: &str, port: u16, path: PathBuf, config: ClientConfig) -> Result<()> {
    let wallet = FileWallet::open(&path)?;
    let coins = wallet.spendable_coins();
    if coins.is_empty() {
        bail!("wallet has no spendable coins");
    }
    println!("fusing {} coins", coins.len());

    let client = FusionClient::connect(host, port, coins, wallet, config).await?;
    let mut handle = client.fuse();

    // Surface phase transitions while the background task works.
    let mut status = handle.status.clone();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow();
            if current != FusionStatus::NotFusing {
                println!("status: {:?}", current);
            }
        }
    });
    let mut pools = handle.pools.clone();
    tokio::spawn(async move {
        while pools.changed().await.is_ok() {
            for pool in pools.borrow().iter() {
                println!(
                    "tier {}: {}/{} players",
                    pool.tier, pool.players, pool.min_players
                );
            }
        }
    });

    match (&mut handle.task).await?? {
        FusionOutcome::Fused(tx) => {
            println!("fused! txid {}", short_hex(&tx.txid()));
            println!(
                "{} inputs, {} outputs, fee {}",
                tx.inputs.len(),
                tx.outputs.len(),
                tx.fee()
            );
        }
        FusionOutcome::Infeasible => {
            println!("no feasible tier for this coin selection; nothing to do");
        }
        FusionOutcome::Quit(reason) => {
            bail!("fusion failed: {}", reason);
        }
    }
    Ok(())
}

fn handle_wallet(action: WalletAction) -> Result<()> {
    match action {
        WalletAction::Create { path, network } => {
            FileWallet::create(&path, &network)?;
            println!("created {} wallet at {}", network, path.display());
        }
        WalletAction::Receive { path } => {
            let mut wallet = FileWallet::open(&path)?;
            let pubkey = wallet.generate_key()?;
            println!("{}", hex::encode(pubkey));
        }
        WalletAction::Import {
            path,
            txid,
            index,
            value,
            seed,
        } => {
            let mut wallet = FileWallet::open(&path)?;
            wallet.import_coin(parse_hex32(&txid)?, index, value, parse_hex32(&seed)?)?;
            println!("imported coin worth {}", value);
        }
        WalletAction::List { path } => {
            let wallet = FileWallet::open(&path)?;
            for coin in &wallet.data.coins {
                println!("{}:{}  {}", hex::encode(coin.txid), coin.index, coin.value);
            }
            println!("total: {}", wallet.total_value());
        }
    }
    Ok(())
}

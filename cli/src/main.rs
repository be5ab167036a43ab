//! `fibb-ledger`: inspect and update token wallets stored as JSON files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use fibb_ledger::ledger::{
    detect_shape, parse_wallet, SnapshotShape, SubscriptionTier, TokenSource, TokenType,
    TokenWallet, UserTokens,
};
use fibb_ledger::{LedgerConfig, LedgerError, TokenBillingInfo};

/// Exit status for expected refusals (not enough tokens, no price).
/// Status 2 is left to clap for usage errors.
const EXIT_REFUSED: u8 = 3;

#[derive(Parser)]
#[command(name = "fibb-ledger")]
#[command(about = "Inspect and update Fibb token wallets")]
#[command(version = fibb_ledger::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Ledger config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show balances and totals
    Show { wallet: PathBuf },

    /// Consume tokens, monthly first
    Consume {
        wallet: PathBuf,
        #[arg(short = 't', long = "type")]
        token_type: TokenType,
        #[arg(short, long)]
        amount: u64,
        /// Write the result back to the wallet file
        #[arg(short, long)]
        write: bool,
    },

    /// Add tokens to one source
    Add {
        wallet: PathBuf,
        #[arg(short = 't', long = "type")]
        token_type: TokenType,
        #[arg(short, long)]
        source: TokenSource,
        #[arg(short, long)]
        amount: u64,
        #[arg(short, long)]
        write: bool,
    },

    /// Zero all monthly balances
    Reset {
        wallet: PathBuf,
        #[arg(short, long)]
        write: bool,
    },

    /// Credit a subscription grant to the monthly balance
    Refill {
        wallet: PathBuf,
        #[arg(short = 't', long = "type")]
        token_type: TokenType,
        #[arg(short, long)]
        amount: u64,
        #[arg(short, long)]
        write: bool,
    },

    /// Per-pack price of a token type
    Price {
        #[arg(short = 't', long = "type")]
        token_type: TokenType,
        #[arg(short = 'r', long)]
        tier: SubscriptionTier,
    },

    /// Cost of buying a quantity of tokens
    Cost {
        #[arg(short = 't', long = "type")]
        token_type: TokenType,
        #[arg(short, long)]
        quantity: u64,
        #[arg(short = 'r', long)]
        tier: SubscriptionTier,
    },

    /// Print the pricing table
    Billing,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    fibb_ledger::logging::init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let refused = err
                .downcast_ref::<LedgerError>()
                .map(|e| e.is_business_outcome())
                .unwrap_or(false);
            eprintln!("{} {:#}", "error:".red().bold(), err);
            if refused {
                ExitCode::from(EXIT_REFUSED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let billing = &config.pricing;

    match cli.command {
        Commands::Show { wallet } => {
            print_balances(&read_wallet(&wallet)?.wallet);
        }
        Commands::Consume {
            wallet: path,
            token_type,
            amount,
            write,
        } => {
            let file = read_wallet(&path)?;
            let next = file.wallet.consume_tokens(token_type, amount)?;
            emit(&path, &file, &next, write)?;
        }
        Commands::Add {
            wallet: path,
            token_type,
            source,
            amount,
            write,
        } => {
            let file = read_wallet(&path)?;
            let next = file.wallet.add_tokens(token_type, source, amount)?;
            emit(&path, &file, &next, write)?;
        }
        Commands::Reset {
            wallet: path,
            write,
        } => {
            let file = read_wallet(&path)?;
            emit(&path, &file, &file.wallet.reset_subscription_tokens(), write)?;
        }
        Commands::Refill {
            wallet: path,
            token_type,
            amount,
            write,
        } => {
            let file = read_wallet(&path)?;
            let next = file.wallet.refill_tokens(token_type, amount)?;
            emit(&path, &file, &next, write)?;
        }
        Commands::Price { token_type, tier } => {
            let price = billing.require_token_price(token_type, tier)?;
            println!("{}", price);
        }
        Commands::Cost {
            token_type,
            quantity,
            tier,
        } => {
            let cost = billing.require_token_cost(token_type, quantity, tier)?;
            let packs = billing.packs_for(token_type, quantity).unwrap_or(0);
            println!("{} ({} packs)", cost, packs);
        }
        Commands::Billing => print_billing(billing),
    }

    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fibb-ledger").join("config.toml"))
}

fn load_config(path: Option<&Path>) -> Result<LedgerConfig> {
    // A missing file falls back to defaults and environment variables
    let path = path.map(Path::to_path_buf).or_else(default_config_path);
    LedgerConfig::load(path.as_deref()).context("Failed to load ledger config")
}

/// A wallet file: the parsed wallet plus the document it came from.
struct WalletFile {
    wallet: TokenWallet,
    shape: SnapshotShape,
    document: Value,
}

fn read_wallet(path: &Path) -> Result<WalletFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read wallet file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Wallet file {} is not valid JSON", path.display()))?;
    let shape = detect_shape(&value)?;
    let wallet = parse_wallet(&value)
        .with_context(|| format!("Invalid wallet in {}", path.display()))?;
    Ok(WalletFile {
        wallet,
        shape,
        document: value,
    })
}

/// Print the wallet, or write it back in the shape it was read in.
///
/// Balance fields are replaced in the original document; other keys such as
/// `userId` and `version` are kept.
fn emit(path: &Path, file: &WalletFile, wallet: &TokenWallet, write: bool) -> Result<()> {
    let fields = match file.shape {
        SnapshotShape::Flat => serde_json::to_value(UserTokens::from(wallet))?,
        SnapshotShape::Nested => serde_json::to_value(wallet)?,
    };
    let mut document = file.document.clone();
    if let (Value::Object(target), Value::Object(fields)) = (&mut document, fields) {
        target.extend(fields);
    }
    let json = serde_json::to_string_pretty(&document)?;

    if write {
        fs::write(path, format!("{}\n", json))
            .with_context(|| format!("Failed to write wallet file {}", path.display()))?;
        eprintln!("{} {}", "updated".green(), path.display());
    } else {
        println!("{}", json);
    }
    Ok(())
}

fn print_balances(wallet: &TokenWallet) {
    println!(
        "{:<10} {:>10} {:>10} {:>10}",
        "type".bold(),
        "monthly".bold(),
        "purchased".bold(),
        "total".bold()
    );
    for token_type in TokenType::ALL {
        let balance = wallet.balance(token_type);
        println!(
            "{:<10} {:>10} {:>10} {:>10}",
            token_type.as_str(),
            balance.monthly,
            balance.purchased,
            balance.total()
        );
    }
    println!("{:<10} {:>32}", "all".bold(), wallet.grand_total());
}

fn print_billing(billing: &TokenBillingInfo) {
    for (token_type, info) in billing.iter() {
        println!(
            "{} ({}, {} per pack)",
            info.name.bold(),
            token_type,
            info.pack_size
        );
        for tier in SubscriptionTier::ALL {
            let price = info
                .price_for(tier)
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unavailable".dimmed().to_string());
            println!("  {:<10} {}", tier.as_str(), price);
        }
    }
}

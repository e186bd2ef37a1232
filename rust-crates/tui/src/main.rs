use alloy::primitives::Address;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use generated_abi::networks::{
    DEFAULT_LOCAL_RPC_URL,
    DEFAULT_MAINNET_RPC_URL,
    DEFAULT_SEPOLIA_RPC_URL,
};
use skylines_client::{
    Network,
    config::{
        self,
        PollIntervals,
    },
    history::DASHBOARD_RECENT_LIMIT,
    referral,
    wallets,
};
use std::{
    str::FromStr,
    sync::OnceLock,
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

const LOG_DIR: &str = ".logs";
const LOG_FILE: &str = "fortune-skylines.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// The terminal belongs to the UI, so logs go to a daily file under `.logs/`.
fn init_tracing() {
    let appender = rolling::daily(LOG_DIR, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    let _ = LOG_GUARD.set(guard);
}

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: fortune-skylines [--mainnet | --sepolia | --local] [--rpc-url <url>]\n\
         [--wallet <name>] [--wallet-dir <path>] [--contract <address>] [--usdc <address>]\n\
         [--ref <address|link>] [--site-url <url>] [--admin]\n\
         [--poll-ms <ms>] [--user-poll-ms <ms>] [--recent-limit <n>]\n\
         \n\
         Flags:\n\
           --mainnet             Connect to Base mainnet (default RPC {})\n\
           --sepolia             Connect to Base Sepolia (default RPC {}); the default\n\
           --local               Connect to a local node (default RPC {})\n\
           --rpc-url <url>       Override the RPC URL ({} is honoured for Base networks)\n\
           --wallet <name>       Foundry keystore used to sign transactions\n\
           --wallet-dir <path>   Keystore directory (defaults to ~/.foundry/keystores)\n\
           --contract <address>  Lottery contract (defaults to the recorded deployment)\n\
           --usdc <address>      USDC token (defaults to the network's USDC)\n\
           --ref <address|link>  Pre-fill the referrer, e.g. https://site/?ref=0x...\n\
           --site-url <url>      Base URL used for your referral link (default {})\n\
           --admin               Start on the admin dashboard\n\
           --poll-ms <ms>        Contract data poll interval (default 5000)\n\
           --user-poll-ms <ms>   Account status poll interval (default 30000)\n\
           --recent-limit <n>    Recent participants to show (default {})",
        DEFAULT_MAINNET_RPC_URL,
        DEFAULT_SEPOLIA_RPC_URL,
        DEFAULT_LOCAL_RPC_URL,
        config::RPC_URL_ENV,
        config::DEFAULT_SITE_URL,
        DASHBOARD_RECENT_LIMIT,
    );
    std::process::exit(0);
}

fn once<T>(slot: &mut Option<T>, value: T, flag: &str) -> Result<()> {
    if slot.is_some() {
        return Err(eyre!("{flag} may only be specified once"));
    }
    *slot = Some(value);
    Ok(())
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| eyre!("{flag} requires an argument"))
}

fn parse_address(raw: &str, flag: &str) -> Result<Address> {
    Address::from_str(raw.trim()).wrap_err_with(|| format!("{flag}: invalid address {raw}"))
}

fn parse_millis(raw: &str, flag: &str) -> Result<Duration> {
    let ms: u64 = raw
        .parse()
        .wrap_err_with(|| format!("{flag}: expected milliseconds, got {raw}"))?;
    if ms == 0 {
        return Err(eyre!("{flag} must be greater than zero"));
    }
    Ok(Duration::from_millis(ms))
}

fn parse_cli_args(args: impl IntoIterator<Item = String>) -> Result<client::AppConfig> {
    let mut args = args.into_iter();
    let mut network: Option<Network> = None;
    let mut custom_url: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;
    let mut contract: Option<Address> = None;
    let mut usdc: Option<Address> = None;
    let mut referrer: Option<String> = None;
    let mut site_url: Option<String> = None;
    let mut admin_view = false;
    let mut polls = PollIntervals::default();
    let mut recent_limit = DASHBOARD_RECENT_LIMIT;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mainnet" | "--sepolia" | "--local" => {
                let selected = match arg.as_str() {
                    "--mainnet" => Network::BaseMainnet,
                    "--sepolia" => Network::BaseSepolia,
                    _ => Network::Local,
                };
                if network.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --mainnet/--sepolia/--local"
                    ));
                }
                network = Some(selected);
            }
            "--rpc-url" => {
                let url = next_value(&mut args, &arg)?;
                once(&mut custom_url, url, &arg)?;
            }
            "--wallet" => {
                let name = next_value(&mut args, &arg)?;
                once(&mut wallet_name, name, &arg)?;
            }
            "--wallet-dir" => {
                let dir = next_value(&mut args, &arg)?;
                once(&mut wallet_dir, dir, &arg)?;
            }
            "--contract" => {
                let address = parse_address(&next_value(&mut args, &arg)?, &arg)?;
                once(&mut contract, address, &arg)?;
            }
            "--usdc" => {
                let address = parse_address(&next_value(&mut args, &arg)?, &arg)?;
                once(&mut usdc, address, &arg)?;
            }
            "--ref" => {
                let raw = next_value(&mut args, &arg)?;
                let value = referral::referrer_input(&raw)
                    .ok_or_else(|| eyre!("--ref expects an address or a link with ?ref=0x..."))?;
                once(&mut referrer, value, &arg)?;
            }
            "--site-url" => {
                let url = next_value(&mut args, &arg)?;
                once(&mut site_url, url, &arg)?;
            }
            "--admin" => admin_view = true,
            "--poll-ms" => polls.contract = parse_millis(&next_value(&mut args, &arg)?, &arg)?,
            "--user-poll-ms" => polls.user = parse_millis(&next_value(&mut args, &arg)?, &arg)?,
            "--recent-limit" => {
                let raw = next_value(&mut args, &arg)?;
                recent_limit = raw
                    .parse()
                    .wrap_err_with(|| format!("--recent-limit: expected a number, got {raw}"))?;
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = network.unwrap_or(Network::BaseSepolia);
    let rpc_url = config::resolve_rpc_url(network, custom_url.as_deref());
    let wallet = match wallet_name {
        Some(name) => Some(client::WalletConfig::FoundryKeystore {
            name,
            dir: wallets::resolve_wallet_dir(wallet_dir.as_deref())?,
        }),
        None if wallet_dir.is_some() => {
            return Err(eyre!("--wallet-dir needs --wallet <name>"));
        }
        None => None,
    };

    Ok(client::AppConfig {
        network,
        rpc_url,
        wallet,
        contract,
        usdc,
        referrer,
        site_url: site_url.unwrap_or_else(|| config::DEFAULT_SITE_URL.to_string()),
        admin_view,
        polls,
        recent_limit,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();
    let app_config = parse_cli_args(std::env::args().skip(1))?;
    tracing::info!(
        app = config::APP_NAME,
        network = %app_config.network,
        rpc_url = %app_config.rpc_url,
        project_id = %config::project_id(),
        "starting client"
    );
    deployments::ensure_structure().map_err(|e| eyre!(e))?;
    client::run_app(app_config).await
}

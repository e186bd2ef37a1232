mod artifact;
mod html;
mod wallets;

use alloy::{
    network::{
        ReceiptResponse,
        TransactionBuilder,
    },
    primitives::{
        Address,
        B256,
        U256,
        utils::format_units,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::SolConstructor,
};
use anyhow::{
    Context,
    Result,
    bail,
};
use clap::{
    ArgGroup,
    Parser,
};
use deployments::{
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
};
use generated_abi::{
    Network,
    TOKEN_DECIMALS,
    networks::{
        BASE_SEPOLIA_KEY_HASH,
        BASE_SEPOLIA_VRF_COORDINATOR,
        DEFAULT_VRF_SUBSCRIPTION_ID,
        address_url,
    },
    refboom_types::RefBoom,
};
use std::str::FromStr;
use tracing::info;

use crate::{
    artifact::{
        Artifact,
        choose_artifact,
    },
    wallets::{
        find_wallet,
        resolve_wallet_dir,
        unlock_wallet,
    },
};

#[derive(Parser, Debug)]
#[command(
    name = "skylines-deploy",
    about = "Deploy the FortuneSkylines lottery, build the browser deployer, or inspect a deployment",
    version,
    group(
        ArgGroup::new("network")
            .args(["mainnet", "sepolia", "local"])
            .required(true)
    )
)]
struct Args {
    /// Target Base mainnet
    #[arg(long)]
    mainnet: bool,

    /// Target Base Sepolia
    #[arg(long)]
    sepolia: bool,

    /// Target a local node (anvil / hardhat)
    #[arg(long)]
    local: bool,

    /// Override RPC URL (else BASE_RPC_URL, else the network default)
    #[arg(long)]
    rpc_url: Option<String>,

    /// Foundry keystore name (required for deploy)
    #[arg(long)]
    wallet: Option<String>,

    /// Override keystore directory (defaults to ~/.foundry/keystores)
    #[arg(long)]
    wallet_dir: Option<String>,

    /// Which action to perform (defaults to deploy)
    #[arg(short, long, value_enum, default_value = "deploy")]
    action: Action,

    /// Compiled contract artifact (Hardhat or Foundry JSON)
    #[arg(long)]
    artifact: Option<String>,

    /// Where the html action writes the deployer page
    #[arg(long, default_value = html::DEFAULT_OUTPUT)]
    output: String,

    /// Stablecoin the lottery collects (defaults to the network's USDC)
    #[arg(long)]
    usdc: Option<String>,

    /// Chainlink VRF coordinator (defaults to the Base Sepolia coordinator off mainnet)
    #[arg(long)]
    vrf_coordinator: Option<String>,

    /// VRF key hash lane (defaults to the Base Sepolia 30 gwei lane off mainnet)
    #[arg(long)]
    key_hash: Option<String>,

    /// VRF subscription id
    #[arg(long, default_value_t = DEFAULT_VRF_SUBSCRIPTION_ID)]
    subscription_id: u64,

    /// Genesis referrer (defaults to the deploying wallet)
    #[arg(long)]
    genesis_referrer: Option<String>,

    /// Contract to inspect (status only; defaults to the latest recorded deployment)
    #[arg(long)]
    contract: Option<String>,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum Action {
    Deploy,
    Html,
    Status,
}

#[derive(Debug, Clone, PartialEq)]
struct ConstructorArgs {
    usdc: Address,
    vrf_coordinator: Address,
    key_hash: B256,
    subscription_id: U256,
    genesis_referrer: Address,
}

impl ConstructorArgs {
    fn encode(&self) -> Vec<u8> {
        RefBoom::constructorCall {
            usdc: self.usdc,
            vrfCoordinator: self.vrf_coordinator,
            keyHash: self.key_hash,
            subscriptionId: self.subscription_id,
            genesisReferrer: self.genesis_referrer,
        }
        .abi_encode()
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn selected_network(args: &Args) -> (Network, DeploymentEnv) {
    if args.mainnet {
        (Network::BaseMainnet, DeploymentEnv::Mainnet)
    } else if args.sepolia {
        (Network::BaseSepolia, DeploymentEnv::Sepolia)
    } else {
        (Network::Local, DeploymentEnv::Local)
    }
}

const RPC_URL_ENV: &str = "BASE_RPC_URL";

/// `BASE_RPC_URL` never applies to a local node.
fn resolve_rpc_url(network: Network, flag: Option<&str>, env: Option<String>) -> String {
    let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    if let Some(url) = non_blank(flag.map(str::to_string)) {
        return url;
    }
    if network != Network::Local
        && let Some(url) = non_blank(env)
    {
        return url;
    }
    network.default_rpc_url().to_string()
}

fn parse_address(raw: &str, what: &str) -> Result<Address> {
    Address::from_str(raw.trim()).with_context(|| format!("parsing {what} address {raw}"))
}

fn parse_key_hash(raw: &str) -> Result<B256> {
    B256::from_str(raw.trim()).with_context(|| format!("parsing key hash {raw}"))
}

/// Flags first; the Base Sepolia VRF lane stands in everywhere but mainnet,
/// where Chainlink has no coordinator and the operator must supply one.
fn constructor_args(
    args: &Args,
    network: Network,
    deployer: Address,
) -> Result<ConstructorArgs> {
    let usdc = match args.usdc.as_deref() {
        Some(raw) => parse_address(raw, "usdc")?,
        None => network.addresses().usdc,
    };
    let vrf_coordinator = match (args.vrf_coordinator.as_deref(), network) {
        (Some(raw), _) => parse_address(raw, "VRF coordinator")?,
        (None, Network::BaseMainnet) => {
            bail!("--vrf-coordinator is required on mainnet")
        }
        (None, _) => BASE_SEPOLIA_VRF_COORDINATOR,
    };
    let key_hash = match (args.key_hash.as_deref(), network) {
        (Some(raw), _) => parse_key_hash(raw)?,
        (None, Network::BaseMainnet) => bail!("--key-hash is required on mainnet"),
        (None, _) => BASE_SEPOLIA_KEY_HASH,
    };
    let genesis_referrer = match args.genesis_referrer.as_deref() {
        Some(raw) => parse_address(raw, "genesis referrer")?,
        None => {
            println!(
                "No genesis referrer specified, defaulting to the deployer: {deployer}"
            );
            deployer
        }
    };
    if genesis_referrer.is_zero() {
        bail!("genesis referrer must not be the zero address");
    }
    Ok(ConstructorArgs {
        usdc,
        vrf_coordinator,
        key_hash,
        subscription_id: U256::from(args.subscription_id),
        genesis_referrer,
    })
}

fn load_signer(args: &Args) -> Result<PrivateKeySigner> {
    let name = args
        .wallet
        .as_deref()
        .context("--wallet <name> is required when deploying")?;
    let wallet_dir =
        resolve_wallet_dir(args.wallet_dir.as_deref()).context("resolving wallet directory")?;
    let descriptor = find_wallet(&wallet_dir, name).context("locating requested wallet")?;
    unlock_wallet(&descriptor).context("unlocking keystore")
}

async fn connect(
    rpc_url: &str,
    network: Network,
    signer: Option<PrivateKeySigner>,
) -> Result<DynProvider> {
    let provider = match signer {
        Some(signer) => ProviderBuilder::new()
            .wallet(signer)
            .connect(rpc_url)
            .await
            .context("failed to connect to provider")?
            .erased(),
        None => ProviderBuilder::new()
            .connect(rpc_url)
            .await
            .context("failed to connect to provider")?
            .erased(),
    };

    let chain_id = provider
        .get_chain_id()
        .await
        .context("fetching chain id")?;
    if chain_id != network.chain_id() {
        bail!(
            "RPC {rpc_url} reports chain {chain_id}, expected {} ({network}); switch networks or pass a matching --rpc-url",
            network.chain_id()
        );
    }
    Ok(provider)
}

async fn deploy(
    args: &Args,
    network: Network,
    store: &DeploymentStore,
    rpc_url: &str,
) -> Result<()> {
    let artifact_path = choose_artifact(args.artifact.as_deref())?;
    let artifact = Artifact::load(&artifact_path)?;
    let creation_code = artifact.creation_code()?;
    let bytecode_hash = deployments::compute_bytecode_hash(&creation_code);
    if let Some(previous) = store.latest().context("loading deployment records")?
        && previous.is_compatible_with_hash(&bytecode_hash)
    {
        println!(
            "Note: {} already runs this bytecode (deployed {}); deploying a fresh instance",
            previous.contract_address, previous.deployed_at
        );
    }

    let signer = load_signer(args)?;
    let deployer = signer.address();
    let provider = connect(rpc_url, network, Some(signer)).await?;
    let ctor = constructor_args(args, network, deployer)?;
    info!(?ctor, %deployer, artifact = %artifact_path, "deploying lottery contract");

    let mut code = creation_code.to_vec();
    code.extend(ctor.encode());
    let tx = TransactionRequest::default()
        .with_from(deployer)
        .with_deploy_code(code);
    let pending = provider
        .send_transaction(tx)
        .await
        .context("sending deployment transaction")?;
    let tx_hash = *pending.tx_hash();
    println!("Deployment transaction sent: {tx_hash}");
    let receipt = pending
        .get_receipt()
        .await
        .context("waiting for deployment receipt")?;
    if !receipt.status() {
        bail!("deployment transaction {tx_hash} reverted");
    }
    let contract_address = receipt
        .contract_address
        .context("deployment receipt has no contract address")?;
    println!(
        "Lottery deployed: {contract_address} (tx: {tx_hash}) at block {}",
        receipt.block_number.unwrap_or_default()
    );
    if network != Network::Local {
        println!("  {}", address_url(network.chain_id(), &contract_address));
    }

    let mut record = DeploymentRecord::new(
        contract_address.to_string(),
        bytecode_hash,
        rpc_url,
        network.chain_id(),
    );
    record.tx_hash = Some(tx_hash.to_string());
    record.block_number = receipt.block_number;
    record.usdc_address = Some(ctor.usdc.to_string());
    record.vrf_coordinator = Some(ctor.vrf_coordinator.to_string());
    record.key_hash = Some(ctor.key_hash.to_string());
    record.subscription_id = Some(ctor.subscription_id.to_string());
    record.genesis_referrer = Some(ctor.genesis_referrer.to_string());

    store.append(record).context("recording deployment")?;
    println!("Deployment metadata written to {}", store.path().display());
    Ok(())
}

fn status_contract(args: &Args, store: &DeploymentStore) -> Result<Address> {
    if let Some(raw) = args.contract.as_deref() {
        return parse_address(raw, "contract");
    }
    let record = store
        .latest()
        .context("loading deployment records")?
        .ok_or_else(|| anyhow::anyhow!("no deployments found for this environment; pass --contract"))?;
    parse_address(&record.contract_address, "stored contract")
}

fn usdc(amount: U256) -> String {
    format_units(amount, TOKEN_DECIMALS as u8).unwrap_or_else(|_| amount.to_string())
}

async fn status(args: &Args, network: Network, store: &DeploymentStore, rpc_url: &str) -> Result<()> {
    let address = status_contract(args, store)?;
    let provider = connect(rpc_url, network, None).await?;
    let lottery = RefBoom::new(address, provider);

    let prize_pool = lottery.getPrizePool().call().await.context("reading prize pool")?;
    let total_users = lottery.totalUsers().call().await.context("reading total users")?;
    let winner_selected = lottery
        .winnerSelected()
        .call()
        .await
        .context("reading winner flag")?;
    let owner = lottery.owner().call().await.context("reading owner")?;
    let genesis = lottery
        .genesisReferrer()
        .call()
        .await
        .context("reading genesis referrer")?;
    let sorteo = lottery
        .sorteoTriggered()
        .call()
        .await
        .context("reading sorteo flag")?;
    let request_id = lottery.requestId().call().await.context("reading request id")?;

    println!("Lottery {address} on {network}");
    println!("  Participants: {total_users} / {}", generated_abi::PARTICIPANT_TARGET);
    println!("  Prize pool: {} USDC", usdc(prize_pool));
    println!("  Owner: {owner}");
    println!("  Genesis referrer: {genesis}");
    println!("  Sorteo triggered: {sorteo}");
    println!("  Request id: {request_id}");
    if winner_selected {
        let winner = lottery.winner().call().await.context("reading winner")?;
        let prize = lottery.prizeAmount().call().await.context("reading prize amount")?;
        println!("  Winner: {winner} ({} USDC)", usdc(prize));
    } else {
        println!("  Winner: not selected");
    }
    Ok(())
}

fn build_html(args: &Args) -> Result<()> {
    let artifact_path = choose_artifact(args.artifact.as_deref())?;
    let artifact = Artifact::load(&artifact_path)?;
    html::write_deployer(&artifact, &args.output)?;
    println!("Deployer written to {}; open it in a browser with a wallet extension", args.output);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    deployments::ensure_structure().context("initializing deployment directories")?;

    let (network, env) = selected_network(&args);
    let rpc_url = resolve_rpc_url(
        network,
        args.rpc_url.as_deref(),
        std::env::var(RPC_URL_ENV).ok(),
    );
    info!(%network, %env, rpc_url = %rpc_url, action = ?args.action, "starting");

    let store = DeploymentStore::new(env).context("opening deployment store")?;
    match args.action {
        Action::Deploy => deploy(&args, network, &store, &rpc_url).await,
        Action::Html => build_html(&args),
        Action::Status => status(&args, network, &store, &rpc_url).await,
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy::primitives::address;

    const DEPLOYER: Address = address!("00000000000000000000000000000000000000d1");

    fn args(raw: &[&str]) -> Args {
        Args::parse_from(std::iter::once("skylines-deploy").chain(raw.iter().copied()))
    }

    #[test]
    fn args__network_flag_is_required() {
        let result = Args::try_parse_from(["skylines-deploy", "--action", "html"]);
        assert!(result.is_err());
    }

    #[test]
    fn args__networks_are_exclusive() {
        let result = Args::try_parse_from(["skylines-deploy", "--mainnet", "--sepolia"]);
        assert!(result.is_err());
    }

    #[test]
    fn selected_network__maps_flags_to_store_env() {
        assert_eq!(
            selected_network(&args(&["--sepolia"])),
            (Network::BaseSepolia, DeploymentEnv::Sepolia)
        );
        assert_eq!(
            selected_network(&args(&["--local"])),
            (Network::Local, DeploymentEnv::Local)
        );
    }

    #[test]
    fn resolve_rpc_url__flag_then_env_then_default() {
        // given
        let env = Some("https://base.example".to_string());

        // when / then
        assert_eq!(
            resolve_rpc_url(Network::BaseMainnet, Some("http://flag"), env.clone()),
            "http://flag"
        );
        assert_eq!(
            resolve_rpc_url(Network::BaseSepolia, Some(" "), env.clone()),
            "https://base.example"
        );
        assert_eq!(
            resolve_rpc_url(Network::Local, None, env),
            Network::Local.default_rpc_url()
        );
        assert_eq!(
            resolve_rpc_url(Network::BaseSepolia, None, Some(String::new())),
            Network::BaseSepolia.default_rpc_url()
        );
    }

    #[test]
    fn constructor_args__sepolia_defaults() {
        // given
        let args = args(&["--sepolia"]);

        // when
        let ctor = constructor_args(&args, Network::BaseSepolia, DEPLOYER).unwrap();

        // then
        assert_eq!(ctor.usdc, generated_abi::networks::BASE_SEPOLIA_USDC);
        assert_eq!(ctor.vrf_coordinator, BASE_SEPOLIA_VRF_COORDINATOR);
        assert_eq!(ctor.key_hash, BASE_SEPOLIA_KEY_HASH);
        assert_eq!(ctor.subscription_id, U256::from(1));
        assert_eq!(ctor.genesis_referrer, DEPLOYER);
    }

    #[test]
    fn constructor_args__mainnet_requires_vrf_settings() {
        let err = constructor_args(&args(&["--mainnet"]), Network::BaseMainnet, DEPLOYER)
            .unwrap_err();
        assert!(err.to_string().contains("--vrf-coordinator"));
    }

    #[test]
    fn constructor_args__flags_override_defaults() {
        let args = args(&[
            "--mainnet",
            "--vrf-coordinator",
            "0x00000000000000000000000000000000000000c0",
            "--key-hash",
            "0x0000000000000000000000000000000000000000000000000000000000000001",
            "--subscription-id",
            "77",
            "--genesis-referrer",
            "0x00000000000000000000000000000000000000aa",
        ]);
        let ctor = constructor_args(&args, Network::BaseMainnet, DEPLOYER).unwrap();
        assert_eq!(ctor.usdc, generated_abi::networks::BASE_MAINNET_USDC);
        assert_eq!(
            ctor.vrf_coordinator,
            address!("00000000000000000000000000000000000000c0")
        );
        assert_eq!(ctor.key_hash, B256::with_last_byte(1));
        assert_eq!(ctor.subscription_id, U256::from(77));
        assert_eq!(
            ctor.genesis_referrer,
            address!("00000000000000000000000000000000000000aa")
        );
    }

    #[test]
    fn constructor_args__encode_is_five_words() {
        let ctor = constructor_args(&args(&["--local"]), Network::Local, DEPLOYER).unwrap();
        let encoded = ctor.encode();
        assert_eq!(encoded.len(), 5 * 32);
        assert_eq!(&encoded[4 * 32 + 12..], DEPLOYER.as_slice());
    }

    #[test]
    fn status_contract__flag_beats_store() {
        let root = std::env::temp_dir().join(format!("skylines-deploy-status-{}", std::process::id()));
        let store = DeploymentStore::in_root(&root, DeploymentEnv::Local).unwrap();
        let args = args(&["--local", "--contract", "0x00000000000000000000000000000000000000bb"]);
        assert_eq!(
            status_contract(&args, &store).unwrap(),
            address!("00000000000000000000000000000000000000bb")
        );
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn status_contract__empty_store__errors() {
        let root = std::env::temp_dir().join(format!("skylines-deploy-empty-{}", std::process::id()));
        let store = DeploymentStore::in_root(&root, DeploymentEnv::Local).unwrap();
        assert!(status_contract(&args(&["--local"]), &store).is_err());
        let _ = std::fs::remove_dir_all(&root);
    }
}

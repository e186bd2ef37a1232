use alloy::primitives::{
    Address,
    B256,
    address,
    b256,
};
use std::fmt;

pub const BASE_MAINNET_CHAIN_ID: u64 = 8453;
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;
pub const LOCAL_CHAIN_ID: u64 = 31337;

pub const DEFAULT_MAINNET_RPC_URL: &str = "https://mainnet.base.org";
pub const DEFAULT_SEPOLIA_RPC_URL: &str = "https://sepolia.base.org";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:8545";

pub const BASE_MAINNET_USDC: Address =
    address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
pub const BASE_SEPOLIA_USDC: Address =
    address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// Chainlink VRF coordinator on Base Sepolia.
pub const BASE_SEPOLIA_VRF_COORDINATOR: Address =
    address!("5C210eF41CD1a72de73bF76eC39637bB0d3d7BEE");

/// 30 gwei key hash lane on Base Sepolia.
pub const BASE_SEPOLIA_KEY_HASH: B256 =
    b256!("9e1344a1247c8a1785d0a4681a27152bffdb43666ae5bf7d14d24a5efd44bf71");

pub const DEFAULT_VRF_SUBSCRIPTION_ID: u64 = 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Network {
    BaseMainnet,
    BaseSepolia,
    Local,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContractAddresses {
    pub refboom: Address,
    pub usdc: Address,
}

impl ContractAddresses {
    /// A zero lottery address means nothing has been deployed for the network yet.
    pub fn is_deployed(&self) -> bool {
        !self.refboom.is_zero()
    }
}

impl Network {
    pub const ALL: [Network; 3] =
        [Network::BaseMainnet, Network::BaseSepolia, Network::Local];

    pub fn chain_id(self) -> u64 {
        match self {
            Network::BaseMainnet => BASE_MAINNET_CHAIN_ID,
            Network::BaseSepolia => BASE_SEPOLIA_CHAIN_ID,
            Network::Local => LOCAL_CHAIN_ID,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Network> {
        Network::ALL.into_iter().find(|n| n.chain_id() == chain_id)
    }

    /// Resolves the network whose address table applies to `chain_id`.
    /// Anything other than Base mainnet or a local node reads from Base Sepolia.
    pub fn for_chain_id_or_default(chain_id: u64) -> Network {
        Network::from_chain_id(chain_id).unwrap_or(Network::BaseSepolia)
    }

    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Network::BaseMainnet => DEFAULT_MAINNET_RPC_URL,
            Network::BaseSepolia => DEFAULT_SEPOLIA_RPC_URL,
            Network::Local => DEFAULT_LOCAL_RPC_URL,
        }
    }

    pub fn addresses(self) -> ContractAddresses {
        match self {
            Network::BaseMainnet => ContractAddresses {
                refboom: Address::ZERO,
                usdc: BASE_MAINNET_USDC,
            },
            Network::BaseSepolia | Network::Local => ContractAddresses {
                refboom: Address::ZERO,
                usdc: BASE_SEPOLIA_USDC,
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Network::BaseMainnet => "Base Mainnet",
            Network::BaseSepolia => "Base Sepolia",
            Network::Local => "Local",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

pub fn explorer_for_chain(chain_id: u64) -> &'static str {
    if chain_id == BASE_MAINNET_CHAIN_ID {
        "https://basescan.org"
    } else {
        "https://sepolia.basescan.org"
    }
}

pub fn chain_label(chain_id: u64) -> String {
    match chain_id {
        BASE_SEPOLIA_CHAIN_ID => "Base Sepolia".to_string(),
        BASE_MAINNET_CHAIN_ID => "Base Mainnet".to_string(),
        other => format!("Chain {other}"),
    }
}

pub fn tx_url(chain_id: u64, tx_hash: &B256) -> String {
    format!("{}/tx/{tx_hash}", explorer_for_chain(chain_id))
}

pub fn address_url(chain_id: u64, address: &Address) -> String {
    format!("{}/address/{address}", explorer_for_chain(chain_id))
}

//! Contract bindings for the FortuneSkylines lottery and the stablecoin it collects,
//! plus the per-network address table shared by the client and the deploy tool.

use alloy::{
    primitives::U256,
    sol,
};

pub mod networks;

pub use networks::{
    ContractAddresses,
    Network,
};

pub mod refboom_types {
    use super::*;

    sol! {
        #[sol(rpc)]
        #[derive(Debug)]
        contract RefBoom {
            event Joined(address indexed user, address indexed referrer);
            event WinnerSelected(address indexed winner, uint256 amount);

            constructor(
                address usdc,
                address vrfCoordinator,
                bytes32 keyHash,
                uint256 subscriptionId,
                address genesisReferrer
            );

            function owner() external view returns (address);
            function getPrizePool() external view returns (uint256);
            function totalUsers() external view returns (uint256);
            function winnerSelected() external view returns (bool);
            function winner() external view returns (address);
            function prizeAmount() external view returns (uint256);
            function hasJoined(address user) external view returns (bool);
            function dailyReferrals(address referrer, uint256 day) external view returns (uint256);
            function genesisReferrer() external view returns (address);
            function sorteoTriggered() external view returns (bool);
            function requestId() external view returns (uint256);

            function join(address referrer) external;
            function selectWinner() external;
            function completeWinnerPayment() external;
        }
    }
}

pub mod erc20_types {
    use super::*;

    sol! {
        #[sol(rpc)]
        #[derive(Debug)]
        contract Erc20 {
            function approve(address spender, uint256 amount) external returns (bool);
            function allowance(address owner, address spender) external view returns (uint256);
            function balanceOf(address account) external view returns (uint256);
        }
    }
}

/// Decimals of the entry-fee stablecoin.
pub const TOKEN_DECIMALS: u32 = 6;

/// Standard entry fee in whole tokens.
pub const ENTRY_FEE_TOKENS: u64 = 100;

/// Discounted entry fee for early participants invited by the genesis referrer.
pub const GENESIS_ENTRY_FEE_TOKENS: u64 = 75;

/// The discount applies while fewer than this many participants have joined.
pub const GENESIS_DISCOUNT_SLOTS: u64 = 50;

/// Participant count at which the prize pool is considered full.
pub const PARTICIPANT_TARGET: u64 = 1000;

/// Contract-enforced cap on referrals per referrer per day.
pub const MAX_DAILY_REFERRALS: u64 = 20;

pub fn token_unit() -> U256 {
    U256::from(10u64).pow(U256::from(TOKEN_DECIMALS))
}

pub fn entry_fee() -> U256 {
    U256::from(ENTRY_FEE_TOKENS) * token_unit()
}

pub fn genesis_entry_fee() -> U256 {
    U256::from(GENESIS_ENTRY_FEE_TOKENS) * token_unit()
}

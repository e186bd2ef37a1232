pub use generated_abi::{
    ContractAddresses,
    Network,
    erc20_types,
    refboom_types,
};

pub mod admin;
pub mod chain;
pub mod config;
pub mod errors;
pub mod history;
pub mod join;
pub mod notifications;
pub mod reader;
pub mod referral;
pub mod units;
pub mod wallets;

#[cfg(test)]
mod test_chain;

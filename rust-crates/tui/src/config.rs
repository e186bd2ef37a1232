//! Environment fallbacks and polling cadence.

use generated_abi::Network;
use std::time::Duration;

pub const RPC_URL_ENV: &str = "BASE_RPC_URL";
pub const PROJECT_ID_ENV: &str = "WALLETCONNECT_PROJECT_ID";
pub const DEFAULT_PROJECT_ID: &str = "d697bc0bcacaa059d8ee82e1367571a2";
pub const APP_NAME: &str = "FortuneSkylines Lottery";
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";

pub const DEFAULT_CONTRACT_POLL: Duration = Duration::from_secs(5);
pub const DEFAULT_USER_POLL: Duration = Duration::from_secs(30);
pub const DEFAULT_RECEIPT_POLL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollIntervals {
    /// Contract data, winner event and live joins.
    pub contract: Duration,
    /// Per-account status and referrals; slower to spare the RPC quota.
    pub user: Duration,
    pub receipt: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            contract: DEFAULT_CONTRACT_POLL,
            user: DEFAULT_USER_POLL,
            receipt: DEFAULT_RECEIPT_POLL,
        }
    }
}

/// Reads `key`, treating unset and blank values alike.
pub fn env_or(key: &str, fallback: &str) -> String {
    non_blank(std::env::var(key).ok()).unwrap_or_else(|| fallback.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Explicit flag first, then `BASE_RPC_URL` for the public Base networks,
/// then the network default. A local node never picks up the env override.
pub fn resolve_rpc_url(network: Network, flag: Option<&str>) -> String {
    resolve_rpc_url_with(network, flag, std::env::var(RPC_URL_ENV).ok())
}

fn resolve_rpc_url_with(network: Network, flag: Option<&str>, env: Option<String>) -> String {
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

pub fn project_id() -> String {
    env_or(PROJECT_ID_ENV, DEFAULT_PROJECT_ID)
}

use crate::{
    chain::LotteryChain,
    units::{
        format_token_amount,
        progress_percent,
    },
};
use alloy::primitives::{
    Address,
    U256,
};
use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::Result;
use std::sync::Arc;
use tracing::warn;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContractData {
    pub deployed: bool,
    pub prize_pool: U256,
    pub total_users: U256,
    pub winner_selected: bool,
    pub winner: Address,
    pub prize_amount: U256,
    pub latest_block: u64,
}

impl ContractData {
    pub fn prize_pool_display(&self) -> String {
        format_token_amount(self.prize_pool)
    }

    pub fn prize_amount_display(&self) -> String {
        format_token_amount(self.prize_amount)
    }

    pub fn progress(&self) -> f64 {
        progress_percent(self.total_users)
    }

    /// A winner is only announced once the flag is set and the address is real.
    pub fn has_winner(&self) -> bool {
        self.winner_selected && !self.winner.is_zero()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserStatus {
    pub account: Address,
    pub has_joined: bool,
    pub referrals_today: U256,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminStatus {
    pub owner: Address,
    pub sorteo_triggered: bool,
    pub request_id: U256,
}

impl AdminStatus {
    /// Display gating only; the contract enforces ownership on every write.
    pub fn is_admin(&self, account: Option<Address>) -> bool {
        is_admin(self.owner, account)
    }
}

pub fn is_admin(owner: Address, account: Option<Address>) -> bool {
    match account {
        Some(account) => !owner.is_zero() && owner == account,
        None => false,
    }
}

/// Day index used by the contract's per-day referral counters.
pub fn unix_day(now: DateTime<Utc>) -> u64 {
    (now.timestamp().max(0) / SECONDS_PER_DAY) as u64
}

fn keep_previous<T>(slot: &mut T, fresh: Result<T>, what: &'static str) {
    match fresh {
        Ok(value) => *slot = value,
        Err(err) => warn!(?err, read = what, "contract read failed; keeping last value"),
    }
}

pub struct ContractReader<C> {
    chain: Arc<C>,
    cached: ContractData,
}

impl<C: LotteryChain> ContractReader<C> {
    pub fn new(chain: Arc<C>) -> Self {
        let deployed = !chain.lottery_address().is_zero();
        Self {
            chain,
            cached: ContractData {
                deployed,
                ..ContractData::default()
            },
        }
    }

    pub async fn refresh(&mut self) -> &ContractData {
        if !self.cached.deployed {
            return &self.cached;
        }
        let chain = &self.chain;
        let data = &mut self.cached;
        keep_previous(&mut data.latest_block, chain.latest_block().await, "latest_block");
        keep_previous(&mut data.prize_pool, chain.prize_pool().await, "getPrizePool");
        keep_previous(&mut data.total_users, chain.total_users().await, "totalUsers");
        keep_previous(
            &mut data.winner_selected,
            chain.winner_selected().await,
            "winnerSelected",
        );
        if data.winner_selected {
            keep_previous(&mut data.winner, chain.winner().await, "winner");
            keep_previous(&mut data.prize_amount, chain.prize_amount().await, "prizeAmount");
        }
        &self.cached
    }
}

pub struct UserStatusReader<C> {
    chain: Arc<C>,
    cached: Option<UserStatus>,
}

impl<C: LotteryChain> UserStatusReader<C> {
    pub fn new(chain: Arc<C>) -> Self {
        Self {
            chain,
            cached: None,
        }
    }

    pub async fn refresh(&mut self, now: DateTime<Utc>) -> Option<&UserStatus> {
        let account = self.chain.account()?;
        if self.chain.lottery_address().is_zero() {
            return None;
        }
        let status = self.cached.get_or_insert(UserStatus {
            account,
            has_joined: false,
            referrals_today: U256::ZERO,
        });
        keep_previous(
            &mut status.has_joined,
            self.chain.has_joined(account).await,
            "hasJoined",
        );
        keep_previous(
            &mut status.referrals_today,
            self.chain.daily_referrals(account, unix_day(now)).await,
            "dailyReferrals",
        );
        Some(&*status)
    }
}

pub struct AdminReader<C> {
    chain: Arc<C>,
    cached: AdminStatus,
}

impl<C: LotteryChain> AdminReader<C> {
    pub fn new(chain: Arc<C>) -> Self {
        Self {
            chain,
            cached: AdminStatus::default(),
        }
    }

    pub async fn refresh(&mut self) -> Option<&AdminStatus> {
        self.chain.account()?;
        if self.chain.lottery_address().is_zero() {
            return None;
        }
        let status = &mut self.cached;
        keep_previous(&mut status.owner, self.chain.owner().await, "owner");
        keep_previous(
            &mut status.sorteo_triggered,
            self.chain.sorteo_triggered().await,
            "sorteoTriggered",
        );
        keep_previous(&mut status.request_id, self.chain.request_id().await, "requestId");
        Some(&self.cached)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_chain::{
        FakeChain,
        addr,
    };
    use chrono::TimeZone;

    #[tokio::test]
    async fn refresh__not_deployed__issues_no_reads() {
        // given
        let chain = FakeChain::new(None);
        chain.with(|s| s.lottery = Address::ZERO);
        let mut reader = ContractReader::new(Arc::new(chain.clone()));

        // when
        let data = reader.refresh().await.clone();

        // then
        assert!(!data.deployed);
        assert!(chain.with(|s| s.reads.is_empty()));
    }

    #[tokio::test]
    async fn refresh__winner_not_selected__skips_winner_reads() {
        // given
        let chain = FakeChain::new(None);
        chain.with(|s| {
            s.prize_pool = U256::from(70_000_000u64);
            s.total_users = U256::from(3u64);
        });
        let mut reader = ContractReader::new(Arc::new(chain.clone()));

        // when
        let data = reader.refresh().await.clone();

        // then
        assert_eq!(data.prize_pool_display(), "70");
        assert_eq!(data.total_users, U256::from(3u64));
        let reads = chain.with(|s| s.reads.clone());
        assert!(!reads.contains(&"winner"));
        assert!(!reads.contains(&"prize_amount"));
    }

    #[tokio::test]
    async fn refresh__winner_selected__reads_winner_and_prize() {
        // given
        let chain = FakeChain::new(None);
        chain.with(|s| {
            s.winner_selected = true;
            s.winner = addr(0x42);
            s.prize_amount = U256::from(1_500_000u64);
        });
        let mut reader = ContractReader::new(Arc::new(chain.clone()));

        // when
        let data = reader.refresh().await.clone();

        // then
        assert!(data.has_winner());
        assert_eq!(data.winner, addr(0x42));
        assert_eq!(data.prize_amount_display(), "1.5");
    }

    #[tokio::test]
    async fn refresh__read_failure__keeps_previous_values() {
        // given
        let chain = FakeChain::new(None);
        chain.with(|s| s.total_users = U256::from(7u64));
        let mut reader = ContractReader::new(Arc::new(chain.clone()));
        reader.refresh().await;

        // when
        chain.with(|s| {
            s.fail_reads = true;
            s.total_users = U256::from(8u64);
        });
        let data = reader.refresh().await.clone();

        // then
        assert_eq!(data.total_users, U256::from(7u64));
    }

    #[tokio::test]
    async fn user_status__without_wallet__is_none() {
        let chain = FakeChain::new(None);
        let mut reader = UserStatusReader::new(Arc::new(chain));
        assert!(reader.refresh(Utc::now()).await.is_none());
    }

    #[tokio::test]
    async fn user_status__reads_todays_referral_counter() {
        // given
        let me = addr(0x11);
        let chain = FakeChain::new(Some(me));
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let day = unix_day(now);
        chain.with(|s| {
            s.joined.insert(me);
            s.daily_referrals.insert((me, day), U256::from(4u64));
            s.daily_referrals.insert((me, day - 1), U256::from(9u64));
        });
        let mut reader = UserStatusReader::new(Arc::new(chain));

        // when
        let status = reader.refresh(now).await.cloned().unwrap();

        // then
        assert!(status.has_joined);
        assert_eq!(status.referrals_today, U256::from(4u64));
    }

    #[test]
    fn unix_day__floors_to_utc_day() {
        let midnight = Utc.with_ymd_and_hms(1970, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(unix_day(midnight), 1);
        assert_eq!(unix_day(midnight - chrono::Duration::seconds(1)), 0);
    }

    #[test]
    fn is_admin__compares_addresses_exactly() {
        let owner = addr(0x01);
        assert!(is_admin(owner, Some(owner)));
        assert!(!is_admin(owner, Some(addr(0x02))));
        assert!(!is_admin(owner, None));
        assert!(!is_admin(Address::ZERO, Some(Address::ZERO)));
    }
}

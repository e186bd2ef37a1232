use crate::chain::{
    JoinedLog,
    LotteryChain,
};
use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::Result;
use futures::future::join_all;
use itertools::Itertools;
use std::collections::HashMap;
use tracing::{
    debug,
    warn,
};

pub const RECENT_LOOKBACK_BLOCKS: u64 = 1_000;
pub const REFERRALS_LOOKBACK_BLOCKS: u64 = 50_000;
pub const WINNER_LOOKBACK_BLOCKS: u64 = 100_000;
pub const DEFAULT_RECENT_LIMIT: usize = 10;
pub const DASHBOARD_RECENT_LIMIT: usize = 20;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Participant {
    pub user: Address,
    pub referrer: Address,
    pub block_number: u64,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct RecentParticipants {
    limit: usize,
    entries: Vec<Participant>,
    next_block: Option<u64>,
}

impl Default for RecentParticipants {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_LIMIT)
    }
}

impl RecentParticipants {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: Vec::new(),
            next_block: None,
        }
    }

    pub fn entries(&self) -> &[Participant] {
        &self.entries
    }

    pub async fn bootstrap<C: LotteryChain>(&mut self, chain: &C) -> Result<()> {
        let latest = chain.latest_block().await?;
        let from = latest.saturating_sub(RECENT_LOOKBACK_BLOCKS);
        let logs = chain.joined_logs(from, latest, None).await?;
        debug!(from, to = latest, found = logs.len(), "bootstrapping recent joins");

        let logs: Vec<JoinedLog> = newest_first(logs)
            .into_iter()
            .filter(|log| !log.user.is_zero())
            .collect();
        let blocks: Vec<u64> = logs
            .iter()
            .map(|log| log.block_number.unwrap_or(latest))
            .unique()
            .collect();
        let stamps: HashMap<u64, DateTime<Utc>> =
            join_all(blocks.into_iter().map(|block_number| async move {
                let joined_at = match chain.block_timestamp(block_number).await {
                    Ok(secs) => timestamp(secs),
                    Err(err) => {
                        warn!(?err, block_number, "block timestamp unavailable");
                        Utc::now()
                    }
                };
                (block_number, joined_at)
            }))
            .await
            .into_iter()
            .collect();

        let found = logs
            .into_iter()
            .map(|log| {
                let block_number = log.block_number.unwrap_or(latest);
                Participant {
                    user: log.user,
                    referrer: log.referrer,
                    block_number,
                    joined_at: stamps.get(&block_number).copied().unwrap_or_else(Utc::now),
                }
            })
            .collect();
        self.entries = dedupe_and_cap(found, self.limit);
        self.next_block = Some(latest + 1);
        Ok(())
    }

    /// Pulls joins mined since the last scan. Returns whether the list changed.
    pub async fn poll_live<C: LotteryChain>(
        &mut self,
        chain: &C,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let latest = chain.latest_block().await?;
        let from = self.next_block.unwrap_or(latest);
        if from > latest {
            return Ok(false);
        }
        let logs = chain.joined_logs(from, latest, None).await?;
        self.next_block = Some(latest + 1);
        Ok(self.merge_live(logs, now))
    }

    /// Prepends freshly observed joins, stamped with `now`.
    pub fn merge_live(
        &mut self,
        logs: impl IntoIterator<Item = JoinedLog>,
        now: DateTime<Utc>,
    ) -> bool {
        let fresh: Vec<Participant> = newest_first(logs.into_iter().collect())
            .into_iter()
            .filter(|log| !log.user.is_zero())
            .map(|log| Participant {
                user: log.user,
                referrer: log.referrer,
                block_number: log.block_number.unwrap_or_default(),
                joined_at: now,
            })
            .collect();
        if fresh.is_empty() {
            return false;
        }
        let merged = fresh.into_iter().chain(self.entries.drain(..)).collect();
        self.entries = dedupe_and_cap(merged, self.limit);
        true
    }
}

fn newest_first(mut logs: Vec<JoinedLog>) -> Vec<JoinedLog> {
    logs.reverse();
    logs.sort_by(|a, b| b.block_number.cmp(&a.block_number));
    logs
}

fn dedupe_and_cap(entries: Vec<Participant>, limit: usize) -> Vec<Participant> {
    entries
        .into_iter()
        .unique_by(|p| p.user)
        .take(limit)
        .collect()
}

fn timestamp(secs: u64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs as i64, 0).unwrap_or_default()
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReferralInfo {
    pub user: Address,
    pub tx_hash: Option<TxHash>,
    pub block_number: Option<u64>,
}

pub async fn load_referrals<C: LotteryChain>(
    chain: &C,
    account: Address,
) -> Result<Vec<ReferralInfo>> {
    let latest = chain.latest_block().await?;
    let from = latest.saturating_sub(REFERRALS_LOOKBACK_BLOCKS);
    let logs = chain.joined_logs(from, latest, Some(account)).await?;
    Ok(newest_first(logs)
        .into_iter()
        .filter(|log| !log.user.is_zero())
        .map(|log| ReferralInfo {
            user: log.user,
            tx_hash: log.tx_hash,
            block_number: log.block_number,
        })
        .collect())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WinnerEvent {
    pub winner: Address,
    pub amount: U256,
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

pub async fn latest_winner_event<C: LotteryChain>(chain: &C) -> Result<Option<WinnerEvent>> {
    let latest = chain.latest_block().await?;
    let from = latest.saturating_sub(WINNER_LOOKBACK_BLOCKS);
    let logs = chain.winner_logs(from, latest).await?;
    let newest = logs.into_iter().rev().find_map(|log| match log.tx_hash {
        Some(tx_hash) => Some(WinnerEvent {
            winner: log.winner,
            amount: log.amount,
            tx_hash,
            block_number: log.block_number,
        }),
        None => {
            warn!(winner = %log.winner, "WinnerSelected log without transaction hash");
            None
        }
    });
    Ok(newest)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        chain::WinnerLog,
        test_chain::{
            FakeChain,
            addr,
            joined,
        },
    };
    use alloy::primitives::B256;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn bootstrap__scans_lookback_window_newest_first() {
        // given
        let chain = FakeChain::new(None);
        chain.with(|s| {
            s.joined_logs = vec![
                joined(addr(1), addr(9), 3_900),
                joined(addr(2), addr(9), 4_100),
                joined(addr(3), addr(9), 4_900),
            ];
        });
        let mut recent = RecentParticipants::default();

        // when
        recent.bootstrap(&chain).await.unwrap();

        // then
        let users: Vec<_> = recent.entries().iter().map(|p| p.user).collect();
        assert_eq!(users, vec![addr(3), addr(2)]);
        assert_eq!(
            recent.entries()[0].joined_at.timestamp(),
            1_700_000_000 + 4_900 * 2
        );
    }

    #[tokio::test]
    async fn bootstrap__reads_each_block_timestamp_once() {
        // given
        let chain = FakeChain::new(None);
        chain.with(|s| {
            s.joined_logs = vec![
                joined(addr(1), addr(9), 4_500),
                joined(addr(2), addr(9), 4_500),
                joined(addr(3), addr(9), 4_600),
                joined(addr(4), addr(9), 4_500),
            ];
        });
        let mut recent = RecentParticipants::default();

        // when
        recent.bootstrap(&chain).await.unwrap();

        // then
        let timestamp_reads = chain.with(|s| {
            s.reads.iter().filter(|name| *name == &"block_timestamp").count()
        });
        assert_eq!(timestamp_reads, 2);
        let users: Vec<_> = recent.entries().iter().map(|p| p.user).collect();
        assert_eq!(users, vec![addr(3), addr(4), addr(2), addr(1)]);
        assert_eq!(
            recent.entries()[1].joined_at.timestamp(),
            1_700_000_000 + 4_500 * 2
        );
    }

    #[tokio::test]
    async fn bootstrap__dedupes_and_truncates() {
        // given
        let chain = FakeChain::new(None);
        chain.with(|s| {
            s.joined_logs = vec![
                joined(addr(1), addr(9), 4_500),
                joined(addr(2), addr(9), 4_600),
                joined(addr(1), addr(9), 4_700),
                joined(addr(3), addr(9), 4_800),
            ];
        });
        let mut recent = RecentParticipants::new(2);

        // when
        recent.bootstrap(&chain).await.unwrap();

        // then
        let users: Vec<_> = recent.entries().iter().map(|p| p.user).collect();
        assert_eq!(users, vec![addr(3), addr(1)]);
        assert_eq!(recent.entries()[1].block_number, 4_700);
    }

    #[tokio::test]
    async fn poll_live__prepends_new_joins_after_cursor() {
        // given
        let chain = FakeChain::new(None);
        chain.with(|s| s.joined_logs = vec![joined(addr(1), addr(9), 4_990)]);
        let mut recent = RecentParticipants::default();
        recent.bootstrap(&chain).await.unwrap();

        // when
        chain.with(|s| {
            s.latest_block = 5_010;
            s.joined_logs.push(joined(addr(2), addr(9), 5_005));
        });
        let now = Utc::now();
        let changed = recent.poll_live(&chain, now).await.unwrap();

        // then
        assert!(changed);
        let entries = recent.entries();
        assert_eq!(entries[0].user, addr(2));
        assert_eq!(entries[0].joined_at, now);
        assert_eq!(entries[1].user, addr(1));
    }

    #[tokio::test]
    async fn poll_live__no_new_blocks__is_unchanged() {
        let chain = FakeChain::new(None);
        let mut recent = RecentParticipants::default();
        recent.bootstrap(&chain).await.unwrap();
        assert!(!recent.poll_live(&chain, Utc::now()).await.unwrap());
    }

    #[test]
    fn merge_live__drops_zero_user_and_moves_rejoined_user_to_front() {
        // given
        let mut recent = RecentParticipants::default();
        let now = Utc::now();
        recent.merge_live(vec![joined(addr(1), addr(9), 10), joined(addr(2), addr(9), 11)], now);

        // when
        let changed = recent.merge_live(
            vec![joined(Address::ZERO, addr(9), 12), joined(addr(1), addr(9), 13)],
            now,
        );

        // then
        assert!(changed);
        let users: Vec<_> = recent.entries().iter().map(|p| p.user).collect();
        assert_eq!(users, vec![addr(1), addr(2)]);
    }

    #[tokio::test]
    async fn load_referrals__only_returns_users_referred_by_account() {
        // given
        let me = addr(0x11);
        let chain = FakeChain::new(Some(me));
        chain.with(|s| {
            s.joined_logs = vec![
                joined(addr(1), me, 4_000),
                joined(addr(2), addr(0x22), 4_001),
                joined(Address::ZERO, me, 4_002),
                joined(addr(3), me, 4_003),
            ];
        });

        // when
        let referrals = load_referrals(&chain, me).await.unwrap();

        // then
        let users: Vec<_> = referrals.iter().map(|r| r.user).collect();
        assert_eq!(users, vec![addr(3), addr(1)]);
    }

    #[tokio::test]
    async fn latest_winner_event__prefers_newest_log_with_hash() {
        // given
        let chain = FakeChain::new(None);
        chain.with(|s| {
            s.winner_logs = vec![
                WinnerLog {
                    winner: addr(1),
                    amount: U256::from(10u64),
                    block_number: Some(4_000),
                    tx_hash: Some(B256::repeat_byte(1)),
                },
                WinnerLog {
                    winner: addr(2),
                    amount: U256::from(20u64),
                    block_number: Some(4_500),
                    tx_hash: None,
                },
            ];
        });

        // when
        let event = latest_winner_event(&chain).await.unwrap();

        // then
        let event = event.expect("a winner event");
        assert_eq!(event.winner, addr(1));
        assert_eq!(event.tx_hash, B256::repeat_byte(1));
    }

    #[tokio::test]
    async fn latest_winner_event__no_logs__is_none() {
        let chain = FakeChain::new(None);
        assert_eq!(latest_winner_event(&chain).await.unwrap(), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 10, .. ProptestConfig::default() })]
        #[test]
        fn merge_live__never_exceeds_limit_or_repeats_users(
            batches in prop::collection::vec(prop::collection::vec(0u8..8, 0..6), 1..5),
            limit in 1usize..6,
        ) {
            let mut recent = RecentParticipants::new(limit);
            let now = Utc::now();
            for (i, batch) in batches.iter().enumerate() {
                let logs = batch
                    .iter()
                    .map(|n| joined(addr(*n), addr(0xEE), i as u64))
                    .collect::<Vec<_>>();
                recent.merge_live(logs, now);
            }
            let users: HashSet<_> = recent.entries().iter().map(|p| p.user).collect();
            prop_assert!(recent.entries().len() <= limit);
            prop_assert_eq!(users.len(), recent.entries().len());
            prop_assert!(!users.contains(&Address::ZERO));
        }
    }
}

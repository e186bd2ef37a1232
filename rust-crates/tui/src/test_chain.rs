use crate::chain::{
    JoinedLog,
    LotteryChain,
    TxReceipt,
    WinnerLog,
};
use alloy::primitives::{
    Address,
    B256,
    TxHash,
    U256,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        Mutex,
    },
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Approve(U256),
    Join(Address),
    SelectWinner,
    CompleteWinnerPayment,
    WaitReceipt(TxHash),
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub account: Option<Address>,
    pub lottery: Address,
    pub chain_id: u64,
    pub latest_block: u64,
    pub prize_pool: U256,
    pub total_users: U256,
    pub winner_selected: bool,
    pub winner: Address,
    pub prize_amount: U256,
    pub owner: Address,
    pub genesis: Address,
    pub sorteo_triggered: bool,
    pub request_id: U256,
    pub joined: HashSet<Address>,
    pub daily_referrals: HashMap<(Address, u64), U256>,
    pub allowance: U256,
    pub balance: U256,
    pub joined_logs: Vec<JoinedLog>,
    pub winner_logs: Vec<WinnerLog>,
    pub calls: Vec<Call>,
    pub reads: Vec<&'static str>,
    pub fail_reads: bool,
    pub revert_approvals: bool,
    pub revert_joins: bool,
    pub send_error: Option<String>,
    next_tx: u64,
    reverted: HashSet<TxHash>,
}

#[derive(Clone, Default)]
pub struct FakeChain {
    state: Arc<Mutex<FakeState>>,
}

pub fn addr(n: u8) -> Address {
    Address::repeat_byte(n)
}

impl FakeChain {
    pub fn new(account: Option<Address>) -> Self {
        let chain = Self::default();
        chain.with(|s| {
            s.account = account;
            s.lottery = addr(0xAA);
            s.chain_id = 84532;
            s.latest_block = 5_000;
        });
        chain
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    fn read<T>(&self, name: &'static str, f: impl FnOnce(&FakeState) -> T) -> Result<T> {
        self.with(|s| {
            s.reads.push(name);
            if s.fail_reads {
                return Err(eyre!("connection refused"));
            }
            Ok(f(s))
        })
    }

    fn submit(&self, call: Call, reverts: bool) -> Result<TxHash> {
        self.with(|s| {
            if let Some(message) = s.send_error.clone() {
                return Err(eyre!(message));
            }
            s.calls.push(call);
            s.next_tx += 1;
            let hash = B256::left_padding_from(&s.next_tx.to_be_bytes());
            if reverts {
                s.reverted.insert(hash);
            }
            Ok(hash)
        })
    }
}

impl LotteryChain for FakeChain {
    fn account(&self) -> Option<Address> {
        self.with(|s| s.account)
    }

    fn lottery_address(&self) -> Address {
        self.with(|s| s.lottery)
    }

    async fn chain_id(&self) -> Result<u64> {
        self.read("chain_id", |s| s.chain_id)
    }

    async fn latest_block(&self) -> Result<u64> {
        self.read("latest_block", |s| s.latest_block)
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64> {
        self.read("block_timestamp", |_| 1_700_000_000 + block * 2)
    }

    async fn prize_pool(&self) -> Result<U256> {
        self.read("prize_pool", |s| s.prize_pool)
    }

    async fn total_users(&self) -> Result<U256> {
        self.read("total_users", |s| s.total_users)
    }

    async fn winner_selected(&self) -> Result<bool> {
        self.read("winner_selected", |s| s.winner_selected)
    }

    async fn winner(&self) -> Result<Address> {
        self.read("winner", |s| s.winner)
    }

    async fn prize_amount(&self) -> Result<U256> {
        self.read("prize_amount", |s| s.prize_amount)
    }

    async fn has_joined(&self, user: Address) -> Result<bool> {
        self.read("has_joined", |s| s.joined.contains(&user))
    }

    async fn daily_referrals(&self, referrer: Address, day: u64) -> Result<U256> {
        self.read("daily_referrals", |s| {
            s.daily_referrals
                .get(&(referrer, day))
                .copied()
                .unwrap_or_default()
        })
    }

    async fn owner(&self) -> Result<Address> {
        self.read("owner", |s| s.owner)
    }

    async fn genesis_referrer(&self) -> Result<Address> {
        self.read("genesis_referrer", |s| s.genesis)
    }

    async fn sorteo_triggered(&self) -> Result<bool> {
        self.read("sorteo_triggered", |s| s.sorteo_triggered)
    }

    async fn request_id(&self) -> Result<U256> {
        self.read("request_id", |s| s.request_id)
    }

    async fn allowance(&self, _owner: Address) -> Result<U256> {
        self.read("allowance", |s| s.allowance)
    }

    async fn balance_of(&self, _account: Address) -> Result<U256> {
        self.read("balance_of", |s| s.balance)
    }

    async fn send_approve(&self, amount: U256) -> Result<TxHash> {
        let reverts = self.with(|s| s.revert_approvals);
        let hash = self.submit(Call::Approve(amount), reverts)?;
        if !reverts {
            self.with(|s| s.allowance = amount);
        }
        Ok(hash)
    }

    async fn send_join(&self, referrer: Address) -> Result<TxHash> {
        let reverts = self.with(|s| s.revert_joins);
        self.submit(Call::Join(referrer), reverts)
    }

    async fn send_select_winner(&self) -> Result<TxHash> {
        self.submit(Call::SelectWinner, false)
    }

    async fn send_complete_winner_payment(&self) -> Result<TxHash> {
        self.submit(Call::CompleteWinnerPayment, false)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt> {
        self.with(|s| {
            s.calls.push(Call::WaitReceipt(tx_hash));
            Ok(TxReceipt {
                tx_hash,
                block_number: Some(s.latest_block),
                success: !s.reverted.contains(&tx_hash),
            })
        })
    }

    async fn joined_logs(
        &self,
        from: u64,
        to: u64,
        referrer: Option<Address>,
    ) -> Result<Vec<JoinedLog>> {
        self.read("joined_logs", |s| {
            s.joined_logs
                .iter()
                .filter(|log| {
                    log.block_number
                        .map(|b| b >= from && b <= to)
                        .unwrap_or(false)
                })
                .filter(|log| referrer.is_none_or(|r| log.referrer == r))
                .cloned()
                .collect()
        })
    }

    async fn winner_logs(&self, from: u64, to: u64) -> Result<Vec<WinnerLog>> {
        self.read("winner_logs", |s| {
            s.winner_logs
                .iter()
                .filter(|log| {
                    log.block_number
                        .map(|b| b >= from && b <= to)
                        .unwrap_or(false)
                })
                .cloned()
                .collect()
        })
    }
}

pub fn joined(user: Address, referrer: Address, block: u64) -> JoinedLog {
    JoinedLog {
        user,
        referrer,
        block_number: Some(block),
        tx_hash: Some(B256::repeat_byte(block as u8)),
    }
}

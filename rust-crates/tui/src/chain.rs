use alloy::{
    eips::BlockNumberOrTag,
    primitives::{
        Address,
        TxHash,
        U256,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::types::Filter,
    signers::local::PrivateKeySigner,
    sol_types::SolEvent,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use generated_abi::{
    ContractAddresses,
    erc20_types::Erc20::{
        self,
        Erc20Instance,
    },
    refboom_types::RefBoom::{
        self,
        RefBoomInstance,
    },
};
use std::{
    future::Future,
    time::Duration,
};
use tokio::time;
use tracing::{
    debug,
    warn,
};
use url::Url;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinedLog {
    pub user: Address,
    pub referrer: Address,
    pub block_number: Option<u64>,
    pub tx_hash: Option<TxHash>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WinnerLog {
    pub winner: Address,
    pub amount: U256,
    pub block_number: Option<u64>,
    pub tx_hash: Option<TxHash>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
}

pub trait LotteryChain: Send + Sync + 'static {
    fn account(&self) -> Option<Address>;
    fn lottery_address(&self) -> Address;

    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;
    fn latest_block(&self) -> impl Future<Output = Result<u64>> + Send;
    fn block_timestamp(&self, block: u64) -> impl Future<Output = Result<u64>> + Send;

    fn prize_pool(&self) -> impl Future<Output = Result<U256>> + Send;
    fn total_users(&self) -> impl Future<Output = Result<U256>> + Send;
    fn winner_selected(&self) -> impl Future<Output = Result<bool>> + Send;
    fn winner(&self) -> impl Future<Output = Result<Address>> + Send;
    fn prize_amount(&self) -> impl Future<Output = Result<U256>> + Send;
    fn has_joined(&self, user: Address) -> impl Future<Output = Result<bool>> + Send;
    fn daily_referrals(
        &self,
        referrer: Address,
        day: u64,
    ) -> impl Future<Output = Result<U256>> + Send;
    fn owner(&self) -> impl Future<Output = Result<Address>> + Send;
    fn genesis_referrer(&self) -> impl Future<Output = Result<Address>> + Send;
    fn sorteo_triggered(&self) -> impl Future<Output = Result<bool>> + Send;
    fn request_id(&self) -> impl Future<Output = Result<U256>> + Send;

    fn allowance(&self, owner: Address) -> impl Future<Output = Result<U256>> + Send;
    fn balance_of(&self, account: Address) -> impl Future<Output = Result<U256>> + Send;

    fn send_approve(&self, amount: U256) -> impl Future<Output = Result<TxHash>> + Send;
    fn send_join(&self, referrer: Address) -> impl Future<Output = Result<TxHash>> + Send;
    fn send_select_winner(&self) -> impl Future<Output = Result<TxHash>> + Send;
    fn send_complete_winner_payment(
        &self,
    ) -> impl Future<Output = Result<TxHash>> + Send;
    fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<TxReceipt>> + Send;

    fn joined_logs(
        &self,
        from: u64,
        to: u64,
        referrer: Option<Address>,
    ) -> impl Future<Output = Result<Vec<JoinedLog>>> + Send;
    fn winner_logs(
        &self,
        from: u64,
        to: u64,
    ) -> impl Future<Output = Result<Vec<WinnerLog>>> + Send;
}

pub struct RpcChain {
    provider: DynProvider,
    lottery: RefBoomInstance<DynProvider>,
    usdc: Erc20Instance<DynProvider>,
    account: Option<Address>,
    receipt_poll: Duration,
}

impl RpcChain {
    pub fn connect(
        rpc_url: &Url,
        addresses: ContractAddresses,
        signer: Option<PrivateKeySigner>,
        receipt_poll: Duration,
    ) -> Self {
        let account = signer.as_ref().map(|s| s.address());
        let provider = match signer {
            Some(signer) => ProviderBuilder::new()
                .wallet(signer)
                .connect_http(rpc_url.clone())
                .erased(),
            None => ProviderBuilder::new().connect_http(rpc_url.clone()).erased(),
        };
        let lottery = RefBoom::new(addresses.refboom, provider.clone());
        let usdc = Erc20::new(addresses.usdc, provider.clone());
        Self {
            provider,
            lottery,
            usdc,
            account,
            receipt_poll,
        }
    }

    fn signer_account(&self) -> Result<Address> {
        self.account
            .ok_or_else(|| eyre!("No wallet connected; start the client with --wallet"))
    }
}

impl LotteryChain for RpcChain {
    fn account(&self) -> Option<Address> {
        self.account
    }

    fn lottery_address(&self) -> Address {
        *self.lottery.address()
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn latest_block(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64> {
        let found = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block))
            .await?
            .ok_or_else(|| eyre!("block {block} not found"))?;
        Ok(found.header.timestamp)
    }

    async fn prize_pool(&self) -> Result<U256> {
        Ok(self.lottery.getPrizePool().call().await?)
    }

    async fn total_users(&self) -> Result<U256> {
        Ok(self.lottery.totalUsers().call().await?)
    }

    async fn winner_selected(&self) -> Result<bool> {
        Ok(self.lottery.winnerSelected().call().await?)
    }

    async fn winner(&self) -> Result<Address> {
        Ok(self.lottery.winner().call().await?)
    }

    async fn prize_amount(&self) -> Result<U256> {
        Ok(self.lottery.prizeAmount().call().await?)
    }

    async fn has_joined(&self, user: Address) -> Result<bool> {
        Ok(self.lottery.hasJoined(user).call().await?)
    }

    async fn daily_referrals(&self, referrer: Address, day: u64) -> Result<U256> {
        Ok(self
            .lottery
            .dailyReferrals(referrer, U256::from(day))
            .call()
            .await?)
    }

    async fn owner(&self) -> Result<Address> {
        Ok(self.lottery.owner().call().await?)
    }

    async fn genesis_referrer(&self) -> Result<Address> {
        Ok(self.lottery.genesisReferrer().call().await?)
    }

    async fn sorteo_triggered(&self) -> Result<bool> {
        Ok(self.lottery.sorteoTriggered().call().await?)
    }

    async fn request_id(&self) -> Result<U256> {
        Ok(self.lottery.requestId().call().await?)
    }

    async fn allowance(&self, owner: Address) -> Result<U256> {
        Ok(self
            .usdc
            .allowance(owner, *self.lottery.address())
            .call()
            .await?)
    }

    async fn balance_of(&self, account: Address) -> Result<U256> {
        Ok(self.usdc.balanceOf(account).call().await?)
    }

    async fn send_approve(&self, amount: U256) -> Result<TxHash> {
        self.signer_account()?;
        let pending = self
            .usdc
            .approve(*self.lottery.address(), amount)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn send_join(&self, referrer: Address) -> Result<TxHash> {
        self.signer_account()?;
        let pending = self.lottery.join(referrer).send().await?;
        Ok(*pending.tx_hash())
    }

    async fn send_select_winner(&self) -> Result<TxHash> {
        self.signer_account()?;
        let pending = self.lottery.selectWinner().send().await?;
        Ok(*pending.tx_hash())
    }

    async fn send_complete_winner_payment(&self) -> Result<TxHash> {
        self.signer_account()?;
        let pending = self.lottery.completeWinnerPayment().send().await?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .wrap_err_with(|| format!("fetching receipt for {tx_hash}"))?;
            if let Some(receipt) = receipt {
                return Ok(TxReceipt {
                    tx_hash,
                    block_number: receipt.block_number,
                    success: receipt.status(),
                });
            }
            debug!(%tx_hash, "receipt not available yet");
            time::sleep(self.receipt_poll).await;
        }
    }

    async fn joined_logs(
        &self,
        from: u64,
        to: u64,
        referrer: Option<Address>,
    ) -> Result<Vec<JoinedLog>> {
        let mut filter = Filter::new()
            .address(*self.lottery.address())
            .event_signature(RefBoom::Joined::SIGNATURE_HASH)
            .from_block(from)
            .to_block(to);
        if let Some(referrer) = referrer {
            filter = filter.topic2(referrer.into_word());
        }
        let logs = self.provider.get_logs(&filter).await?;
        let decoded = logs
            .iter()
            .filter_map(|log| match log.log_decode::<RefBoom::Joined>() {
                Ok(event) => Some(JoinedLog {
                    user: event.inner.data.user,
                    referrer: event.inner.data.referrer,
                    block_number: log.block_number,
                    tx_hash: log.transaction_hash,
                }),
                Err(err) => {
                    warn!(?err, "skipping undecodable Joined log");
                    None
                }
            })
            .collect();
        Ok(decoded)
    }

    async fn winner_logs(&self, from: u64, to: u64) -> Result<Vec<WinnerLog>> {
        let filter = Filter::new()
            .address(*self.lottery.address())
            .event_signature(RefBoom::WinnerSelected::SIGNATURE_HASH)
            .from_block(from)
            .to_block(to);
        let logs = self.provider.get_logs(&filter).await?;
        let decoded = logs
            .iter()
            .filter_map(|log| match log.log_decode::<RefBoom::WinnerSelected>() {
                Ok(event) => Some(WinnerLog {
                    winner: event.inner.data.winner,
                    amount: event.inner.data.amount,
                    block_number: log.block_number,
                    tx_hash: log.transaction_hash,
                }),
                Err(err) => {
                    warn!(?err, "skipping undecodable WinnerSelected log");
                    None
                }
            })
            .collect();
        Ok(decoded)
    }
}

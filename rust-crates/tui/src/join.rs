//! Entry-fee quoting, client-side validation and the approve-then-join sequence.

use crate::{
    chain::{
        LotteryChain,
        TxReceipt,
    },
    errors::{
        friendly_error,
        report_text,
    },
    notifications::Notifier,
    units::format_token_amount,
};
use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use color_eyre::eyre::{
    Report,
    Result,
    eyre,
};
use generated_abi::{
    GENESIS_DISCOUNT_SLOTS,
    entry_fee as standard_entry_fee,
    genesis_entry_fee,
};
use std::{
    fmt,
    str::FromStr,
    sync::Arc,
};
use tracing::info;

const JOIN_TOAST: &str = "join";
const APPROVE_TOAST: &str = "approve";

/// Reasons a join is refused before anything is sent to the chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum JoinRejection {
    MissingReferrer,
    MalformedReferrer,
    InsufficientBalance { fee: U256 },
    NoWallet,
}

impl fmt::Display for JoinRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinRejection::MissingReferrer => {
                write!(f, "Please provide a valid referrer address")
            }
            JoinRejection::MalformedReferrer => write!(
                f,
                "Invalid address format. Please enter a valid Ethereum address."
            ),
            JoinRejection::InsufficientBalance { fee } => write!(
                f,
                "❌ Insufficient USDC balance. You need at least {} USDC to join.",
                format_token_amount(*fee)
            ),
            JoinRejection::NoWallet => {
                write!(f, "Connect a wallet first (start with --wallet <name>)")
            }
        }
    }
}

impl std::error::Error for JoinRejection {}

/// `0x` followed by exactly 40 hex digits.
pub fn is_well_formed_address(input: &str) -> bool {
    match input.strip_prefix("0x") {
        Some(hex) => hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

pub fn parse_referrer(input: &str) -> Result<Address, JoinRejection> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(JoinRejection::MissingReferrer);
    }
    if !is_well_formed_address(trimmed) {
        return Err(JoinRejection::MalformedReferrer);
    }
    Address::from_str(trimmed).map_err(|_| JoinRejection::MalformedReferrer)
}

/// Fee owed for joining through `referrer`. The discount needs both the genesis
/// referrer and a participant count below the discount slots.
pub fn entry_fee(
    referrer: Option<Address>,
    genesis: Option<Address>,
    total_users: U256,
) -> U256 {
    let discounted = match (referrer, genesis) {
        (Some(referrer), Some(genesis)) => {
            referrer == genesis && total_users < U256::from(GENESIS_DISCOUNT_SLOTS)
        }
        _ => false,
    };
    if discounted {
        genesis_entry_fee()
    } else {
        standard_entry_fee()
    }
}

pub fn needs_approval(allowance: U256, fee: U256) -> bool {
    allowance < fee
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinQuote {
    pub fee: U256,
    pub discounted: bool,
    pub allowance: U256,
    pub balance: U256,
    pub needs_approval: bool,
}

impl JoinQuote {
    pub fn new(
        referrer: Option<Address>,
        genesis: Option<Address>,
        total_users: U256,
        allowance: U256,
        balance: U256,
    ) -> Self {
        let fee = entry_fee(referrer, genesis, total_users);
        Self {
            fee,
            discounted: fee != standard_entry_fee(),
            allowance,
            balance,
            needs_approval: needs_approval(allowance, fee),
        }
    }

    pub fn check_balance(&self) -> Result<(), JoinRejection> {
        if self.balance < self.fee {
            return Err(JoinRejection::InsufficientBalance { fee: self.fee });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoinReceipt {
    pub approval: Option<TxReceipt>,
    pub join: TxReceipt,
}

pub struct JoinFlow<C> {
    chain: Arc<C>,
    notifier: Notifier,
    genesis: Option<Address>,
}

impl<C: LotteryChain> JoinFlow<C> {
    pub fn new(chain: Arc<C>, notifier: Notifier) -> Self {
        Self {
            chain,
            notifier,
            genesis: None,
        }
    }

    /// The genesis referrer never changes after deployment, so it is read once.
    pub async fn genesis_referrer(&mut self) -> Result<Address> {
        if let Some(genesis) = self.genesis {
            return Ok(genesis);
        }
        let genesis = self.chain.genesis_referrer().await?;
        self.genesis = Some(genesis);
        Ok(genesis)
    }

    pub async fn quote(&mut self, referrer: Option<Address>) -> Result<JoinQuote> {
        let account = self.chain.account().ok_or(JoinRejection::NoWallet)?;
        let genesis = self.genesis_referrer().await?;
        let total_users = self.chain.total_users().await?;
        let allowance = self.chain.allowance(account).await?;
        let balance = self.chain.balance_of(account).await?;
        Ok(JoinQuote::new(
            referrer,
            Some(genesis),
            total_users,
            allowance,
            balance,
        ))
    }

    /// Approves exactly the entry fee and waits for the approval to land.
    pub async fn approve(&mut self, referrer: Option<Address>) -> Result<TxReceipt> {
        let quote = self.quote(referrer).await?;
        self.notifier.loading(APPROVE_TOAST, "Approving USDC...");
        let outcome = self.send_approval(quote.fee, APPROVE_TOAST).await;
        match &outcome {
            Ok(_) => self
                .notifier
                .success(APPROVE_TOAST, "USDC approved! You can now join the lottery."),
            Err(err) => self.notifier.error(APPROVE_TOAST, describe(err)),
        }
        outcome
    }

    /// Submits `join` directly; the allowance must already cover the fee.
    pub async fn join(&mut self, referrer: Address) -> Result<TxReceipt> {
        let outcome = self.try_join(referrer).await;
        match &outcome {
            Ok(_) => self
                .notifier
                .success(JOIN_TOAST, "🎉 Successfully joined the lottery!"),
            Err(err) => self.notifier.error(JOIN_TOAST, describe(err)),
        }
        outcome
    }

    pub async fn approve_and_join(&mut self, referrer_input: &str) -> Result<JoinReceipt> {
        let outcome = self.try_approve_and_join(referrer_input).await;
        match &outcome {
            Ok(_) => self
                .notifier
                .success(JOIN_TOAST, "🎉 Successfully joined the lottery!"),
            Err(err) => self.notifier.error(JOIN_TOAST, describe(err)),
        }
        outcome
    }

    async fn try_join(&mut self, referrer: Address) -> Result<TxReceipt> {
        let quote = self.quote(Some(referrer)).await?;
        quote.check_balance()?;
        self.send_join(referrer, JOIN_TOAST).await
    }

    async fn try_approve_and_join(&mut self, referrer_input: &str) -> Result<JoinReceipt> {
        let referrer = parse_referrer(referrer_input)?;
        let quote = self.quote(Some(referrer)).await?;
        quote.check_balance()?;

        let approval = if quote.needs_approval {
            self.notifier.loading(JOIN_TOAST, "Approving USDC...");
            let receipt = self.send_approval(quote.fee, JOIN_TOAST).await?;
            self.notifier
                .loading(JOIN_TOAST, "Approval confirmed! Joining lottery now...");
            Some(receipt)
        } else {
            None
        };

        let join = self.send_join(referrer, JOIN_TOAST).await?;
        Ok(JoinReceipt { approval, join })
    }

    async fn send_approval(&self, fee: U256, toast: &'static str) -> Result<TxReceipt> {
        let tx_hash = self.chain.send_approve(fee).await?;
        info!(%tx_hash, fee = %format_token_amount(fee), "approval sent");
        self.notifier
            .loading(toast, "Approval sent! Waiting for confirmation...");
        confirmed(self.chain.wait_for_receipt(tx_hash).await?, "Approval")
    }

    async fn send_join(&self, referrer: Address, toast: &'static str) -> Result<TxReceipt> {
        let tx_hash = self.chain.send_join(referrer).await?;
        info!(%tx_hash, %referrer, "join sent");
        self.notifier.loading(toast, "Join transaction sent!");
        confirmed(self.chain.wait_for_receipt(tx_hash).await?, "Join")
    }
}

fn confirmed(receipt: TxReceipt, what: &str) -> Result<TxReceipt> {
    if !receipt.success {
        return Err(reverted(what, receipt.tx_hash));
    }
    Ok(receipt)
}

fn reverted(what: &str, tx_hash: TxHash) -> Report {
    eyre!("{what} transaction {tx_hash} failed: execution reverted")
}

/// Validation failures are shown verbatim; chain failures go through the
/// friendly-error rules.
pub fn describe(err: &Report) -> String {
    if let Some(rejection) = err.downcast_ref::<JoinRejection>() {
        return rejection.to_string();
    }
    friendly_error(&report_text(err)).message
}

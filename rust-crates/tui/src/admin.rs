use crate::{
    chain::{
        LotteryChain,
        TxReceipt,
    },
    errors::report_text,
    notifications::Notifier,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::sync::Arc;
use tracing::info;

const SELECT_TOAST: &str = "select-winner";
const PAYMENT_TOAST: &str = "complete-payment";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdminAction {
    SelectWinner,
    CompleteWinnerPayment,
}

impl AdminAction {
    pub fn label(&self) -> &'static str {
        match self {
            AdminAction::SelectWinner => "Select winner",
            AdminAction::CompleteWinnerPayment => "Complete winner payment",
        }
    }

    fn toast_key(&self) -> &'static str {
        match self {
            AdminAction::SelectWinner => SELECT_TOAST,
            AdminAction::CompleteWinnerPayment => PAYMENT_TOAST,
        }
    }

    fn sent_message(&self) -> &'static str {
        match self {
            AdminAction::SelectWinner => "Winner selection transaction sent!",
            AdminAction::CompleteWinnerPayment => "Payment completion transaction sent!",
        }
    }

    fn confirmed_message(&self) -> &'static str {
        match self {
            AdminAction::SelectWinner => {
                "🎉 Winner selection triggered! Waiting for VRF to complete..."
            }
            AdminAction::CompleteWinnerPayment => "✅ Winner payment completed!",
        }
    }

    fn failure_prefix(&self) -> &'static str {
        match self {
            AdminAction::SelectWinner => "Failed to select winner",
            AdminAction::CompleteWinnerPayment => "Failed to complete payment",
        }
    }
}

/// Owner-only writes. Nothing here checks ownership; the contract rejects
/// callers that are not the owner.
pub struct AdminActions<C> {
    chain: Arc<C>,
    notifier: Notifier,
}

impl<C: LotteryChain> AdminActions<C> {
    pub fn new(chain: Arc<C>, notifier: Notifier) -> Self {
        Self { chain, notifier }
    }

    pub async fn select_winner(&self) -> Result<TxReceipt> {
        self.run(AdminAction::SelectWinner).await
    }

    pub async fn complete_winner_payment(&self) -> Result<TxReceipt> {
        self.run(AdminAction::CompleteWinnerPayment).await
    }

    pub async fn run(&self, action: AdminAction) -> Result<TxReceipt> {
        let outcome = self.submit(action).await;
        match &outcome {
            Ok(_) => self
                .notifier
                .success(action.toast_key(), action.confirmed_message()),
            Err(err) => self.notifier.error(
                action.toast_key(),
                format!("{}: {}", action.failure_prefix(), report_text(err)),
            ),
        }
        outcome
    }

    async fn submit(&self, action: AdminAction) -> Result<TxReceipt> {
        let tx_hash = match action {
            AdminAction::SelectWinner => self.chain.send_select_winner().await?,
            AdminAction::CompleteWinnerPayment => {
                self.chain.send_complete_winner_payment().await?
            }
        };
        info!(%tx_hash, action = action.label(), "admin transaction sent");
        self.notifier.loading(action.toast_key(), action.sent_message());
        let receipt = self.chain.wait_for_receipt(tx_hash).await?;
        if !receipt.success {
            return Err(eyre!("transaction {tx_hash} reverted"));
        }
        Ok(receipt)
    }
}

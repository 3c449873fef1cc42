//! Liquid-balance transfers between holders of the same campaign.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::{CoreError, Result};
use crate::types::{Amount, SettlementStatus, TokenTransfer, TokenWallet, TransferType};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransferOutcome {
    pub from: TokenWallet,
    pub to: TokenWallet,
    pub transfer: TokenTransfer,
}

/// Move `amount` of liquid balance from `from` to `to`.
///
/// Locked balances are never touched.
pub fn transfer_tokens(from: &TokenWallet, to: &TokenWallet, amount: Amount) -> Result<TransferOutcome> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(
            "transfer must be greater than 0".to_string(),
        ));
    }
    if from.campaign_id != to.campaign_id {
        return Err(CoreError::InvalidAmount(
            "wallets belong to different campaigns".to_string(),
        ));
    }
    if from.holder == to.holder {
        return Err(CoreError::InvalidAmount(
            "cannot transfer to the same wallet".to_string(),
        ));
    }
    if from.balance < amount {
        return Err(CoreError::InsufficientBalance);
    }

    let mut sender = from.clone();
    sender.balance = from.balance - amount;

    let mut receiver = to.clone();
    receiver.balance = to.balance.checked_add(amount).ok_or(CoreError::Overflow)?;

    Ok(TransferOutcome {
        transfer: TokenTransfer {
            campaign_id: from.campaign_id,
            from: from.holder.clone(),
            to: to.holder.clone(),
            amount,
            transfer_type: TransferType::Transfer,
            status: SettlementStatus::Completed,
        },
        from: sender,
        to: receiver,
    })
}

//! Offer policy filter: evaluates PIN events against local rules and wallet
//! health.

use std::sync::Arc;

use tracing::info;

use pinfold_core::config::PolicyParams;
use pinfold_core::constants::ESTIMATED_TX_FEE;
use pinfold_core::events::PinEvent;
use pinfold_core::records::FilterDecision;
use pinfold_core::traits::LedgerReader;
use pinfold_core::types::SlotId;

/// Sequential short-circuit evaluation; the first failing check names the
/// reason code. The check order is part of the observable contract:
/// price → wallet headroom → slot liveness → profitability.
pub struct PolicyFilter {
    queries: Arc<dyn LedgerReader>,
    our_address: String,
    params: Arc<PolicyParams>,
}

impl PolicyFilter {
    pub fn new(queries: Arc<dyn LedgerReader>, our_address: &str, params: Arc<PolicyParams>) -> Self {
        Self {
            queries,
            our_address: our_address.to_string(),
            params,
        }
    }

    pub async fn evaluate(&self, event: &PinEvent) -> FilterDecision {
        let fee = ESTIMATED_TX_FEE;
        let net_profit = event.offer_price as i64 - fee as i64;
        let decision = |accepted, reason, wallet_balance| FilterDecision {
            accepted,
            reason,
            slot: event.slot,
            offer_price: event.offer_price,
            wallet_balance,
            estimated_tx_fee: fee,
            net_profit,
        };

        // 1. Price floor.
        if event.offer_price < self.params.min_price() {
            return decision(false, "price_too_low", 0);
        }

        // 2. Wallet must cover this transaction plus one more.
        let balance = self.queries.wallet_balance(&self.our_address).await;
        if balance < fee * 2 {
            return decision(false, "insufficient_xlm", balance);
        }

        // 3. The slot must still be claimable on-chain.
        if !self.slot_active(event.slot).await {
            return decision(false, "slot_not_active", balance);
        }

        // 4. Claiming must be worth the fee.
        if net_profit <= 0 {
            return decision(false, "unprofitable", balance);
        }

        info!(
            slot = event.slot,
            price = event.offer_price,
            net_profit,
            "offer accepted"
        );
        decision(true, "accepted", balance)
    }

    /// A slot is claimable when it exists, has not expired, and still has
    /// pins remaining. Unknown state counts as not claimable.
    async fn slot_active(&self, slot: SlotId) -> bool {
        if self.queries.is_slot_expired(slot).await == Some(true) {
            return false;
        }
        match self.queries.slot(slot).await {
            Some(info) => info.pins_remaining > 0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pinfold_core::records::{ParticipantInfo, SlotInfo};
    use pinfold_core::types::Amount;

    struct FixedQueries {
        balance: Amount,
        expired: bool,
        pins_remaining: u32,
    }

    #[async_trait]
    impl LedgerReader for FixedQueries {
        async fn wallet_balance(&self, _address: &str) -> Amount {
            self.balance
        }
        async fn slot(&self, slot: SlotId) -> Option<SlotInfo> {
            Some(SlotInfo {
                slot,
                cid_digest: String::new(),
                publisher: "PUB".into(),
                offer_price: 0,
                pin_qty: 3,
                pins_remaining: self.pins_remaining,
                escrow_balance: 0,
                created_at: 0,
                claimants: vec![],
            })
        }
        async fn is_slot_expired(&self, _slot: SlotId) -> Option<bool> {
            Some(self.expired)
        }
        async fn participant(&self, _address: &str) -> Option<ParticipantInfo> {
            None
        }
        async fn join_fee(&self) -> Option<Amount> {
            None
        }
        async fn stake_amount(&self) -> Option<Amount> {
            None
        }
    }

    fn filter(queries: FixedQueries, min_price: Amount) -> PolicyFilter {
        PolicyFilter::new(
            Arc::new(queries),
            "SELF",
            Arc::new(PolicyParams::new(min_price, 1_073_741_824)),
        )
    }

    fn event(price: Amount) -> PinEvent {
        PinEvent {
            slot: 1,
            cid: "QmX".into(),
            filename: "x".into(),
            gateway: "https://gw".into(),
            offer_price: price,
            pin_qty: 3,
            publisher: "PUB".into(),
            ledger_sequence: 1,
        }
    }

    /// Every check can fail at once; the first one in the fixed order names
    /// the reason.
    #[tokio::test]
    async fn first_failing_check_names_the_reason() {
        let f = filter(
            FixedQueries {
                balance: 0,
                expired: true,
                pins_remaining: 0,
            },
            1_000,
        );
        let decision = f.evaluate(&event(1)).await;
        assert!(!decision.accepted);
        assert_eq!(decision.reason, "price_too_low");

        // With the price floor cleared, the wallet check fires next.
        let decision = f.evaluate(&event(1_000_000)).await;
        assert_eq!(decision.reason, "insufficient_xlm");
    }

    #[tokio::test]
    async fn expired_slot_beats_profitability() {
        let f = filter(
            FixedQueries {
                balance: 10_000_000,
                expired: true,
                pins_remaining: 3,
            },
            100,
        );
        // The offer would also be unprofitable, but slot liveness is
        // checked first.
        let decision = f.evaluate(&event(ESTIMATED_TX_FEE)).await;
        assert_eq!(decision.reason, "slot_not_active");
    }

    #[tokio::test]
    async fn accepted_offer_carries_net_profit() {
        let f = filter(
            FixedQueries {
                balance: 10_000_000,
                expired: false,
                pins_remaining: 3,
            },
            100,
        );
        let decision = f.evaluate(&event(1_000_000)).await;
        assert!(decision.accepted);
        assert_eq!(decision.reason, "accepted");
        assert_eq!(decision.net_profit, 1_000_000 - ESTIMATED_TX_FEE as i64);
        assert_eq!(decision.wallet_balance, 10_000_000);
    }
}

//! The loyalty card and its balance invariants.
//!
//! A card holds at most [`MAX_STAMPS`] stamps; a full card is redeemable for
//! one reward, which consumes [`STAMPS_PER_REWARD`] stamps. Lifetime counters
//! are strictly historical: they only ever grow, and redemption never touches
//! them. The ledger engine is the sole writer of card state; the transition
//! helpers here return `None` instead of violating an invariant so the caller
//! can surface the matching business-rule error.

use serde::{Deserialize, Serialize};

use super::cup::CupKind;

/// Maximum stamps a card can hold.
pub const MAX_STAMPS: u8 = 9;

/// Stamps consumed by one redemption.
pub const STAMPS_PER_REWARD: u8 = 9;

/// A customer's loyalty card balance and lifetime totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoyaltyCard {
    /// Current stamps toward the next reward. Invariant: `0..=MAX_STAMPS`.
    pub stamp_count: u8,
    /// Total stamps ever collected. Monotonically non-decreasing.
    pub lifetime_stamps_collected: u64,
    /// Total grams of CO₂ saved by reusable cups. Monotonically non-decreasing.
    pub lifetime_co2_saved_grams: u64,
}

/// Customer-visible card state, derived from the balance and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    /// Collecting stamps toward a reward (`stamp_count < MAX_STAMPS`).
    Collecting,
    /// Full card, ready to redeem (`stamp_count == MAX_STAMPS`).
    Redeemable,
}

impl LoyaltyCard {
    /// A fresh card with no stamps.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stamp_count: 0,
            lifetime_stamps_collected: 0,
            lifetime_co2_saved_grams: 0,
        }
    }

    /// Derived state for the stamp/redeem state machine.
    #[must_use]
    pub const fn state(&self) -> CardState {
        if self.stamp_count >= MAX_STAMPS {
            CardState::Redeemable
        } else {
            CardState::Collecting
        }
    }

    /// The card after one stamp, or `None` if the card is already full.
    ///
    /// Increments the balance and both lifetime counters (CO₂ only for a
    /// reusable cup).
    #[must_use]
    pub const fn stamped(&self, cup_kind: CupKind) -> Option<Self> {
        if self.stamp_count >= MAX_STAMPS {
            return None;
        }
        Some(Self {
            stamp_count: self.stamp_count + 1,
            lifetime_stamps_collected: self.lifetime_stamps_collected + 1,
            lifetime_co2_saved_grams: self.lifetime_co2_saved_grams
                + cup_kind.co2_saved_grams(),
        })
    }

    /// The card after one redemption, or `None` if there are not enough stamps.
    ///
    /// Deducts [`STAMPS_PER_REWARD`] stamps; lifetime counters are historical
    /// totals and stay untouched.
    #[must_use]
    pub const fn redeemed(&self) -> Option<Self> {
        if self.stamp_count < STAMPS_PER_REWARD {
            return None;
        }
        Some(Self {
            stamp_count: self.stamp_count - STAMPS_PER_REWARD,
            lifetime_stamps_collected: self.lifetime_stamps_collected,
            lifetime_co2_saved_grams: self.lifetime_co2_saved_grams,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_card_is_collecting() {
        let card = LoyaltyCard::new();
        assert_eq!(card.stamp_count, 0);
        assert_eq!(card.state(), CardState::Collecting);
    }

    #[test]
    fn stamping_increments_balance_and_lifetime_counters() {
        let card = LoyaltyCard::new();
        let card = card.stamped(CupKind::Reusable).expect("not full");
        assert_eq!(card.stamp_count, 1);
        assert_eq!(card.lifetime_stamps_collected, 1);
        assert_eq!(card.lifetime_co2_saved_grams, 15);

        let card = card.stamped(CupKind::Disposable).expect("not full");
        assert_eq!(card.stamp_count, 2);
        assert_eq!(card.lifetime_stamps_collected, 2);
        assert_eq!(card.lifetime_co2_saved_grams, 15);
    }

    #[test]
    fn full_card_refuses_another_stamp() {
        let mut card = LoyaltyCard::new();
        for _ in 0..MAX_STAMPS {
            card = card.stamped(CupKind::Disposable).expect("not full yet");
        }
        assert_eq!(card.stamp_count, MAX_STAMPS);
        assert_eq!(card.state(), CardState::Redeemable);
        assert!(card.stamped(CupKind::Disposable).is_none());
    }

    #[test]
    fn redemption_needs_a_full_card_and_keeps_lifetime_totals() {
        let mut card = LoyaltyCard::new();
        for _ in 0..8 {
            card = card.stamped(CupKind::Reusable).expect("not full yet");
        }
        assert!(card.redeemed().is_none());

        card = card.stamped(CupKind::Reusable).expect("ninth stamp");
        let after = card.redeemed().expect("full card redeems");
        assert_eq!(after.stamp_count, 0);
        assert_eq!(after.state(), CardState::Collecting);
        assert_eq!(after.lifetime_stamps_collected, 9);
        assert_eq!(after.lifetime_co2_saved_grams, 135);
    }
}

//! Append-only ledger event records.
//!
//! Events are written once by the ledger engine and never updated. Stamp rows
//! for a redeemed block are purged as a batch when the redemption that consumed
//! them commits, so the visible card history resets with the balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::card::{CardState, LoyaltyCard};
use super::cup::CupKind;
use super::id::{AccountId, RewardId};

/// Unique event-log entry identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Mint a fresh random event ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for EventId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One earned stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampEvent {
    pub event_id: EventId,
    pub account_id: AccountId,
    pub cup_kind: CupKind,
    pub created_at: DateTime<Utc>,
}

/// One redeemed reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionEvent {
    pub event_id: EventId,
    pub account_id: AccountId,
    pub reward_id: RewardId,
    pub cup_kind: CupKind,
    pub created_at: DateTime<Utc>,
}

/// Read-side view of a card for the customer home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub card: LoyaltyCard,
    pub state: CardState,
}

impl From<LoyaltyCard> for CardSummary {
    fn from(card: LoyaltyCard) -> Self {
        Self {
            card,
            state: card.state(),
        }
    }
}

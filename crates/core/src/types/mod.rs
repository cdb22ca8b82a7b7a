//! Core types for the LoyalTEA loyalty ledger.
//!
//! This module provides type-safe wrappers for the domain concepts shared
//! between token issuance, terminal authentication, and the ledger engine.

pub mod card;
pub mod cup;
pub mod event;
pub mod id;
pub mod session;

pub use card::{CardState, LoyaltyCard, MAX_STAMPS, STAMPS_PER_REWARD};
pub use cup::{CO2_SAVED_PER_REUSABLE_CUP_GRAMS, CupKind};
pub use event::{CardSummary, EventId, RedemptionEvent, StampEvent};
pub use id::*;
pub use session::{Role, Session};

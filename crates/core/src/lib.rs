//! LoyalTEA Core - Shared types library.
//!
//! This crate provides the common types used across the LoyalTEA components:
//! - `ledger` - Token issuance, terminal authentication, and the ledger engine
//! - `integration-tests` - Cross-component scenario tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no crypto.
//! Signing, verification, and persistence live in the `ledger` crate; anything
//! here can be used from any component without pulling those concerns in.
//!
//! # Modules
//!
//! - [`types`] - ID newtypes, roles, cup kinds, the loyalty card, and event records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

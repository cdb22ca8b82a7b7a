//! Reward catalog boundary.
//!
//! The catalog is an external collaborator; the core only asks it whether a
//! reward exists at token-issuance time. [`StaticRewardCatalog`] ships the
//! café's single drink menu as the default implementation (multi-store
//! catalogs are out of scope).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use loyaltea_core::RewardId;

/// Errors from the reward catalog collaborator.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog backend could not be reached.
    #[error("reward catalog unavailable: {0}")]
    Unavailable(String),
}

/// A redeemable drink in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub name: String,
    pub description: String,
}

impl Reward {
    fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: RewardId::new(id),
            name: name.to_owned(),
            description: description.to_owned(),
        }
    }
}

/// Lookup interface for validating redemption tokens at issuance time.
#[allow(async_fn_in_trait)]
pub trait RewardCatalog {
    /// Whether `reward_id` references a currently offered reward.
    async fn lookup(&self, reward_id: &RewardId) -> Result<bool, CatalogError>;
}

/// In-process catalog holding a fixed reward list.
#[derive(Debug, Clone)]
pub struct StaticRewardCatalog {
    rewards: Vec<Reward>,
    ids: HashSet<RewardId>,
}

impl StaticRewardCatalog {
    /// Build a catalog from a reward list.
    #[must_use]
    pub fn new(rewards: Vec<Reward>) -> Self {
        let ids = rewards.iter().map(|r| r.id.clone()).collect();
        Self { rewards, ids }
    }

    /// The café's drink menu.
    #[must_use]
    pub fn cafe_menu() -> Self {
        Self::new(vec![
            Reward::new("cafe-tea", "Normal Tea", "Classic blend"),
            Reward::new("cafe-speciality-tea", "Special Tea", "Unique infusion"),
            Reward::new("double-espresso", "Double Espresso", "Strong & intense"),
            Reward::new("flat-white", "Flat White", "Smooth & bold"),
            Reward::new("americano", "Americano", "Rich and clean"),
            Reward::new("cafe-latte", "Latte", "Creamy and smooth"),
            Reward::new("cappuccino", "Cappuccino", "Foamy delight"),
            Reward::new("cafe-mocha", "Mocha", "Coffee & chocolate"),
            Reward::new("hot-chocolate", "Hot Chocolate", "Sweet & comforting"),
            Reward::new("chai-latte", "Chai Latte", "Spiced & aromatic"),
        ])
    }

    /// All offered rewards, in menu order.
    #[must_use]
    pub fn rewards(&self) -> &[Reward] {
        &self.rewards
    }
}

impl RewardCatalog for StaticRewardCatalog {
    async fn lookup(&self, reward_id: &RewardId) -> Result<bool, CatalogError> {
        Ok(self.ids.contains(reward_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn menu_contains_the_flat_white() {
        let catalog = StaticRewardCatalog::cafe_menu();
        assert!(
            catalog
                .lookup(&RewardId::new("flat-white"))
                .await
                .expect("lookup works")
        );
        assert!(
            !catalog
                .lookup(&RewardId::new("pumpkin-spice"))
                .await
                .expect("lookup works")
        );
    }

    #[test]
    fn menu_has_ten_drinks() {
        assert_eq!(StaticRewardCatalog::cafe_menu().rewards().len(), 10);
    }
}

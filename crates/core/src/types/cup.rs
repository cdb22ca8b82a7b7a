//! Cup kind and CO₂ accounting.

use serde::{Deserialize, Serialize};

/// Grams of CO₂ saved per drink served in a reusable cup.
pub const CO2_SAVED_PER_REUSABLE_CUP_GRAMS: u64 = 15;

/// Whether a purchase used a reusable or disposable vessel.
///
/// Affects CO₂-saved accounting only; a stamp is a stamp either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CupKind {
    Reusable,
    Disposable,
}

impl CupKind {
    /// Grams of CO₂ saved by serving in this cup kind.
    #[must_use]
    pub const fn co2_saved_grams(self) -> u64 {
        match self {
            Self::Reusable => CO2_SAVED_PER_REUSABLE_CUP_GRAMS,
            Self::Disposable => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reusable_cups_save_co2() {
        assert_eq!(CupKind::Reusable.co2_saved_grams(), 15);
        assert_eq!(CupKind::Disposable.co2_saved_grams(), 0);
    }
}

//! Card rarity tiers and their wire representations.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::VariantArray;

/// Rarity of a card in a booster pack.
///
/// The marketplace exchanges rarities as integers: `1..=5` for the five
/// assignable tiers and `0` for a card that has not been assigned a tier yet.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::IntoStaticStr,
    strum::VariantArray,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Rarity {
    Unassigned,
    Common,
    Rare,
    Epic,
    Legendary,
    Mythic,
}

impl From<Rarity> for u8 {
    fn from(rarity: Rarity) -> Self {
        rarity.to_wire()
    }
}

impl TryFrom<u8> for Rarity {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rarity::from_wire(value)
    }
}

impl Rarity {
    /// The five tiers a card can be assigned to, lowest first.
    pub const TIERS: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Mythic,
    ];

    /// Convert a wire integer into a rarity.
    pub fn from_wire(value: u8) -> anyhow::Result<Self> {
        match value {
            0 => Ok(Rarity::Unassigned),
            1 => Ok(Rarity::Common),
            2 => Ok(Rarity::Rare),
            3 => Ok(Rarity::Epic),
            4 => Ok(Rarity::Legendary),
            5 => Ok(Rarity::Mythic),
            other => anyhow::bail!("Invalid rarity value {}: expected 0-5", other),
        }
    }

    /// The wire integer for this rarity.
    pub fn to_wire(self) -> u8 {
        match self {
            Rarity::Unassigned => 0,
            Rarity::Common => 1,
            Rarity::Rare => 2,
            Rarity::Epic => 3,
            Rarity::Legendary => 4,
            Rarity::Mythic => 5,
        }
    }

    pub fn is_assigned(self) -> bool {
        self != Rarity::Unassigned
    }
}

impl FromStr for Rarity {
    type Err = anyhow::Error;

    /// Parse either a wire integer (`"3"`) or a tier label (`"epic"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(value) = trimmed.parse::<u8>() {
            return Self::from_wire(value);
        }

        Self::VARIANTS
            .iter()
            .copied()
            .find(|rarity| <&str>::from(*rarity).eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| anyhow::anyhow!("Unknown rarity '{}'", trimmed))
    }
}

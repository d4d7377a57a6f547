//! Token economics of a new drop and the per-deployment contract config.

use alloy_core::primitives::U256;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Rarity, abi::DropConfig};

/// Placeholder substituted with the collection slug in a base URI template.
pub const SLUG_PLACEHOLDER: &str = "{slug}";

/// Default base URI template for drop metadata.
pub const DEFAULT_BASE_URI_TEMPLATE: &str =
    "https://build.wield.xyz/vibe/boosterbox/metadata/{slug}/";

/// Decimals of the drop's token.
pub const TOKEN_DECIMALS: u8 = 18;

/// Token amounts in whole tokens, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Economics {
    pub tokens_per_mint: u64,
    pub common_offer: u64,
    pub rare_offer: u64,
    pub epic_offer: u64,
    pub legendary_offer: u64,
    pub mythic_offer: u64,
}

impl Default for Economics {
    fn default() -> Self {
        Self {
            tokens_per_mint: 100_000,
            common_offer: 20_000,
            rare_offer: 100_000,
            epic_offer: 500_000,
            legendary_offer: 2_500_000,
            mythic_offer: 10_000_000,
        }
    }
}

impl Economics {
    /// Sell-back offer for a card of `rarity`, in whole tokens.
    pub fn offer_for(&self, rarity: Rarity) -> Option<u64> {
        match rarity {
            Rarity::Unassigned => None,
            Rarity::Common => Some(self.common_offer),
            Rarity::Rare => Some(self.rare_offer),
            Rarity::Epic => Some(self.epic_offer),
            Rarity::Legendary => Some(self.legendary_offer),
            Rarity::Mythic => Some(self.mythic_offer),
        }
    }
}

/// Scale whole tokens to 18-decimal fixed point.
pub fn to_wei(whole_tokens: u64) -> U256 {
    U256::from(whole_tokens) * U256::from(10u64).pow(U256::from(TOKEN_DECIMALS))
}

/// Fixed-point economics plus the slug-specific base URI of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractConfig {
    pub tokens_per_mint: U256,
    pub common_offer: U256,
    pub rare_offer: U256,
    pub epic_offer: U256,
    pub legendary_offer: U256,
    pub mythic_offer: U256,
    #[serde(rename = "baseURI")]
    pub base_uri: String,
}

impl ContractConfig {
    /// Build the config for `slug`, which is embedded verbatim into the base URI.
    pub fn for_slug(economics: &Economics, base_uri_template: &str, slug: &str) -> Result<Self> {
        if !base_uri_template.contains(SLUG_PLACEHOLDER) {
            anyhow::bail!(
                "Base URI template '{}' does not contain {}",
                base_uri_template,
                SLUG_PLACEHOLDER
            );
        }
        if slug.trim().is_empty() {
            anyhow::bail!("Cannot build a contract config for an empty slug");
        }

        Ok(Self {
            tokens_per_mint: to_wei(economics.tokens_per_mint),
            common_offer: to_wei(economics.common_offer),
            rare_offer: to_wei(economics.rare_offer),
            epic_offer: to_wei(economics.epic_offer),
            legendary_offer: to_wei(economics.legendary_offer),
            mythic_offer: to_wei(economics.mythic_offer),
            base_uri: base_uri_template.replace(SLUG_PLACEHOLDER, slug),
        })
    }

    pub fn to_sol(&self) -> DropConfig {
        DropConfig {
            tokensPerMint: self.tokens_per_mint,
            commonOffer: self.common_offer,
            rareOffer: self.rare_offer,
            epicOffer: self.epic_offer,
            legendaryOffer: self.legendary_offer,
            mythicOffer: self.mythic_offer,
            baseURI: self.base_uri.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_wei() {
        assert_eq!(to_wei(0), U256::ZERO);
        assert_eq!(to_wei(1), U256::from(1_000_000_000_000_000_000u128));
        assert_eq!(to_wei(20_000), U256::from(20_000_000_000_000_000_000_000u128));
    }

    #[test]
    fn test_slug_embedded_in_base_uri() {
        for slug in ["geo-cards", "a", "weird_slug-123"] {
            let config =
                ContractConfig::for_slug(&Economics::default(), DEFAULT_BASE_URI_TEMPLATE, slug)
                    .unwrap();
            assert_eq!(
                config.base_uri,
                format!("https://build.wield.xyz/vibe/boosterbox/metadata/{}/", slug)
            );
        }
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        assert!(
            ContractConfig::for_slug(&Economics::default(), "https://x/metadata/", "s").is_err()
        );
        assert!(
            ContractConfig::for_slug(&Economics::default(), DEFAULT_BASE_URI_TEMPLATE, " ").is_err()
        );
    }

    #[test]
    fn test_offers_scale_per_rarity() {
        let economics = Economics::default();
        let config =
            ContractConfig::for_slug(&economics, DEFAULT_BASE_URI_TEMPLATE, "geo").unwrap();

        assert_eq!(config.mythic_offer, to_wei(economics.mythic_offer));
        assert_eq!(economics.offer_for(Rarity::Unassigned), None);
        assert_eq!(economics.offer_for(Rarity::Epic), Some(500_000));

        let sol = config.to_sol();
        assert_eq!(sol.tokensPerMint, to_wei(100_000));
        assert_eq!(sol.baseURI, config.base_uri);
    }
}

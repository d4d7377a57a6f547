//! Metadata drafts created on the marketplace ahead of the contract deployment.

use anyhow::{Context, Result};
use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};

use crate::{CollectionMetadata, ContractConfig, DraftResponse};

/// Server-issued identifier of a metadata draft. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Deref, Display)]
pub struct DraftId(String);

impl DraftId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let id = id.trim();
        if id.is_empty() {
            anyhow::bail!("Draft id cannot be empty");
        }
        Ok(Self(id.to_string()))
    }
}

/// A created draft and everything the deployer and confirmation need.
///
/// Passed by value from draft creation through deployment to confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    pub draft_id: DraftId,
    pub slug: String,
    pub metadata: CollectionMetadata,
    pub contract_config: ContractConfig,
}

impl DraftRecord {
    /// Accept a draft response, failing when it carries no `draftId`.
    pub fn from_response(
        response: DraftResponse,
        metadata: CollectionMetadata,
        contract_config: ContractConfig,
    ) -> Result<Self> {
        let draft_id = response
            .draft_id
            .context("Draft response is missing draftId")
            .and_then(DraftId::new)?;

        if let Some(slug) = response.slug.as_deref().filter(|s| *s != metadata.slug) {
            tracing::warn!(
                requested = %metadata.slug,
                returned = %slug,
                "Marketplace returned a different slug, keeping the one in the base URI"
            );
        }

        Ok(Self {
            draft_id,
            slug: metadata.slug.clone(),
            metadata,
            contract_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollectionForm, Economics, economics::DEFAULT_BASE_URI_TEMPLATE};

    fn parts() -> (CollectionMetadata, ContractConfig) {
        let form = CollectionForm {
            name: "Geo".to_string(),
            symbol: "GEO".to_string(),
            ..Default::default()
        };
        let metadata = CollectionMetadata::from_uploads(&form, "geo", &[]).unwrap();
        let config =
            ContractConfig::for_slug(&Economics::default(), DEFAULT_BASE_URI_TEMPLATE, "geo")
                .unwrap();
        (metadata, config)
    }

    #[test]
    fn test_draft_id_rejects_blank() {
        assert!(DraftId::new("  ").is_err());
        assert_eq!(DraftId::new(" d-1 ").unwrap().as_str(), "d-1");
    }

    #[test]
    fn test_from_response_requires_draft_id() {
        let (metadata, config) = parts();
        let missing = DraftResponse {
            draft_id: None,
            slug: Some("geo".into()),
        };
        let err = DraftRecord::from_response(missing, metadata.clone(), config.clone()).unwrap_err();
        assert!(err.to_string().contains("draftId"));

        let empty = DraftResponse {
            draft_id: Some(String::new()),
            slug: None,
        };
        assert!(DraftRecord::from_response(empty, metadata, config).is_err());
    }

    #[test]
    fn test_from_response_keeps_requested_slug() {
        let (metadata, config) = parts();
        let response = DraftResponse {
            draft_id: Some("draft-9".into()),
            slug: Some("geo-2".into()),
        };
        let record = DraftRecord::from_response(response, metadata, config).unwrap();
        assert_eq!(record.draft_id.to_string(), "draft-9");
        assert_eq!(record.slug, "geo");
    }
}

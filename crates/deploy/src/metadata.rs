//! Collection metadata, rarity assignments and uploadable files.

use std::collections::HashMap;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::Rarity;

/// A single card in the collection manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataItem {
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub rarity: Rarity,
    pub token_id: u64,
}

/// The metadata manifest submitted to the draft endpoint.
///
/// Built once from the user's form and the uploaded files, then treated as
/// immutable for the rest of the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub creator: Address,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    pub disable_foil: bool,
    pub disable_wear: bool,
    #[serde(rename = "isNSFW")]
    pub is_nsfw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_link: Option<String>,
    pub pack_amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Address>,
    pub metadata_items: Vec<MetadataItem>,
}

impl CollectionMetadata {
    /// Assemble the manifest from the form inputs and fully uploaded files.
    ///
    /// Token ids are assigned `1..=N` in file order.
    pub fn from_uploads(form: &CollectionForm, slug: &str, files: &[UploadedFile]) -> Result<Self> {
        let metadata_items = files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                let image_url = file
                    .uploaded_url
                    .clone()
                    .with_context(|| format!("File {} has not been uploaded", file.filename))?;
                if !file.rarity.is_assigned() {
                    anyhow::bail!("File {} has no rarity assigned", file.filename);
                }
                Ok(MetadataItem {
                    name: card_name(&file.filename),
                    description: form.description.clone(),
                    image_url,
                    rarity: file.rarity,
                    token_id: index as u64 + 1,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: form.name.clone(),
            symbol: form.symbol.clone(),
            description: form.description.clone(),
            creator: form.creator,
            slug: slug.to_string(),
            featured_image_url: form.featured_image_url.clone(),
            bg_color: form.bg_color.clone(),
            disable_foil: form.disable_foil,
            disable_wear: form.disable_wear,
            is_nsfw: form.is_nsfw,
            twitter_link: form.twitter_link.clone(),
            website_link: form.website_link.clone(),
            pack_amount: form.pack_amount,
            owner: form.owner,
            metadata_items,
        })
    }

    /// The address that will own the deployed contracts.
    pub fn effective_owner(&self) -> Address {
        self.owner.unwrap_or(self.creator)
    }
}

/// User supplied collection settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectionForm {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub creator: Address,
    pub owner: Option<Address>,
    pub featured_image_url: Option<String>,
    pub bg_color: Option<String>,
    pub disable_foil: bool,
    pub disable_wear: bool,
    pub is_nsfw: bool,
    pub twitter_link: Option<String>,
    pub website_link: Option<String>,
    pub pack_amount: u64,
}

/// A `filename,rarity` row from the rarity CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityAssignment {
    pub filename: String,
    /// Wire value, `1..=5` for a valid assignment.
    pub rarity: u8,
}

/// Parse a rarity CSV.
///
/// Each non-empty line is `filename,rarity`. A leading header row is skipped
/// when its rarity column is not a rarity. Rarity accepts the wire integer
/// or a tier label.
pub fn parse_rarity_csv(text: &str) -> Result<Vec<RarityAssignment>> {
    let mut assignments = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (filename, rarity) = line
            .rsplit_once(',')
            .with_context(|| format!("Line {}: expected 'filename,rarity'", index + 1))?;
        let filename = filename.trim().trim_matches('"');
        let rarity = rarity.trim().trim_matches('"');

        match rarity.parse::<Rarity>() {
            Ok(parsed) => assignments.push(RarityAssignment {
                filename: filename.to_string(),
                rarity: parsed.to_wire(),
            }),
            // Header row
            Err(_) if assignments.is_empty() && rarity.eq_ignore_ascii_case("rarity") => {}
            Err(_) => {
                // Keep out-of-range integers so the validator can report them.
                let value = rarity.parse::<u8>().with_context(|| {
                    format!("Line {}: invalid rarity '{}'", index + 1, rarity)
                })?;
                assignments.push(RarityAssignment {
                    filename: filename.to_string(),
                    rarity: value,
                });
            }
        }
    }

    Ok(assignments)
}

/// An image selected for the collection, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// An image paired with its rarity, optionally already uploaded.
///
/// `uploaded_url` is only set after a successful remote upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub rarity: Rarity,
    pub uploaded_url: Option<String>,
}

impl UploadedFile {
    pub fn is_uploaded(&self) -> bool {
        self.uploaded_url.is_some()
    }
}

/// Pair validated images with their CSV rarity (filenames match case-insensitively).
pub fn pair_with_rarities(
    images: Vec<ImageFile>,
    assignments: &[RarityAssignment],
) -> Result<Vec<UploadedFile>> {
    let by_name: HashMap<String, u8> = assignments
        .iter()
        .map(|a| (a.filename.to_lowercase(), a.rarity))
        .collect();

    images
        .into_iter()
        .map(|image| {
            let wire = by_name
                .get(&image.filename.to_lowercase())
                .copied()
                .with_context(|| format!("No rarity assigned to {}", image.filename))?;
            Ok(UploadedFile {
                rarity: Rarity::from_wire(wire)?,
                filename: image.filename,
                bytes: image.bytes,
                uploaded_url: None,
            })
        })
        .collect()
}

/// Derive a card name from its file name (`fire_dragon.png` -> `fire dragon`).
fn card_name(filename: &str) -> String {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);
    stem.replace(['_', '-'], " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploaded(name: &str, rarity: Rarity) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            bytes: vec![],
            rarity,
            uploaded_url: Some(format!("https://cdn.example/{}", name)),
        }
    }

    fn form() -> CollectionForm {
        CollectionForm {
            name: "Geo Cards".to_string(),
            symbol: "GEO".to_string(),
            description: "Shapes".to_string(),
            creator: Address::repeat_byte(0x11),
            pack_amount: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_csv_with_header_and_labels() {
        let csv = "filename,rarity\nA.png,1\nb.png, Mythic\n\n c.png ,3\n";
        let rows = parse_rarity_csv(csv).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], RarityAssignment { filename: "A.png".into(), rarity: 1 });
        assert_eq!(rows[1].rarity, 5);
        assert_eq!(rows[2].filename, "c.png");
    }

    #[test]
    fn test_parse_csv_keeps_out_of_range_values() {
        let rows = parse_rarity_csv("a.png,7").unwrap();
        assert_eq!(rows[0].rarity, 7);
    }

    #[test]
    fn test_parse_csv_rejects_garbage() {
        assert!(parse_rarity_csv("a.png;1").is_err());
        assert!(parse_rarity_csv("a.png,1\nb.png,sparkly").is_err());
    }

    #[test]
    fn test_from_uploads_assigns_sequential_token_ids() {
        let files = vec![uploaded("fire_dragon.png", Rarity::Rare), uploaded("b.png", Rarity::Mythic)];
        let metadata = CollectionMetadata::from_uploads(&form(), "geo-cards", &files).unwrap();

        assert_eq!(metadata.metadata_items.len(), 2);
        assert_eq!(metadata.metadata_items[0].token_id, 1);
        assert_eq!(metadata.metadata_items[0].name, "fire dragon");
        assert_eq!(metadata.metadata_items[1].token_id, 2);
        assert_eq!(metadata.slug, "geo-cards");
        assert_eq!(metadata.effective_owner(), Address::repeat_byte(0x11));
    }

    #[test]
    fn test_from_uploads_requires_urls() {
        let mut file = uploaded("a.png", Rarity::Common);
        file.uploaded_url = None;
        assert!(CollectionMetadata::from_uploads(&form(), "s", &[file]).is_err());
    }

    #[test]
    fn test_manifest_serializes_camel_case() {
        let files = vec![uploaded("a.png", Rarity::Epic)];
        let metadata = CollectionMetadata::from_uploads(&form(), "geo", &files).unwrap();
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["packAmount"], 100);
        assert_eq!(json["isNSFW"], false);
        assert_eq!(json["metadataItems"][0]["rarity"], 3);
        assert_eq!(json["metadataItems"][0]["imageUrl"], "https://cdn.example/a.png");
        assert!(json.get("owner").is_none());
    }

    #[test]
    fn test_pair_with_rarities_is_case_insensitive() {
        let images = vec![ImageFile { filename: "Card.PNG".into(), bytes: vec![1] }];
        let rows = vec![RarityAssignment { filename: "card.png".into(), rarity: 4 }];
        let paired = pair_with_rarities(images, &rows).unwrap();
        assert_eq!(paired[0].rarity, Rarity::Legendary);
        assert!(!paired[0].is_uploaded());
    }
}

//! Input validation for a collection's images and rarity CSV.
//!
//! Validation is pure: it never touches the network and reports every problem
//! it finds instead of stopping at the first one.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Cursor;

use image::ImageFormat;

use crate::{ImageFile, Rarity, RarityAssignment};

/// Minimum number of images in a collection.
pub const MIN_IMAGES: usize = 5;
/// Maximum number of images in a collection.
pub const MAX_IMAGES: usize = 1000;
/// Maximum size of a single image.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
/// Minimum image width in pixels.
pub const MIN_WIDTH: u32 = 609;
/// Minimum image height in pixels.
pub const MIN_HEIGHT: u32 = 864;

/// Outcome of validating a batch of images against a rarity CSV.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate images and their rarity assignments.
pub fn validate(images: &[ImageFile], csv: &[RarityAssignment]) -> ValidationReport {
    let mut errors = Vec::new();

    if images.len() < MIN_IMAGES {
        errors.push(format!(
            "At least {} images are required, got {}",
            MIN_IMAGES,
            images.len()
        ));
    }
    if images.len() > MAX_IMAGES {
        errors.push(format!(
            "At most {} images are allowed, got {}",
            MAX_IMAGES,
            images.len()
        ));
    }

    for image in images {
        errors.extend(check_image(image));
    }

    errors.extend(check_filenames(images, csv));
    errors.extend(check_rarities(csv));

    ValidationReport::from_errors(errors)
}

/// Size, format and dimension checks for one image.
fn check_image(image: &ImageFile) -> Vec<String> {
    let mut errors = Vec::new();

    if image.bytes.len() > MAX_IMAGE_BYTES {
        errors.push(format!(
            "{}: file is {} bytes, maximum is {} bytes (10MB)",
            image.filename,
            image.bytes.len(),
            MAX_IMAGE_BYTES
        ));
    }

    let format = match image::guess_format(&image.bytes) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)) => format,
        Ok(other) => {
            errors.push(format!(
                "{}: unsupported image type {:?}, expected PNG, JPEG or WebP",
                image.filename, other
            ));
            return errors;
        }
        Err(_) => {
            errors.push(format!(
                "{}: not a recognizable image, expected PNG, JPEG or WebP",
                image.filename
            ));
            return errors;
        }
    };

    let dimensions = image::io::Reader::with_format(Cursor::new(&image.bytes), format)
        .into_dimensions();
    match dimensions {
        Ok((width, height)) if width < MIN_WIDTH || height < MIN_HEIGHT => {
            errors.push(format!(
                "{}: image is {}x{}, minimum is {}x{}",
                image.filename, width, height, MIN_WIDTH, MIN_HEIGHT
            ));
        }
        Ok(_) => {}
        Err(e) => {
            errors.push(format!("{}: failed to decode image: {}", image.filename, e));
        }
    }

    errors
}

/// Every image needs exactly one CSV row and every CSV row needs an image.
fn check_filenames(images: &[ImageFile], csv: &[RarityAssignment]) -> Vec<String> {
    let mut errors = Vec::new();

    let image_names: HashSet<String> = images.iter().map(|i| i.filename.to_lowercase()).collect();

    let mut csv_counts: HashMap<String, usize> = HashMap::new();
    for row in csv {
        *csv_counts.entry(row.filename.to_lowercase()).or_default() += 1;
    }

    let mut seen = HashSet::new();
    for image in images {
        let key = image.filename.to_lowercase();
        if !seen.insert(key.clone()) {
            errors.push(format!("{}: duplicate image filename", image.filename));
        }
        if !csv_counts.contains_key(&key) {
            errors.push(format!("{}: no rarity assigned in CSV", image.filename));
        }
    }

    let mut reported = HashSet::new();
    for row in csv {
        let key = row.filename.to_lowercase();
        if !image_names.contains(&key) && reported.insert(key.clone()) {
            errors.push(format!("{}: listed in CSV but no matching image", row.filename));
        }
        if csv_counts.get(&key).copied().unwrap_or(0) > 1 && reported.insert(format!("dup:{key}")) {
            errors.push(format!("{}: listed more than once in CSV", row.filename));
        }
    }

    errors
}

/// The set of rarities must be exactly the five tiers.
fn check_rarities(csv: &[RarityAssignment]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut present = BTreeSet::new();

    for row in csv {
        if (1..=5).contains(&row.rarity) {
            present.insert(row.rarity);
        } else {
            errors.push(format!(
                "{}: invalid rarity {}, expected 1-5",
                row.filename, row.rarity
            ));
        }
    }

    for tier in Rarity::TIERS {
        if !present.contains(&tier.to_wire()) {
            errors.push(format!(
                "Missing rarity tier: {} ({})",
                tier,
                tier.to_wire()
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageOutputFormat};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(GrayImage::new(width, height))
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    fn image(name: &str) -> ImageFile {
        ImageFile {
            filename: name.to_string(),
            bytes: png(MIN_WIDTH, MIN_HEIGHT),
        }
    }

    fn row(name: &str, rarity: u8) -> RarityAssignment {
        RarityAssignment {
            filename: name.to_string(),
            rarity,
        }
    }

    #[test]
    fn test_check_image_accepts_minimum_size() {
        assert!(check_image(&image("a.png")).is_empty());
    }

    #[test]
    fn test_check_image_rejects_small_dimensions() {
        let small = ImageFile {
            filename: "small.png".into(),
            bytes: png(100, 100),
        };
        let errors = check_image(&small);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("100x100"));
    }

    #[test]
    fn test_check_image_rejects_unknown_format() {
        let text = ImageFile {
            filename: "notes.txt".into(),
            bytes: b"hello world".to_vec(),
        };
        assert!(check_image(&text)[0].contains("not a recognizable image"));
    }

    #[test]
    fn test_check_image_rejects_unsupported_format() {
        let gif = ImageFile {
            filename: "anim.gif".into(),
            bytes: b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec(),
        };
        let errors = check_image(&gif);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("unsupported image type Gif"), "{}", errors[0]);
    }

    #[test]
    fn test_check_image_rejects_oversized_file() {
        let mut big = image("big.png");
        big.bytes.resize(MAX_IMAGE_BYTES + 1, 0);
        let errors = check_image(&big);
        assert!(errors.iter().any(|e| e.contains("maximum is")));
    }

    #[test]
    fn test_filename_orphans_both_directions() {
        let images = vec![image("a.png"), image("B.png")];
        let csv = vec![row("b.PNG", 1), row("c.png", 2)];
        let errors = check_filenames(&images, &csv);

        assert!(errors.iter().any(|e| e.starts_with("a.png: no rarity")));
        assert!(errors.iter().any(|e| e.starts_with("c.png: listed in CSV")));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_duplicate_csv_rows_reported_once() {
        let images = vec![image("a.png")];
        let csv = vec![row("a.png", 1), row("A.png", 2)];
        let errors = check_filenames(&images, &csv);
        assert_eq!(errors, vec!["a.png: listed more than once in CSV".to_string()]);
    }

    #[test]
    fn test_rarity_set_must_be_complete() {
        let csv = vec![row("a", 1), row("b", 2), row("c", 3), row("d", 4)];
        let errors = check_rarities(&csv);
        assert_eq!(errors, vec!["Missing rarity tier: Mythic (5)".to_string()]);
    }

    #[test]
    fn test_rarity_out_of_range() {
        let csv = vec![row("a", 1), row("b", 2), row("c", 3), row("d", 4), row("e", 5), row("f", 0)];
        let errors = check_rarities(&csv);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("invalid rarity 0"));
    }

    #[test]
    fn test_too_few_images_is_reported_with_other_errors() {
        let images = vec![image("a.png")];
        let csv = vec![row("a.png", 1)];
        let report = validate(&images, &csv);

        assert!(!report.valid);
        assert!(report.errors[0].contains("At least 5 images"));
        assert!(report.errors.iter().any(|e| e.contains("Mythic")));
    }

    #[test]
    fn test_too_many_images() {
        let bytes = png(MIN_WIDTH, MIN_HEIGHT);
        let count = MAX_IMAGES + 1;
        let images: Vec<ImageFile> = (0..count)
            .map(|i| ImageFile {
                filename: format!("card{}.png", i),
                bytes: bytes.clone(),
            })
            .collect();
        let csv: Vec<RarityAssignment> = (0..count)
            .map(|i| row(&format!("card{}.png", i), (i % 5) as u8 + 1))
            .collect();

        let report = validate(&images, &csv);
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec!["At most 1000 images are allowed, got 1001".to_string()]
        );
    }
}

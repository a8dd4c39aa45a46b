//! Perceptual fingerprinting for card images.
//!
//! A fingerprint is a fixed 64-bit (8 byte) perceptual hash computed with the
//! Blockhash algorithm. It survives re-encoding, rescaling, and the moderate
//! lighting noise of photographed cards, which makes it suitable as the sole
//! similarity signal for index lookups.
//!
//! # Usage
//!
//! ```no_run
//! use cardlens_core::fingerprint::{Blockhash64Hasher, ImageHasher};
//!
//! let image_data = std::fs::read("card.png").unwrap();
//! let hasher = Blockhash64Hasher::default();
//! let fp1 = hasher.hash_bytes(&image_data).unwrap();
//! let fp2 = hasher.hash_bytes(&image_data).unwrap();
//! assert_eq!(fp1.distance(&fp2), 0);
//! ```

use blockhash::{blockhash64, Blockhash64};
use image::DynamicImage;

use crate::error::{CardlensError, Result};

/// Fixed fingerprint size in bytes (64 bits = 8 bytes).
pub const FINGERPRINT_SIZE: usize = 8;

/// A perceptual image fingerprint.
///
/// Stored and exchanged as a lowercase hexadecimal string; compared with
/// [`Fingerprint::distance`]. Two fingerprints from any two `hash_*` calls are
/// always comparable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    bytes: Vec<u8>,
}

impl Fingerprint {
    /// Create a fingerprint from fixed-size hash bytes.
    pub fn new(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Parse a fingerprint from its hexadecimal encoding.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| CardlensError::InvalidFingerprint(format!("invalid hex string: {e}")))?;
        if bytes.is_empty() {
            return Err(CardlensError::InvalidFingerprint(
                "empty fingerprint".into(),
            ));
        }
        Ok(Self { bytes })
    }

    /// Hexadecimal encoding of the fingerprint.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Raw hash bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hamming distance to another fingerprint.
    ///
    /// Counts differing bits over the overlapping bytes. A length mismatch
    /// incurs a penalty of 8 bits per missing byte, so fingerprints of
    /// different sizes are never reported as identical.
    pub fn distance(&self, other: &Self) -> u32 {
        let min_len = self.bytes.len().min(other.bytes.len());

        let distance: u32 = self.bytes[..min_len]
            .iter()
            .zip(other.bytes[..min_len].iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();

        let size_penalty = (self.bytes.len().abs_diff(other.bytes.len()) * 8) as u32;

        distance + size_penalty
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// An image hashing strategy.
///
/// One concrete strategy exists today ([`Blockhash64Hasher`]); the trait keeps
/// the acquisition pipeline and the matching engine decoupled from the
/// algorithm choice.
pub trait ImageHasher: Send + Sync {
    /// Decode `bytes` and compute a perceptual fingerprint.
    ///
    /// Deterministic: the same bytes always yield the same fingerprint.
    fn hash_bytes(&self, bytes: &[u8]) -> Result<Fingerprint>;

    /// Fingerprint an already-decoded image.
    fn hash_image(&self, image: &DynamicImage) -> Fingerprint;
}

/// Blockhash64 hashing strategy: consistent 64-bit output, grid-based.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blockhash64Hasher;

impl ImageHasher for Blockhash64Hasher {
    fn hash_bytes(&self, bytes: &[u8]) -> Result<Fingerprint> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| CardlensError::Decode(format!("failed to decode image: {e}")))?;
        Ok(self.hash_image(&image))
    }

    fn hash_image(&self, image: &DynamicImage) -> Fingerprint {
        let hash: Blockhash64 = blockhash64(image);
        let hash_bytes: [u8; FINGERPRINT_SIZE] = hash.into();
        Fingerprint::new(hash_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    /// Encode a horizontal-gradient test image as PNG bytes.
    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, _| {
            let v = (x * 255 / width.max(1)) as u8;
            image::Rgb([v, v, v])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_hash_bytes_deterministic() {
        let bytes = gradient_png(64, 64);
        let hasher = Blockhash64Hasher::default();
        let fp1 = hasher.hash_bytes(&bytes).unwrap();
        let fp2 = hasher.hash_bytes(&bytes).unwrap();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.distance(&fp2), 0);
    }

    #[test]
    fn test_hash_bytes_rejects_garbage() {
        let hasher = Blockhash64Hasher::default();
        let err = hasher.hash_bytes(&[0x00, 0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, CardlensError::Decode(_)));
    }

    #[test]
    fn test_distance_symmetric() {
        let f1 = Fingerprint::new([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x11, 0x22, 0x33]);
        let f2 = Fingerprint::new([0xCA, 0xFE, 0xBA, 0xBE, 0x44, 0x55, 0x66, 0x77]);
        assert_eq!(f1.distance(&f2), f2.distance(&f1));
    }

    #[test]
    fn test_distance_identical() {
        let f = Fingerprint::new([0x00, 0xFF, 0xAA, 0x55, 0x00, 0xFF, 0xAA, 0x55]);
        assert_eq!(f.distance(&f.clone()), 0);
    }

    #[test]
    fn test_distance_all_bits() {
        let f1 = Fingerprint::new([0x00; 8]);
        let f2 = Fingerprint::new([0xFF; 8]);
        assert_eq!(f1.distance(&f2), 64);
    }

    #[test]
    fn test_distance_one_bit() {
        let f1 = Fingerprint::new([0x00; 8]);
        let f2 = Fingerprint::new([0x01, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(f1.distance(&f2), 1);
    }

    #[test]
    fn test_distance_size_mismatch_penalty() {
        let short = Fingerprint::from_hex("0000000000").unwrap(); // 5 bytes
        let full = Fingerprint::new([0x00; 8]);
        // 3 missing bytes * 8 bits.
        assert_eq!(short.distance(&full), 24);
        assert_eq!(full.distance(&short), 24);
    }

    #[test]
    fn test_hex_roundtrip() {
        let original = Fingerprint::new([0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE]);
        let hex = original.to_hex();
        assert_eq!(hex, "deadbeefcafebabe");
        let restored = Fingerprint::from_hex(&hex).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_from_hex_invalid() {
        assert!(Fingerprint::from_hex("xyz").is_err());
        assert!(Fingerprint::from_hex("").is_err());
    }

    #[test]
    fn test_different_images_differ() {
        let hasher = Blockhash64Hasher::default();
        let horizontal = hasher.hash_bytes(&gradient_png(64, 64)).unwrap();
        let vertical = {
            let img = RgbImage::from_fn(64, 64, |_, y| {
                let v = (y * 255 / 64) as u8;
                image::Rgb([v, v, v])
            });
            let mut buf = Vec::new();
            DynamicImage::ImageRgb8(img)
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .unwrap();
            hasher.hash_bytes(&buf).unwrap()
        };
        assert!(horizontal.distance(&vertical) > 0);
    }
}

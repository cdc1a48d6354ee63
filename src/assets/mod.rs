//! Opaque encoded-image handles and the decode/encode boundary.

mod decode;
mod encode;

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use thiserror::Error;

pub use decode::ImageDecoder;
pub use encode::{encode_png, encode_raster, EncodeError, ExportFormat};

static NEXT_ASSET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(u64);

impl AssetId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

/// Reference to immutable encoded pixel data.
///
/// Cloning shares the byte buffer; the bytes can never be mutated, so a cloned
/// handle inside a history snapshot stays independent of the live stack.
#[derive(Clone)]
pub struct AssetRef {
    id: AssetId,
    bytes: Arc<[u8]>,
}

impl AssetRef {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            id: AssetId(NEXT_ASSET_ID.fetch_add(1, Ordering::Relaxed)),
            bytes: Arc::from(bytes),
        }
    }

    pub const fn id(&self) -> AssetId {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PartialEq for AssetRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AssetRef {}

impl fmt::Debug for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRef")
            .field("id", &self.id)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Decoded straight-alpha pixels plus the natural size of the asset.
#[derive(Debug, Clone)]
pub struct DecodedAsset {
    pub pixels: Arc<RgbaImage>,
}

impl DecodedAsset {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("asset {asset} is empty")]
    Empty { asset: AssetId },
    #[error("asset {asset} could not be decoded: {source}")]
    Malformed {
        asset: AssetId,
        #[source]
        source: image::ImageError,
    },
    #[error("asset {asset} is unavailable: {message}")]
    Unavailable { asset: AssetId, message: String },
}

/// Turns an encoded asset reference into drawable pixels.
#[async_trait]
pub trait AssetDecoder: Send + Sync {
    async fn decode(&self, asset: &AssetRef) -> Result<DecodedAsset, DecodeError>;

    /// Forgets cached pixels for every asset not in `live`. Uncached decoders ignore it.
    fn retain(&self, _live: &HashSet<AssetId>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_refs_get_distinct_ids_and_compare_by_id() {
        let first = AssetRef::from_bytes(vec![1, 2, 3]);
        let second = AssetRef::from_bytes(vec![1, 2, 3]);
        assert_ne!(first, second);
        assert_eq!(first.clone(), first);
        assert_eq!(first.len(), 3);
        assert!(!first.is_empty());
    }

    #[test]
    fn asset_ref_debug_omits_payload() {
        let asset = AssetRef::from_bytes(vec![0_u8; 2048]);
        let rendered = format!("{asset:?}");
        assert!(rendered.contains("len: 2048"));
        assert!(!rendered.contains("0, 0, 0"));
    }
}

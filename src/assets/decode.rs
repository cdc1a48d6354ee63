use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::RgbaImage;

use super::{AssetDecoder, AssetId, AssetRef, DecodeError, DecodedAsset};

/// Decoder backed by the `image` crate with a per-asset raster cache.
#[derive(Debug, Default)]
pub struct ImageDecoder {
    cache: Mutex<HashMap<AssetId, Arc<RgbaImage>>>,
}

impl ImageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<AssetId, Arc<RgbaImage>>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn decode_uncached(asset: &AssetRef) -> Result<RgbaImage, DecodeError> {
        if asset.is_empty() {
            return Err(DecodeError::Empty { asset: asset.id() });
        }
        let decoded =
            image::load_from_memory(asset.bytes()).map_err(|source| DecodeError::Malformed {
                asset: asset.id(),
                source,
            })?;
        Ok(decoded.to_rgba8())
    }
}

#[async_trait]
impl AssetDecoder for ImageDecoder {
    async fn decode(&self, asset: &AssetRef) -> Result<DecodedAsset, DecodeError> {
        let cached = self.lock_cache().get(&asset.id()).cloned();
        if let Some(pixels) = cached {
            return Ok(DecodedAsset { pixels });
        }

        let pixels = Arc::new(Self::decode_uncached(asset)?);
        tracing::debug!(
            asset = %asset.id(),
            width = pixels.width(),
            height = pixels.height(),
            "decoded asset"
        );
        self.lock_cache().insert(asset.id(), Arc::clone(&pixels));
        Ok(DecodedAsset { pixels })
    }

    fn retain(&self, live: &HashSet<AssetId>) {
        let mut cache = self.lock_cache();
        let before = cache.len();
        cache.retain(|id, _| live.contains(id));
        let evicted = before - cache.len();
        if evicted > 0 {
            tracing::debug!(evicted, kept = cache.len(), "evicted decoded assets");
        }
    }
}

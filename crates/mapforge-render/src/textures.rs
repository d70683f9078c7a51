//! Texture cache with version-stamped asynchronous loading.
//!
//! The engine never fetches bytes itself; the host is handed a
//! [`LoadTicket`] per requested asset and later reports the outcome.
//! Every slot carries a monotonically increasing version, and a
//! completion is applied only when its ticket still matches the slot's
//! current version, so a reload ordered mid-flight silently wins over
//! the stale response.

use image::ImageFormat;
use std::collections::HashMap;
use thiserror::Error;

/// Texture loading errors reported back to the host.
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),
    #[error("Decode failed for {asset_id}: {source}")]
    Decode {
        asset_id: String,
        source: image::ImageError,
    },
}

/// Decoded RGBA8 image data ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels, row-major.
    pub pixels: Vec<u8>,
}

/// Lifecycle of one texture slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureState {
    /// Requested from the host; bytes not yet delivered.
    Pending,
    Ready(TextureImage),
    /// The load failed; the slot stays failed until invalidated, and
    /// renderers substitute their fallback art.
    Failed,
}

/// Opaque handle the host passes back with the load outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub asset_id: String,
    version: u64,
}

#[derive(Debug)]
struct Slot {
    version: u64,
    state: TextureState,
}

/// Per-board texture store keyed by asset id.
#[derive(Debug, Default)]
pub struct TextureCache {
    slots: HashMap<String, Slot>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an asset. Returns a ticket for the host to fulfil when the
    /// asset is not yet loaded (or was invalidated); `None` means the
    /// slot is already pending, ready, or failed and no fetch is needed.
    pub fn request(&mut self, asset_id: &str) -> Option<LoadTicket> {
        if self.slots.contains_key(asset_id) {
            return None;
        }
        self.slots.insert(
            asset_id.to_string(),
            Slot {
                version: 1,
                state: TextureState::Pending,
            },
        );
        Some(LoadTicket {
            asset_id: asset_id.to_string(),
            version: 1,
        })
    }

    /// Drop an asset's current contents and demand a fresh load. Any
    /// in-flight completion for the old version becomes stale.
    pub fn invalidate(&mut self, asset_id: &str) -> LoadTicket {
        let slot = self.slots.entry(asset_id.to_string()).or_insert(Slot {
            version: 0,
            state: TextureState::Pending,
        });
        slot.version += 1;
        slot.state = TextureState::Pending;
        LoadTicket {
            asset_id: asset_id.to_string(),
            version: slot.version,
        }
    }

    /// Deliver fetched bytes for a ticket. Stale tickets (the slot was
    /// invalidated since) are discarded without touching the slot.
    pub fn complete(&mut self, ticket: &LoadTicket, bytes: &[u8]) -> Result<(), TextureError> {
        let Some(slot) = self.slots.get_mut(&ticket.asset_id) else {
            return Err(TextureError::UnknownAsset(ticket.asset_id.clone()));
        };
        if slot.version != ticket.version {
            log::debug!("discarding stale texture load for {}", ticket.asset_id);
            return Ok(());
        }
        match decode(bytes) {
            Ok(img) => {
                slot.state = TextureState::Ready(img);
                Ok(())
            }
            Err(source) => {
                slot.state = TextureState::Failed;
                Err(TextureError::Decode {
                    asset_id: ticket.asset_id.clone(),
                    source,
                })
            }
        }
    }

    /// Report a failed fetch. Stale tickets are ignored.
    pub fn fail(&mut self, ticket: &LoadTicket) {
        if let Some(slot) = self.slots.get_mut(&ticket.asset_id) {
            if slot.version == ticket.version {
                slot.state = TextureState::Failed;
                log::warn!("texture load failed for {}", ticket.asset_id);
            }
        }
    }

    /// Current state of an asset's slot, if it was ever requested.
    pub fn state(&self, asset_id: &str) -> Option<&TextureState> {
        self.slots.get(asset_id).map(|s| &s.state)
    }

    /// The decoded image for an asset when (and only when) it is ready.
    pub fn ready(&self, asset_id: &str) -> Option<&TextureImage> {
        match self.state(asset_id) {
            Some(TextureState::Ready(img)) => Some(img),
            _ => None,
        }
    }
}

fn decode(bytes: &[u8]) -> Result<TextureImage, image::ImageError> {
    let format = image::guess_format(bytes).unwrap_or(ImageFormat::Png);
    let img = image::load_from_memory_with_format(bytes, format)?.to_rgba8();
    Ok(TextureImage {
        width: img.width(),
        height: img.height(),
        pixels: img.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smallest valid 1x1 red PNG, generated once with the image crate.
    fn red_pixel_png() -> Vec<u8> {
        let mut bytes = Vec::new();
        let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 0, 255]));
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_request_once_per_asset() {
        let mut cache = TextureCache::new();
        assert!(cache.request("tree").is_some());
        // Second request while pending: no duplicate fetch
        assert!(cache.request("tree").is_none());
        assert_eq!(cache.state("tree"), Some(&TextureState::Pending));
    }

    #[test]
    fn test_complete_decodes_rgba() {
        let mut cache = TextureCache::new();
        let ticket = cache.request("tree").unwrap();
        cache.complete(&ticket, &red_pixel_png()).unwrap();

        let img = cache.ready("tree").unwrap();
        assert_eq!((img.width, img.height), (1, 1));
        assert_eq!(img.pixels, vec![255, 0, 0, 255]);
    }

    #[test]
    fn test_stale_completion_discarded() {
        let mut cache = TextureCache::new();
        let old = cache.request("tree").unwrap();
        let fresh = cache.invalidate("tree");

        // The old fetch lands after the invalidation: ignored.
        cache.complete(&old, &red_pixel_png()).unwrap();
        assert_eq!(cache.state("tree"), Some(&TextureState::Pending));

        cache.complete(&fresh, &red_pixel_png()).unwrap();
        assert!(cache.ready("tree").is_some());
    }

    #[test]
    fn test_stale_failure_ignored() {
        let mut cache = TextureCache::new();
        let old = cache.request("tree").unwrap();
        let fresh = cache.invalidate("tree");
        cache.fail(&old);
        assert_eq!(cache.state("tree"), Some(&TextureState::Pending));

        cache.fail(&fresh);
        assert_eq!(cache.state("tree"), Some(&TextureState::Failed));
    }

    #[test]
    fn test_decode_failure_marks_failed() {
        let mut cache = TextureCache::new();
        let ticket = cache.request("tree").unwrap();
        assert!(cache.complete(&ticket, b"not an image").is_err());
        assert_eq!(cache.state("tree"), Some(&TextureState::Failed));
        // Failed slots don't re-request; the host must invalidate.
        assert!(cache.request("tree").is_none());
    }

    #[test]
    fn test_unknown_ticket_rejected() {
        let mut cache = TextureCache::new();
        let ticket = LoadTicket {
            asset_id: "ghost".to_string(),
            version: 1,
        };
        assert!(matches!(
            cache.complete(&ticket, &red_pixel_png()),
            Err(TextureError::UnknownAsset(_))
        ));
    }
}

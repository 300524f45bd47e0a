//! Still image loading.

use cutframe_core::{CutframeError, FrameBuffer, Result, SharedFrameBuffer};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Decode an image file into an RGBA8 frame.
pub fn load_image(path: &Path) -> Result<FrameBuffer> {
    let decoded = image::open(path)
        .map_err(|e| CutframeError::Media(format!("Failed to load {}: {e}", path.display())))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    FrameBuffer::from_rgba8(width, height, decoded.as_raw())
}

/// Decoded images keyed by asset id. Entries live until cleared.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: Mutex<HashMap<Uuid, SharedFrameBuffer>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image for `asset_id`, loading it from `path` on first use.
    /// Failed loads are not cached.
    pub fn get_or_load(&self, asset_id: Uuid, path: &Path) -> Result<SharedFrameBuffer> {
        if let Some(image) = self.images.lock().get(&asset_id) {
            return Ok(Arc::clone(image));
        }
        let image = Arc::new(load_image(path)?);
        tracing::debug!(%asset_id, width = image.width, height = image.height, "Image loaded");
        self.images.lock().insert(asset_id, Arc::clone(&image));
        Ok(image)
    }

    /// Register an already decoded image.
    pub fn insert(&self, asset_id: Uuid, image: FrameBuffer) {
        self.images.lock().insert(asset_id, Arc::new(image));
    }

    pub fn remove(&self, asset_id: Uuid) {
        self.images.lock().remove(&asset_id);
    }

    pub fn clear(&self) {
        self.images.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.images.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.lock().is_empty()
    }
}

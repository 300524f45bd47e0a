//! Per-asset video decode sessions.
//!
//! Opening a decoder and seeking are expensive, pulling the next frame is
//! cheap. [`DecodeCache`] keeps one session per asset and decides per request
//! whether the frame it already holds is still valid, whether a short forward
//! scan reaches the target, or whether the stream has to be reopened.

use cutframe_core::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::decoder::{DecodedFrame, FrameStream, MediaSource, VideoDecoder, VideoSource};

/// Largest forward jump served by iterating instead of seeking.
pub const DEFAULT_LOOKAHEAD_SECS: f64 = 2.0;
/// How far past the target a forward scan may run before giving up.
pub const DEFAULT_MAX_OVERSHOOT_SECS: f64 = 1.0;

/// Forward-scan versus seek thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub lookahead_secs: f64,
    pub max_overshoot_secs: f64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: DEFAULT_LOOKAHEAD_SECS,
            max_overshoot_secs: DEFAULT_MAX_OVERSHOOT_SECS,
        }
    }
}

/// Snapshot of the cache for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Sessions known to the cache, in any state
    pub sessions: usize,
    /// Sessions with an open source
    pub active: usize,
    /// Sessions whose initialization failed
    pub failed: usize,
    /// Sessions currently holding a decoded frame
    pub with_frame: usize,
}

/// An open decoder for one asset.
struct DecodeSession {
    source: Box<dyn VideoSource>,
    stream: Option<Box<dyn FrameStream>>,
    last_timestamp: Option<f64>,
    current: Option<DecodedFrame>,
}

enum SessionSlot {
    /// Not opened yet
    Pending,
    Ready(DecodeSession),
    /// Initialization failed; stays failed until cleared
    Failed(String),
    /// Removed from the cache while another caller still held it
    Closed,
}

impl DecodeSession {
    fn new(source: Box<dyn VideoSource>) -> Self {
        Self {
            source,
            stream: None,
            last_timestamp: None,
            current: None,
        }
    }

    fn frame_at(&mut self, time: f64, config: &DecodeConfig) -> Result<Option<DecodedFrame>> {
        if let Some(frame) = &self.current {
            if frame.window().contains(time) {
                return Ok(Some(frame.clone()));
            }
        }

        if let Some(last) = self.last_timestamp {
            if time >= last && time - last < config.lookahead_secs {
                if let Some(frame) = self.scan_forward(time, config)? {
                    return Ok(Some(frame));
                }
            }
        }

        self.seek(time)
    }

    /// Pull frames from the open stream until one covers `time`.
    fn scan_forward(&mut self, time: f64, config: &DecodeConfig) -> Result<Option<DecodedFrame>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        while let Some(frame) = stream.next_frame()? {
            self.last_timestamp = Some(frame.timestamp);
            if frame.window().contains(time) {
                self.current = Some(frame.clone());
                return Ok(Some(frame));
            }
            if frame.timestamp > time + config.max_overshoot_secs {
                tracing::debug!(time, reached = frame.timestamp, "Forward scan overshot");
                break;
            }
        }
        Ok(None)
    }

    fn seek(&mut self, time: f64) -> Result<Option<DecodedFrame>> {
        // The old stream must be released before the next one starts.
        self.stream = None;
        self.current = None;
        self.last_timestamp = None;

        let mut stream = self.source.frames_from(time)?;
        let first = stream.next_frame()?;
        self.stream = Some(stream);
        if let Some(frame) = &first {
            self.last_timestamp = Some(frame.timestamp);
            self.current = Some(frame.clone());
        }
        Ok(first)
    }
}

/// One decode session per video asset.
///
/// Each session sits behind its own lock: two callers asking for the same
/// asset take turns, and a caller arriving while the session is being opened
/// waits for that open instead of starting another one.
pub struct DecodeCache {
    decoder: Arc<dyn VideoDecoder>,
    config: DecodeConfig,
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<SessionSlot>>>>,
}

impl DecodeCache {
    pub fn new(decoder: Arc<dyn VideoDecoder>) -> Self {
        Self::with_config(decoder, DecodeConfig::default())
    }

    pub fn with_config(decoder: Arc<dyn VideoDecoder>, config: DecodeConfig) -> Self {
        Self {
            decoder,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// The decoder new sessions are opened with.
    pub fn decoder(&self) -> Arc<dyn VideoDecoder> {
        Arc::clone(&self.decoder)
    }

    /// Frame of `asset_id` whose display window contains `time` (source
    /// seconds), opening a session on first use.
    ///
    /// Returns `None` when the asset cannot be decoded, when `time` lies past
    /// the end of the video, or when decoding fails mid-stream.
    pub fn get_frame_at(&self, asset_id: Uuid, source: &MediaSource, time: f64) -> Option<DecodedFrame> {
        let slot = {
            let mut sessions = self.sessions.lock();
            Arc::clone(
                sessions
                    .entry(asset_id)
                    .or_insert_with(|| Arc::new(Mutex::new(SessionSlot::Pending))),
            )
        };

        let mut slot = slot.lock();
        if matches!(*slot, SessionSlot::Pending) {
            *slot = match self.decoder.open(source) {
                Ok(opened) => {
                    tracing::info!(%asset_id, path = %source.path.display(), "Decode session opened");
                    SessionSlot::Ready(DecodeSession::new(opened))
                }
                Err(e) => {
                    tracing::error!(%asset_id, path = %source.path.display(), error = %e, "Failed to open video");
                    SessionSlot::Failed(e.to_string())
                }
            };
        }

        let SessionSlot::Ready(session) = &mut *slot else {
            return None;
        };
        match session.frame_at(time, &self.config) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%asset_id, time, error = %e, "Failed to decode frame");
                // Force a fresh stream on the next request.
                session.stream = None;
                session.current = None;
                session.last_timestamp = None;
                None
            }
        }
    }

    /// Dispose the session for `asset_id`. The next request reopens it.
    pub fn clear_video(&self, asset_id: Uuid) {
        let removed = self.sessions.lock().remove(&asset_id);
        if let Some(slot) = removed {
            *slot.lock() = SessionSlot::Closed;
            tracing::debug!(%asset_id, "Decode session cleared");
        }
    }

    /// Dispose every session.
    pub fn clear_all(&self) {
        let removed = std::mem::take(&mut *self.sessions.lock());
        let count = removed.len();
        for slot in removed.into_values() {
            *slot.lock() = SessionSlot::Closed;
        }
        if count > 0 {
            tracing::debug!(count, "Decode sessions cleared");
        }
    }

    /// Error that made `asset_id` undecodable, if its open failed.
    pub fn failure(&self, asset_id: Uuid) -> Option<String> {
        let slot = self.sessions.lock().get(&asset_id).cloned()?;
        let slot = slot.lock();
        match &*slot {
            SessionSlot::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    pub fn stats(&self) -> DecodeStats {
        let slots: Vec<_> = self.sessions.lock().values().cloned().collect();
        let mut stats = DecodeStats {
            sessions: slots.len(),
            ..DecodeStats::default()
        };
        for slot in slots {
            match &*slot.lock() {
                SessionSlot::Ready(session) => {
                    stats.active += 1;
                    if session.current.is_some() {
                        stats.with_frame += 1;
                    }
                }
                SessionSlot::Failed(_) => stats.failed += 1,
                SessionSlot::Pending | SessionSlot::Closed => {}
            }
        }
        stats
    }
}

impl std::fmt::Debug for DecodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeCache")
            .field("config", &self.config)
            .field("sessions", &self.sessions.lock().len())
            .finish()
    }
}

//! Memo of rendered preview frames.
//!
//! Frames are stored per time bucket (`floor(time * resolution)`) together
//! with a fingerprint of everything that shaped them. A lookup only hits when
//! the fingerprint recomputed for the requested time still matches, so edits
//! invalidate exactly the buckets they are visible in.

use cutframe_core::SharedFrameBuffer;
use cutframe_timeline::{ElementContent, Scene};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

/// Frames behind the playhead are this many times less urgent than frames ahead.
const BACKWARD_PENALTY: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewCacheConfig {
    /// Buckets per second
    pub resolution: f64,
    /// Upper bound on stored frames
    pub max_entries: usize,
    /// Share of entries dropped when the bound is exceeded
    pub eviction_fraction: f64,
    /// Seconds around the playhead considered for pre-rendering
    pub prerender_window_secs: f64,
    /// Frames rendered per idle pass
    pub max_prerender_per_pass: usize,
}

impl Default for PreviewCacheConfig {
    fn default() -> Self {
        Self {
            resolution: 30.0,
            max_entries: 300,
            eviction_fraction: 0.2,
            prerender_window_secs: 3.0,
            max_prerender_per_pass: 30,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    frame: SharedFrameBuffer,
    fingerprint: u64,
    /// Insertion order, for eviction
    sequence: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bucketed, fingerprint-validated frame memo.
#[derive(Debug)]
pub struct PreviewCache {
    config: PreviewCacheConfig,
    entries: HashMap<i64, CacheEntry>,
    next_sequence: u64,
    stats: PreviewCacheStats,
}

impl PreviewCache {
    pub fn new(config: PreviewCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            next_sequence: 0,
            stats: PreviewCacheStats::default(),
        }
    }

    pub fn config(&self) -> &PreviewCacheConfig {
        &self.config
    }

    #[inline]
    pub fn bucket(&self, time: f64) -> i64 {
        (time * self.config.resolution).floor() as i64
    }

    /// Fingerprint of the state that determines the frame at `time`.
    pub fn fingerprint(&self, time: f64, scene: &Scene) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.bucket(time).hash(&mut hasher);
        scene.scene_id.hash(&mut hasher);

        let settings = &scene.settings;
        settings.canvas_size.hash(&mut hasher);
        settings.background.color.hash(&mut hasher);
        settings.background.mode.hash(&mut hasher);
        settings.background.blur_intensity.to_bits().hash(&mut hasher);

        let active = scene.active_elements(time);
        active.len().hash(&mut hasher);
        for item in &active {
            let element = item.element;
            item.track_index.hash(&mut hasher);
            element.id.hash(&mut hasher);
            element.type_name().hash(&mut hasher);
            for value in [
                element.start_time,
                element.duration,
                element.trim_start,
                element.trim_end,
            ] {
                value.to_bits().hash(&mut hasher);
            }
            match &element.content {
                ElementContent::Media(media) => media.media_id.hash(&mut hasher),
                ElementContent::Text(text) => {
                    text.content.hash(&mut hasher);
                    text.font_family.hash(&mut hasher);
                    text.font_weight.hash(&mut hasher);
                    text.font_style.hash(&mut hasher);
                    text.color.hash(&mut hasher);
                    text.background_color.hash(&mut hasher);
                    text.text_align.hash(&mut hasher);
                    for value in [text.font_size, text.x, text.y, text.rotation, text.opacity] {
                        value.to_bits().hash(&mut hasher);
                    }
                }
            }
        }
        hasher.finish()
    }

    /// Cached frame for `time`, if still valid for `scene`.
    pub fn get(&mut self, time: f64, scene: &Scene) -> Option<SharedFrameBuffer> {
        let bucket = self.bucket(time);
        let hit = match self.entries.get(&bucket) {
            Some(entry) if entry.fingerprint == self.fingerprint(time, scene) => {
                Some(SharedFrameBuffer::clone(&entry.frame))
            }
            _ => None,
        };
        if hit.is_some() {
            self.stats.hits += 1;
            tracing::trace!(time, bucket, "Preview cache hit");
        } else {
            self.stats.misses += 1;
        }
        hit
    }

    /// Whether a valid frame exists for `time`, without touching the stats.
    pub fn contains(&self, time: f64, scene: &Scene) -> bool {
        self.entries
            .get(&self.bucket(time))
            .is_some_and(|entry| entry.fingerprint == self.fingerprint(time, scene))
    }

    /// Store the frame rendered for `time`.
    pub fn set(&mut self, time: f64, scene: &Scene, frame: SharedFrameBuffer) {
        let bucket = self.bucket(time);
        let entry = CacheEntry {
            frame,
            fingerprint: self.fingerprint(time, scene),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.entries.insert(bucket, entry);
        if self.entries.len() > self.config.max_entries {
            self.evict();
        }
    }

    /// Drop the oldest entries, at least one.
    fn evict(&mut self) {
        let count = ((self.entries.len() as f64 * self.config.eviction_fraction).floor() as usize)
            .max(1)
            .max(self.entries.len().saturating_sub(self.config.max_entries));
        let mut by_age: Vec<(u64, i64)> = self
            .entries
            .iter()
            .map(|(bucket, entry)| (entry.sequence, *bucket))
            .collect();
        by_age.sort_unstable();
        for (_, bucket) in by_age.into_iter().take(count) {
            self.entries.remove(&bucket);
        }
        self.stats.evictions += count as u64;
        tracing::debug!(evicted = count, remaining = self.entries.len(), "Preview cache evicted");
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> PreviewCacheStats {
        PreviewCacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }

    /// Uncached times worth rendering next, most urgent first.
    ///
    /// Every uncached bucket within the window marks its whole second for
    /// rendering; the result favours times ahead of the playhead and is
    /// capped at `max_prerender_per_pass`.
    pub fn prerender_plan(&self, playhead: f64, scene: &Scene) -> Vec<f64> {
        let duration = scene.duration();
        let resolution = self.config.resolution;
        if duration <= 0.0 || resolution <= 0.0 || self.config.max_prerender_per_pass == 0 {
            return Vec::new();
        }
        let window = self.config.prerender_window_secs;
        let lo = (playhead - window).max(0.0);
        let hi = (playhead + window).min(duration);
        if lo >= hi {
            return Vec::new();
        }

        let bucket_time = |bucket: i64| bucket as f64 / resolution;
        let mut seconds = BTreeSet::new();
        for bucket in self.bucket(lo)..=self.bucket(hi) {
            let time = bucket_time(bucket).max(0.0);
            if time < duration && !self.contains(time, scene) {
                seconds.insert(time.floor() as i64);
            }
        }

        let mut plan = Vec::new();
        for second in seconds {
            let first = (second as f64 * resolution).ceil() as i64;
            let last = ((second + 1) as f64 * resolution).ceil() as i64;
            for bucket in first..last {
                let time = bucket_time(bucket);
                if time < duration && !self.contains(time, scene) {
                    plan.push(time);
                }
            }
        }

        let urgency = |time: f64| {
            if time >= playhead {
                time - playhead
            } else {
                (playhead - time) * BACKWARD_PENALTY
            }
        };
        plan.sort_by(|a, b| urgency(*a).total_cmp(&urgency(*b)).then(a.total_cmp(b)));
        plan.truncate(self.config.max_prerender_per_pass);
        plan
    }
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::new(PreviewCacheConfig::default())
    }
}

//! Cutframe Render - turns a timeline snapshot into pixels
//!
//! This crate handles:
//! - CPU canvas blitting, gradients, blur and text rasterization
//! - Frame compositing (`Compositor`)
//! - Memoized interactive preview with idle pre-rendering
//! - Frame-accurate export into an encoding sink

pub mod blur;
pub mod canvas;
pub mod compositor;
pub mod export;
pub mod gradient;
pub mod preview;
pub mod preview_cache;
pub mod text;

pub use compositor::{Compositor, CompositorConfig};
pub use export::{export_project, ExportJob, ExportOptions, ExportOutcome, ExportSequencer};
pub use gradient::{ColorStop, Direction, Fill, Gradient, StopPosition};
pub use preview::{PreviewFrame, PreviewRenderer};
pub use preview_cache::{PreviewCache, PreviewCacheConfig, PreviewCacheStats};
pub use text::{BlockRasterizer, FontBook, FontSpec, TextRasterizer, TextRun};

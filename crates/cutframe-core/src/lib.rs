//! Cutframe Core - Foundation types for the rendering engine
//!
//! This crate provides the fundamental types used throughout cutframe:
//! - Time representation (RationalTime, FrameRate, TimeWindow)
//! - Colors and CSS color parsing
//! - RGBA / alpha-mask frame buffers
//! - Geometric primitives and fit modes

pub mod color;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod time;

pub use color::Color;
pub use error::{CutframeError, Result};
pub use frame::{FrameBuffer, FramePlane, PixelFormat, SharedFrameBuffer};
pub use geometry::{FitMode, Rect, Size, Transform2D, Vec2};
pub use time::{FrameRate, RationalTime, TimeWindow};

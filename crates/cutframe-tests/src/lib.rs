//! Integration test crate for cutframe.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! Video comes from the synthetic decoder, whose frame `n` is a solid fill of
//! a color derived from `n`, so pixels identify the source frame used.

#[cfg(test)]
mod support;

#[cfg(test)]
mod timeline;

#[cfg(test)]
mod compositing;

#[cfg(test)]
mod preview;

#[cfg(test)]
mod export;

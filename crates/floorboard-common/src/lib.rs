//! Shared infrastructure for the floorboard viewer.
//!
//! This crate carries the pieces both the render pipeline and any embedding
//! shell need: the per-document [`ViewContext`], the [`ViewError`] type, the
//! proxy-path conventions shared with the archive server, and tracing setup.

pub mod config;
pub mod error;
pub mod proxy;
pub mod telemetry;

pub use crate::config::ViewContext;
pub use crate::error::ViewError;

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Palettes and skeleton topology for drawing poses.

/// Color definitions and palettes.
pub mod color;

/// COCO skeleton topology.
pub mod skeleton;

pub use color::Color;
pub use skeleton::{KPT_COLOR_INDICES, LIMB_COLOR_INDICES, SKELETON};

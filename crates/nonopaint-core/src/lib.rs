//! Core types and image pipeline for nonopaint.
//!
//! This crate holds everything that does not touch a device: screenshot
//! geometry extraction, the answer bitmap, palette resolution, tap planning and
//! the touch wire codec. The CLI drives it with screenshots and replays the
//! resulting plan over a touch session.
//!
//! # Modules
//!
//! - [`error`]: error types with actionable suggestions
//! - [`raster`], [`mask`]: images and binary masks that keep their screen origin
//! - [`extract`]: answer, nonogram, grid and palette extraction
//! - [`bitmap`]: downsampling the answer picture into one value per cell
//! - [`palette`], [`plan`]: nearest-colour resolution and tap planning
//! - [`touch`]: the 32-byte touch event record
//! - [`calibration`]: heuristic constants and timings
//!
//! # Coordinates
//!
//! Every [`raster::RasterImage`] and [`mask::Mask`] carries the screen position
//! of its top-left pixel. Cropping composes origins, so any rect reported by a
//! pipeline step is in screen coordinates no matter how deep the crop chain.
//!
//! | Step | Input | Output |
//! |------|-------|--------|
//! | `extract_answer` | answer screen | answer picture |
//! | `extract_nonogram` | puzzle screen | clues plus grid |
//! | `extract_grid` | nonogram | grid and cell layout |
//! | `extract_palette` | puzzle screen | colour tap points |

pub mod bitmap;
pub mod calibration;
pub mod color;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod grid;
pub mod mask;
pub mod palette;
pub mod plan;
pub mod raster;
pub mod touch;

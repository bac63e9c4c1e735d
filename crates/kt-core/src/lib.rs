/// Types, traits, and shared structures for kinetype.
///
/// This crate contains everything the other workspace members agree
/// on: the screen cell model, character width metrics, the playback
/// clock, and the audio sink seam.

pub mod cell;
pub mod clock;
pub mod error;
pub mod traits;
pub mod width;

pub use cell::{Cell, Rgb, Rgba, TextStyle};
pub use clock::PlaybackClock;
pub use error::CoreError;
pub use traits::AudioSink;

// Background music for kinetype: decode once, play through the
// default output device, controlled by the engine through AudioSink.

pub mod decode;
pub mod error;
pub mod playback;

pub use error::AudioError;
pub use playback::MusicPlayer;

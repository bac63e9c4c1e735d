use thiserror::Error;

/// Errors originating from the audio backend.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio output device found.
    #[error("Aucun périphérique audio de sortie trouvé")]
    NoOutputDevice,

    /// Unsupported output sample format.
    #[error("Format audio non supporté : {0}")]
    UnsupportedFormat(String),

    /// The decoded file contains no samples.
    #[error("Piste audio vide : {0}")]
    EmptyTrack(String),
}

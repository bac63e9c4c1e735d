use thiserror::Error;

/// Errors originating from the core types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid grid dimensions.
    #[error("Dimensions de grille invalides : {width}×{height}")]
    InvalidDimensions {
        /// Width value.
        width: usize,
        /// Height value.
        height: usize,
    },
}

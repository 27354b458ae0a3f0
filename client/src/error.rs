use thiserror::Error;

/// Failures surfaced to the user. `Display` is the alert text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    #[error("{0}")]
    Validation(String),
    #[error("Image is too large ({width}x{height}); the pixel area may not exceed 4096x4096")]
    ResourceLimit { width: u32, height: u32 },
    #[error("Crop request failed: {0}")]
    Transport(String),
    #[error("Failed to load image: {0}")]
    AssetLoad(String),
}

impl CropError {
    pub fn not_enough_points() -> Self {
        CropError::Validation("At least 3 points are needed to form a selection".into())
    }
}

use std::cell::RefMut;

use async_trait::async_trait;
use polycrop_shared::{Ack, ApplyRequest, CancelRequest, DrawingMode};

use crate::error::CropError;
use crate::render::Surface;

pub type SnapshotOf<H> = <<H as Host>::Surface as Surface>::Snapshot;

/// The apply/cancel endpoints of the crop backend.
#[async_trait(?Send)]
pub trait CropApi {
    async fn apply(&self, request: &ApplyRequest) -> Result<Ack, CropError>;
    async fn cancel(&self, request: &CancelRequest) -> Result<Ack, CropError>;
}

/// Everything the session needs from the page: image decoding, the drawing
/// surface, animation frames, alerts and the modal dialog.
#[async_trait(?Send)]
pub trait Host {
    type Image;
    type Surface: Surface;

    async fn decode_image(&self, source: &str) -> Result<Self::Image, CropError>;
    fn image_size(&self, image: &Self::Image) -> (u32, u32);
    /// Resizes the canvas to the image, paints it and grabs the pixels.
    fn capture(
        &self,
        image: &Self::Image,
    ) -> Result<<Self::Surface as Surface>::Snapshot, CropError>;
    fn surface(&self) -> RefMut<'_, Self::Surface>;
    fn request_frame(&self, on_frame: Box<dyn FnOnce()>);
    fn alert(&self, message: &str);
    fn present(&self, mode: DrawingMode);
    /// Closes the dialog and wipes the canvas pixels.
    fn dismiss(&self);
}

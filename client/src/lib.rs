pub mod actions;
pub mod coords;
pub mod error;
pub mod geometry;
pub mod host;
pub mod lifecycle;
pub mod render;
pub mod session;
pub mod state;

#[cfg(target_arch = "wasm32")]
mod app;
#[cfg(target_arch = "wasm32")]
mod canvas;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod logger;
#[cfg(target_arch = "wasm32")]
mod net;
#[cfg(target_arch = "wasm32")]
mod ws;

#[cfg(test)]
mod testing;

#[cfg(target_arch = "wasm32")]
pub use app::run;
pub use error::CropError;
pub use host::{CropApi, Host};
pub use session::{Cropper, Phase, SessionManager, SubmitOutcome};

use std::fmt;
use std::str::FromStr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

mod wire;

pub use wire::{decode_server_message, decode_server_text, encode_server_message, WireDecodeError};

pub const MAX_SUBMIT_POINTS: usize = 2000;
pub const MIN_REGION_POINTS: usize = 3;
pub const MAX_IMAGE_AREA: u64 = 4096 * 4096;

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrawingMode {
    #[default]
    #[serde(rename = "polygon")]
    Polygon,
    #[serde(rename = "free_draw")]
    FreeDraw,
}

impl DrawingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DrawingMode::Polygon => "polygon",
            DrawingMode::FreeDraw => "free_draw",
        }
    }
}

impl fmt::Display for DrawingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown drawing mode: {0}")]
pub struct UnknownDrawingMode(pub String);

impl FromStr for DrawingMode {
    type Err = UnknownDrawingMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "polygon" => Ok(DrawingMode::Polygon),
            "free_draw" => Ok(DrawingMode::FreeDraw),
            other => Err(UnknownDrawingMode(other.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundFill {
    #[default]
    Transparent,
    Black,
    White,
    Blur,
}

/// Per-session options delivered with the open event. Only `crop_mode`
/// affects drawing; the rest travel to the backend untouched.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CropConfig {
    pub crop_mode: DrawingMode,
    pub background_fill: BackgroundFill,
    pub edge_smooth: u32,
    pub auto_crop: bool,
    pub crop_padding: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            crop_mode: DrawingMode::Polygon,
            background_fill: BackgroundFill::Transparent,
            edge_smooth: 0,
            auto_crop: true,
            crop_padding: 10,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ApplyRequest {
    #[serde(alias = "node_id")]
    pub session_id: String,
    pub path_points: Vec<Point>,
    pub image_width: u32,
    pub image_height: u32,
    pub drawing_mode: DrawingMode,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CancelRequest {
    #[serde(alias = "node_id")]
    pub session_id: String,
}

/// Reply of the apply/cancel endpoints. Hosts may answer with any JSON
/// object; a reply without a verdict counts as accepted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Ack {
    #[serde(default = "accepted")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn accepted() -> bool {
    true
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "session:open")]
    SessionOpen {
        session_id: String,
        image_data: String,
        #[serde(default)]
        config: CropConfig,
    },
    #[serde(rename = "session:expired")]
    SessionExpired { session_id: String },
}

use crate::ServerMessage;

#[derive(thiserror::Error, Debug)]
pub enum WireDecodeError {
    #[error("binary frame: {0}")]
    Binary(#[from] bincode::error::DecodeError),
    #[error("text frame: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn encode_server_message(message: &ServerMessage) -> Vec<u8> {
    bincode::encode_to_vec(message, bincode::config::standard()).unwrap_or_default()
}

pub fn decode_server_message(payload: &[u8]) -> Result<ServerMessage, WireDecodeError> {
    let (message, _) = bincode::decode_from_slice(payload, bincode::config::standard())?;
    Ok(message)
}

pub fn decode_server_text(text: &str) -> Result<ServerMessage, WireDecodeError> {
    Ok(serde_json::from_str(text)?)
}

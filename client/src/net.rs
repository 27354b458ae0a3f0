use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, Response, Window};

use polycrop_shared::{Ack, ApplyRequest, CancelRequest};

use crate::dom::js_error_text;
use crate::error::CropError;
use crate::host::CropApi;

pub const APPLY_PATH: &str = "/irregular_cropper/apply";
pub const CANCEL_PATH: &str = "/irregular_cropper/cancel";

pub fn websocket_url(window: &Window) -> Result<String, JsValue> {
    let location = window.location();
    let protocol = location.protocol()?;
    let host = location.host()?;
    let scheme = if protocol == "https:" { "wss" } else { "ws" };
    Ok(format!("{scheme}://{host}/ws"))
}

/// Same-origin JSON client for the crop endpoints.
pub struct HttpCropApi {
    window: Window,
}

impl HttpCropApi {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, CropError> {
        let payload =
            serde_json::to_string(body).map_err(|error| CropError::Transport(error.to_string()))?;
        let response = self
            .send(path, &payload)
            .await
            .map_err(|error| CropError::Transport(js_error_text(&error)))?;
        if !response.ok() {
            return Err(CropError::Transport(format!(
                "{path} answered HTTP {}",
                response.status()
            )));
        }
        let text = response
            .text()
            .map_err(|error| CropError::Transport(js_error_text(&error)))?;
        let text = JsFuture::from(text)
            .await
            .map_err(|error| CropError::Transport(js_error_text(&error)))?
            .as_string()
            .unwrap_or_default();
        serde_json::from_str(&text).map_err(|error| CropError::Transport(error.to_string()))
    }

    async fn send(&self, path: &str, payload: &str) -> Result<Response, JsValue> {
        let headers = Headers::new()?;
        headers.set("Content-Type", "application/json")?;
        let init = RequestInit::new();
        init.set_method("POST");
        init.set_headers(&headers);
        init.set_body(&JsValue::from_str(payload));
        let request = Request::new_with_str_and_init(path, &init)?;
        let response = JsFuture::from(self.window.fetch_with_request(&request)).await?;
        response.dyn_into::<Response>()
    }
}

#[async_trait(?Send)]
impl CropApi for HttpCropApi {
    async fn apply(&self, request: &ApplyRequest) -> Result<Ack, CropError> {
        self.post_json(APPLY_PATH, request).await
    }

    async fn cancel(&self, request: &CancelRequest) -> Result<Ack, CropError> {
        self.post_json(CANCEL_PATH, request).await
    }
}

use std::cell::{RefCell, RefMut};

use async_trait::async_trait;
use js_sys::{Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement, ImageData, Window};

use polycrop_shared::DrawingMode;

use crate::dom::{js_error_text, reattach_modal, select_mode_input, Modal};
use crate::error::CropError;
use crate::host::Host;
use crate::render::Surface;

pub struct CanvasSurface {
    ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
    pub fn new(ctx: CanvasRenderingContext2d) -> Self {
        Self { ctx }
    }
}

impl Surface for CanvasSurface {
    type Snapshot = ImageData;

    fn clear(&mut self, width: f64, height: f64) {
        self.ctx.clear_rect(0.0, 0.0, width, height);
    }

    fn draw_snapshot(&mut self, snapshot: &ImageData) {
        let _ = self.ctx.put_image_data(snapshot, 0.0, 0.0);
    }

    fn set_smoothing(&mut self, enabled: bool) {
        self.ctx.set_image_smoothing_enabled(enabled);
        if enabled {
            let _ = Reflect::set(
                self.ctx.as_ref(),
                &JsValue::from_str("imageSmoothingQuality"),
                &JsValue::from_str("high"),
            );
        }
    }

    fn set_round_joins(&mut self) {
        self.ctx.set_line_join("round");
        self.ctx.set_line_cap("round");
    }

    fn set_stroke_color(&mut self, color: &str) {
        self.ctx.set_stroke_style_str(color);
    }

    fn set_fill_color(&mut self, color: &str) {
        self.ctx.set_fill_style_str(color);
    }

    fn set_line_width(&mut self, width: f64) {
        self.ctx.set_line_width(width);
    }

    fn begin_path(&mut self) {
        self.ctx.begin_path();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.ctx.move_to(x, y);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.ctx.line_to(x, y);
    }

    fn close_path(&mut self) {
        self.ctx.close_path();
    }

    fn circle(&mut self, x: f64, y: f64, radius: f64) {
        let _ = self
            .ctx
            .arc(x, y, radius, 0.0, std::f64::consts::PI * 2.0);
    }

    fn fill(&mut self) {
        self.ctx.fill();
    }

    fn stroke(&mut self) {
        self.ctx.stroke();
    }
}

/// The crop dialog of a live page.
pub struct WebHost {
    window: Window,
    modal: Modal,
    ctx: CanvasRenderingContext2d,
    surface: RefCell<CanvasSurface>,
}

impl WebHost {
    pub fn new(window: Window, modal: Modal) -> Result<Self, JsValue> {
        let ctx = modal
            .canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("Missing 2d context"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        Ok(Self {
            window,
            modal,
            surface: RefCell::new(CanvasSurface::new(ctx.clone())),
            ctx,
        })
    }
}

#[async_trait(?Send)]
impl Host for WebHost {
    type Image = HtmlImageElement;
    type Surface = CanvasSurface;

    async fn decode_image(&self, source: &str) -> Result<HtmlImageElement, CropError> {
        let image = HtmlImageElement::new()
            .map_err(|error| CropError::AssetLoad(js_error_text(&error)))?;
        let loaded = Promise::new(&mut |resolve, reject| {
            image.set_onload(Some(&resolve));
            image.set_onerror(Some(&reject));
        });
        image.set_src(source);
        let result = JsFuture::from(loaded).await;
        image.set_onload(None);
        image.set_onerror(None);
        match result {
            Ok(_) => Ok(image),
            Err(_) => Err(CropError::AssetLoad("the image could not be decoded".into())),
        }
    }

    fn image_size(&self, image: &HtmlImageElement) -> (u32, u32) {
        (image.natural_width(), image.natural_height())
    }

    fn capture(&self, image: &HtmlImageElement) -> Result<ImageData, CropError> {
        let (width, height) = self.image_size(image);
        let canvas = &self.modal.canvas;
        canvas.set_width(width);
        canvas.set_height(height);
        self.surface.borrow_mut().set_smoothing(true);
        self.ctx
            .draw_image_with_html_image_element(image, 0.0, 0.0)
            .map_err(|error| CropError::AssetLoad(js_error_text(&error)))?;
        self.ctx
            .get_image_data(0.0, 0.0, width as f64, height as f64)
            .map_err(|error| CropError::AssetLoad(js_error_text(&error)))
    }

    fn surface(&self) -> RefMut<'_, CanvasSurface> {
        self.surface.borrow_mut()
    }

    fn request_frame(&self, on_frame: Box<dyn FnOnce()>) {
        let cb = Closure::once_into_js(move |_: f64| on_frame());
        if self
            .window
            .request_animation_frame(cb.unchecked_ref())
            .is_err()
        {
            log::warn!("requestAnimationFrame unavailable; frame dropped");
        }
    }

    fn alert(&self, message: &str) {
        let _ = self.window.alert_with_message(message);
    }

    fn present(&self, mode: DrawingMode) {
        let reattached = self
            .window
            .document()
            .ok_or_else(|| JsValue::from_str("Missing document"))
            .and_then(|document| reattach_modal(&document, &self.modal));
        if let Err(error) = reattached {
            log::error!("Crop dialog is not in the page: {}", js_error_text(&error));
        }
        select_mode_input(&self.modal, mode);
        if self.modal.dialog.open() {
            return;
        }
        if let Err(error) = self.modal.dialog.show_modal() {
            log::error!("Failed to show crop dialog: {}", js_error_text(&error));
        }
    }

    fn dismiss(&self) {
        let canvas = &self.modal.canvas;
        self.ctx
            .clear_rect(0.0, 0.0, canvas.width() as f64, canvas.height() as f64);
        if self.modal.dialog.open() {
            self.modal.dialog.close();
        }
    }
}

use std::cell::RefCell;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, Event, HtmlButtonElement, HtmlCanvasElement, HtmlDialogElement,
    HtmlInputElement, MouseEvent, Window,
};

use polycrop_shared::{DrawingMode, Point};

use crate::coords::{display_to_image, DisplayRect};

const MODAL_ID: &str = "polycrop-modal";
const STYLE_ID: &str = "polycrop-styles";
const MODE_INPUT_NAME: &str = "polycrop-mode";

const MODAL_HTML: &str = r#"
<div class="polycrop-header">
  <span class="polycrop-title">Irregular crop</span>
  <button type="button" class="polycrop-close" data-action="close" aria-label="Close">&times;</button>
</div>
<div class="polycrop-modes">
  <label><input type="radio" name="polycrop-mode" value="polygon"> Polygon</label>
  <label><input type="radio" name="polycrop-mode" value="free_draw"> Free draw</label>
</div>
<p class="polycrop-hint">Polygon: click to add points, double-click to close. Free draw: hold the mouse button and trace the outline.</p>
<div class="polycrop-stage"><canvas class="polycrop-canvas"></canvas></div>
<div class="polycrop-toolbar">
  <button type="button" data-action="undo">Undo point</button>
  <button type="button" data-action="clear">Clear</button>
  <button type="button" data-action="close-path">Close path</button>
  <span class="polycrop-spacer"></span>
  <button type="button" data-action="cancel">Cancel</button>
  <button type="button" data-action="apply" class="polycrop-apply">Apply crop</button>
</div>
"#;

const MODAL_CSS: &str = r#"
#polycrop-modal { padding: 0; border: none; border-radius: 8px; background: #1e1e1e; color: #ddd; max-width: 95vw; max-height: 95vh; font-family: sans-serif; }
#polycrop-modal::backdrop { background: rgba(0, 0, 0, 0.7); }
#polycrop-modal .polycrop-header { display: flex; justify-content: space-between; align-items: center; padding: 8px 12px; border-bottom: 1px solid #333; }
#polycrop-modal .polycrop-close { background: none; border: none; color: #ddd; font-size: 20px; cursor: pointer; }
#polycrop-modal .polycrop-modes, #polycrop-modal .polycrop-hint { padding: 4px 12px; margin: 0; font-size: 13px; }
#polycrop-modal .polycrop-stage { padding: 8px 12px; overflow: auto; text-align: center; }
#polycrop-modal .polycrop-canvas { max-width: 85vw; max-height: 65vh; cursor: crosshair; touch-action: none; }
#polycrop-modal .polycrop-toolbar { display: flex; gap: 8px; padding: 8px 12px; border-top: 1px solid #333; }
#polycrop-modal .polycrop-spacer { flex: 1; }
#polycrop-modal button { padding: 4px 10px; border-radius: 4px; border: 1px solid #555; background: #2b2b2b; color: #ddd; cursor: pointer; }
#polycrop-modal .polycrop-apply { background: #2e7d32; border-color: #2e7d32; color: #fff; }
"#;

/// Handles into the crop dialog. Cloning shares the underlying nodes.
#[derive(Clone)]
pub struct Modal {
    pub dialog: HtmlDialogElement,
    pub canvas: HtmlCanvasElement,
    pub close_button: HtmlButtonElement,
    pub undo_button: HtmlButtonElement,
    pub clear_button: HtmlButtonElement,
    pub close_path_button: HtmlButtonElement,
    pub cancel_button: HtmlButtonElement,
    pub apply_button: HtmlButtonElement,
    pub mode_inputs: Vec<HtmlInputElement>,
}

thread_local! {
    static MODAL: RefCell<Option<Modal>> = const { RefCell::new(None) };
}

pub fn get_element<T: JsCast>(root: &Element, selector: &str) -> Result<T, JsValue> {
    let element = root
        .query_selector(selector)?
        .ok_or_else(|| JsValue::from_str(&format!("Missing element: {selector}")))?;
    element
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("Invalid element type: {selector}")))
}

pub fn js_error_text(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(value, &JsValue::from_str("message"))
                .ok()
                .and_then(|message| message.as_string())
        })
        .unwrap_or_else(|| "unknown error".to_string())
}

pub fn page_transition_persisted(event: &Event) -> Option<bool> {
    js_sys::Reflect::get(event.as_ref(), &JsValue::from_str("persisted"))
        .ok()?
        .as_bool()
}

pub fn debug_enabled(window: &Window) -> bool {
    let search = window.location().search().ok().unwrap_or_default();
    search.contains("debug=1") || search.contains("debug=true")
}

/// Returns the page's crop dialog, building it on first use. A dialog that
/// was detached from the document is replaced.
pub fn modal(document: &Document) -> Result<Modal, JsValue> {
    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("Missing body"))?;
    let existing = MODAL.with(|slot| slot.borrow().clone());
    if let Some(modal) = existing {
        if body.contains(Some(modal.dialog.as_ref())) {
            return Ok(modal);
        }
    }

    ensure_styles(document)?;
    if let Some(stale) = document.get_element_by_id(MODAL_ID) {
        stale.remove();
    }
    let dialog = document
        .create_element("dialog")?
        .dyn_into::<HtmlDialogElement>()
        .map_err(|_| JsValue::from_str("dialog element unsupported"))?;
    dialog.set_id(MODAL_ID);
    dialog.set_inner_html(MODAL_HTML);
    body.append_child(&dialog)?;

    let root: &Element = dialog.as_ref();
    let inputs = root.query_selector_all(&format!("input[name=\"{MODE_INPUT_NAME}\"]"))?;
    let mut mode_inputs = Vec::with_capacity(inputs.length() as usize);
    for index in 0..inputs.length() {
        if let Some(input) = inputs
            .item(index)
            .and_then(|node| node.dyn_into::<HtmlInputElement>().ok())
        {
            mode_inputs.push(input);
        }
    }

    let modal = Modal {
        canvas: get_element(root, "canvas.polycrop-canvas")?,
        close_button: get_element(root, "button[data-action=\"close\"]")?,
        undo_button: get_element(root, "button[data-action=\"undo\"]")?,
        clear_button: get_element(root, "button[data-action=\"clear\"]")?,
        close_path_button: get_element(root, "button[data-action=\"close-path\"]")?,
        cancel_button: get_element(root, "button[data-action=\"cancel\"]")?,
        apply_button: get_element(root, "button[data-action=\"apply\"]")?,
        mode_inputs,
        dialog,
    };
    MODAL.with(|slot| *slot.borrow_mut() = Some(modal.clone()));
    Ok(modal)
}

fn ensure_styles(document: &Document) -> Result<(), JsValue> {
    if document.get_element_by_id(STYLE_ID).is_some() {
        return Ok(());
    }
    let head = document
        .head()
        .ok_or_else(|| JsValue::from_str("Missing head"))?;
    let style = document.create_element("style")?;
    style.set_id(STYLE_ID);
    style.set_text_content(Some(MODAL_CSS));
    head.append_child(&style)?;
    Ok(())
}

/// Puts a dialog taken out by `remove_modal` back into the page. Listeners
/// bound to its nodes survive the round trip, so the handles stay valid.
pub fn reattach_modal(document: &Document, modal: &Modal) -> Result<(), JsValue> {
    if modal.dialog.is_connected() {
        return Ok(());
    }
    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("Missing body"))?;
    ensure_styles(document)?;
    if let Some(stale) = document.get_element_by_id(MODAL_ID) {
        stale.remove();
    }
    body.append_child(&modal.dialog)?;
    MODAL.with(|slot| *slot.borrow_mut() = Some(modal.clone()));
    log::debug!("Crop dialog reattached");
    Ok(())
}

/// Detaches the dialog and its stylesheet from the page.
pub fn remove_modal(document: &Document) {
    MODAL.with(|slot| slot.borrow_mut().take());
    for id in [MODAL_ID, STYLE_ID] {
        if let Some(element) = document.get_element_by_id(id) {
            element.remove();
        }
    }
}

pub fn select_mode_input(modal: &Modal, mode: DrawingMode) {
    for input in &modal.mode_inputs {
        input.set_checked(input.value() == mode.as_str());
    }
}

pub fn event_to_point(canvas: &HtmlCanvasElement, event: &MouseEvent) -> Point {
    let rect = canvas.get_bounding_client_rect();
    display_to_image(
        event.client_x() as f64,
        event.client_y() as f64,
        DisplayRect {
            left: rect.left(),
            top: rect.top(),
            width: rect.width(),
            height: rect.height(),
        },
        canvas.width(),
        canvas.height(),
    )
}

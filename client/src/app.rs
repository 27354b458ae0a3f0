use std::cell::Cell;
use std::rc::Rc;

use js_sys::Reflect;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, HtmlButtonElement, KeyboardEvent, MouseEvent, PointerEvent};

use polycrop_shared::{DrawingMode, ServerMessage};

use crate::canvas::WebHost;
use crate::coords::is_drawing_pointer;
use crate::dom::{
    debug_enabled, event_to_point, modal, page_transition_persisted, remove_modal,
};
use crate::lifecycle::discards_page;
use crate::logger;
use crate::net::HttpCropApi;
use crate::session::SessionManager;
use crate::ws::{connect_ws, WsEvent};

type App = SessionManager<WebHost, HttpCropApi>;

fn document_ready_state(document: &web_sys::Document) -> Option<String> {
    Reflect::get(document.as_ref(), &JsValue::from_str("readyState"))
        .ok()?
        .as_string()
}

fn server_message_kind(message: &ServerMessage) -> &'static str {
    match message {
        ServerMessage::SessionOpen { .. } => "session:open",
        ServerMessage::SessionExpired { .. } => "session:expired",
    }
}

#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
    logger::init(debug_enabled(&window));
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;
    let started = Rc::new(Cell::new(false));

    if document_ready_state(&document).as_deref() == Some("complete") {
        started.set(true);
        return start_app();
    }

    let onload_started = started.clone();
    let onload = Closure::<dyn FnMut(Event)>::new(move |_| {
        if onload_started.replace(true) {
            return;
        }
        if let Err(err) = start_app() {
            log::error!("Failed to start cropper: {err:?}");
        }
    });
    window.add_event_listener_with_callback("load", onload.as_ref().unchecked_ref())?;
    onload.forget();

    Ok(())
}

fn on_click(
    button: &HtmlButtonElement,
    app: &Rc<App>,
    action: fn(&Rc<App>),
) -> Result<(), JsValue> {
    let app = app.clone();
    let onclick = Closure::<dyn FnMut(Event)>::new(move |_| action(&app));
    button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
    onclick.forget();
    Ok(())
}

fn spawn_submit(app: &Rc<App>) {
    let app = app.clone();
    spawn_local(async move {
        if let Ok(outcome) = app.submit().await {
            log::debug!("Submit finished: {outcome:?}");
        }
    });
}

fn spawn_cancel(app: &Rc<App>) {
    let app = app.clone();
    spawn_local(async move {
        app.cancel().await;
    });
}

fn handle_server_message(app: &Rc<App>, message: ServerMessage) {
    log::debug!("WS message {}", server_message_kind(&message));
    match message {
        ServerMessage::SessionOpen {
            session_id,
            image_data,
            config,
        } => {
            let app = app.clone();
            spawn_local(async move {
                if let Err(error) = app.open(session_id, &image_data, config).await {
                    log::warn!("Crop session did not open: {error}");
                }
            });
        }
        ServerMessage::SessionExpired { session_id } => app.expire(&session_id),
    }
}

fn start_app() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;

    let modal = modal(&document)?;
    let host = WebHost::new(window.clone(), modal.clone())?;
    let app = SessionManager::new(host, HttpCropApi::new(window.clone()));
    let canvas = modal.canvas.clone();

    {
        let down_app = app.clone();
        let down_canvas = canvas.clone();
        let ondown = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if !is_drawing_pointer(event.is_primary(), event.button()) {
                return;
            }
            event.prevent_default();
            let _ = down_canvas.set_pointer_capture(event.pointer_id());
            down_app.press(event_to_point(&down_canvas, &event));
        });
        canvas.add_event_listener_with_callback("pointerdown", ondown.as_ref().unchecked_ref())?;
        ondown.forget();
    }

    {
        let move_app = app.clone();
        let move_canvas = canvas.clone();
        let onmove = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if !event.is_primary() || !move_app.cropper().model().is_dragging() {
                return;
            }
            move_app.drag_to(event_to_point(&move_canvas, &event));
        });
        canvas.add_event_listener_with_callback("pointermove", onmove.as_ref().unchecked_ref())?;
        onmove.forget();
    }

    for name in ["pointerup", "pointercancel"] {
        let up_app = app.clone();
        let up_canvas = canvas.clone();
        let onup = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if !event.is_primary() {
                return;
            }
            if up_canvas.has_pointer_capture(event.pointer_id()) {
                let _ = up_canvas.release_pointer_capture(event.pointer_id());
            }
            up_app.release();
        });
        canvas.add_event_listener_with_callback(name, onup.as_ref().unchecked_ref())?;
        onup.forget();
    }

    {
        let dbl_app = app.clone();
        let ondblclick = Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
            event.prevent_default();
            dbl_app.double_press();
        });
        canvas.add_event_listener_with_callback("dblclick", ondblclick.as_ref().unchecked_ref())?;
        ondblclick.forget();
    }

    {
        let oncontextmenu = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            event.prevent_default();
        });
        canvas.add_event_listener_with_callback(
            "contextmenu",
            oncontextmenu.as_ref().unchecked_ref(),
        )?;
        oncontextmenu.forget();
    }

    on_click(&modal.undo_button, &app, |app| app.undo_last_point())?;
    on_click(&modal.clear_button, &app, |app| app.clear_path())?;
    on_click(&modal.close_path_button, &app, |app| app.close_path())?;
    on_click(&modal.apply_button, &app, spawn_submit)?;
    on_click(&modal.cancel_button, &app, spawn_cancel)?;
    on_click(&modal.close_button, &app, spawn_cancel)?;

    for input in &modal.mode_inputs {
        let mode_app = app.clone();
        let input_cb = input.clone();
        let onchange = Closure::<dyn FnMut(Event)>::new(move |_| {
            if !input_cb.checked() {
                return;
            }
            match input_cb.value().parse::<DrawingMode>() {
                Ok(mode) => mode_app.set_mode(mode),
                Err(error) => log::warn!("{error}"),
            }
        });
        input.add_event_listener_with_callback("change", onchange.as_ref().unchecked_ref())?;
        onchange.forget();
    }

    {
        let key_app = app.clone();
        let onkeydown = Closure::<dyn FnMut(KeyboardEvent)>::new(move |event: KeyboardEvent| {
            if event.key() == "Escape" {
                event.prevent_default();
                spawn_cancel(&key_app);
            }
        });
        modal
            .dialog
            .add_event_listener_with_callback("keydown", onkeydown.as_ref().unchecked_ref())?;
        onkeydown.forget();
    }

    {
        // The browser closes a modal dialog on its own "cancel"; route it
        // through the session so the backend hears about it.
        let cancel_app = app.clone();
        let oncancel = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            event.prevent_default();
            spawn_cancel(&cancel_app);
        });
        modal
            .dialog
            .add_event_listener_with_callback("cancel", oncancel.as_ref().unchecked_ref())?;
        oncancel.forget();
    }

    {
        let document_cb = document.clone();
        let onpagehide = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            // A cached page comes back with its dialog still wired.
            if discards_page(page_transition_persisted(&event)) {
                remove_modal(&document_cb);
            }
        });
        window.add_event_listener_with_callback("pagehide", onpagehide.as_ref().unchecked_ref())?;
        onpagehide.forget();
    }

    {
        let ws_app = app.clone();
        connect_ws(&window, move |event| match event {
            WsEvent::Open => log::info!("Connected to crop backend"),
            WsEvent::Close => log::debug!("Crop backend connection closed"),
            WsEvent::Message(message) => handle_server_message(&ws_app, message),
        })?;
    }

    log::info!("Cropper ready");
    Ok(())
}

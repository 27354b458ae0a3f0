use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket, Window};

use polycrop_shared::{decode_server_message, decode_server_text, ServerMessage};

use crate::dom::page_transition_persisted;
use crate::lifecycle::SocketLifecycle;
use crate::net::websocket_url;

const RECONNECT_DELAY_MS: i32 = 2000;

#[derive(Debug)]
pub enum WsEvent {
    Open,
    Close,
    Message(ServerMessage),
}

/// The page's one event socket; reconnects replace `socket` in place.
struct Connection {
    window: Window,
    handler: RefCell<Box<dyn FnMut(WsEvent)>>,
    socket: RefCell<Option<WebSocket>>,
    lifecycle: RefCell<SocketLifecycle>,
}

impl Connection {
    fn emit(&self, event: WsEvent) {
        (self.handler.borrow_mut())(event);
    }

    fn is_current(&self, socket: &WebSocket) -> bool {
        self.socket.borrow().as_ref() == Some(socket)
    }

    fn is_live(&self) -> bool {
        self.socket.borrow().as_ref().is_some_and(|socket| {
            matches!(
                socket.ready_state(),
                WebSocket::CONNECTING | WebSocket::OPEN
            )
        })
    }
}

fn decode_event(event: &MessageEvent) -> Option<ServerMessage> {
    let data = event.data();
    if let Ok(buffer) = data.clone().dyn_into::<js_sys::ArrayBuffer>() {
        let bytes = Uint8Array::new(&buffer).to_vec();
        return match decode_server_message(&bytes) {
            Ok(message) => Some(message),
            Err(error) => {
                log::error!("WS message bincode parse error: {error}");
                None
            }
        };
    }
    if let Some(text) = data.as_string() {
        return match decode_server_text(&text) {
            Ok(message) => Some(message),
            Err(error) => {
                let snippet: String = text.chars().take(200).collect();
                log::error!("WS message JSON parse error: {error} payload={snippet:?}");
                None
            }
        };
    }
    log::error!("WS message data is not a string or arraybuffer");
    None
}

/// Listens for backend pushes. The socket reconnects after a drop and
/// after the page comes back from the back/forward cache.
pub fn connect_ws(window: &Window, on_event: impl 'static + FnMut(WsEvent)) -> Result<(), JsValue> {
    let connection = Rc::new(Connection {
        window: window.clone(),
        handler: RefCell::new(Box::new(on_event)),
        socket: RefCell::new(None),
        lifecycle: RefCell::new(SocketLifecycle::default()),
    });

    {
        let connection = connection.clone();
        let onbeforeunload = Closure::<dyn FnMut(Event)>::new(move |_| {
            connection.lifecycle.borrow_mut().leave();
            if let Some(socket) = connection.socket.borrow().as_ref() {
                let _ = socket.close();
            }
        });
        window.add_event_listener_with_callback(
            "beforeunload",
            onbeforeunload.as_ref().unchecked_ref(),
        )?;
        onbeforeunload.forget();
    }

    {
        let connection = connection.clone();
        let onpageshow = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let live = connection.is_live();
            let reopen = connection
                .lifecycle
                .borrow_mut()
                .on_show(page_transition_persisted(&event), live);
            if reopen {
                log::info!("Page restored, reconnecting WS");
                if let Err(error) = open_socket(&connection) {
                    log::error!("WS reconnect failed: {error:?}");
                }
            }
        });
        window.add_event_listener_with_callback("pageshow", onpageshow.as_ref().unchecked_ref())?;
        onpageshow.forget();
    }

    open_socket(&connection)
}

fn schedule_reconnect(connection: &Rc<Connection>) {
    let retry = connection.clone();
    let onretry = Closure::once_into_js(move || {
        if !retry.lifecycle.borrow().reconnect_after_close() || retry.is_live() {
            return;
        }
        if let Err(error) = open_socket(&retry) {
            log::error!("WS reconnect failed: {error:?}");
        }
    });
    let _ = connection
        .window
        .set_timeout_with_callback_and_timeout_and_arguments_0(
            onretry.unchecked_ref(),
            RECONNECT_DELAY_MS,
        );
}

fn open_socket(connection: &Rc<Connection>) -> Result<(), JsValue> {
    let ws_url = websocket_url(&connection.window)?;
    log::debug!("Connecting to {ws_url}");
    let socket = WebSocket::new(&ws_url)?;
    let _ = Reflect::set(
        socket.as_ref(),
        &JsValue::from_str("binaryType"),
        &JsValue::from_str("arraybuffer"),
    );

    {
        let connection = connection.clone();
        let onopen = Closure::<dyn FnMut(Event)>::new(move |_| {
            connection.emit(WsEvent::Open);
        });
        socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();
    }

    {
        let connection = connection.clone();
        let closed = socket.clone();
        let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
            if !connection.is_current(&closed) {
                return;
            }
            connection.emit(WsEvent::Close);
            if connection.lifecycle.borrow().reconnect_after_close() {
                log::warn!("WS closed (code {}), reconnecting", event.code());
                schedule_reconnect(&connection);
            }
        });
        socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();
    }

    {
        let onerror = Closure::<dyn FnMut(Event)>::new(move |_| {
            log::warn!("WS error");
        });
        socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();
    }

    {
        let connection = connection.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if let Some(message) = decode_event(&event) {
                connection.emit(WsEvent::Message(message));
            }
        });
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();
    }

    *connection.socket.borrow_mut() = Some(socket);
    Ok(())
}

//! Control page, form API and command socket.
//!
//! | Path | Description |
//! |------|-------------|
//! | `/` | control page |
//! | `/static/*` | files from the static directory |
//! | `/control_event` | `POST` form with a `control` token |
//! | `/ws` | JSON command socket |

use {
    crate::{Controller, stopped},
    axum::{
        Form, Router,
        extract::{
            State, WebSocketUpgrade,
            rejection::FormRejection,
            ws::{Message, WebSocket},
        },
        response::{Html, Response},
        routing::{get, post},
    },
    base::log,
    motor::CommandSink,
    serde::{Deserialize, Serialize},
    std::{collections::BTreeSet, path::Path, sync::Arc},
    tokio::{net::TcpListener, sync::watch},
    tower_http::services::ServeDir,
};

/// Shared by every request handler.
pub struct AppState<S> {
    pub controller: Controller<S>,
    pub page: Arc<str>,
    pub shutdown: watch::Receiver<bool>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            page: Arc::clone(&self.page),
            shutdown: self.shutdown.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ControlForm {
    #[serde(default)]
    control: String,
}

/// Messages a page sends on the command socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ClientEvent {
    Control { data: String },
    Join { room: String },
    Leave { room: String },
}

/// Every reply on the command socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub event: String,
    pub data: String,
    pub count: u64,
}

impl ServerEvent {
    pub fn response(data: impl Into<String>, count: u64) -> Self {
        Self {
            event: "response".to_string(),
            data: data.into(),
            count,
        }
    }
}

pub fn router<S: CommandSink + 'static>(state: AppState<S>, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/", get(index::<S>))
        .route("/control_event", post(control_event::<S>))
        .route("/ws", get(command_upgrade::<S>))
        .nest_service("/static", ServeDir::new(static_dir.as_ref()))
        .with_state(state)
}

/// Serve `app` until `shutdown` turns true, then finish in-flight requests.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { stopped(&mut shutdown).await })
        .await
}

async fn index<S: CommandSink + 'static>(State(state): State<AppState<S>>) -> Html<String> {
    Html(state.page.to_string())
}

async fn control_event<S: CommandSink + 'static>(
    State(state): State<AppState<S>>,
    form: Result<Form<ControlForm>, FormRejection>,
) -> &'static str {
    match form {
        Ok(Form(form)) => {
            state.controller.handle_token(&form.control);
        }
        Err(rejection) => log::debug!("control_event without a usable form: {}", rejection),
    }
    "OK"
}

async fn command_upgrade<S: CommandSink + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
) -> Response {
    ws.on_upgrade(move |socket| command_socket(socket, state))
}

/// Per-connection state of the command socket.
struct Session<S> {
    controller: Controller<S>,
    rooms: BTreeSet<String>,
    count: u64,
}

impl<S: CommandSink> Session<S> {
    fn new(controller: Controller<S>) -> Self {
        Self {
            controller,
            rooms: BTreeSet::new(),
            count: 0,
        }
    }

    fn handle(&mut self, text: &str) -> ServerEvent {
        self.count += 1;
        let data = match serde_json::from_str::<ClientEvent>(text) {
            Ok(ClientEvent::Control { data }) => {
                self.controller.handle_name(&data);
                data
            }
            Ok(ClientEvent::Join { room }) => {
                self.rooms.insert(room);
                self.rooms_summary()
            }
            Ok(ClientEvent::Leave { room }) => {
                self.rooms.remove(&room);
                self.rooms_summary()
            }
            Err(error) => {
                log::debug!("invalid command socket message: {}", error);
                "invalid message".to_string()
            }
        };
        ServerEvent::response(data, self.count)
    }

    fn rooms_summary(&self) -> String {
        let rooms: Vec<&str> = self.rooms.iter().map(String::as_str).collect();
        format!("In rooms: {}", rooms.join(", "))
    }
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).map_err(axum::Error::new)?;
    socket.send(Message::Text(text.into())).await
}

async fn command_socket<S: CommandSink + 'static>(mut socket: WebSocket, state: AppState<S>) {
    let mut shutdown = state.shutdown.clone();
    let mut session = Session::new(state.controller.clone());

    if let Err(error) = send_event(&mut socket, &ServerEvent::response("Connected", 0)).await {
        log::warn!("command socket greeting failed: {}", error);
        return;
    }
    log::info!("command socket connected");

    loop {
        let next = tokio::select! {
            next = socket.recv() => Some(next),
            _ = stopped(&mut shutdown) => None,
        };
        let Some(next) = next else {
            let _ = socket.send(Message::Close(None)).await;
            break;
        };
        match next {
            Some(Ok(Message::Text(text))) => {
                let reply = session.handle(text.as_str());
                if let Err(error) = send_event(&mut socket, &reply).await {
                    log::warn!("command socket send failed: {}", error);
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(error)) => {
                log::warn!("command socket error: {}", error);
                break;
            }
        }
    }
    log::info!("command socket closed after {} messages", session.count);
}

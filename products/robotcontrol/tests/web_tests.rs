mod common;

use {
    axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
    },
    common::RecordingSink,
    futures_util::{SinkExt, StreamExt},
    http_body_util::BodyExt,
    robotcontrol::{
        Controller,
        web::{self, AppState, ServerEvent},
    },
    std::sync::{Arc, Mutex},
    tokio::{
        net::TcpListener,
        sync::{mpsc, watch},
        time::{Duration, timeout},
    },
    tokio_websockets::{ClientBuilder, Message},
    tower::ServiceExt,
};

fn app(sink: &RecordingSink) -> (Router, watch::Sender<bool>) {
    let (faults, _) = mpsc::unbounded_channel();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let state = AppState {
        controller: Controller::new(Arc::new(Mutex::new(sink.clone())), 75, faults),
        page: "<canvas width=\"640\" height=\"480\"></canvas>".into(),
        shutdown: shutdown_rx,
    };
    let router = web::router(state, concat!(env!("CARGO_MANIFEST_DIR"), "/static"));
    (router, shutdown)
}

fn control_request(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/control_event")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("request build failed")
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body read failed")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("body not utf-8")
}

#[tokio::test]
async fn test_index_serves_page() {
    let sink = RecordingSink::default();
    let (app, _shutdown) = app(&sink);
    let response = app
        .oneshot(Request::get("/").body(Body::empty()).expect("request build failed"))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("width=\"640\""));
}

#[tokio::test]
async fn test_control_event_forward() {
    let sink = RecordingSink::default();
    let (app, _shutdown) = app(&sink);
    let response = app
        .oneshot(control_request("control=f"))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "OK");
    assert_eq!(sink.calls(), vec![("forward", Some(75))]);
}

#[tokio::test]
async fn test_control_event_unknown_token_is_acknowledged() {
    let sink = RecordingSink::default();
    let (app, _shutdown) = app(&sink);
    let response = app
        .oneshot(control_request("control=x"))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "OK");
    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn test_control_event_without_field_is_acknowledged() {
    let sink = RecordingSink::default();
    let (app, _shutdown) = app(&sink);
    let response = app
        .clone()
        .oneshot(control_request("other=1"))
        .await
        .expect("request failed");
    assert_eq!(body_string(response).await, "OK");

    let bare = Request::post("/control_event")
        .body(Body::empty())
        .expect("request build failed");
    let response = app.oneshot(bare).await.expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn test_control_event_failure_still_acknowledged() {
    let sink = RecordingSink::failing();
    let (app, _shutdown) = app(&sink);
    let response = app
        .oneshot(control_request("control=s"))
        .await
        .expect("request failed");
    assert_eq!(body_string(response).await, "OK");
    assert_eq!(sink.calls(), vec![("stop", None)]);
}

#[tokio::test]
async fn test_static_files_are_served() {
    let sink = RecordingSink::default();
    let (app, _shutdown) = app(&sink);
    let response = app
        .oneshot(
            Request::get("/static/control.js")
                .body(Body::empty())
                .expect("request build failed"),
        )
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("/control_event"));
}

async fn recv_event(
    ws: &mut tokio_websockets::WebSocketStream<tokio_websockets::MaybeTlsStream<tokio::net::TcpStream>>,
) -> ServerEvent {
    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("recv timed out")
        .expect("socket closed")
        .expect("socket error");
    serde_json::from_str(msg.as_text().expect("not a text message")).expect("not a server event")
}

#[tokio::test]
async fn test_command_socket_session() {
    let sink = RecordingSink::default();
    let (app, shutdown) = app(&sink);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().expect("no local addr");
    let server = tokio::spawn(web::serve(listener, app, shutdown.subscribe()));

    let uri: http::Uri = format!("ws://{}/ws", addr).parse().expect("bad uri");
    let (mut ws, _) = ClientBuilder::from_uri(uri)
        .connect()
        .await
        .expect("connect failed");

    assert_eq!(recv_event(&mut ws).await, ServerEvent::response("Connected", 0));

    ws.send(Message::text(r#"{"event":"control","data":"Left"}"#.to_string()))
        .await
        .expect("send failed");
    assert_eq!(recv_event(&mut ws).await, ServerEvent::response("Left", 1));
    assert_eq!(sink.calls(), vec![("left", Some(75))]);

    ws.send(Message::text(r#"{"event":"join","room":"garage"}"#.to_string()))
        .await
        .expect("send failed");
    assert_eq!(recv_event(&mut ws).await, ServerEvent::response("In rooms: garage", 2));

    ws.send(Message::text("{}".to_string())).await.expect("send failed");
    assert_eq!(recv_event(&mut ws).await, ServerEvent::response("invalid message", 3));

    shutdown.send(true).expect("server gone");
    timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .expect("server panicked")
        .expect("server failed");
}

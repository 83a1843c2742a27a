//! Per-run WebSocket channel.
//!
//! Each connection gets an outbound queue drained by its own writer task,
//! and a reader loop that decodes inbound frames in arrival order and hands
//! them to the coordinator.

use std::sync::Arc;
use std::time::Duration;

use actrelay_coordinator::ChannelHandle;
use actrelay_core::{InboundMessage, RunId};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::http::responses::error_response;
use crate::state::AppState;

/// How long queued frames may take to flush after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upgrade to the run's duplex channel.
pub async fn run_channel(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Response {
    let run_id = match RunId::parse(&run_id) {
        Ok(run_id) => run_id,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    ws.on_upgrade(move |socket| serve_channel(state, run_id, socket))
}

async fn serve_channel(state: Arc<AppState>, run_id: RunId, socket: WebSocket) {
    let coordinator = Arc::clone(&state.coordinator);
    let (handle, mut outbound) = ChannelHandle::channel(coordinator.config().channel_buffer);
    let connection_id = handle.connection_id().clone();
    let (mut sink, mut stream) = socket.split();

    if let Some(previous) = coordinator.connect(run_id.clone(), handle.clone()).await {
        info!(run_id = %run_id, previous = %previous, "Replaced existing channel");
    }
    info!(run_id = %run_id, connection_id = %connection_id, "Channel attached");

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, kind = message.kind(), "Failed to encode frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            _ = handle.closed() => {
                info!(run_id = %run_id, connection_id = %connection_id, "Channel superseded");
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(message) = decode_frame(&run_id, &text) {
                        coordinator.handle_inbound(&run_id, message).await;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Pings are answered by axum
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(run_id = %run_id, error = %e, "Channel read error");
                    break;
                }
            }
        }
    }

    let failed = coordinator.disconnect(&run_id, &connection_id).await;
    info!(run_id = %run_id, connection_id = %connection_id, failed, "Channel detached");

    // Dropping the last sender lets the writer flush and close the socket.
    drop(handle);
    let abort = writer.abort_handle();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        abort.abort();
    }
}

/// Decode one text frame, dropping anything malformed.
fn decode_frame(run_id: &RunId, text: &str) -> Option<InboundMessage> {
    match InboundMessage::decode(text) {
        Ok(message) => Some(message),
        Err(e) => {
            debug!(run_id = %run_id, error = %e, "Dropping malformed frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use actrelay_core::{ApprovalResponse, RunMetadata, RunStatus};
    use serde_json::{json, Value};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::http::StatusCode as WsStatusCode;
    use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use tower_http::cors::CorsLayer;

    use crate::config::ServerConfig;
    use crate::http::create_router;

    type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn serve(state: Arc<AppState>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state, CorsLayer::permissive());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }

    async fn connect(addr: SocketAddr, run_id: &RunId) -> ClientSocket {
        let (socket, _) = connect_async(format!("ws://{addr}/ws/run/{run_id}"))
            .await
            .unwrap();
        socket
    }

    /// Start a run that asks for approval once `gate` fires.
    async fn approval_run(
        state: &AppState,
    ) -> (RunId, oneshot::Sender<()>, oneshot::Receiver<ApprovalResponse>) {
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        let (answer_tx, answer_rx) = oneshot::channel();
        let run_id = state
            .coordinator
            .start_run(RunMetadata::new(), move |ctx| async move {
                let _ = gate_rx.await;
                let answer = ctx.request(json!({"message": "Submit the form?"})).await;
                let _ = answer_tx.send(answer);
                ctx.finish(RunStatus::Completed).await;
            })
            .await;
        (run_id, gate_tx, answer_rx)
    }

    async fn wait_attached(state: &AppState, run_id: &RunId, attached: bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.coordinator.is_attached(run_id).await != attached {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn next_json(socket: &mut ClientSocket) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
                .await
                .unwrap();
            match frame {
                Some(Ok(WsMessage::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                other => panic!("Expected text frame, got {other:?}"),
            }
        }
    }

    /// Returns once the server has closed `socket`.
    async fn wait_closed(socket: &mut ClientSocket) {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
                .await
                .unwrap();
            match frame {
                Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_superseded_socket_is_closed_and_new_one_answers() {
        let state = AppState::dry_run(&ServerConfig::default());
        let addr = serve(Arc::clone(&state)).await;
        let (run_id, gate, answer) = approval_run(&state).await;

        let mut first = connect(addr, &run_id).await;
        wait_attached(&state, &run_id, true).await;
        let mut second = connect(addr, &run_id).await;
        wait_closed(&mut first).await;
        assert!(state.coordinator.is_attached(&run_id).await);

        gate.send(()).unwrap();
        let request = next_json(&mut second).await;
        assert_eq!(request["type"], "request");
        assert_eq!(request["payload"]["message"], "Submit the form?");

        // Malformed frames are dropped without closing the channel.
        second
            .send(WsMessage::Text("not json".to_string()))
            .await
            .unwrap();
        second
            .send(WsMessage::Text(r#"{"type":"response"}"#.to_string()))
            .await
            .unwrap();
        let response = json!({
            "type": "response",
            "request_id": request["request_id"],
            "payload": {"approved": true, "reason": "ok"},
        });
        second
            .send(WsMessage::Text(response.to_string()))
            .await
            .unwrap();

        let answer = tokio::time::timeout(Duration::from_secs(5), answer)
            .await
            .unwrap()
            .unwrap();
        assert!(answer.approved);
        assert_eq!(answer.reason, "ok");

        second.close(None).await.unwrap();
        wait_attached(&state, &run_id, false).await;
    }

    #[tokio::test]
    async fn test_socket_close_fails_pending_request() {
        let state = AppState::dry_run(&ServerConfig::default());
        let addr = serve(Arc::clone(&state)).await;
        let (run_id, gate, answer) = approval_run(&state).await;

        let mut socket = connect(addr, &run_id).await;
        wait_attached(&state, &run_id, true).await;
        gate.send(()).unwrap();
        assert_eq!(next_json(&mut socket).await["type"], "request");
        assert_eq!(state.coordinator.pending_requests(&run_id).await, 1);

        socket.close(None).await.unwrap();

        let answer = tokio::time::timeout(Duration::from_secs(5), answer)
            .await
            .unwrap()
            .unwrap();
        assert!(!answer.approved);
        assert_eq!(answer.reason, "Error: Client disconnected");
        wait_attached(&state, &run_id, false).await;
        assert_eq!(state.coordinator.pending_requests(&run_id).await, 0);
    }

    #[tokio::test]
    async fn test_cancel_frame_is_acknowledged() {
        let state = AppState::dry_run(&ServerConfig::default());
        let addr = serve(Arc::clone(&state)).await;
        let (run_id, _gate, _answer) = approval_run(&state).await;

        let mut socket = connect(addr, &run_id).await;
        wait_attached(&state, &run_id, true).await;
        socket
            .send(WsMessage::Text(r#"{"type":"cancel"}"#.to_string()))
            .await
            .unwrap();

        assert_eq!(next_json(&mut socket).await, json!({"type": "cancelled", "data": null}));
        assert_eq!(
            state.coordinator.status(&run_id).await,
            Some(RunStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_invalid_run_id_is_rejected() {
        let state = AppState::dry_run(&ServerConfig::default());
        let addr = serve(state).await;

        let err = connect_async(format!("ws://{addr}/ws/run/a:b"))
            .await
            .unwrap_err();
        match err {
            WsError::Http(response) => assert_eq!(response.status(), WsStatusCode::BAD_REQUEST),
            other => panic!("Expected HTTP rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_frame() {
        let run_id = RunId::new("run-1");

        let message = decode_frame(
            &run_id,
            r#"{"type":"response","request_id":"run-1:abc","payload":{"approved":true}}"#,
        );
        assert!(matches!(message, Some(InboundMessage::Response { .. })));

        assert_eq!(
            decode_frame(&run_id, r#"{"type":"cancel"}"#),
            Some(InboundMessage::Cancel)
        );
        assert_eq!(
            decode_frame(&run_id, r#"{"type":"ping"}"#),
            Some(InboundMessage::Unknown)
        );
    }

    #[test]
    fn test_decode_frame_drops_malformed() {
        let run_id = RunId::new("run-1");

        assert_eq!(decode_frame(&run_id, "not json"), None);
        assert_eq!(decode_frame(&run_id, r#"{"request_id":"x"}"#), None);
        assert_eq!(decode_frame(&run_id, r#"{"type":"response"}"#), None);
    }
}

//! WebSocket upgrade handler for operator sessions.
//!
//! Connection lifecycle:
//! 1. Subscribe to the fan-out bus (before the upgrade completes, so no
//!    event published after the handshake is missed)
//! 2. Send `connected`
//! 3. Forward events until either side closes
//!
//! A session that falls behind the bus capacity receives `resync` instead of
//! the dropped events.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use super::messages::{ClientFrame, ServerFrame, TypingSignal};
use crate::adapters::http::AppState;
use crate::domain::foundation::{DeskEvent, DeskEventKind};
use crate::ports::FanoutPublisher;

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let events = state.engine.fanout().subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, state, events))
}

async fn handle_socket(socket: WebSocket, state: AppState, mut events: broadcast::Receiver<DeskEvent>) {
    let session_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!(session_id = %session_id, "Operator session connected");

    if send_frame(&mut sender, &ServerFrame::connected(&session_id)).await.is_err() {
        return;
    }

    // Frames the receive side wants sent back (pong, errors).
    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::channel::<ServerFrame>(16);

    let send_session = session_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => match ServerFrame::event(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode desk event");
                            continue;
                        }
                    },
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(session_id = %send_session, missed, "Operator session lagged");
                        ServerFrame::resync(missed)
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(frame) => frame,
                    None => break,
                },
            };
            if send_frame(&mut sender, &frame).await.is_err() {
                break;
            }
        }
    });

    let fanout = std::sync::Arc::clone(state.engine.fanout());
    let recv_session = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            let text = match result {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            let reply = match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::Ping) => Some(ServerFrame::pong()),
                Ok(ClientFrame::Typing(signal)) => {
                    publish_typing(fanout.as_ref(), signal);
                    None
                }
                Err(e) => {
                    tracing::debug!(session_id = %recv_session, error = %e, "Unsupported client frame");
                    Some(ServerFrame::error(
                        "UNSUPPORTED_FRAME",
                        "Only typing and ping frames are accepted",
                    ))
                }
            };
            if let Some(frame) = reply {
                if reply_tx.send(frame).await.is_err() {
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    tracing::debug!(session_id = %session_id, "Operator session closed");
}

/// Typing signals are best-effort and never audited.
fn publish_typing(fanout: &dyn FanoutPublisher, signal: TypingSignal) {
    let mut event = DeskEvent::new(DeskEventKind::Typing).for_conversation(signal.conversation_id);
    if let Some(agent_id) = signal.agent_id {
        event = event.for_agent(agent_id);
    }
    fanout.publish(event);
}

async fn send_frame(sender: &mut SplitSink<WebSocket, Message>, frame: &ServerFrame) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fanout::BroadcastFanout;
    use crate::domain::foundation::ConversationId;

    #[tokio::test]
    async fn typing_signal_is_published_without_sequence() {
        let bus = BroadcastFanout::default();
        let mut rx = bus.subscribe();
        let conversation_id = ConversationId::new();

        publish_typing(
            &bus,
            TypingSignal {
                conversation_id,
                agent_id: None,
            },
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, DeskEventKind::Typing);
        assert_eq!(event.conversation_id, Some(conversation_id));
        assert!(event.sequence.is_none());
    }
}

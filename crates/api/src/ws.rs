use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use core_sim::EngineState;
use runtime::SessionEvent;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

pub async fn events_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events(mut socket: WebSocket, state: AppState) {
    // Subscribe first so no tick falls between the snapshot and the stream.
    let mut events = state.subscribe_events();

    let Ok(snapshot) = state.session().snapshot(state.snapshot_window()).await else {
        return;
    };
    if send_event(&mut socket, &SessionEvent::Tick { snapshot })
        .await
        .is_err()
    {
        return;
    }
    if state.session().state() == EngineState::Stopped {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => return,
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(&mut socket, &event).await.is_err() {
                            return;
                        }
                        // Streams end at the first stop.
                        if matches!(event, SessionEvent::Stopped { .. }) {
                            let _ = socket.send(Message::Close(None)).await;
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "websocket client lagged behind session events");
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &SessionEvent) -> Result<(), ()> {
    let payload = event_json(event)?;
    socket.send(Message::Text(payload)).await.map_err(|_| ())
}

fn event_json(event: &SessionEvent) -> Result<String, ()> {
    serde_json::to_string(event).map_err(|_| ())
}

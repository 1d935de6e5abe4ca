use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{sink::SinkExt, stream::StreamExt, Sink};
use serde::{Deserialize, Serialize};
use tdp::services::ProgressEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::handlers::{actor_from_headers, ApiError};
use crate::server::app::AppState;

/// Messages pushed to a progress subscriber
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProgressMessage {
    /// Current state, sent once on connect
    StatusUpdate(ProgressEvent),
    ProgressUpdate(ProgressEvent),
}

pub async fn restore_progress_handler(
    ws: WebSocketUpgrade,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let actor = actor_from_headers(&headers);
    let (snapshot, receiver) = state
        .ctx
        .restore_service()
        .subscribe(&actor, &task_id)
        .await?;

    info!("Progress subscriber connected to restore {}", task_id);
    Ok(ws.on_upgrade(move |socket| stream_progress(socket, snapshot, receiver)))
}

async fn stream_progress(
    socket: WebSocket,
    snapshot: ProgressEvent,
    receiver: Option<broadcast::Receiver<ProgressEvent>>,
) {
    let task_id = snapshot.task_id.clone();
    let (mut sender, mut incoming) = socket.split();

    if send(&mut sender, &ProgressMessage::StatusUpdate(snapshot)).await.is_err() {
        return;
    }

    if let Some(mut receiver) = receiver {
        loop {
            tokio::select! {
                event = receiver.recv() => match event {
                    Ok(event) => {
                        let terminal = event.is_terminal();
                        if send(&mut sender, &ProgressMessage::ProgressUpdate(event)).await.is_err() {
                            return;
                        }
                        if terminal {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Progress subscriber of {} skipped {} events", task_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                message = incoming.next() => match message {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        debug!("Progress subscriber of {} went away", task_id);
                        return;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
    info!("Progress stream for restore {} finished", task_id);
}

async fn send<S>(sender: &mut S, message: &ProgressMessage) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize progress message: {}", e);
            return Err(());
        }
    };
    sender.send(Message::Text(json)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdp::backup::ImportCounts;
    use tdp::database::entities::RestoreStatus;

    #[test]
    fn test_message_shape() {
        let event = ProgressEvent {
            task_id: "t1".to_string(),
            status: RestoreStatus::Processing,
            progress: 40,
            message: "Importing tags".to_string(),
            imported_counts: ImportCounts::default(),
        };

        let value = serde_json::to_value(ProgressMessage::StatusUpdate(event.clone())).unwrap();
        assert_eq!(value["type"], "status_update");
        assert_eq!(value["data"]["progress"], 40);
        assert_eq!(value["data"]["status"], "processing");

        let value = serde_json::to_value(ProgressMessage::ProgressUpdate(event)).unwrap();
        assert_eq!(value["type"], "progress_update");
    }
}

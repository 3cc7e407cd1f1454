use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc, watch,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::sse::{ServerEvent, SystemStatus},
    state::SharedState,
};

const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Subscribe to leaderboard change notifications and degraded-mode updates.
pub fn subscribe_leaderboard(
    state: &SharedState,
) -> (broadcast::Receiver<ServerEvent>, watch::Receiver<bool>) {
    (state.subscribe_best_scores(), state.degraded_watcher())
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

fn status_event(degraded: bool) -> Option<Event> {
    match ServerEvent::json(
        Some(EVENT_SYSTEM_STATUS.to_string()),
        &SystemStatus { degraded },
    ) {
        Ok(payload) => Some(to_event(payload)),
        Err(err) => {
            warn!(error = %err, "failed to serialize system status event");
            None
        }
    }
}

/// Convert the subscriptions into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
///
/// The current degraded flag is sent first, then again whenever it changes.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    mut degraded: watch::Receiver<bool>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let initial = *degraded.borrow_and_update();
        if let Some(event) = status_event(initial) {
            if tx.send(Ok(event)).await.is_err() {
                return;
            }
        }

        let mut watching = true;
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                changed = degraded.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    let flag = *degraded.borrow_and_update();
                    if let Some(event) = status_event(flag) {
                        if tx.send(Ok(event)).await.is_err() {
                            break;
                        }
                    }
                }
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Skip lagged messages but keep the stream alive.
                            warn!(skipped, "leaderboard SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!("Leaderboard SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc, watch,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    services::{room_events, room_service},
    state::{SharedState, room_code::RoomCode},
};

/// Everything a new room stream needs: its first frame and the live feeds.
pub struct RoomSubscription {
    code: RoomCode,
    initial: Option<ServerEvent>,
    receiver: broadcast::Receiver<ServerEvent>,
    degraded: watch::Receiver<bool>,
}

/// Subscribe to the events of one room.
///
/// The broadcast receiver is registered before the snapshot is read, so a commit landing
/// in between is delivered after the snapshot instead of being lost.
pub async fn subscribe_room(
    state: &SharedState,
    code: &RoomCode,
) -> Result<RoomSubscription, ServiceError> {
    let receiver = state.hub().subscribe(code.as_str());
    let room = match room_service::get_room(state, code).await {
        Ok(room) => room,
        Err(err) => {
            drop(receiver);
            state.hub().release(code.as_str());
            return Err(err);
        }
    };

    Ok(RoomSubscription {
        code: code.clone(),
        initial: room_events::room_updated_event(&room),
        receiver,
        degraded: state.degraded_watcher(),
    })
}

/// Convert a room subscription into an SSE response, forwarding events and
/// cleaning up once the client disconnects or the room is deleted.
pub fn to_sse_stream(
    subscription: RoomSubscription,
    state: SharedState,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let RoomSubscription {
        code,
        initial,
        mut receiver,
        mut degraded,
    } = subscription;

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let initial_sent = match initial {
            Some(event) => tx.send(Ok(to_event(event))).await.is_ok(),
            None => true,
        };
        if initial_sent {
            forward(&code, &mut receiver, &mut degraded, &tx).await;
        }

        drop(receiver);
        state.hub().release(code.as_str());
        info!(code = %code, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Pump room events and degraded-mode changes into `tx` until either side goes away.
async fn forward(
    code: &RoomCode,
    receiver: &mut broadcast::Receiver<ServerEvent>,
    degraded: &mut watch::Receiver<bool>,
    tx: &mpsc::Sender<Result<Event, Infallible>>,
) {
    loop {
        tokio::select! {
            _ = tx.closed() => break,
            changed = degraded.changed() => {
                if changed.is_err() {
                    break;
                }
                let flag = *degraded.borrow_and_update();
                if let Some(event) = room_events::system_status_event(flag) {
                    if tx.send(Ok(to_event(event))).await.is_err() {
                        break;
                    }
                }
            }
            recv_result = receiver.recv() => {
                match recv_result {
                    Ok(payload) => {
                        let terminal = payload.is_terminal();
                        if tx.send(Ok(to_event(payload))).await.is_err() || terminal {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        // Every frame is a full snapshot; the next one supersedes the gap.
                        debug!(code = %code, skipped, "room SSE subscriber lagged");
                        continue;
                    }
                }
            }
        }
    }
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::room_store::memory::MemoryRoomStore,
        dto::sse::EVENT_ROOM_UPDATED,
        state::{AppState, room::SettingsPatch, test_support::player},
    };

    #[tokio::test]
    async fn subscription_starts_with_a_snapshot() {
        let state = AppState::new(AppConfig::default());
        state
            .install_room_store(Arc::new(MemoryRoomStore::new()))
            .await;
        let room = room_service::create_room(&state, player("a"), SettingsPatch::default())
            .await
            .unwrap();

        let subscription = subscribe_room(&state, &room.code).await.unwrap();
        let initial = subscription.initial.as_ref().unwrap();
        assert_eq!(initial.event.as_deref(), Some(EVENT_ROOM_UPDATED));
        assert_eq!(state.hub().subscriber_count(room.code.as_str()), 1);
    }

    #[tokio::test]
    async fn unknown_room_leaves_no_channel_behind() {
        let state = AppState::new(AppConfig::default());
        state
            .install_room_store(Arc::new(MemoryRoomStore::new()))
            .await;
        let code = RoomCode::parse("ZZZZZZ").unwrap();

        assert!(subscribe_room(&state, &code).await.is_err());
        assert_eq!(state.hub().subscriber_count(code.as_str()), 0);
    }
}

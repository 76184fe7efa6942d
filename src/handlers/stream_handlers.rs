//! Server-Sent Events push channel for file-list changes.
//!
//! Each connection subscribes to the store; the subscription lives inside
//! the response stream and is released when the client disconnects.

use crate::{
    models::api::FilesEvent,
    services::{
        file_store::{Snapshot, Subscription},
        share_service::ShareService,
    },
};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::{convert::Infallible, time::Duration};
use tokio::sync::watch;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

struct StreamState {
    rx: watch::Receiver<Snapshot>,
    _subscription: Subscription,
    primed: bool,
}

/// `GET /files/stream`: emits the current listing, then one event per
/// store change. Slow clients skip straight to the latest listing.
pub async fn stream_files(
    State(service): State<ShareService>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (rx, subscription) = service.store().subscribe();
    let state = StreamState {
        rx,
        _subscription: subscription,
        primed: false,
    };

    let stream = stream::unfold(state, |mut state| async move {
        if state.primed && state.rx.changed().await.is_err() {
            return None;
        }
        state.primed = true;

        let event = files_event(&state.rx.borrow_and_update());
        Some((Ok(event), state))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

fn files_event(snapshot: &Snapshot) -> Event {
    let payload = FilesEvent {
        files: snapshot.iter().map(|record| record.metadata()).collect(),
    };
    let data = serde_json::to_string(&payload).unwrap_or_default();
    Event::default().data(data)
}

//! GET /events - SSE stream of hub events

use crate::AppState;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use tableau_common::sse::event_bus_sse_stream;

pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_bus_sse_stream(&state.event_bus, "tableau-hub")
}

//! Reduce a run event stream to the text of the final answer.

use super::events::RunEvent;
use crate::error::Result;
use futures::{future, Stream, StreamExt};

/// Yield the text of every final-answer content chunk, in order.
///
/// Every other event is dropped. Errors pass through unchanged so a failed
/// query stays distinguishable from an empty answer.
pub fn answer_text<S>(events: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = Result<RunEvent>>,
{
    events.filter_map(|event| {
        future::ready(match event {
            Ok(event) => event.into_answer_text().map(Ok),
            Err(e) => Some(Err(e)),
        })
    })
}

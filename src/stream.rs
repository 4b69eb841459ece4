//! Streaming support types and utilities.

use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::client::ClientError;

pub use crate::sse::{is_done_marker, parse_sse_line};

/// One unit of an incremental completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Newly generated text.
    Content(String),
    /// The completion finished. Nothing follows.
    Done,
}

/// Boxed stream of completion events.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ClientError>> + Send>>;

/// Abort a stream with [`ClientError::Cancelled`] when `token` fires.
///
/// The cancellation error is the last item; the inner stream is dropped with
/// the wrapper.
pub fn cancellable(inner: FragmentStream, token: CancellationToken) -> FragmentStream {
    Box::pin(stream::unfold(
        (inner, token, false),
        |(mut inner, token, finished)| async move {
            if finished {
                return None;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    Some((Err(ClientError::Cancelled), (inner, token, true)))
                }
                item = inner.next() => {
                    item.map(|item| (item, (inner, token, false)))
                }
            }
        },
    ))
}

/// Drain a stream into its full text, stopping at [`StreamEvent::Done`].
pub async fn collect_text(mut stream: FragmentStream) -> Result<String, ClientError> {
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Content(fragment) => text.push_str(&fragment),
            StreamEvent::Done => break,
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(items: Vec<Result<StreamEvent, ClientError>>) -> FragmentStream {
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn test_collect_text_stops_at_done() {
        let stream = events(vec![
            Ok(StreamEvent::Content("Hel".to_string())),
            Ok(StreamEvent::Content("lo".to_string())),
            Ok(StreamEvent::Done),
            Ok(StreamEvent::Content("ignored".to_string())),
        ]);
        assert_eq!(collect_text(stream).await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_collect_text_propagates_errors() {
        let stream = events(vec![
            Ok(StreamEvent::Content("partial".to_string())),
            Err(ClientError::Fetch("reset".to_string())),
        ]);
        assert!(matches!(collect_text(stream).await, Err(ClientError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_cancellable_fails_fast() {
        let token = CancellationToken::new();
        let mut stream = cancellable(
            Box::pin(stream::pending::<Result<StreamEvent, ClientError>>()),
            token.clone(),
        );
        token.cancel();

        assert!(matches!(stream.next().await, Some(Err(ClientError::Cancelled))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancellable_passes_events_through() {
        let token = CancellationToken::new();
        let stream = cancellable(
            events(vec![
                Ok(StreamEvent::Content("a".to_string())),
                Ok(StreamEvent::Done),
            ]),
            token,
        );
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 2);
    }
}

//! Extraction Pipeline
//!
//! Strict request/response loop for a bidirectional extraction call:
//!
//! ```text
//!            ┌──────────── response sent ◄──────────┐
//!            ▼                                      │
//! ──► AwaitRequest ──request──► Processing ─────────┘
//!        │    │                     │
//!       EOF  error/cancel      engine error / send failure
//!        ▼    ▼                     ▼
//!      Done  Failed               Failed
//! ```
//!
//! One request is fully processed and answered before the next is read.
//! Cancellation is observed before and while waiting for a request; a
//! request that is already in the engine runs to completion first.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::StreamError;
use crate::application::ports::SharedExtractor;
use crate::domain::extraction::Entity;
use crate::infrastructure::metrics;

/// Runs requests through the extraction engine one at a time.
#[derive(Clone)]
pub struct ExtractionPipeline {
    extractor: SharedExtractor,
}

impl ExtractionPipeline {
    /// Create a pipeline backed by `extractor`.
    #[must_use]
    pub const fn new(extractor: SharedExtractor) -> Self {
        Self { extractor }
    }

    /// Drive one call until the caller closes its side or something fails.
    ///
    /// Returns the number of responses written on clean completion. A
    /// send failure is terminal, like a receive failure.
    ///
    /// # Errors
    ///
    /// - `StreamError::Cancelled` if `cancel` fired or the caller went away
    /// - `StreamError::Transport` if the inbound stream failed or a
    ///   response could not be written
    /// - `StreamError::Engine` if the engine rejected a request
    pub async fn run<S>(
        &self,
        inbound: S,
        outbound: &mpsc::Sender<Vec<Entity>>,
        cancel: &CancellationToken,
    ) -> Result<u64, StreamError>
    where
        S: Stream<Item = Result<String, StreamError>>,
    {
        let mut inbound = std::pin::pin!(inbound);
        let mut answered = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(StreamError::Cancelled),
                () = outbound.closed() => return Err(StreamError::Cancelled),
                next = inbound.next() => next,
            };

            let text = match next {
                None => return Ok(answered),
                Some(Err(e)) => return Err(e),
                Some(Ok(text)) => text,
            };

            let entities = self.extract(text).await?;

            outbound
                .send(entities)
                .await
                .map_err(|_| StreamError::send_closed())?;
            metrics::record_extraction_requests(1);
            answered += 1;
        }
    }

    /// Run the engine on the blocking pool and wait for it.
    async fn extract(&self, text: String) -> Result<Vec<Entity>, StreamError> {
        let extractor = Arc::clone(&self.extractor);
        let started = std::time::Instant::now();

        let result = tokio::task::spawn_blocking(move || extractor.extract(&text))
            .await
            .map_err(|e| StreamError::Internal(e.to_string()))?;

        metrics::record_extraction_duration(started.elapsed());
        Ok(result?)
    }
}

impl std::fmt::Debug for ExtractionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionPipeline").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use mockall::Sequence;
    use mockall::predicate::eq;
    use parking_lot::Mutex;

    use super::*;
    use crate::application::ports::MockEntityExtractor;
    use crate::domain::extraction::ExtractionError;

    fn requests(texts: &[&str]) -> impl Stream<Item = Result<String, StreamError>> {
        let items: Vec<_> = texts.iter().map(|t| Ok((*t).to_string())).collect();
        stream::iter(items)
    }

    fn collect(rx: &mut mpsc::Receiver<Vec<Entity>>) -> Vec<Vec<Entity>> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn answers_each_request_in_order() {
        let mut mock = MockEntityExtractor::new();
        let mut seq = Sequence::new();
        mock.expect_extract()
            .with(eq("Barack Obama visited Paris."))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(vec![
                    Entity::new("Barack Obama", "PERSON"),
                    Entity::new("Paris", "GPE"),
                ])
            });
        mock.expect_extract()
            .with(eq("no entities here"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![]));

        let pipeline = ExtractionPipeline::new(Arc::new(mock));
        let (tx, mut rx) = mpsc::channel(8);

        let answered = pipeline
            .run(
                requests(&["Barack Obama visited Paris.", "no entities here"]),
                &tx,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(answered, 2);
        let responses = collect(&mut rx);
        assert_eq!(responses.len(), 2);
        assert_eq!(
            responses[0],
            vec![
                Entity::new("Barack Obama", "PERSON"),
                Entity::new("Paris", "GPE")
            ]
        );
        assert!(responses[1].is_empty());
    }

    #[tokio::test]
    async fn empty_input_completes_cleanly() {
        let mut mock = MockEntityExtractor::new();
        mock.expect_extract().never();

        let pipeline = ExtractionPipeline::new(Arc::new(mock));
        let (tx, _rx) = mpsc::channel(8);

        let answered = pipeline
            .run(requests(&[]), &tx, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answered, 0);
    }

    #[tokio::test]
    async fn engine_error_aborts_the_call() {
        let mut mock = MockEntityExtractor::new();
        let mut seq = Sequence::new();
        mock.expect_extract()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![Entity::new("Ada", "PERSON")]));
        mock.expect_extract()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ExtractionError::Unparseable { offset: 0 }));

        let pipeline = ExtractionPipeline::new(Arc::new(mock));
        let (tx, mut rx) = mpsc::channel(8);

        let err = pipeline
            .run(
                requests(&["Ada", "\u{0}", "never processed"]),
                &tx,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StreamError::Engine(ExtractionError::Unparseable { offset: 0 })
        );
        assert_eq!(collect(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn receive_error_is_terminal() {
        let mut mock = MockEntityExtractor::new();
        mock.expect_extract().times(1).returning(|_| Ok(vec![]));

        let pipeline = ExtractionPipeline::new(Arc::new(mock));
        let (tx, mut rx) = mpsc::channel(8);
        let inbound = stream::iter(vec![
            Ok("first".to_string()),
            Err(StreamError::receive("connection reset")),
            Ok("after failure".to_string()),
        ]);

        let err = pipeline
            .run(inbound, &tx, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "receive request: connection reset");
        assert_eq!(collect(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_receive() {
        let mut mock = MockEntityExtractor::new();
        mock.expect_extract().never();

        let pipeline = ExtractionPipeline::new(Arc::new(mock));
        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pipeline
            .run(requests(&["Ada"]), &tx, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, StreamError::Cancelled);
    }

    #[tokio::test]
    async fn cancel_while_waiting_for_request() {
        let mut mock = MockEntityExtractor::new();
        mock.expect_extract().never();

        let pipeline = ExtractionPipeline::new(Arc::new(mock));
        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = pipeline
            .run(stream::pending(), &tx, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, StreamError::Cancelled);
    }

    #[tokio::test]
    async fn caller_gone_counts_as_cancelled() {
        let mut mock = MockEntityExtractor::new();
        mock.expect_extract().never();

        let pipeline = ExtractionPipeline::new(Arc::new(mock));
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let err = pipeline
            .run(requests(&["Ada"]), &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, StreamError::Cancelled);
    }

    #[tokio::test]
    async fn send_failure_is_terminal() {
        let (tx, rx) = mpsc::channel(8);
        let receiver = Arc::new(Mutex::new(Some(rx)));

        // The caller disappears while its request is in the engine.
        let mut mock = MockEntityExtractor::new();
        let slot = Arc::clone(&receiver);
        mock.expect_extract().times(1).returning(move |_| {
            slot.lock().take();
            Ok(vec![])
        });

        let pipeline = ExtractionPipeline::new(Arc::new(mock));
        let err = pipeline
            .run(
                requests(&["Ada", "Grace"]),
                &tx,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, StreamError::send_closed());
    }

    struct PanickingExtractor;

    impl crate::application::ports::EntityExtractor for PanickingExtractor {
        fn extract(&self, _text: &str) -> Result<Vec<Entity>, ExtractionError> {
            panic!("model crashed")
        }
    }

    #[tokio::test]
    async fn engine_panic_is_internal() {
        let pipeline = ExtractionPipeline::new(Arc::new(PanickingExtractor));
        let (tx, _rx) = mpsc::channel(8);

        let err = pipeline
            .run(requests(&["Ada"]), &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "internal");
    }
}

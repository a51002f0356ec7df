//! Record streams for live consumers

use std::sync::Arc;

use futures_util::stream::{self, Stream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::interceptor::Interceptor;
use super::subscribers::Subscription;

/// Subscription that unsubscribes itself when dropped
struct ScopedSubscription {
    tee: Arc<Interceptor>,
    subscription: Subscription,
}

impl Drop for ScopedSubscription {
    fn drop(&mut self) {
        self.tee.unsubscribe(self.subscription.id());
    }
}

impl Interceptor {
    /// Stream every record emitted from now until `cancel` fires
    ///
    /// The subscriber is registered before this returns, so nothing written
    /// after the call is missed. The stream ends when `cancel` is cancelled
    /// or the subscriber is removed. However it ends, including the consumer
    /// simply dropping the stream, the subscriber is unsubscribed.
    pub fn stream_to_consumer(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = String> + Send + 'static {
        let scoped = ScopedSubscription {
            tee: Arc::clone(self),
            subscription: self.subscribe(),
        };

        stream::unfold((scoped, cancel), |(mut scoped, cancel)| async move {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(subscriber = %scoped.subscription.id(), "Record stream cancelled");
                    None
                }
                record = scoped.subscription.recv() => record,
            };
            next.map(|record| (record, (scoped, cancel)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tee::interceptor::TeeOptions;
    use crate::tee::record::parse_record;
    use crate::tee::test_support::SharedBuffer;
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready};

    fn tee() -> (tempfile::TempDir, Arc<Interceptor>) {
        let dir = tempfile::tempdir().unwrap();
        let options = TeeOptions::new(dir.path().join("stream.log"));
        let tee = Interceptor::new(&options, Box::new(SharedBuffer::new())).unwrap();
        (dir, Arc::new(tee))
    }

    fn content(record: &str) -> &str {
        parse_record(record).unwrap().1
    }

    #[tokio::test]
    async fn test_stream_yields_records_written_after_call() {
        let (_dir, tee) = tee();
        tee.write("before\n").unwrap();

        let stream = tee.stream_to_consumer(CancellationToken::new());
        tee.write("one\ntwo\n").unwrap();

        let records: Vec<String> = stream.take(2).collect().await;
        assert_eq!(content(&records[0]), "one");
        assert_eq!(content(&records[1]), "two");
    }

    #[tokio::test]
    async fn test_cancel_ends_stream_and_unsubscribes() {
        let (_dir, tee) = tee();
        let cancel = CancellationToken::new();
        let mut stream = Box::pin(tee.stream_to_consumer(cancel.clone()));
        assert_eq!(tee.subscriber_count(), 1);

        let waiter = tokio::spawn(async move { stream.next().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let ended = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("stream did not observe cancellation")
            .unwrap();
        assert!(ended.is_none());
        assert_eq!(tee.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_wins_over_queued_records() {
        let (_dir, tee) = tee();
        let cancel = CancellationToken::new();
        let mut stream = Box::pin(tee.stream_to_consumer(cancel.clone()));

        tee.write("queued\n").unwrap();
        cancel.cancel();

        assert!(stream.next().await.is_none());
        assert_eq!(tee.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let (_dir, tee) = tee();
        let stream = tee.stream_to_consumer(CancellationToken::new());
        assert_eq!(tee.subscriber_count(), 1);

        drop(stream);
        assert_eq!(tee.subscriber_count(), 0);
    }

    #[test]
    fn test_stream_is_pending_until_a_record_arrives() {
        let (_dir, tee) = tee();
        let mut stream = Box::pin(tee.stream_to_consumer(CancellationToken::new()));

        let mut next = tokio_test::task::spawn(stream.next());
        assert_pending!(next.poll());

        tee.write("wake\n").unwrap();
        assert!(next.is_woken());
        let record = assert_ready!(next.poll()).unwrap();
        assert_eq!(content(&record), "wake");
    }

    #[tokio::test]
    async fn test_concurrent_streams_are_independent() {
        let (_dir, tee) = tee();
        let first = tee.stream_to_consumer(CancellationToken::new());
        let second = tee.stream_to_consumer(CancellationToken::new());
        assert_eq!(tee.subscriber_count(), 2);

        for i in 0..5 {
            tee.write(&format!("r{}\n", i)).unwrap();
        }

        let a: Vec<String> = first.take(5).collect().await;
        assert_eq!(tee.subscriber_count(), 1);
        let b: Vec<String> = second.take(5).collect().await;
        assert_eq!(a, b);
        assert_eq!(tee.subscriber_count(), 0);
    }
}

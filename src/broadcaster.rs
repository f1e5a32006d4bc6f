//! Rate-limited broadcast queue shared by every component that sends
//! outbound messages.
//!
//! All callers feed one FIFO queue; whichever caller finds the queue idle
//! becomes the drainer and delivers items one at a time, pacing them to stay
//! under the configured send rate. Every caller gets the outcome of its own
//! item through a per-item completion channel, no matter who drained it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use teloxide::types::{ChatId, MessageId};
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::transport::{SendError, SendOptions, Transport};

/// Telegram caps message text at 4096 characters
const MAX_TEXT_LEN: usize = 4096;

/// Payload of one delivery request
#[derive(Debug, Clone)]
pub enum Content {
    Text(String),
    /// A "typing…" chat action; produces no message id
    Typing,
}

impl Content {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

struct QueueItem {
    chat: ChatId,
    content: Content,
    opts: SendOptions,
    done: oneshot::Sender<Option<MessageId>>,
}

/// Queue plus the drainer flag, guarded together so the check-and-set of
/// the flag and the append are atomic on a multi-threaded runtime.
/// The lock is never held across an await.
struct Shared {
    queue: VecDeque<QueueItem>,
    draining: bool,
}

#[derive(Clone)]
pub struct Broadcaster(Arc<BroadcasterInner>);

struct BroadcasterInner {
    transport: Box<dyn Transport>,
    /// Delay enforced between consecutive dispatches
    pace: Duration,
    shared: Mutex<Shared>,
}

/// Releases the drainer flag if the drain loop is cancelled mid-item,
/// so a later enqueue can pick the queue back up.
struct DrainGuard<'a> {
    shared: &'a Mutex<Shared>,
    armed: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.lock().unwrap().draining = false;
        }
    }
}

impl Broadcaster {
    pub fn new(transport: impl Transport + 'static, max_messages_per_second: u32) -> Self {
        assert_ne!(max_messages_per_second, 0);
        Self(Arc::new(BroadcasterInner {
            transport: Box::new(transport),
            pace: Duration::from_secs(1) / max_messages_per_second,
            shared: Mutex::new(Shared { queue: VecDeque::new(), draining: false }),
        }))
    }

    /// Queue one delivery and wait for its outcome.
    ///
    /// Returns the message id for delivered text, `None` for chat actions
    /// and for any failure. Failures never propagate past this point; they
    /// only show up in the logs.
    pub async fn send_content(
        &self,
        chat: ChatId,
        content: Content,
        opts: SendOptions,
    ) -> Option<MessageId> {
        if let Content::Text(text) = &content {
            if text.is_empty() {
                error!("{}: text message cannot be empty", chat);
                return None;
            }
        }

        let (tx, rx) = oneshot::channel();
        let became_drainer = {
            let mut shared = self.0.shared.lock().unwrap();
            shared.queue.push_back(QueueItem { chat, content, opts, done: tx });
            if shared.draining {
                false
            } else {
                shared.draining = true;
                true
            }
        };

        if became_drainer {
            self.drain().await;
        }

        // The drainer (this call or another one) fulfills the channel
        rx.await.unwrap_or(None)
    }

    /// Send the same content to every chat in order, one paced dispatch at
    /// a time. Per-recipient failures are logged by the dispatch path and
    /// do not stop the rest of the batch.
    pub async fn broadcast(&self, chats: &[ChatId], content: Content, opts: SendOptions) {
        for &chat in chats {
            self.send_content(chat, content.clone(), opts.clone()).await;
        }
        if !chats.is_empty() {
            info!("broadcast to {} chats finished", chats.len());
        }
    }

    /// Pop and dispatch items until the queue is observed empty, then
    /// release the drainer flag. At most one execution runs this loop.
    async fn drain(&self) {
        let mut guard = DrainGuard { shared: &self.0.shared, armed: true };
        loop {
            let item = {
                let mut shared = self.0.shared.lock().unwrap();
                match shared.queue.pop_front() {
                    Some(item) => item,
                    None => {
                        shared.draining = false;
                        guard.armed = false;
                        return;
                    }
                }
            };
            let outcome = self.dispatch(&item).await;
            // The receiver may be gone if the caller was cancelled
            let _ = item.done.send(outcome);
            sleep(self.0.pace).await;
        }
    }

    /// Deliver a single item, retrying on rate-limit and swallowing every
    /// other failure so one bad recipient never shortens the batch.
    async fn dispatch(&self, item: &QueueItem) -> Option<MessageId> {
        loop {
            let result = match &item.content {
                Content::Text(text) => {
                    let text = truncate_chars(text, MAX_TEXT_LEN);
                    self.0.transport.send_text(item.chat, text, &item.opts).await.map(Some)
                }
                Content::Typing => self.0.transport.send_typing(item.chat).await.map(|_| None),
            };
            match result {
                Ok(id) => return id,
                Err(SendError::RetryAfter(delay)) => {
                    warn!("{}: flood limit, sleeping {:?}", item.chat, delay);
                    sleep(delay).await;
                }
                Err(err) => {
                    error!("{}: send failed: {}", item.chat, err);
                    return None;
                }
            }
        }
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::transport::Result;

    /// Records every call and serves scripted outcomes in order
    struct MockTransport {
        calls: Mutex<Vec<(ChatId, Option<String>, bool)>>,
        script: Mutex<VecDeque<Result<MessageId>>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockTransport {
        fn new(script: Vec<Result<MessageId>>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                script: Mutex::new(script.into()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn next_outcome(&self) -> Result<MessageId> {
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(MessageId(0)))
        }

        fn calls(&self) -> Vec<(ChatId, Option<String>, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for Arc<MockTransport> {
        async fn send_text(
            &self,
            chat: ChatId,
            text: &str,
            opts: &SendOptions,
        ) -> Result<MessageId> {
            let n = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(n, Ordering::SeqCst);
            // Hold the call open long enough for overlap to be observable
            sleep(Duration::from_millis(1)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push((chat, Some(text.to_string()), opts.notify));
            self.next_outcome()
        }

        async fn send_typing(&self, chat: ChatId) -> Result<()> {
            self.calls.lock().unwrap().push((chat, None, true));
            self.next_outcome().map(|_| ())
        }
    }

    fn broadcaster(transport: &Arc<MockTransport>, rate: u32) -> Broadcaster {
        Broadcaster::new(transport.clone(), rate)
    }

    #[tokio::test(start_paused = true)]
    async fn text_outcome_is_message_id() {
        let transport = MockTransport::new(vec![Ok(MessageId(123))]);
        let bc = broadcaster(&transport, 20);
        let id = bc.send_content(ChatId(1), Content::text("hello"), SendOptions::notify()).await;
        assert_eq!(id, Some(MessageId(123)));
        assert_eq!(transport.calls(), vec![(ChatId(1), Some("hello".into()), true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn typing_produces_no_id() {
        let transport = MockTransport::new(vec![]);
        let bc = broadcaster(&transport, 20);
        let id = bc.send_content(ChatId(1), Content::Typing, SendOptions::notify()).await;
        assert_eq!(id, None);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_text_short_circuits() {
        let transport = MockTransport::new(vec![]);
        let bc = broadcaster(&transport, 20);
        let id = bc.send_content(ChatId(5), Content::text(""), SendOptions::notify()).await;
        assert_eq!(id, None);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_is_silent_ordered_and_paced() {
        let transport = MockTransport::new(vec![Ok(MessageId(1)), Ok(MessageId(2))]);
        let bc = broadcaster(&transport, 20);
        let start = Instant::now();
        bc.broadcast(&[ChatId(111), ChatId(222)], Content::text("hi"), SendOptions::silent())
            .await;
        let calls = transport.calls();
        assert_eq!(
            calls,
            vec![
                (ChatId(111), Some("hi".into()), false),
                (ChatId(222), Some("hi".into()), false),
            ]
        );
        // two sends at 20 msg/s are at least one pacing interval apart
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_lower_bound() {
        let transport = MockTransport::new(vec![]);
        let bc = broadcaster(&transport, 10);
        let chats: Vec<_> = (1..=4).map(ChatId).collect();
        let start = Instant::now();
        bc.broadcast(&chats, Content::text("x"), SendOptions::silent()).await;
        // (N - 1) / rate = 3 * 100ms
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_never_shortens_the_batch() {
        let transport = MockTransport::new(vec![
            Ok(MessageId(1)),
            Err(SendError::BadRequest("chat not found".into())),
            Ok(MessageId(3)),
        ]);
        let bc = broadcaster(&transport, 20);
        bc.broadcast(
            &[ChatId(1), ChatId(2), ChatId(3)],
            Content::text("hi"),
            SendOptions::notify(),
        )
        .await;
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_recipient_maps_to_none() {
        let transport = MockTransport::new(vec![Err(SendError::Forbidden)]);
        let bc = broadcaster(&transport, 20);
        let id = bc.send_content(ChatId(1), Content::text("hi"), SendOptions::notify()).await;
        assert_eq!(id, None);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_is_retried_after_backoff() {
        let transport = MockTransport::new(vec![
            Err(SendError::RetryAfter(Duration::from_secs(1))),
            Ok(MessageId(42)),
        ]);
        let bc = broadcaster(&transport, 20);
        let start = Instant::now();
        let id = bc.send_content(ChatId(1), Content::text("hi"), SendOptions::notify()).await;
        assert_eq!(id, Some(MessageId(42)));
        assert_eq!(transport.calls().len(), 2);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_drainer() {
        let transport = MockTransport::new(vec![]);
        let bc = broadcaster(&transport, 10);

        let a = {
            let bc = bc.clone();
            async move {
                bc.broadcast(
                    &[ChatId(1), ChatId(2), ChatId(3)],
                    Content::text("a"),
                    SendOptions::notify(),
                )
                .await;
            }
        };
        let b = {
            let bc = bc.clone();
            async move {
                // Let the first caller become the drainer
                sleep(Duration::from_millis(1)).await;
                let id = bc.send_content(ChatId(4), Content::text("b"), SendOptions::notify()).await;
                assert_eq!(id, Some(MessageId(0)));
            }
        };
        let (a, b) = tokio::join!(tokio::spawn(a), tokio::spawn(b));
        a.unwrap();
        b.unwrap();

        // No dispatch ever overlapped another
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(transport.calls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn items_enqueued_mid_drain_keep_fifo_order() {
        let transport = MockTransport::new(vec![]);
        let bc = broadcaster(&transport, 10);

        // The drainer's pacing sleep is long enough for the second task to
        // enqueue chat 20 before chat 10's drain cycle observes the queue
        // empty; the drainer must pick it up in insertion order.
        let first = {
            let bc = bc.clone();
            tokio::spawn(async move {
                bc.send_content(ChatId(10), Content::text("x"), SendOptions::notify()).await;
            })
        };
        let second = {
            let bc = bc.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(2)).await;
                bc.send_content(ChatId(20), Content::text("y"), SendOptions::notify()).await;
            })
        };
        first.await.unwrap();
        second.await.unwrap();

        let order: Vec<_> = transport.calls().iter().map(|(chat, ..)| *chat).collect();
        assert_eq!(order, vec![ChatId(10), ChatId(20)]);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_drainer_releases_the_flag() {
        let transport = MockTransport::new(vec![]);
        let bc = broadcaster(&transport, 10);

        let drainer = {
            let bc = bc.clone();
            tokio::spawn(async move {
                bc.broadcast(
                    &[ChatId(1), ChatId(2), ChatId(3)],
                    Content::text("x"),
                    SendOptions::notify(),
                )
                .await;
            })
        };
        // Let the first item go out, then kill the drainer in its pacing sleep
        sleep(Duration::from_millis(5)).await;
        drainer.abort();
        assert!(drainer.await.unwrap_err().is_cancelled());

        // The flag must have been released so a later caller can take over
        let id = tokio::time::timeout(
            Duration::from_secs(5),
            bc.send_content(ChatId(4), Content::text("y"), SendOptions::notify()),
        )
        .await
        .expect("queue never resumed after the drainer was cancelled");
        assert_eq!(id, Some(MessageId(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn long_text_is_truncated() {
        let transport = MockTransport::new(vec![]);
        let bc = broadcaster(&transport, 20);
        let long = "й".repeat(5000);
        bc.send_content(ChatId(1), Content::text(long), SendOptions::notify()).await;
        let calls = transport.calls();
        assert_eq!(calls[0].1.as_ref().unwrap().chars().count(), MAX_TEXT_LEN);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_broadcast_is_a_noop() {
        let transport = MockTransport::new(vec![]);
        let bc = broadcaster(&transport, 20);
        bc.broadcast(&[], Content::text("hi"), SendOptions::notify()).await;
        assert!(transport.calls().is_empty());
    }
}

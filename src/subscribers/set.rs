//! # SubscriberSet: non-blocking fan-out over multiple subscribers.
//!
//! [`SubscriberSet`] distributes each [`Event`] to multiple subscribers
//! **without awaiting** their processing.
//!
//! ## What it guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and reported as
//!   `SubscriberPanicked` events (isolation).
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on per-subscriber queue overflow: the event is dropped
//!   for that subscriber and a `SubscriberOverflow` event is published.
//!
//! ## Diagram
//! ```text
//!    emit(&Event)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//!                                              │
//!                              panic / overflow ─► Bus
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event, EventKind};

use super::Subscribe;

/// Stringifies a caught panic payload.
fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Per-subscriber channel with metadata
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
///
/// Subscriber misbehavior (overflow, panic) is reported back onto the
/// [`Bus`] it was built with, so the same event stream carries it.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    ///
    /// Each subscriber gets a bounded queue of size `max(queue_capacity, 1)`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let sub_bus = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(payload) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        sub_bus.publish(
                            Event::new(EventKind::SubscriberPanicked)
                                .with_subscriber(name)
                                .with_reason(panic_reason(&*payload)),
                        );
                    }
                }
            });

            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }

        Self { channels, workers, bus }
    }

    /// Bridges the set onto a [`Bus`]: subscribes and forwards every event
    /// to the subscribers from a background task.
    ///
    /// The forwarder stops when the bus is dropped; dropping the returned
    /// handle does not stop it.
    pub fn listen(self: Arc<Self>, bus: &Bus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => self.emit(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Fan-out one event to all subscribers (non-blocking).
    ///
    /// A full or closed subscriber queue drops the event for that
    /// subscriber and publishes `SubscriberOverflow` naming it.
    pub fn emit(&self, event: &Event) {
        // Never generate overflow-on-overflow cascades.
        let is_overflow_evt = matches!(event.kind, EventKind::SubscriberOverflow);

        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    if !is_overflow_evt {
                        self.bus.publish(
                            Event::new(EventKind::SubscriberOverflow)
                                .with_subscriber(channel.name)
                                .with_reason("queue full"),
                        );
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    if !is_overflow_evt {
                        self.bus.publish(
                            Event::new(EventKind::SubscriberOverflow)
                                .with_subscriber(channel.name)
                                .with_reason("worker closed"),
                        );
                    }
                }
            }
        }
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    struct Counting {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl Subscribe for Counting {
        async fn on_event(&self, _event: &Event) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    struct Panicking;

    #[async_trait]
    impl Subscribe for Panicking {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber bug");
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    /// Parks forever on the first event, so a tiny queue overflows.
    struct Wedged;

    #[async_trait]
    impl Subscribe for Wedged {
        async fn on_event(&self, _event: &Event) {
            std::future::pending::<()>().await;
        }

        fn name(&self) -> &'static str {
            "wedged"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_emit_reaches_all_subscribers() {
        let counting = Arc::new(Counting {
            seen: AtomicUsize::new(0),
        });
        let set = SubscriberSet::new(
            vec![counting.clone() as Arc<dyn Subscribe>],
            Bus::new(16),
        );

        set.emit(&Event::new(EventKind::ShardStarted));
        set.emit(&Event::new(EventKind::ShardStopped));
        set.shutdown().await;

        assert_eq!(counting.seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated_and_reported() {
        let bus = Bus::new(16);
        let mut events = bus.subscribe();
        let counting = Arc::new(Counting {
            seen: AtomicUsize::new(0),
        });
        let set = SubscriberSet::new(
            vec![
                Arc::new(Panicking) as Arc<dyn Subscribe>,
                counting.clone() as Arc<dyn Subscribe>,
            ],
            bus,
        );
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::ProcessSpawned));
        set.shutdown().await;

        assert_eq!(counting.seen.load(Ordering::SeqCst), 1);
        let report = events.recv().await.unwrap();
        assert_eq!(report.kind, EventKind::SubscriberPanicked);
        assert_eq!(report.subscriber, Some("panicking"));
        assert_eq!(report.reason.as_deref(), Some("subscriber bug"));
    }

    #[tokio::test]
    async fn test_overflow_drops_and_reports_for_that_subscriber_only() {
        let bus = Bus::new(16);
        let mut events = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Wedged) as Arc<dyn Subscribe>], bus);

        // First event wedges the worker, second fills the queue, third
        // overflows.
        for _ in 0..3 {
            set.emit(&Event::new(EventKind::ProcessReady));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let report = events.try_recv().unwrap();
        assert_eq!(report.kind, EventKind::SubscriberOverflow);
        assert_eq!(report.subscriber, Some("wedged"));
    }

    #[tokio::test]
    async fn test_listen_forwards_bus_events() {
        let counting = Arc::new(Counting {
            seen: AtomicUsize::new(0),
        });
        let bus = Bus::new(64);
        let set = Arc::new(SubscriberSet::new(
            vec![counting.clone() as Arc<dyn Subscribe>],
            bus.clone(),
        ));
        let _forwarder = Arc::clone(&set).listen(&bus);

        bus.publish(Event::new(EventKind::ProcessReady));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(counting.seen.load(Ordering::SeqCst), 1);
    }
}

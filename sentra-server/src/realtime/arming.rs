use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

/// Schedules delayed arm activations, one pending countdown per
/// customer.
///
/// Each schedule stamps a fresh generation into the pending table; the
/// spawned timer only runs its completion if its own generation is
/// still current when it wakes. Disarming or re-arming overwrites the
/// entry, so superseded timers expire as no-ops without needing to be
/// aborted. The completion receives an [`ArmTicket`] and commits it
/// after its own side effects, so a disarm that lands mid-completion
/// still invalidates the countdown.
#[derive(Debug, Default)]
pub struct ArmScheduler {
    pending: DashMap<Uuid, u64>,
    generation: AtomicU64,
}

impl ArmScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a countdown. Any previous pending countdown for the
    /// customer is superseded. `complete` runs once the delay elapses,
    /// unless the countdown was cancelled or replaced in the meantime;
    /// it decides via [`ArmTicket::commit`] whether its effects stand.
    pub fn schedule<F, Fut>(self: &Arc<Self>, customer_id: Uuid, delay: Duration, complete: F)
    where
        F: FnOnce(ArmTicket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.pending.insert(customer_id, generation);
        debug!(%customer_id, generation, delay_secs = delay.as_secs(), "arm countdown started");

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            sleep(delay).await;
            if scheduler.is_current(customer_id, generation) {
                let ticket = ArmTicket {
                    scheduler,
                    customer_id,
                    generation,
                };
                complete(ticket).await;
            } else {
                debug!(%customer_id, generation, "arm countdown superseded");
            }
        });
    }

    /// Cancel the pending countdown, if any. Returns whether one was
    /// pending.
    pub fn cancel(&self, customer_id: Uuid) -> bool {
        self.pending.remove(&customer_id).is_some()
    }

    pub fn has_pending(&self, customer_id: Uuid) -> bool {
        self.pending.contains_key(&customer_id)
    }

    fn is_current(&self, customer_id: Uuid, generation: u64) -> bool {
        self.pending
            .get(&customer_id)
            .is_some_and(|current| *current == generation)
    }

    fn take_if_current(&self, customer_id: Uuid, generation: u64) -> bool {
        self.pending
            .remove_if(&customer_id, |_, current| *current == generation)
            .is_some()
    }
}

/// Held by a running completion; proves its countdown reached the
/// deadline while still current. Committing consumes the pending entry
/// atomically, so exactly one of commit and cancel wins.
#[derive(Debug)]
pub struct ArmTicket {
    scheduler: Arc<ArmScheduler>,
    customer_id: Uuid,
    generation: u64,
}

impl ArmTicket {
    /// Returns false when a disarm or re-arm superseded the countdown
    /// after the deadline; the completion must then undo its effects.
    pub fn commit(self) -> bool {
        self.scheduler
            .take_if_current(self.customer_id, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use tokio::sync::{Notify, oneshot};

    fn flag_completion(
        flag: Arc<AtomicBool>,
    ) -> impl FnOnce(ArmTicket) -> futures_util::future::Ready<()> {
        move |ticket| {
            if ticket.commit() {
                flag.store(true, Ordering::SeqCst);
            }
            futures_util::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_fires_after_delay() {
        let scheduler = Arc::new(ArmScheduler::new());
        let customer = Uuid::new_v4();
        let armed = Arc::new(AtomicBool::new(false));

        scheduler.schedule(
            customer,
            Duration::from_secs(30),
            flag_completion(Arc::clone(&armed)),
        );
        assert!(scheduler.has_pending(customer));

        sleep(Duration::from_secs(31)).await;
        assert!(armed.load(Ordering::SeqCst));
        assert!(!scheduler.has_pending(customer));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_activation() {
        let scheduler = Arc::new(ArmScheduler::new());
        let customer = Uuid::new_v4();
        let armed = Arc::new(AtomicBool::new(false));

        scheduler.schedule(
            customer,
            Duration::from_secs(30),
            flag_completion(Arc::clone(&armed)),
        );

        sleep(Duration::from_secs(5)).await;
        assert!(scheduler.cancel(customer));

        sleep(Duration::from_secs(60)).await;
        assert!(!armed.load(Ordering::SeqCst));
        assert!(!scheduler.cancel(customer));
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_supersedes_earlier_countdown() {
        let scheduler = Arc::new(ArmScheduler::new());
        let customer = Uuid::new_v4();
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));

        scheduler.schedule(
            customer,
            Duration::from_secs(30),
            flag_completion(Arc::clone(&first)),
        );
        sleep(Duration::from_secs(10)).await;
        scheduler.schedule(
            customer,
            Duration::from_secs(30),
            flag_completion(Arc::clone(&second)),
        );

        // The first timer wakes at t=30 but its generation is stale.
        sleep(Duration::from_secs(25)).await;
        assert!(!first.load(Ordering::SeqCst));
        assert!(!second.load(Ordering::SeqCst));

        sleep(Duration::from_secs(10)).await;
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn countdowns_are_per_customer() {
        let scheduler = Arc::new(ArmScheduler::new());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let alice_armed = Arc::new(AtomicBool::new(false));
        let bob_armed = Arc::new(AtomicBool::new(false));

        scheduler.schedule(
            alice,
            Duration::from_secs(10),
            flag_completion(Arc::clone(&alice_armed)),
        );
        scheduler.schedule(
            bob,
            Duration::from_secs(30),
            flag_completion(Arc::clone(&bob_armed)),
        );

        assert!(scheduler.cancel(bob));
        sleep(Duration::from_secs(60)).await;

        assert!(alice_armed.load(Ordering::SeqCst));
        assert!(!bob_armed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_during_completion_invalidates_commit() {
        let scheduler = Arc::new(ArmScheduler::new());
        let customer = Uuid::new_v4();
        let armed = Arc::new(AtomicBool::new(false));
        let gate = Arc::new(Notify::new());
        let (entered_tx, entered_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        {
            let armed = Arc::clone(&armed);
            let gate = Arc::clone(&gate);
            scheduler.schedule(customer, Duration::from_secs(30), move |ticket| async move {
                let _ = entered_tx.send(());
                gate.notified().await;
                if ticket.commit() {
                    armed.store(true, Ordering::SeqCst);
                }
                let _ = done_tx.send(());
            });
        }

        sleep(Duration::from_secs(31)).await;
        entered_rx.await.unwrap();

        // The deadline has passed and the completion is mid-flight;
        // the disarm must still win.
        assert!(scheduler.cancel(customer));
        gate.notify_one();
        done_rx.await.unwrap();

        assert!(!armed.load(Ordering::SeqCst));
        assert!(!scheduler.has_pending(customer));
    }
}

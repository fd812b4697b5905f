//! At-most-one-in-flight execution per key.
//!
//! The first caller for a key claims it and runs the work; every concurrent
//! caller for the same key waits on the claimant's outcome instead of running
//! the work again. Successful outcomes stay recorded until evicted; failed
//! outcomes are delivered to all waiters and then forgotten so a later call
//! can retry.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

/// State of a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlightState<E> {
    /// Work is in progress
    Running,
    /// Work completed successfully
    Done,
    /// Work failed; the slot has been released
    Failed(E),
    /// The claimant was dropped before finishing
    Abandoned,
}

impl<E> FlightState<E> {
    fn is_settled(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

type Slot<E> = Arc<watch::Sender<FlightState<E>>>;

enum Claim<E> {
    Leader(Slot<E>),
    Follower(Slot<E>),
}

/// Keyed single-flight table.
pub struct SingleFlight<K, E> {
    slots: Mutex<HashMap<K, Slot<E>>>,
}

impl<K, E> SingleFlight<K, E>
where
    K: Eq + Hash + Clone,
    E: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` for `key` unless it already completed or is in flight.
    ///
    /// All callers that overlap with one execution observe that execution's
    /// outcome. If the claimant is dropped mid-flight, one of the waiters
    /// takes over.
    pub async fn run<F, Fut>(&self, key: &K, work: F) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        loop {
            let slot = match self.claim(key) {
                Claim::Leader(slot) => {
                    let mut guard = FlightGuard {
                        flight: self,
                        key: key.clone(),
                        slot,
                        settled: false,
                    };
                    let outcome = work().await;
                    guard.settle(&outcome);
                    return outcome;
                }
                Claim::Follower(slot) => slot,
            };

            let mut rx = slot.subscribe();
            let state = rx
                .wait_for(FlightState::is_settled)
                .await
                .map(|state| state.clone())
                .unwrap_or(FlightState::Abandoned);

            match state {
                FlightState::Done => return Ok(()),
                FlightState::Failed(e) => return Err(e),
                FlightState::Abandoned | FlightState::Running => continue,
            }
        }
    }

    /// Whether `key` completed successfully and has not been evicted.
    pub fn is_done(&self, key: &K) -> bool {
        self.lock()
            .get(key)
            .map(|slot| matches!(*slot.borrow(), FlightState::Done))
            .unwrap_or(false)
    }

    /// Whether `key` is in flight or completed.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    /// Forget `key` so the next call runs the work again.
    ///
    /// An execution already in flight still delivers its outcome to the
    /// callers waiting on it.
    pub fn evict(&self, key: &K) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Forget every key matching `pred`.
    pub fn evict_where(&self, mut pred: impl FnMut(&K) -> bool) -> usize {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|key, _| !pred(key));
        before - slots.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn claim(&self, key: &K) -> Claim<E> {
        let mut slots = self.lock();
        if let Some(slot) = slots.get(key) {
            return Claim::Follower(Arc::clone(slot));
        }
        let (tx, _) = watch::channel(FlightState::Running);
        let slot = Arc::new(tx);
        slots.insert(key.clone(), Arc::clone(&slot));
        Claim::Leader(slot)
    }

    fn release(&self, key: &K, slot: &Slot<E>) {
        let mut slots = self.lock();
        if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<E>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, E> Default for SingleFlight<K, E>
where
    K: Eq + Hash + Clone,
    E: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Publishes the claimant's outcome, or `Abandoned` if it never got one.
struct FlightGuard<'a, K, E>
where
    K: Eq + Hash + Clone,
    E: Clone + Send + Sync,
{
    flight: &'a SingleFlight<K, E>,
    key: K,
    slot: Slot<E>,
    settled: bool,
}

impl<K, E> FlightGuard<'_, K, E>
where
    K: Eq + Hash + Clone,
    E: Clone + Send + Sync,
{
    fn settle(&mut self, outcome: &Result<(), E>) {
        self.settled = true;
        match outcome {
            Ok(()) => {
                self.slot.send_replace(FlightState::Done);
            }
            Err(e) => {
                self.flight.release(&self.key, &self.slot);
                self.slot.send_replace(FlightState::Failed(e.clone()));
            }
        }
    }
}

impl<K, E> Drop for FlightGuard<'_, K, E>
where
    K: Eq + Hash + Clone,
    E: Clone + Send + Sync,
{
    fn drop(&mut self) {
        if !self.settled {
            self.flight.release(&self.key, &self.slot);
            self.slot.send_replace(FlightState::Abandoned);
        }
    }
}

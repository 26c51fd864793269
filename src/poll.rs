// Copyright 2018, The Embedded Linux Team <embedded-linux@teams.rust-embedded.org>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/license/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option.  This file may not be copied, modified, or distributed
// except according to those terms.

//! Change-detecting polling engine.
//!
//! Each polled device runs as a sequence of discrete ticks on its own
//! worker thread: sample the device, fold the sample into the last known
//! state, notify subscribers once if anything changed, reschedule after a
//! fixed delay. A tick that fails on the bus is dropped silently and the
//! cadence continues, which is the right behavior for a hot-pluggable
//! peripheral board: a disconnected device simply stops producing events
//! until it answers again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

use crate::core::Result;

/// Per-device sampling strategy driven by [`PolledDevice`].
///
/// Transient-failure handling is chosen per device through this trait:
///
/// - *Best-effort per field*: encode availability in the state type
///   (an `Option` per quantity, gated on the device's data-ready bits)
///   and override [`merge`](Sampler::merge) so quantities missing from
///   this tick keep their previous value.
/// - *Transaction failure*: return `Err` from [`sample`](Sampler::sample);
///   the tick becomes a no-op and polling continues on schedule.
pub trait Sampler: Send + 'static {
    /// Snapshot of every channel the device reports.
    type State: Clone + PartialEq + Send + 'static;

    /// Read the device's current channel values. One call per tick.
    fn sample(&mut self) -> Result<Self::State>;

    /// Fold a fresh sample into the last known state. The default keeps
    /// the sample as-is, which suits devices whose reads are always
    /// complete.
    fn merge(previous: &Self::State, current: Self::State) -> Self::State {
        let _ = previous;
        current
    }
}

/// Snapshot delivered to subscribers when a tick observes a change.
///
/// Carries every current channel value, not just the ones that changed,
/// plus the full previous snapshot (`None` until the first successful
/// sample) and the index of the tick that produced it (first tick is 1).
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<T> {
    pub current: T,
    pub previous: Option<T>,
    pub tick: u64,
}

/// Handle returned by [`PolledDevice::subscribe`], used to unsubscribe.
#[derive(Debug)]
pub struct Subscription(u64);

type Callback<T> = Arc<dyn Fn(&ChangeEvent<T>) + Send + Sync>;

struct SubscriberList<T> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Callback<T>)>>,
}

impl<T> SubscriberList<T> {
    fn new() -> SubscriberList<T> {
        SubscriberList {
            next_id: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }

    fn add(&self, callback: Callback<T>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().unwrap().push((id, callback));
        Subscription(id)
    }

    fn remove(&self, subscription: Subscription) {
        self.entries
            .lock()
            .unwrap()
            .retain(|(id, _)| *id != subscription.0);
    }

    fn notify(&self, event: &ChangeEvent<T>) {
        // Snapshot under the lock, invoke outside it, so a callback may
        // subscribe or unsubscribe without deadlocking.
        let callbacks: Vec<Callback<T>> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }
}

/// One sample-compare-notify cycle. Owned by the worker thread; the
/// stored state is never shared.
struct Engine<S: Sampler> {
    sampler: S,
    state: Option<S::State>,
    subscribers: Arc<SubscriberList<S::State>>,
    ticks: u64,
}

impl<S: Sampler> Engine<S> {
    fn new(sampler: S, subscribers: Arc<SubscriberList<S::State>>) -> Engine<S> {
        Engine {
            sampler,
            state: None,
            subscribers,
            ticks: 0,
        }
    }

    fn tick(&mut self) {
        self.ticks += 1;
        let sample = match self.sampler.sample() {
            Ok(sample) => sample,
            Err(err) => {
                // Transient bus fault: drop the tick, keep the state and
                // the cadence. Nothing reaches subscribers.
                debug!("tick {} dropped: {}", self.ticks, err);
                return;
            }
        };
        let current = match &self.state {
            Some(previous) => S::merge(previous, sample),
            None => sample,
        };
        if self.state.as_ref() != Some(&current) {
            let event = ChangeEvent {
                current: current.clone(),
                previous: self.state.take(),
                tick: self.ticks,
            };
            self.subscribers.notify(&event);
        }
        self.state = Some(current);
    }
}

/// A device polled on a fixed cadence from its own worker thread.
///
/// Lifecycle is Idle (constructed), Active ([`start`](PolledDevice::start)),
/// then Disposed ([`dispose`](PolledDevice::dispose) or drop). The first tick
/// runs immediately on start; each subsequent tick is scheduled a fixed
/// delay after the previous one *completes*, so a slow bus transaction
/// naturally throttles the cadence rather than piling ticks up.
pub struct PolledDevice<S: Sampler> {
    engine: Option<Engine<S>>,
    interval: Duration,
    subscribers: Arc<SubscriberList<S::State>>,
    disposed: Arc<AtomicBool>,
    cancel: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Sampler> PolledDevice<S> {
    /// Wrap `sampler` for polling every `interval`. No tick runs until
    /// [`start`](PolledDevice::start).
    pub fn new(sampler: S, interval: Duration) -> PolledDevice<S> {
        let subscribers = Arc::new(SubscriberList::new());
        PolledDevice {
            engine: Some(Engine::new(sampler, Arc::clone(&subscribers))),
            interval,
            subscribers,
            disposed: Arc::new(AtomicBool::new(false)),
            cancel: None,
            worker: None,
        }
    }

    /// Register a callback for change events. Callbacks run synchronously
    /// on the polling thread, in subscription order, and may subscribe or
    /// unsubscribe (including themselves) from within the notification.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent<S::State>) + Send + Sync + 'static,
    {
        self.subscribers.add(Arc::new(callback))
    }

    /// Remove a previously registered callback.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.subscribers.remove(subscription);
    }

    /// Start polling. The first tick is scheduled immediately. Calling
    /// `start` on a device that is already active or disposed is a no-op.
    pub fn start(&mut self) {
        if self.disposed.load(Ordering::Acquire) || self.worker.is_some() {
            return;
        }
        let Some(mut engine) = self.engine.take() else {
            return;
        };
        let (cancel_tx, cancel_rx) = mpsc::channel();
        let disposed = Arc::clone(&self.disposed);
        let interval = self.interval;
        self.cancel = Some(cancel_tx);
        self.worker = Some(thread::spawn(move || loop {
            // A tick in flight when disposal was requested completes; this
            // check only stops future ticks from touching the device.
            if disposed.load(Ordering::Acquire) {
                break;
            }
            engine.tick();
            match cancel_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                // Cancelled, or the handle went away entirely.
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }));
    }

    /// Stop polling and release the worker. Cooperative: an in-flight
    /// tick completes before the worker exits, and no further tick is
    /// scheduled. Safe to call repeatedly; also runs on drop.
    pub fn dispose(&mut self) {
        self.disposed.store(true, Ordering::Release);
        self.engine = None;
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    /// Whether the polling worker is running.
    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }
}

impl<S: Sampler> Drop for PolledDevice<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::AtomicUsize;

    /// Sampler replaying a fixed script of outcomes.
    struct Scripted {
        steps: VecDeque<std::result::Result<u8, ()>>,
    }

    impl Scripted {
        fn new(steps: &[std::result::Result<u8, ()>]) -> Scripted {
            Scripted {
                steps: steps.iter().cloned().collect(),
            }
        }
    }

    impl Sampler for Scripted {
        type State = u8;

        fn sample(&mut self) -> Result<u8> {
            match self.steps.pop_front().expect("script exhausted") {
                Ok(value) => Ok(value),
                Err(()) => Err(Error::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "injected fault",
                ))),
            }
        }
    }

    fn collected(
        subscribers: &Arc<SubscriberList<u8>>,
    ) -> (Arc<Mutex<Vec<ChangeEvent<u8>>>>, Subscription) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = subscribers.add(Arc::new(move |event: &ChangeEvent<u8>| {
            sink.lock().unwrap().push(event.clone());
        }));
        (events, subscription)
    }

    #[test]
    fn first_sample_is_a_transition_from_unknown() {
        let subscribers = Arc::new(SubscriberList::new());
        let (events, _sub) = collected(&subscribers);
        let mut engine = Engine::new(Scripted::new(&[Ok(0x00)]), subscribers);

        engine.tick();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].current, 0x00);
        assert_eq!(events[0].previous, None);
        assert_eq!(events[0].tick, 1);
    }

    #[test]
    fn identical_readings_notify_once() {
        let subscribers = Arc::new(SubscriberList::new());
        let (events, _sub) = collected(&subscribers);
        let mut engine = Engine::new(Scripted::new(&[Ok(0x00), Ok(0x00), Ok(0x00)]), subscribers);

        engine.tick();
        engine.tick();
        engine.tick();

        // Only the unknown->known transition fires.
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn event_carries_previous_snapshot() {
        let subscribers = Arc::new(SubscriberList::new());
        let (events, _sub) = collected(&subscribers);
        let mut engine = Engine::new(Scripted::new(&[Ok(0x00), Ok(0x10)]), subscribers);

        engine.tick();
        engine.tick();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].current, 0x10);
        assert_eq!(events[1].previous, Some(0x00));
        assert_eq!(events[1].tick, 2);
    }

    #[test]
    fn failed_tick_is_dropped_and_state_survives() {
        let subscribers = Arc::new(SubscriberList::new());
        let (events, _sub) = collected(&subscribers);
        let mut engine = Engine::new(
            Scripted::new(&[Ok(0x00), Err(()), Ok(0x10)]),
            subscribers,
        );

        engine.tick();
        engine.tick(); // fault: no event, state untouched
        assert_eq!(events.lock().unwrap().len(), 1);

        engine.tick();
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        // The recovery tick diffs against the last successfully observed
        // state, not against anything from the failed tick.
        assert_eq!(events[1].previous, Some(0x00));
        assert_eq!(events[1].current, 0x10);
    }

    #[test]
    fn failed_tick_then_identical_recovery_stays_silent() {
        let subscribers = Arc::new(SubscriberList::new());
        let (events, _sub) = collected(&subscribers);
        let mut engine = Engine::new(Scripted::new(&[Ok(0x04), Err(()), Ok(0x04)]), subscribers);

        engine.tick();
        engine.tick();
        engine.tick();

        assert_eq!(events.lock().unwrap().len(), 1);
    }

    /// Two-channel state with per-field availability, exercising the
    /// best-effort merge policy.
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Pair {
        a: Option<u32>,
        b: Option<u32>,
    }

    struct PairScript {
        steps: VecDeque<Pair>,
    }

    impl Sampler for PairScript {
        type State = Pair;

        fn sample(&mut self) -> Result<Pair> {
            Ok(self.steps.pop_front().expect("script exhausted"))
        }

        fn merge(previous: &Pair, current: Pair) -> Pair {
            Pair {
                a: current.a.or(previous.a),
                b: current.b.or(previous.b),
            }
        }
    }

    #[test]
    fn merge_retains_fields_missing_from_a_tick() {
        let subscribers = Arc::new(SubscriberList::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        subscribers.add(Arc::new(move |event: &ChangeEvent<Pair>| {
            sink.lock().unwrap().push(event.clone());
        }));
        let script = PairScript {
            steps: VecDeque::from(vec![
                Pair {
                    a: Some(1),
                    b: Some(2),
                },
                // b not ready this tick: retained, no event
                Pair { a: Some(1), b: None },
                // a changes; event must still carry the retained b
                Pair { a: Some(3), b: None },
            ]),
        };
        let mut engine = Engine::new(script, subscribers);

        engine.tick();
        engine.tick();
        engine.tick();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1].current,
            Pair {
                a: Some(3),
                b: Some(2),
            }
        );
        assert_eq!(
            events[1].previous,
            Some(Pair {
                a: Some(1),
                b: Some(2),
            })
        );
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let subscribers: Arc<SubscriberList<u8>> = Arc::new(SubscriberList::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let list = Arc::clone(&subscribers);
        let seen = Arc::clone(&calls);
        let own = Arc::clone(&slot);
        let subscription = subscribers.add(Arc::new(move |_event: &ChangeEvent<u8>| {
            seen.fetch_add(1, Ordering::SeqCst);
            if let Some(subscription) = own.lock().unwrap().take() {
                list.remove(subscription);
            }
        }));
        *slot.lock().unwrap() = Some(subscription);

        let mut engine = Engine::new(Scripted::new(&[Ok(1), Ok(2)]), subscribers);
        engine.tick();
        engine.tick();

        // Second event must not reach the removed callback.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribed_callback_stops_receiving() {
        let subscribers = Arc::new(SubscriberList::new());
        let (events, subscription) = collected(&subscribers);
        let mut engine = Engine::new(Scripted::new(&[Ok(1), Ok(2)]), Arc::clone(&subscribers));

        engine.tick();
        subscribers.remove(subscription);
        engine.tick();

        assert_eq!(events.lock().unwrap().len(), 1);
    }

    /// Sampler counting ticks, for lifecycle tests on the real worker.
    struct Counting {
        ticks: Arc<AtomicUsize>,
    }

    impl Sampler for Counting {
        type State = u8;

        fn sample(&mut self) -> Result<u8> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    #[test]
    fn start_ticks_immediately_and_dispose_stops() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut device = PolledDevice::new(
            Counting {
                ticks: Arc::clone(&ticks),
            },
            Duration::from_millis(5),
        );
        assert!(!device.is_active());

        device.start();
        assert!(device.is_active());
        // The first tick is scheduled immediately; give the worker a
        // moment to run it.
        thread::sleep(Duration::from_millis(50));
        device.dispose();
        assert!(!device.is_active());

        let after_dispose = ticks.load(Ordering::SeqCst);
        assert!(after_dispose >= 1);

        // No pending tick may fire after disposal.
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after_dispose);
    }

    #[test]
    fn dispose_twice_is_harmless() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut device = PolledDevice::new(
            Counting {
                ticks: Arc::clone(&ticks),
            },
            Duration::from_millis(5),
        );
        device.start();
        device.dispose();
        device.dispose();
    }

    #[test]
    fn dispose_without_start_is_harmless() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut device = PolledDevice::new(
            Counting {
                ticks: Arc::clone(&ticks),
            },
            Duration::from_millis(5),
        );
        device.dispose();
        device.start(); // disposed; must not come back to life
        assert!(!device.is_active());
    }

    /// Sampler that takes long enough that disposal overlaps a tick.
    struct Slow;

    impl Sampler for Slow {
        type State = u8;

        fn sample(&mut self) -> Result<u8> {
            thread::sleep(Duration::from_millis(40));
            Ok(0)
        }
    }

    #[test]
    fn dispose_waits_for_in_flight_tick() {
        let mut device = PolledDevice::new(Slow, Duration::from_millis(5));
        device.start();
        // Land inside the first tick, then dispose: the tick completes,
        // the worker exits, nothing panics.
        thread::sleep(Duration::from_millis(10));
        device.dispose();
        assert!(!device.is_active());
    }

    #[test]
    fn drop_without_dispose_stops_the_worker() {
        let ticks = Arc::new(AtomicUsize::new(0));
        {
            let mut device = PolledDevice::new(
                Counting {
                    ticks: Arc::clone(&ticks),
                },
                Duration::from_millis(5),
            );
            device.start();
            thread::sleep(Duration::from_millis(20));
        }
        let after_drop = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after_drop);
    }
}

//! C2: monotonic-deadline min-ordered queue of promises resolved at tick
//! time (§4.2). Grounded in the teacher's `backbone-lib/src/timer.rs`
//! "list of entries, scan-and-drain" shape, generalized from a list of raw
//! ids to a list of `(deadline, Promise<T>)` pairs.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A value cell with a continuation list, resolved exactly once on the tick
/// thread (§9 "Promises"). No thread-safety primitives: resolution is
/// tick-serialized, so a plain `Rc<RefCell<_>>` is enough.
struct PromiseState<T> {
    value: Option<T>,
    continuations: Vec<Box<dyn FnOnce(&T)>>,
}

pub struct Promise<T> {
    state: Rc<RefCell<PromiseState<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone> Promise<T> {
    fn new() -> (Promise<T>, PromiseResolver<T>) {
        let state = Rc::new(RefCell::new(PromiseState {
            value: None,
            continuations: Vec::new(),
        }));
        (
            Promise {
                state: state.clone(),
            },
            PromiseResolver { state },
        )
    }

    pub fn is_resolved(&self) -> bool {
        self.state.borrow().value.is_some()
    }

    pub fn value(&self) -> Option<T> {
        self.state.borrow().value.clone()
    }

    /// Registers a continuation. If already resolved, runs it immediately.
    pub fn then(&self, f: impl FnOnce(&T) + 'static) {
        let mut state = self.state.borrow_mut();
        if let Some(v) = &state.value {
            drop(state);
            f(v);
        } else {
            state.continuations.push(Box::new(f));
        }
    }
}

/// The producer side, held only by the scheduler that resolved it into
/// being. Dropping this without calling `resolve` makes the promise dead -
/// the no-op-cancellation described in §5.
struct PromiseResolver<T> {
    state: Rc<RefCell<PromiseState<T>>>,
}

impl<T: Clone> PromiseResolver<T> {
    /// Resolves exactly once; a second call is a programmer error that we
    /// silently ignore rather than panic the tick thread.
    fn resolve(self, value: T) {
        let continuations = {
            let mut state = self.state.borrow_mut();
            if state.value.is_some() {
                return;
            }
            state.value = Some(value.clone());
            std::mem::take(&mut state.continuations)
        };
        for cont in continuations {
            cont(&value);
        }
    }
}

pub type Void = ();

struct Entry {
    deadline: Instant,
    resolver: PromiseResolver<Void>,
}

/// Drains deadline-ascending; a resort happens lazily before the next drain
/// rather than on every insert, matching §4.2's "amortized cheap" note.
#[derive(Default)]
pub struct TimerQueue {
    entries: Vec<Entry>,
    dirty: bool,
}

impl TimerQueue {
    pub fn new() -> Self {
        TimerQueue::default()
    }

    /// Computes `deadline = now + duration`. New entries are pushed to the
    /// back; the list is only re-sorted lazily in `tick` (I5).
    pub fn set_timer(&mut self, now: Instant, duration: Duration) -> Promise<Void> {
        let (promise, resolver) = Promise::new();
        self.entries.push(Entry {
            deadline: now + duration,
            resolver,
        });
        self.dirty = true;
        promise
    }

    /// Drains the prefix with `deadline <= now` in ascending order,
    /// resolving each promise exactly once. Timers enqueued by a
    /// resolution callback land after this drain's snapshot and are never
    /// resolved within the same tick.
    pub fn tick(&mut self, now: Instant) {
        if self.dirty {
            self.entries.sort_by_key(|e| e.deadline);
            self.dirty = false;
        }
        let split_at = self
            .entries
            .iter()
            .position(|e| e.deadline > now)
            .unwrap_or(self.entries.len());
        let due: Vec<Entry> = self.entries.drain(..split_at).collect();
        for entry in due {
            entry.resolver.resolve(());
        }
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_no_earlier_than_deadline() {
        let mut queue = TimerQueue::new();
        let start = Instant::now();
        let promise = queue.set_timer(start, Duration::from_millis(30));

        queue.tick(start);
        assert!(!promise.is_resolved());

        queue.tick(start + Duration::from_millis(50));
        assert!(promise.is_resolved());
    }

    #[test]
    fn drains_in_ascending_deadline_order() {
        let mut queue = TimerQueue::new();
        let start = Instant::now();
        let order = Rc::new(RefCell::new(Vec::new()));

        let late = queue.set_timer(start, Duration::from_millis(20));
        let early = queue.set_timer(start, Duration::from_millis(5));

        {
            let order = order.clone();
            early.then(move |_| order.borrow_mut().push("early"));
        }
        {
            let order = order.clone();
            late.then(move |_| order.borrow_mut().push("late"));
        }

        queue.tick(start + Duration::from_millis(50));
        assert_eq!(*order.borrow(), vec!["early", "late"]);
    }

    #[test]
    fn timers_enqueued_during_resolution_wait_for_next_tick() {
        let mut queue = Rc::new(RefCell::new(TimerQueue::new()));
        let start = Instant::now();
        let fired_again = Rc::new(RefCell::new(false));

        let promise = queue.borrow_mut().set_timer(start, Duration::from_millis(1));
        {
            let queue = queue.clone();
            let fired_again = fired_again.clone();
            promise.then(move |_| {
                queue
                    .borrow_mut()
                    .set_timer(start, Duration::from_millis(1));
                *fired_again.borrow_mut() = true;
            });
        }

        queue.borrow_mut().tick(start + Duration::from_millis(10));
        assert!(*fired_again.borrow());
        assert_eq!(queue.borrow().pending_count(), 1);
    }
}

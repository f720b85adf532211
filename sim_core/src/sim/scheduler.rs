//! Time-ordered pending action queue

use super::Simulation;
use crate::error::{SimError, SimResult};
use crate::types::SimTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

/// One-shot action, consumed when it fires
pub type OnceAction = Box<dyn FnOnce(&mut Simulation) -> SimResult<()>>;
/// Action fired on every tick of a periodic schedule
pub type PeriodicAction = Rc<dyn Fn(&mut Simulation) -> SimResult<()>>;

/// Handle to a scheduled action, used to cancel it
///
/// Handles are never reused within one `Simulation`, so cancelling a handle
/// whose action already fired is a harmless no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionHandle(u64);

/// Options for a periodic action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicOptions {
    /// Time between ticks; must be positive
    pub period: SimTime,
    /// Remove the action after this many ticks; `None` repeats until cancelled
    pub num_ticks: Option<u32>,
    /// Fire the first tick at the current time instead of one period later
    pub tick_immediately: bool,
}

impl PeriodicOptions {
    pub fn every(period: SimTime) -> Self {
        PeriodicOptions {
            period,
            num_ticks: None,
            tick_immediately: false,
        }
    }

    pub fn with_num_ticks(mut self, num_ticks: u32) -> Self {
        self.num_ticks = Some(num_ticks);
        self
    }

    pub fn immediately(mut self) -> Self {
        self.tick_immediately = true;
        self
    }
}

enum Payload {
    Once(OnceAction),
    Periodic {
        action: PeriodicAction,
        period: SimTime,
        /// Ticks left including the one currently queued
        remaining: Option<u32>,
    },
}

struct Pending {
    due: SimTime,
    payload: Payload,
}

/// Heap entry; ordered so the earliest due time (then lowest sequence) pops first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    due: SimTime,
    seq: u64,
    handle: ActionHandle,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behaviour (BinaryHeap is a max-heap)
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What to do with an action popped from the queue
pub(crate) enum Fired {
    Once(OnceAction),
    Periodic {
        action: PeriodicAction,
        is_final: bool,
    },
}

/// The simulation clock together with its pending action queue
///
/// Cancelled actions are dropped from the payload table immediately and
/// their heap entries are discarded lazily when they reach the top.
#[derive(Default)]
pub struct Scheduler {
    now: SimTime,
    queue: BinaryHeap<QueueEntry>,
    pending: HashMap<ActionHandle, Pending>,
    next_seq: u64,
    next_handle: u64,
    fired: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulation time
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of actions still waiting to fire
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Total actions fired since the last reset
    pub fn fired_count(&self) -> u64 {
        self.fired
    }

    /// Drop every pending action and rewind the clock to zero
    pub fn reset(&mut self) {
        self.now = SimTime::ZERO;
        self.queue.clear();
        self.pending.clear();
        self.next_seq = 0;
        self.fired = 0;
    }

    pub(crate) fn schedule_once(&mut self, due: SimTime, action: OnceAction) -> SimResult<ActionHandle> {
        self.check_due(due)?;
        let handle = self.new_handle();
        self.pending.insert(
            handle,
            Pending {
                due,
                payload: Payload::Once(action),
            },
        );
        self.enqueue(due, handle);
        Ok(handle)
    }

    pub(crate) fn schedule_periodic(
        &mut self,
        options: PeriodicOptions,
        action: PeriodicAction,
    ) -> SimResult<ActionHandle> {
        if options.period <= SimTime::ZERO || options.period.is_never() {
            return Err(SimError::InvalidPeriod(options.period));
        }
        let handle = self.new_handle();
        if options.num_ticks == Some(0) {
            return Ok(handle);
        }
        let due = if options.tick_immediately {
            self.now
        } else {
            self.now + options.period
        };
        self.pending.insert(
            handle,
            Pending {
                due,
                payload: Payload::Periodic {
                    action,
                    period: options.period,
                    remaining: options.num_ticks,
                },
            },
        );
        self.enqueue(due, handle);
        Ok(handle)
    }

    /// Remove an action from future firing. Returns false if it was not pending.
    pub fn cancel(&mut self, handle: ActionHandle) -> bool {
        self.pending.remove(&handle).is_some()
    }

    pub fn is_pending(&self, handle: ActionHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    /// Due time of a pending action
    pub fn due_time(&self, handle: ActionHandle) -> Option<SimTime> {
        self.pending.get(&handle).map(|p| p.due)
    }

    /// Pop the earliest live action due no later than `limit` (or strictly
    /// before it when `inclusive` is false) and advance the clock to it.
    pub(crate) fn pop_due(&mut self, limit: SimTime, inclusive: bool) -> Option<(ActionHandle, Fired)> {
        self.discard_cancelled();
        let top = *self.queue.peek()?;
        let due_now = if inclusive { top.due <= limit } else { top.due < limit };
        if !due_now {
            return None;
        }
        self.queue.pop();
        self.now = top.due;
        self.fired += 1;

        let fired = match self.pending.remove(&top.handle)?.payload {
            Payload::Once(action) => Fired::Once(action),
            Payload::Periodic {
                action,
                period,
                remaining,
            } => {
                let remaining = remaining.map(|r| r.saturating_sub(1));
                let is_final = remaining == Some(0);
                if !is_final {
                    // Kept in the table while the callback runs so it can cancel itself
                    self.pending.insert(
                        top.handle,
                        Pending {
                            due: top.due + period,
                            payload: Payload::Periodic {
                                action: Rc::clone(&action),
                                period,
                                remaining,
                            },
                        },
                    );
                }
                Fired::Periodic { action, is_final }
            }
        };
        Some((top.handle, fired))
    }

    /// Re-enqueue a periodic action after its callback returned, unless it was cancelled
    pub(crate) fn requeue_periodic(&mut self, handle: ActionHandle) {
        if let Some(due) = self.pending.get(&handle).map(|p| p.due) {
            self.enqueue(due, handle);
        }
    }

    /// Move the clock forward without firing anything
    pub(crate) fn advance_to(&mut self, time: SimTime) {
        if time > self.now {
            self.now = time;
        }
    }

    fn check_due(&self, due: SimTime) -> SimResult<()> {
        if due < self.now {
            return Err(SimError::ScheduledInPast { at: due, now: self.now });
        }
        Ok(())
    }

    fn new_handle(&mut self) -> ActionHandle {
        let handle = ActionHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn enqueue(&mut self, due: SimTime, handle: ActionHandle) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(QueueEntry { due, seq, handle });
    }

    fn discard_cancelled(&mut self) {
        while let Some(top) = self.queue.peek() {
            match self.pending.get(&top.handle) {
                Some(p) if p.due == top.due => break,
                _ => {
                    self.queue.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> OnceAction {
        Box::new(|_: &mut Simulation| Ok(()))
    }

    #[test]
    fn test_pops_in_time_order() {
        let mut scheduler = Scheduler::new();
        let late = scheduler.schedule_once(SimTime::from_secs(5), noop()).unwrap();
        let early = scheduler.schedule_once(SimTime::from_secs(2), noop()).unwrap();

        let (first, _) = scheduler.pop_due(SimTime::from_secs(10), true).unwrap();
        assert_eq!(first, early);
        assert_eq!(scheduler.now(), SimTime::from_secs(2));
        let (second, _) = scheduler.pop_due(SimTime::from_secs(10), true).unwrap();
        assert_eq!(second, late);
        assert!(scheduler.pop_due(SimTime::from_secs(10), true).is_none());
    }

    #[test]
    fn test_same_time_fifo() {
        let mut scheduler = Scheduler::new();
        let at = SimTime::from_secs(1);
        let handles: Vec<_> = (0..5).map(|_| scheduler.schedule_once(at, noop()).unwrap()).collect();

        let popped: Vec<_> = std::iter::from_fn(|| scheduler.pop_due(at, true).map(|(h, _)| h)).collect();
        assert_eq!(popped, handles);
    }

    #[test]
    fn test_rejects_past() {
        let mut scheduler = Scheduler::new();
        scheduler.advance_to(SimTime::from_secs(3));
        let result = scheduler.schedule_once(SimTime::from_secs(2), noop());
        assert!(matches!(result, Err(SimError::ScheduledInPast { .. })));
        // Scheduling exactly at the current time is allowed
        assert!(scheduler.schedule_once(SimTime::from_secs(3), noop()).is_ok());
    }

    #[test]
    fn test_cancel_skips_entry() {
        let mut scheduler = Scheduler::new();
        let cancelled = scheduler.schedule_once(SimTime::from_secs(1), noop()).unwrap();
        let kept = scheduler.schedule_once(SimTime::from_secs(2), noop()).unwrap();

        assert!(scheduler.cancel(cancelled));
        assert!(!scheduler.cancel(cancelled));
        let (popped, _) = scheduler.pop_due(SimTime::from_secs(5), true).unwrap();
        assert_eq!(popped, kept);
    }

    #[test]
    fn test_exclusive_limit() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(SimTime::from_secs(5), noop()).unwrap();
        assert!(scheduler.pop_due(SimTime::from_secs(5), false).is_none());
        assert!(scheduler.pop_due(SimTime::from_secs(5), true).is_some());
    }

    #[test]
    fn test_periodic_final_tick_removes_action() {
        let mut scheduler = Scheduler::new();
        let options = PeriodicOptions::every(SimTime::from_secs(1)).with_num_ticks(2);
        let handle = scheduler.schedule_periodic(options, Rc::new(|_: &mut Simulation| Ok(()))).unwrap();

        let (_, fired) = scheduler.pop_due(SimTime::from_secs(10), true).unwrap();
        assert!(matches!(fired, Fired::Periodic { is_final: false, .. }));
        scheduler.requeue_periodic(handle);
        assert_eq!(scheduler.due_time(handle), Some(SimTime::from_secs(2)));

        let (_, fired) = scheduler.pop_due(SimTime::from_secs(10), true).unwrap();
        assert!(matches!(fired, Fired::Periodic { is_final: true, .. }));
        assert!(!scheduler.is_pending(handle));
    }

    #[test]
    fn test_periodic_rejects_zero_period() {
        let mut scheduler = Scheduler::new();
        let result = scheduler.schedule_periodic(PeriodicOptions::every(SimTime::ZERO), Rc::new(|_: &mut Simulation| Ok(())));
        assert!(matches!(result, Err(SimError::InvalidPeriod(_))));
    }
}

//! Cancellable deferred events
//!
//! Delayed effects (flashes, staggered spawns) are queued here instead of
//! being handed to the host as fire-and-forget callbacks. A scene owns its
//! queue, polls it from its update with instance-local time, and cancels
//! everything still pending when it is cleaned up.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Pending<E> {
    id: TimerId,
    due: f32,
    event: E,
}

#[derive(Debug)]
pub struct TimerQueue<E> {
    pending: Vec<Pending<E>>,
    next_id: u64,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            next_id: 0,
        }
    }

    /// Fire `event` once `delay` seconds after `now`
    pub fn schedule(&mut self, now: f32, delay: f32, event: E) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push(Pending {
            id,
            due: now + delay.max(0.0),
            event,
        });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        self.pending.len() != before
    }

    /// Cancel everything; returns how many timers were still pending
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    /// Remove and return every event due at `now`, earliest first
    pub fn poll(&mut self, now: f32) -> Vec<E> {
        self.poll_due(now).into_iter().map(|(_, event)| event).collect()
    }

    /// Like [`poll`](Self::poll), paired with the time each event fell due
    pub fn poll_due(&mut self, now: f32) -> Vec<(f32, E)> {
        let (mut due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = waiting;
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.id.0.cmp(&b.id.0)));
        due.into_iter().map(|p| (p.due, p.event)).collect()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

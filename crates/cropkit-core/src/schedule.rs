//! Debounced, generation-guarded render scheduling.
//!
//! Every state change calls [`RenderScheduler::request`], which bumps the
//! generation and replaces whatever render was pending. The host polls with
//! the current time; a ticket comes out once its debounce has elapsed, and
//! only if nothing newer was requested meanwhile.
//!
//! Time is passed in explicitly so the host decides where it comes from
//! (`web_time::Instant` works on both native and wasm targets).

use web_time::{Duration, Instant};

/// Permission to run one render for a specific generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTicket {
    generation: u64,
    due: Instant,
}

impl RenderTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn due(&self) -> Instant {
        self.due
    }
}

#[derive(Debug, Clone)]
pub struct RenderScheduler {
    debounce: Duration,
    generation: u64,
    pending: Option<RenderTicket>,
}

impl RenderScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            generation: 0,
            pending: None,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Latest generation handed out.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedule a render `debounce` after `now`, superseding any pending one.
    pub fn request(&mut self, now: Instant) -> RenderTicket {
        self.generation += 1;
        if let Some(previous) = self.pending {
            log::debug!(
                "render generation {} superseded by {}",
                previous.generation,
                self.generation
            );
        }
        let ticket = RenderTicket {
            generation: self.generation,
            due: now + self.debounce,
        };
        self.pending = Some(ticket);
        ticket
    }

    /// Take the pending ticket if its debounce has elapsed.
    ///
    /// Returns each ticket at most once.
    pub fn poll(&mut self, now: Instant) -> Option<RenderTicket> {
        match self.pending {
            Some(ticket) if ticket.due <= now => self.pending.take(),
            _ => None,
        }
    }

    /// Take the pending ticket regardless of its due time.
    pub fn flush(&mut self) -> Option<RenderTicket> {
        self.pending.take()
    }

    /// Time left until the pending render is due.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.pending
            .map(|ticket| ticket.due.saturating_duration_since(now))
    }

    /// Drop the pending render. Outstanding tickets become stale.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.generation += 1;
    }

    /// Whether a ticket still reflects the latest requested state.
    pub fn is_current(&self, ticket: &RenderTicket) -> bool {
        ticket.generation == self.generation
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_nothing_pending_initially() {
        let mut s = RenderScheduler::default();
        assert!(!s.has_pending());
        assert_eq!(s.poll(Instant::now()), None);
        assert_eq!(s.generation(), 0);
    }

    #[test]
    fn test_poll_before_due_is_noop() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(ms(100));
        s.request(t0);
        assert_eq!(s.poll(t0 + ms(99)), None);
        assert!(s.has_pending());
    }

    #[test]
    fn test_poll_after_due_fires_once() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(ms(100));
        let ticket = s.request(t0);
        assert_eq!(s.poll(t0 + ms(100)), Some(ticket));
        assert_eq!(s.poll(t0 + ms(500)), None);
        assert!(s.is_current(&ticket));
    }

    #[test]
    fn test_rapid_requests_coalesce() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(ms(100));
        let first = s.request(t0);
        let second = s.request(t0 + ms(40));

        // The first deadline passes without anything firing.
        assert_eq!(s.poll(t0 + ms(100)), None);
        assert_eq!(s.poll(t0 + ms(140)), Some(second));
        assert_eq!(s.poll(t0 + ms(1000)), None);

        assert!(!s.is_current(&first));
        assert!(s.is_current(&second));
    }

    #[test]
    fn test_flush_ignores_due_time() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(ms(100));
        let ticket = s.request(t0);
        assert_eq!(s.flush(), Some(ticket));
        assert_eq!(s.flush(), None);
    }

    #[test]
    fn test_cancel_makes_tickets_stale() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(ms(10));
        let ticket = s.request(t0);
        s.cancel();
        assert!(!s.has_pending());
        assert!(!s.is_current(&ticket));
        assert_eq!(s.poll(t0 + ms(50)), None);
    }

    #[test]
    fn test_zero_debounce_is_due_immediately() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(Duration::ZERO);
        let ticket = s.request(t0);
        assert_eq!(s.poll(t0), Some(ticket));
    }

    #[test]
    fn test_time_until_due() {
        let t0 = Instant::now();
        let mut s = RenderScheduler::new(ms(100));
        assert_eq!(s.time_until_due(t0), None);
        s.request(t0);
        assert_eq!(s.time_until_due(t0 + ms(30)), Some(ms(70)));
        assert_eq!(s.time_until_due(t0 + ms(300)), Some(Duration::ZERO));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: however many requests arrive, at most one ticket fires and
        /// it belongs to the latest request.
        #[test]
        fn prop_only_latest_request_fires(offsets in prop::collection::vec(0u64..50, 1..20)) {
            let t0 = Instant::now();
            let mut s = RenderScheduler::new(Duration::from_millis(100));
            let mut now = t0;
            let mut last = None;
            for step in offsets {
                now += Duration::from_millis(step);
                last = Some(s.request(now));
            }
            let fired: Vec<_> = (0..10)
                .filter_map(|i| s.poll(now + Duration::from_millis(60 * i)))
                .collect();
            prop_assert_eq!(fired.len(), 1);
            prop_assert_eq!(Some(fired[0]), last);
            prop_assert!(s.is_current(&fired[0]));
        }
    }
}

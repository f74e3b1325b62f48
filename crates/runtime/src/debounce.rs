use std::time::Duration;

use tokio::time::Instant;

/// Trailing-edge debounce timer.
///
/// Each `poke` pushes the deadline out to `now + window`; the timer is due
/// once a full window passes without another poke. Time is passed in by the
/// caller so the timer itself never reads a clock.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn poke(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Disarms the timer and returns `true` if its deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::Debouncer;

    #[test]
    fn fires_once_after_quiet_window() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        assert!(!d.fire_if_due(t0));

        d.poke(t0);
        assert!(!d.fire_if_due(t0 + Duration::from_millis(99)));
        assert!(d.fire_if_due(t0 + Duration::from_millis(100)));
        assert!(!d.is_pending());
        assert!(!d.fire_if_due(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn repeated_pokes_extend_the_window() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.poke(t0);
        d.poke(t0 + Duration::from_millis(80));
        assert!(!d.fire_if_due(t0 + Duration::from_millis(150)));
        assert!(d.fire_if_due(t0 + Duration::from_millis(180)));
    }

    #[test]
    fn cancel_disarms() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(10));
        d.poke(t0);
        d.cancel();
        assert!(d.deadline().is_none());
        assert!(!d.fire_if_due(t0 + Duration::from_secs(1)));
    }
}

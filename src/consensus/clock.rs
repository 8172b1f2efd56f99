use std::time::{Duration, Instant};

/// Half-round schedule of one instance, anchored at its start so that a
/// loop which wakes up late catches up instead of shifting every later round.
pub(super) struct RoundClock {
    start: Instant,
    half_round: Duration,
    elapsed: u32,
}

impl RoundClock {
    pub(super) fn new(start: Instant, round_duration: Duration) -> Self {
        Self {
            start,
            half_round: round_duration / 2,
            elapsed: 0,
        }
    }

    pub(super) fn next_deadline(&self) -> Instant {
        self.start + self.half_round * (self.elapsed + 1)
    }

    /// Ends the current half round. Returns true when we are now at a round's
    /// midpoint, false at a round boundary.
    pub(super) fn tick(&mut self) -> bool {
        self.elapsed += 1;
        self.elapsed % 2 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halves_alternate() {
        let mut clock = RoundClock::new(Instant::now(), Duration::from_millis(100));
        assert!(clock.tick());
        assert!(!clock.tick());
        assert!(clock.tick());
    }

    #[test]
    fn test_deadlines_do_not_drift() {
        let start = Instant::now();
        let mut clock = RoundClock::new(start, Duration::from_millis(100));
        assert_eq!(clock.next_deadline(), start + Duration::from_millis(50));

        // handled long after their deadlines
        std::thread::sleep(Duration::from_millis(120));
        clock.tick();
        clock.tick();
        assert_eq!(clock.next_deadline(), start + Duration::from_millis(150));

        for _ in 0..5 {
            clock.tick();
        }
        assert_eq!(clock.next_deadline(), start + Duration::from_millis(400));
    }
}

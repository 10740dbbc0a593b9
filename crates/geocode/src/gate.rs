//! Minimum-interval gate for free-tier providers.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// An owned, serializing rate-limit clock. One gate is shared by every
/// orchestrator in the process; callers block until the interval since the
/// previous request has elapsed.
///
/// The lock is held across the sleep on purpose: a second caller arriving
/// mid-wait queues behind the first and observes its updated timestamp, so
/// back-to-back requests are always separated by at least `min_interval`.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until a request slot is available, then claim it.
    pub fn wait(&self) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_wait_is_free() {
        let gate = RateGate::new(Duration::from_millis(200));
        let start = Instant::now();
        gate.wait();
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn back_to_back_waits_are_spaced() {
        let gate = RateGate::new(Duration::from_millis(80));
        gate.wait();
        let start = Instant::now();
        gate.wait();
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn concurrent_callers_serialize() {
        let gate = Arc::new(RateGate::new(Duration::from_millis(60)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || gate.wait())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Three slots: the first free, two more spaced by >= 60ms each.
        assert!(start.elapsed() >= Duration::from_millis(120));
    }
}

use std::thread;
use std::time::{Duration, Instant};

/// Millisecond time source used by every wait in the bring-up sequence.
pub trait Clock {
    /// Monotonic milliseconds since an arbitrary origin.
    fn get_ms(&self) -> u64;

    /// Block for at least `interval` milliseconds.
    fn spin_ms(&self, interval: u64);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant
}

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> SystemClock {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn get_ms(&self) -> u64 {
        let elapsed = self.origin.elapsed();
        elapsed.as_secs() * 1_000 + u64::from(elapsed.subsec_millis())
    }

    fn spin_ms(&self, interval: u64) {
        thread::sleep(Duration::from_millis(interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances_across_spin() {
        let clock = SystemClock::new();
        let t = clock.get_ms();
        clock.spin_ms(5);
        assert!(clock.get_ms() >= t + 5);
    }
}

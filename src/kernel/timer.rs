use std::thread;
use std::time::{Duration, Instant};

/// Monotonic stopwatch measuring time since `start`.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started_at: Instant,
}

impl Timer {
    pub fn start() -> Timer {
        Timer {
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed().as_millis()
    }

    pub fn elapsed_us(&self) -> u128 {
        self.elapsed().as_micros()
    }
}

/// Blocks the calling thread until `duration` has passed.
pub fn wait(duration: Duration) {
    let deadline = Instant::now() + duration;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_elapsed_is_monotonic() {
        let timer = Timer::start();
        let first = timer.elapsed_us();
        wait(Duration::from_millis(2));
        let second = timer.elapsed_us();

        assert!(second >= first);
        assert!(timer.elapsed_ms() >= 2);
    }

    #[test]
    fn test_timer_wait_blocks_for_duration() {
        let timer = Timer::start();
        wait(Duration::from_millis(15));
        assert!(timer.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_timer_wait_zero_returns() {
        let timer = Timer::start();
        wait(Duration::ZERO);
        assert!(timer.elapsed_secs() < 1.0);
    }
}

use std::time::Duration;

/// Blocking wait between retries, injectable so tests run without wall-clock
/// delay.
pub trait Sleeper: Send {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

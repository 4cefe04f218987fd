//! Minimum spacing between remote calls

use std::time::Duration;
use tokio::time::Instant;

/// Holds the driver loop back so consecutive remote calls start at least
/// `interval` apart
#[derive(Debug)]
pub struct Pacer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Wait out whatever is left of the interval since the previous call
    pub async fn wait(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last) {
            let due = last + interval;
            if due > Instant::now() {
                tokio::time::sleep_until(due).await;
            }
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_spacing_is_enforced() {
        let mut pacer = Pacer::new(Some(Duration::from_millis(200)));
        let start = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_interval_never_waits() {
        let mut pacer = Pacer::new(None);
        let start = Instant::now();
        for _ in 0..5 {
            pacer.wait().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}

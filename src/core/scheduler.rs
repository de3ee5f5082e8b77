use std::time::Duration;
use async_trait::async_trait;
use super::traits::Ticker;

/// 固定间隔的 Ticker
#[derive(Debug, Clone, Copy)]
pub struct IntervalTicker {
    interval: Duration,
}

impl IntervalTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for IntervalTicker {
    fn default() -> Self {
        Self::new(Duration::from_millis(150))
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&self) {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
    }
}

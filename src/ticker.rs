// THEORY:
// A `Ticker` is the heartbeat of a sampling session. The scheduler never talks
// to a timer directly; it awaits `Ticker::tick`. Production code uses a tokio
// interval, and tests or embedding hosts feed ticks through a channel and
// decide exactly when each one fires.

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

pub trait Ticker: Send + 'static {
    /// Resolves at the next tick. `None` means the ticker is exhausted and the
    /// session should wind down.
    fn tick(&mut self) -> BoxFuture<'_, Option<()>>;
}

/// Fires every `period`, starting one period after the first `tick` call.
///
/// Ticks that come due while the previous one is still being handled are
/// skipped rather than queued, so a slow sample never causes a burst.
#[derive(Debug)]
pub struct IntervalTicker {
    period: Duration,
    interval: Option<Interval>,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Ticker for IntervalTicker {
    fn tick(&mut self) -> BoxFuture<'_, Option<()>> {
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        Box::pin(async move {
            interval.tick().await;
            Some(())
        })
    }
}

/// Fires once per message received on a channel.
#[derive(Debug)]
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

/// The sending half of a `ManualTicker`.
#[derive(Debug, Clone)]
pub struct TickHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    pub fn new() -> (TickHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TickHandle { tx }, Self { rx })
    }
}

impl TickHandle {
    /// Queues one tick. Returns `false` once the ticker has been dropped.
    pub fn fire(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl Ticker for ManualTicker {
    fn tick(&mut self) -> BoxFuture<'_, Option<()>> {
        Box::pin(self.rx.recv())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn interval_ticker_waits_one_period_first() {
        let start = Instant::now();
        let mut ticker = IntervalTicker::new(Duration::from_millis(500));
        assert_eq!(ticker.tick().await, Some(()));
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(ticker.tick().await, Some(()));
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticker_skips_missed_ticks() {
        let start = Instant::now();
        let mut ticker = IntervalTicker::new(Duration::from_millis(100));
        ticker.tick().await;
        tokio::time::advance(Duration::from_millis(350)).await;
        // The overdue tick fires once, then the schedule realigns to the period grid.
        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(450));
        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn manual_ticker_fires_on_demand_and_ends_when_dropped() {
        let (handle, mut ticker) = ManualTicker::new();
        assert!(handle.fire());
        assert!(handle.fire());
        assert_eq!(ticker.tick().await, Some(()));
        assert_eq!(ticker.tick().await, Some(()));
        drop(handle);
        assert_eq!(ticker.tick().await, None);
    }
}

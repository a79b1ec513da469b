use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

/// Time source for the Adapter's ingestion stamp and the batch strategy's
/// flush interval. Abstracted so tests can drive time deterministically
/// instead of sleeping for real.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
    fn ticker(&self, period: Duration) -> Box<dyn Ticker>;
}

/// A recurring timer. `tick` resolves once per period; `stop` releases any
/// resources the ticker holds (a no-op for `WallClock`, a wake of any
/// pending `tick` for `ManualClock`).
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
    fn stop(&mut self);
}

/// The production clock: delegates to `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn ticker(&self, period: Duration) -> Box<dyn Ticker> {
        Box::new(WallTicker {
            interval: tokio::time::interval(period),
        })
    }
}

struct WallTicker {
    interval: tokio::time::Interval,
}

#[async_trait]
impl Ticker for WallTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }

    fn stop(&mut self) {}
}

struct ManualTimer {
    until: SystemTime,
    notify: Arc<Notify>,
}

struct ManualState {
    now: SystemTime,
    timer: Option<ManualTimer>,
}

/// A hand-advanced clock for deterministic tests. Only one active ticker is
/// supported at a time, which is all `BatchStrategy` ever needs.
#[derive(Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: start,
                timer: None,
            })),
        }
    }

    /// Moves time forward by `d`, waking the pending ticker (if any and if
    /// due). An `async fn` so it cooperatively yields instead of blocking an
    /// OS thread, which would stall a current-thread runtime.
    pub async fn advance(&self, d: Duration) {
        let due = {
            let mut state = self.state.lock().await;
            state.now += d;
            match &state.timer {
                Some(timer) if timer.until <= state.now => Some(timer.notify.clone()),
                _ => None,
            }
        };
        if let Some(notify) = due {
            notify.notify_waiters();
        }
        // Cooperative yield so the woken ticker task gets scheduled before
        // the caller moves on to assert on its effects.
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        // `now()` is synchronous by trait contract; the manual clock only
        // needs to be read, never locked across an await, so a blocking
        // lock is safe here.
        self.state.blocking_lock().now
    }

    fn ticker(&self, period: Duration) -> Box<dyn Ticker> {
        Box::new(ManualTicker {
            state: self.state.clone(),
            period,
            notify: Arc::new(Notify::new()),
        })
    }
}

struct ManualTicker {
    state: Arc<Mutex<ManualState>>,
    period: Duration,
    notify: Arc<Notify>,
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        loop {
            let notified = {
                let mut state = self.state.lock().await;
                let until = state.now + self.period;
                state.timer = Some(ManualTimer {
                    until,
                    notify: self.notify.clone(),
                });
                if until <= state.now {
                    None
                } else {
                    Some(self.notify.notified())
                }
            };
            match notified {
                None => return,
                Some(notified) => notified.await,
            }
            let due = {
                let state = self.state.lock().await;
                state.timer.as_ref().map_or(true, |t| t.until <= state.now)
            };
            if due {
                return;
            }
        }
    }

    fn stop(&mut self) {
        self.notify.notify_waiters();
    }
}

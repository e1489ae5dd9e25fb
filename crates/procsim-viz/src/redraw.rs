use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RedrawTick {
    pub generation: u64,
}

/// Periodic redraw for the timeline view. At most one timer task exists:
/// arming replaces the previous task, and ticks from a replaced or cancelled
/// timer are rejected by [`RedrawTimer::is_live`] even if already queued.
pub struct RedrawTimer {
    tx: mpsc::Sender<RedrawTick>,
    period: Duration,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl RedrawTimer {
    pub fn new(tx: mpsc::Sender<RedrawTick>, period: Duration) -> Self {
        Self {
            tx,
            period,
            generation: 0,
            handle: None,
        }
    }

    pub fn arm(&mut self) {
        self.cancel();
        self.generation += 1;
        let tick = RedrawTick {
            generation: self.generation,
        };
        let tx = self.tx.clone();
        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(tick).await.is_err() {
                    break;
                }
            }
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_live(&self, tick: RedrawTick) -> bool {
        self.is_armed() && tick.generation == self.generation
    }
}

impl Drop for RedrawTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

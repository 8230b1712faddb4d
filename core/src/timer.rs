use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TimerStatus {
    Running,
    Expired,
}

/// One-shot countdown. Reports expiry the first time the remaining time
/// reaches zero and never again, however often it is ticked or observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    limit_seconds: u64,
    remaining_seconds: u64,
    status: TimerStatus,
}

impl Countdown {
    pub fn new(limit_seconds: u64) -> Self {
        Self {
            limit_seconds,
            remaining_seconds: limit_seconds,
            status: TimerStatus::Running,
        }
    }

    pub fn limit_seconds(&self) -> u64 {
        self.limit_seconds
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    /// One clock second elapsed. Returns `true` exactly once, on expiry.
    pub fn tick(&mut self) -> bool {
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        self.latch()
    }

    /// Feeds a remaining-time reading from an external clock. Readings can
    /// only lower the remaining time. Returns `true` exactly once, on expiry.
    pub fn observe(&mut self, remaining_seconds: i64) -> bool {
        let reading = u64::try_from(remaining_seconds).unwrap_or(0);
        self.remaining_seconds = self.remaining_seconds.min(reading);
        self.latch()
    }

    fn latch(&mut self) -> bool {
        if self.status == TimerStatus::Running && self.remaining_seconds == 0 {
            self.status = TimerStatus::Expired;
            return true;
        }
        false
    }
}

/// Countdown driven by a one-second tokio interval.
///
/// Dropping or cancelling the timer before expiry guarantees the expiry
/// callback never runs.
#[derive(Debug)]
pub struct QuestionTimer {
    remaining: watch::Receiver<u64>,
    expired: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl QuestionTimer {
    const TICK: Duration = Duration::from_secs(1);

    /// Must be called inside a tokio runtime.
    pub fn start<F>(limit_seconds: u64, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (remaining_tx, remaining) = watch::channel(limit_seconds);
        let (expired_tx, expired) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut countdown = Countdown::new(limit_seconds);
            let mut interval = tokio::time::interval(Self::TICK);
            interval.tick().await; // first tick completes immediately

            let mut fired = countdown.observe(i64::try_from(limit_seconds).unwrap_or(i64::MAX));
            while !fired {
                interval.tick().await;
                fired = countdown.tick();
                let _ = remaining_tx.send(countdown.remaining_seconds());
            }
            log::debug!("Timer expired after {}s", countdown.limit_seconds());
            on_expire();
            let _ = expired_tx.send(true);
        });

        Self {
            remaining,
            expired,
            task,
        }
    }

    pub fn remaining_seconds(&self) -> u64 {
        *self.remaining.borrow()
    }

    pub fn status(&self) -> TimerStatus {
        if *self.expired.borrow() {
            TimerStatus::Expired
        } else {
            TimerStatus::Running
        }
    }

    /// Receiver that sees every remaining-seconds update.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    /// Resolves once the timer has expired and the expiry callback has returned.
    /// Pending forever if cancelled first.
    pub async fn expired(&self) {
        let mut rx = self.expired.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for QuestionTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

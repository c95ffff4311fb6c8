use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// A gravity fire. `token` identifies the schedule that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerFired {
    pub token: u64,
}

/// The one reschedulable timer a controller owns. Every `reschedule` hands out a fresh
/// token; fires carrying an older token must be ignored by the owner.
pub trait TickScheduler: Send {
    fn reschedule(&mut self, interval: Duration) -> u64;
    fn cancel(&mut self);
    fn interval(&self) -> Option<Duration>;
}

pub trait TickSource: Send {
    fn scheduler(&self) -> Box<dyn TickScheduler>;
}

/// Host-driven timer: records the schedule and leaves firing to the caller.
#[derive(Default)]
pub struct ManualTicker {
    interval: Option<Duration>,
    reschedules: u32,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reschedules(&self) -> u32 {
        self.reschedules
    }
}

impl TickScheduler for ManualTicker {
    fn reschedule(&mut self, interval: Duration) -> u64 {
        self.interval = Some(interval);
        self.reschedules += 1;
        next_token()
    }

    fn cancel(&mut self) {
        self.interval = None;
    }

    fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

#[derive(Clone, Copy, Default)]
pub struct ManualTicks;

impl TickSource for ManualTicks {
    fn scheduler(&self) -> Box<dyn TickScheduler> {
        Box::new(ManualTicker::new())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::{TokioTicker, TokioTicks};

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::*;
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::task::JoinHandle;
    use tokio::time::{interval_at, Instant, MissedTickBehavior};

    /// Sends a `TimerFired` down `tx` every interval from a spawned task. The task is
    /// aborted on reschedule, cancel and drop. Must be (re)scheduled inside a runtime.
    pub struct TokioTicker {
        tx: UnboundedSender<TimerFired>,
        task: Option<JoinHandle<()>>,
        interval: Option<Duration>,
    }

    impl TokioTicker {
        pub fn new(tx: UnboundedSender<TimerFired>) -> Self {
            Self {
                tx,
                task: None,
                interval: None,
            }
        }
    }

    impl TickScheduler for TokioTicker {
        fn reschedule(&mut self, interval: Duration) -> u64 {
            self.cancel();
            // tokio rejects a zero period
            let interval = interval.max(Duration::from_millis(1));
            let token = next_token();
            let tx = self.tx.clone();
            self.task = Some(tokio::spawn(async move {
                let mut ticks = interval_at(Instant::now() + interval, interval);
                ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticks.tick().await;
                    if tx.send(TimerFired { token }).is_err() {
                        break;
                    }
                }
            }));
            self.interval = Some(interval);
            token
        }

        fn cancel(&mut self) {
            if let Some(task) = self.task.take() {
                task.abort();
            }
            self.interval = None;
        }

        fn interval(&self) -> Option<Duration> {
            self.interval
        }
    }

    impl Drop for TokioTicker {
        fn drop(&mut self) {
            self.cancel();
        }
    }

    #[derive(Clone)]
    pub struct TokioTicks {
        tx: UnboundedSender<TimerFired>,
    }

    impl TokioTicks {
        pub fn new(tx: UnboundedSender<TimerFired>) -> Self {
            Self { tx }
        }
    }

    impl TickSource for TokioTicks {
        fn scheduler(&self) -> Box<dyn TickScheduler> {
            Box::new(TokioTicker::new(self.tx.clone()))
        }
    }
}

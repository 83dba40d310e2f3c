use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Spawn a once-per-second ticker. `on_tick` returns false to stop.
/// The first tick fires one period after spawning.
pub fn spawn_ticker<F>(period: Duration, mut on_tick: F) -> JoinHandle<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval's first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if !on_tick() {
                break;
            }
        }
    })
}

/// Display-only countdown, e.g. the pause between multiplayer rounds.
/// Aborted when dropped.
pub struct Countdown {
    remaining: watch::Receiver<u32>,
    handle: JoinHandle<()>,
}

impl Countdown {
    pub fn start(secs: u32) -> Self {
        let (tx, remaining) = watch::channel(secs);
        let handle = spawn_ticker(Duration::from_secs(1), move || {
            let mut left = 0;
            tx.send_modify(|v| {
                *v = v.saturating_sub(1);
                left = *v;
            });
            left > 0
        });
        Self { remaining, handle }
    }

    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.remaining.clone()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

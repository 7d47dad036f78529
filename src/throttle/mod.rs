use std::time::Duration;

use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(1);

/// Keeps a worker's read-capacity consumption under its budget.
///
/// Consumption is accumulated against a rolling window; when the
/// accumulated units outrun what the budget allows for the elapsed window
/// time, [`Throttle::record`] sleeps the caller for the difference. This is
/// a self-correcting rate limiter rather than a hard gate: a burst within
/// one window is tolerated, a sustained burst is paid for in sleep. The
/// window rolls once at least a second has passed and any owed sleep has
/// been served, so idle time banks at most one window of credit.
pub struct Throttle {
    per_sec: f64,
    window: Instant,
    consumed: f64,
}

impl Throttle {
    /// `units_per_sec` is the worker's capacity budget in read-capacity
    /// units per second.
    pub fn new(units_per_sec: f64) -> Self {
        Self {
            per_sec: units_per_sec.max(1e-6),
            window: Instant::now(),
            consumed: 0.0,
        }
    }

    /// Records capacity spent by the most recent request, sleeping first if
    /// the window's consumption rate is over budget.
    pub async fn record(&mut self, units: f64) {
        self.consumed += units;

        let owed = Duration::from_secs_f64(self.consumed / self.per_sec);
        let elapsed = self.window.elapsed();
        if owed > elapsed {
            tokio::time::sleep(owed - elapsed).await;
        }

        if self.window.elapsed() >= WINDOW {
            self.window = Instant::now();
            self.consumed = 0.0;
        }
    }
}

use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::Receiver;

/// Bound on buffered worker → reporter progress events.
pub const CHANNEL_CAPACITY: usize = 1024;

/// One progress update from a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// `n` more items moved.
    Items(u64),
    /// One unit of work (a partition or a file) finished.
    UnitComplete,
}

/// Running totals aggregated by the reporter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTotals {
    pub items: u64,
    pub units_complete: usize,
}

impl ProgressTotals {
    pub fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Items(n) => self.items += n,
            ProgressEvent::UnitComplete => self.units_complete += 1,
        }
    }
}

/// Status-line shape for each pipeline.
#[derive(Debug, Clone)]
pub enum ReportStyle {
    Dump {
        /// Approximate item count from describe-table, for the `~N` hint.
        approx_items: u64,
        /// `"segments"` or `"keys"`, depending on the partition mode.
        unit_label: &'static str,
    },
    Load,
}

impl ReportStyle {
    pub fn line(&self, totals: &ProgressTotals, total_units: usize) -> String {
        match self {
            Self::Dump {
                approx_items,
                unit_label,
            } => format!(
                "{}/~{} items dumped - {}/{} {}.",
                totals.items, approx_items, totals.units_complete, total_units, unit_label
            ),
            Self::Load => format!(
                "{} items loaded - {}/{} files complete.",
                totals.items, totals.units_complete, total_units
            ),
        }
    }
}

/// The single consumer of all worker progress events.
///
/// Once a second: drain everything pending, fold it into the totals,
/// print one status line. Finishes when every unit has reported
/// completion, or when all senders are gone and the channel is drained
/// (the orchestrator aborts this task outright on a worker failure).
pub async fn report(
    mut events: Receiver<ProgressEvent>,
    style: ReportStyle,
    total_units: usize,
) -> ProgressTotals {
    let mut totals = ProgressTotals::default();

    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut closed = false;
        loop {
            match events.try_recv() {
                Ok(event) => totals.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        println!("{}", style.line(&totals, total_units));

        if totals.units_complete >= total_units || closed {
            return totals;
        }
    }
}

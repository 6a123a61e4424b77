//! Stage totals and the final rollup.

use parking_lot::Mutex;

use super::Stage;
use super::policy::Outcome;
use crate::log;
use crate::utils::plural::plural_count;
use crate::utils::size::fmt_size;

/// Byte and file counters for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub original: u64,
    pub saved: u64,
    pub files: usize,
    pub committed: usize,
}

impl Totals {
    /// `saved / original * 100`, or `None` when nothing was processed.
    pub fn percent(&self) -> Option<f64> {
        (self.original > 0).then(|| self.saved as f64 / self.original as f64 * 100.0)
    }

    pub const fn new_size(&self) -> u64 {
        self.original.saturating_sub(self.saved)
    }

    fn add(&mut self, outcome: &Outcome) {
        self.original += outcome.original;
        self.saved += outcome.saved();
        self.files += 1;
        if outcome.committed() {
            self.committed += 1;
        }
    }
}

/// Accumulator shared by every task of a stage.
///
/// Each update holds the lock only for the additions.
#[derive(Debug, Default)]
pub struct StageTotals {
    inner: Mutex<Totals>,
}

impl StageTotals {
    pub fn record(&self, outcome: &Outcome) {
        self.inner.lock().add(outcome);
    }

    pub fn snapshot(&self) -> Totals {
        *self.inner.lock()
    }
}

/// Settled result of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub totals: Totals,
    pub failed: usize,
}

impl StageReport {
    /// One summary line, e.g. `[img] 12 files, 3 rewritten: 1.2 kb saved of 40.0 kb (3.0%)`.
    pub fn log(&self) {
        let Totals {
            original,
            saved,
            files,
            committed,
        } = self.totals;

        if files == 0 && self.failed == 0 {
            log!(self.stage.name(); "nothing to do");
            return;
        }

        let failures = if self.failed > 0 {
            format!(", {}", plural_count(self.failed, "failure"))
        } else {
            String::new()
        };
        match self.totals.percent() {
            Some(percent) => log!(
                self.stage.name();
                "{}, {} {}{}: {} saved of {} ({:.1}%)",
                plural_count(files, "file"),
                committed,
                self.stage.commit_verb(),
                failures,
                fmt_size(saved),
                fmt_size(original),
                percent
            ),
            None => log!(
                self.stage.name();
                "{}, {} {}{}",
                plural_count(files, "file"),
                committed,
                self.stage.commit_verb(),
                failures
            ),
        }
    }
}

/// All stage reports of a run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub stages: Vec<StageReport>,
}

impl Report {
    pub fn push(&mut self, report: StageReport) {
        self.stages.push(report);
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// Sum of every stage.
    ///
    /// Derivative stages add their savings but not their originals, which
    /// were already counted by the stage that processed the source files.
    pub fn overall(&self) -> Totals {
        self.stages.iter().fold(Totals::default(), |mut acc, r| {
            if !r.stage.is_derivative() {
                acc.original += r.totals.original;
                acc.files += r.totals.files;
            }
            acc.saved += r.totals.saved;
            acc.committed += r.totals.committed;
            acc
        })
    }

    pub fn failed(&self) -> usize {
        self.stages.iter().map(|r| r.failed).sum()
    }

    /// Final rollup line.
    pub fn log(&self) {
        let total = self.overall();
        let failures = match self.failed() {
            0 => String::new(),
            n => format!(" ({})", plural_count(n, "failure")),
        };
        match total.percent() {
            Some(percent) => log!(
                "done";
                "{} → {}, saved {} ({:.1}%){}",
                fmt_size(total.original),
                fmt_size(total.new_size()),
                fmt_size(total.saved),
                percent,
                failures
            ),
            None => log!("done"; "no assets found{}", failures),
        }
    }
}

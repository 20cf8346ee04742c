//! Wall-clock section timing.
//!
//! A [`Timer`] accumulates call counts and elapsed time per named section. Sections are
//! entered through [`Timer::scope`], which returns a guard that records on drop, so early
//! returns and `?` still close the section.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SectionStats {
    pub calls: usize,
    pub wall: Duration,
}

#[derive(Debug, Default)]
pub struct Timer {
    sections: Mutex<BTreeMap<&'static str, SectionStats>>,
}

/// Records the elapsed time of one section entry when dropped.
pub struct ScopedTimer<'a> {
    timer: &'a Timer,
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&self, name: &'static str) -> ScopedTimer<'_> {
        ScopedTimer {
            timer: self,
            name,
            start: Instant::now(),
        }
    }

    fn record(&self, name: &'static str, elapsed: Duration) {
        // A poisoned lock only means another thread panicked mid-update; the counters stay usable.
        let mut sections = self.sections.lock().unwrap_or_else(|e| e.into_inner());
        let entry = sections.entry(name).or_default();
        entry.calls += 1;
        entry.wall += elapsed;
    }

    pub fn section(&self, name: &str) -> Option<SectionStats> {
        let sections = self.sections.lock().unwrap_or_else(|e| e.into_inner());
        sections.get(name).copied()
    }

    pub fn reset(&self) {
        self.sections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Snapshot of all sections in name order.
    pub fn summary(&self) -> Vec<(&'static str, SectionStats)> {
        let sections = self.sections.lock().unwrap_or_else(|e| e.into_inner());
        sections.iter().map(|(k, v)| (*k, *v)).collect()
    }

    /// Print the summary table through the `log` facade.
    pub fn log_summary(&self) {
        log::info!("{:<12}{:>10}{:>14}{:>14}", "section", "calls", "wall [s]", "avg [s]");
        for (name, stats) in self.summary() {
            let wall = stats.wall.as_secs_f64();
            let avg = if stats.calls > 0 {
                wall / stats.calls as f64
            } else {
                0.0
            };
            log::info!("{:<12}{:>10}{:>14.4e}{:>14.4e}", name, stats.calls, wall, avg);
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        self.timer.record(self.name, self.start.elapsed());
    }
}

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::Stage;

/// Weighted progress across the pipeline stages.
///
/// Owned by the orchestrator; stage work reports percentages through `update`
/// and nothing else writes to it.
pub struct StageProgress {
    current: Option<Stage>,
    percent: f64,
    visible: bool,
    bar: ProgressBar,
}

impl StageProgress {
    pub fn new() -> Self {
        Self {
            current: None,
            percent: 0.0,
            visible: true,
            bar: ProgressBar::hidden(),
        }
    }

    /// Tracks progress without drawing anything.
    pub fn hidden() -> Self {
        Self {
            visible: false,
            ..Self::new()
        }
    }

    pub fn start(&mut self, stage: Stage) {
        info!("Starting: {}", stage.label());
        self.current = Some(stage);
        self.percent = 0.0;
        self.bar = if self.visible {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] {msg:<20} [{bar:40.cyan/blue}] {pos:>3}%")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            bar.set_message(stage.label());
            bar
        } else {
            ProgressBar::hidden()
        };
    }

    /// Treat `stage` as already done, so the next `start` accounts for it.
    pub fn resume_after(&mut self, stage: Stage) {
        self.current = Some(stage);
        self.percent = 100.0;
    }

    /// Percentage of the current stage, clamped to [0, 100].
    pub fn update(&mut self, percent: f64) {
        self.percent = percent.clamp(0.0, 100.0);
        self.bar.set_position(self.percent.round() as u64);
    }

    pub fn finish(&mut self) {
        self.update(100.0);
        self.bar.finish_and_clear();
        if let Some(stage) = self.current {
            info!("Finished: {} ({:.1}% overall)", stage.label(), self.overall());
        }
    }

    /// `(completed weight + current% * current weight) / total weight`, as a percentage.
    pub fn overall(&self) -> f64 {
        let Some(current) = self.current else {
            return 0.0;
        };
        let total: u32 = Stage::ALL.iter().map(|s| s.weight()).sum();
        let completed: u32 = Stage::ALL[..current.index()].iter().map(|s| s.weight()).sum();
        let partial = self.percent / 100.0 * f64::from(current.weight());
        (f64::from(completed) + partial) / f64::from(total) * 100.0
    }
}

impl Default for StageProgress {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──

//! Mining progress reports.
//!
//! Scheduling is left to the caller; [`ProgressReporter::report`] formats
//! one report and posts it through the notifier.

use crate::error::Result;
use crate::ports::notifier::Notifier;
use minefleet_msg::{Announcement, MessageCatalog, ProgressContext};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Figures a progress report is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MiningStats {
    pub mined_blocks: u64,
    pub durability: u32,
    pub max_durability: u32,
    pub tool_count: usize,
    pub current_y: i32,
    pub target_y: i32,
}

impl MiningStats {
    /// Completion percentage towards `target_y`, in `0..=100`.
    ///
    /// Measured as the remaining vertical distance relative to the target
    /// level's magnitude. A zero target with any distance left counts as no
    /// progress.
    ///
    /// # Examples
    ///
    /// ```
    /// use minefleet_core::progress::MiningStats;
    ///
    /// let stats = MiningStats { current_y: 30, target_y: -60, ..Default::default() };
    /// assert_eq!(stats.progress_percent(), 0);
    ///
    /// let stats = MiningStats { current_y: 15, target_y: 12, ..Default::default() };
    /// assert_eq!(stats.progress_percent(), 75);
    /// ```
    pub fn progress_percent(&self) -> u32 {
        let distance = f64::from(self.target_y.abs_diff(self.current_y));
        if distance == 0.0 {
            return 100;
        }
        let scale = f64::from(self.target_y.unsigned_abs());
        if scale == 0.0 {
            return 0;
        }
        ((1.0 - distance / scale) * 100.0).clamp(0.0, 100.0).round() as u32
    }

    fn context(&self) -> ProgressContext {
        ProgressContext {
            progress: self.progress_percent(),
            current: self.current_y,
            target: self.target_y,
            durability: self.durability,
            max_durability: self.max_durability,
            tool_count: self.tool_count,
        }
    }
}

/// Posts progress reports.
pub struct ProgressReporter {
    notifier: Arc<dyn Notifier>,
    catalog: Arc<MessageCatalog>,
}

impl ProgressReporter {
    pub fn new(notifier: Arc<dyn Notifier>, catalog: Arc<MessageCatalog>) -> Self {
        Self { notifier, catalog }
    }

    /// Renders `stats` and posts the text.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::Message` if the `progress` template fails to
    /// render; nothing is posted in that case.
    pub fn report(&self, stats: &MiningStats) -> Result<String> {
        let text = self.catalog.announce(Announcement::Progress, &stats.context())?;
        debug!(progress = stats.progress_percent(), "posting progress report");
        self.notifier.notify(&text);
        Ok(text)
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::notifier::MockNotifier;

    fn stats(current_y: i32, target_y: i32) -> MiningStats {
        MiningStats {
            current_y,
            target_y,
            ..Default::default()
        }
    }

    #[test]
    fn test_progress_percent_edges() {
        assert_eq!(stats(-58, -58).progress_percent(), 100);
        assert_eq!(stats(0, 0).progress_percent(), 100);
        assert_eq!(stats(5, 0).progress_percent(), 0);
        assert_eq!(stats(0, -60).progress_percent(), 0);
        assert_eq!(stats(-30, -60).progress_percent(), 50);
        assert_eq!(stats(-59, -60).progress_percent(), 98);
    }

    #[test]
    fn test_should_post_rendered_report() {
        let notifier = MockNotifier::new();
        let reporter = ProgressReporter::new(
            Arc::new(notifier.clone()),
            Arc::new(MessageCatalog::builtin()),
        );
        let stats = MiningStats {
            mined_blocks: 12,
            durability: 40,
            max_durability: 59,
            tool_count: 2,
            current_y: -30,
            target_y: -60,
        };

        let text = reporter.report(&stats).unwrap();
        assert_eq!(
            text,
            "[progress] 50%  (Y=-30/-60)\n[tool] durability 40/59, spare tools 2"
        );
        assert_eq!(notifier.messages(), vec![text]);
    }
}

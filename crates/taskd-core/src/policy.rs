//! Foreground classification policies.
//!
//! Whether a process is "foreground" is a heuristic. The only assumption
//! made about the input score is that lower means more foreground; the
//! threshold itself carries no further meaning and is configurable.

/// Default `oom_score_adj` threshold at or below which a process counts as foreground.
pub const DEFAULT_FOREGROUND_THRESHOLD: i32 = 100;

/// Decides whether a process is in the foreground.
pub trait ForegroundPolicy: Send + Sync {
    /// Classifies a process from its OOM score adjustment.
    ///
    /// `None` means the score could not be read.
    fn is_foreground(&self, oom_score_adj: Option<i32>) -> bool;
}

/// Foreground when `oom_score_adj` is at or below a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OomScoreThreshold {
    pub threshold: i32,
}

impl OomScoreThreshold {
    pub const fn new(threshold: i32) -> Self {
        Self { threshold }
    }
}

impl Default for OomScoreThreshold {
    fn default() -> Self {
        Self::new(DEFAULT_FOREGROUND_THRESHOLD)
    }
}

impl ForegroundPolicy for OomScoreThreshold {
    fn is_foreground(&self, oom_score_adj: Option<i32>) -> bool {
        oom_score_adj.is_some_and(|score| score <= self.threshold)
    }
}

//! Fit records and search run tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique search run identifier.
pub type SearchRunId = Uuid;

/// Lifecycle state for a search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// The best candidate seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCandidate {
    pub candidate: usize,
    pub mean_score: f64,
}

/// Aggregate status of one search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRun {
    pub id: SearchRunId,
    pub estimator: String,
    pub splitter: String,
    pub n_candidates: usize,
    pub n_splits: usize,
    pub n_workers: usize,
    pub state: RunState,
    pub fits_completed: usize,
    pub fits_failed: usize,
    pub best: Option<BestCandidate>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SearchRun {
    pub fn new(estimator: &str, splitter: &str, n_candidates: usize, n_splits: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            estimator: estimator.to_string(),
            splitter: splitter.to_string(),
            n_candidates,
            n_splits,
            n_workers: 1,
            state: RunState::Pending,
            fits_completed: 0,
            fits_failed: 0,
            best: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn total_fits(&self) -> usize {
        self.n_candidates * self.n_splits
    }

    pub fn mark_running(&mut self, n_workers: usize) {
        self.state = RunState::Running;
        self.n_workers = n_workers;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = RunState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn record_fit(&mut self, succeeded: bool) {
        if succeeded {
            self.fits_completed += 1;
        } else {
            self.fits_failed += 1;
        }
    }

    /// Replace the best candidate only on a strictly higher mean score, so
    /// the earliest candidate keeps a tie.
    pub fn update_best(&mut self, candidate: usize, mean_score: f64) {
        if !mean_score.is_finite() {
            return;
        }
        let improves = match &self.best {
            None => true,
            Some(current) => mean_score > current.mean_score,
        };
        if improves {
            self.best = Some(BestCandidate {
                candidate,
                mean_score,
            });
        }
    }

    /// Wall-clock seconds between start and finish.
    pub fn elapsed_seconds(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}

/// Outcome of fitting one candidate on one split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRecord {
    pub candidate: usize,
    pub split: usize,
    pub test_score: f64,
    pub train_score: Option<f64>,
    /// Seconds.
    pub fit_time: f64,
    /// Seconds.
    pub score_time: f64,
}

impl FitRecord {
    /// Stand-in record for a failed fit when the search substitutes a score.
    pub fn substituted(candidate: usize, split: usize, score: f64, with_train: bool) -> Self {
        Self {
            candidate,
            split,
            test_score: score,
            train_score: with_train.then_some(score),
            fit_time: 0.0,
            score_time: 0.0,
        }
    }
}

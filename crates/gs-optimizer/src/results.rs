//! Per-candidate cross-validation scores and best-candidate selection.

use gs_types::{GsResult, SearchError};
use serde::{Deserialize, Serialize};

use crate::search::ParamSet;
use crate::trial::FitRecord;

/// Aggregated scores for one grid point across all splits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub params: ParamSet,
    pub split_test_scores: Vec<f64>,
    pub mean_test_score: f64,
    pub std_test_score: f64,
    /// 1 is best; tied scores share the lowest rank.
    pub rank_test_score: usize,
    pub split_train_scores: Option<Vec<f64>>,
    pub mean_train_score: Option<f64>,
    pub std_train_score: Option<f64>,
    pub mean_fit_time: f64,
    pub std_fit_time: f64,
    pub mean_score_time: f64,
    pub std_score_time: f64,
}

impl CandidateResult {
    /// Aggregate the fit records of one candidate, in split order. The rank is
    /// filled in by [`CvResults::new`].
    pub fn from_records(params: ParamSet, records: &[FitRecord]) -> Self {
        let split_test_scores: Vec<f64> = records.iter().map(|r| r.test_score).collect();
        let split_train_scores: Option<Vec<f64>> =
            records.iter().map(|r| r.train_score).collect();
        let fit_times: Vec<f64> = records.iter().map(|r| r.fit_time).collect();
        let score_times: Vec<f64> = records.iter().map(|r| r.score_time).collect();

        Self {
            params,
            mean_test_score: mean(&split_test_scores),
            std_test_score: std_dev(&split_test_scores),
            rank_test_score: 0,
            mean_train_score: split_train_scores.as_deref().map(mean),
            std_train_score: split_train_scores.as_deref().map(std_dev),
            split_test_scores,
            split_train_scores,
            mean_fit_time: mean(&fit_times),
            std_fit_time: std_dev(&fit_times),
            mean_score_time: mean(&score_times),
            std_score_time: std_dev(&score_times),
        }
    }
}

/// The full score table of a search plus the selected best candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResults {
    candidates: Vec<CandidateResult>,
    best_index: usize,
    n_splits: usize,
}

impl CvResults {
    /// Rank candidates by mean test score and pick the best. Ties go to the
    /// earliest candidate.
    pub fn new(mut candidates: Vec<CandidateResult>, n_splits: usize) -> GsResult<Self> {
        let means: Vec<f64> = candidates.iter().map(|c| c.mean_test_score).collect();
        for (candidate, rank) in candidates.iter_mut().zip(rank_descending(&means)) {
            candidate.rank_test_score = rank;
        }

        let best_index = candidates
            .iter()
            .position(|c| c.rank_test_score == 1 && c.mean_test_score.is_finite())
            .ok_or(SearchError::NoFiniteScores {
                candidates: candidates.len(),
            })?;

        Ok(Self {
            candidates,
            best_index,
            n_splits,
        })
    }

    pub fn candidates(&self) -> &[CandidateResult] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn best_index(&self) -> usize {
        self.best_index
    }

    pub fn best(&self) -> &CandidateResult {
        &self.candidates[self.best_index]
    }

    pub fn best_score(&self) -> f64 {
        self.best().mean_test_score
    }

    pub fn best_params(&self) -> &ParamSet {
        &self.best().params
    }

    pub fn mean_test_scores(&self) -> Vec<f64> {
        self.candidates.iter().map(|c| c.mean_test_score).collect()
    }

    /// The `n` best candidates, best first; ties keep enumeration order.
    pub fn top_n(&self, n: usize) -> Vec<&CandidateResult> {
        let mut sorted: Vec<&CandidateResult> = self.candidates.iter().collect();
        sorted.sort_by_key(|c| c.rank_test_score);
        sorted.into_iter().take(n).collect()
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Min-method ranks, highest score first. NaN scores rank after every
/// finite score.
pub fn rank_descending(scores: &[f64]) -> Vec<usize> {
    let finite = scores.iter().filter(|s| !s.is_nan()).count();
    scores
        .iter()
        .map(|score| {
            if score.is_nan() {
                finite + 1
            } else {
                1 + scores.iter().filter(|other| **other > *score).count()
            }
        })
        .collect()
}

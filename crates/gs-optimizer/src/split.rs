//! Cross-validation fold splitting.

use gs_types::{GsResult, SearchError};
use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Row indices for one train/validation split. Both lists are ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Produces train/validation splits for a label vector.
pub trait CrossValidator: Send + Sync {
    fn n_splits(&self) -> usize;

    fn split(&self, labels: ArrayView1<'_, f32>) -> GsResult<Vec<Split>>;

    /// Human-readable splitter name.
    fn name(&self) -> &str;
}

fn check_split_count(n_splits: usize, n_samples: usize) -> GsResult<()> {
    if n_splits < 2 {
        return Err(SearchError::InvalidSplit {
            message: format!("at least 2 folds are required, got {n_splits}"),
        }
        .into());
    }
    if n_splits > n_samples {
        return Err(SearchError::InvalidSplit {
            message: format!("cannot make {n_splits} folds from {n_samples} samples"),
        }
        .into());
    }
    Ok(())
}

/// Turn a per-sample fold assignment into ascending train/test index lists.
fn splits_from_assignment(assignment: &[usize], n_splits: usize) -> Vec<Split> {
    (0..n_splits)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..assignment.len()).partition(|&i| assignment[i] == fold);
            Split { train, test }
        })
        .collect()
}

/// Contiguous folds over the (optionally shuffled) sample order. The first
/// `n % k` folds hold one extra sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KFold {
    n_splits: usize,
    shuffle_seed: Option<u64>,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle_seed: None,
        }
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }
}

impl CrossValidator for KFold {
    fn n_splits(&self) -> usize {
        self.n_splits
    }

    fn split(&self, labels: ArrayView1<'_, f32>) -> GsResult<Vec<Split>> {
        let n_samples = labels.len();
        check_split_count(self.n_splits, n_samples)?;

        let mut order: Vec<usize> = (0..n_samples).collect();
        if let Some(seed) = self.shuffle_seed {
            order.shuffle(&mut StdRng::seed_from_u64(seed));
        }

        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;
        let mut assignment = vec![0usize; n_samples];
        let mut start = 0;
        for fold in 0..self.n_splits {
            let size = base + usize::from(fold < extra);
            for &sample in &order[start..start + size] {
                assignment[sample] = fold;
            }
            start += size;
        }

        Ok(splits_from_assignment(&assignment, self.n_splits))
    }

    fn name(&self) -> &str {
        "kfold"
    }
}

/// Folds that preserve class proportions.
///
/// Classes are encoded by order of first appearance. Each class's samples are
/// dealt to folds so that fold `i` receives the class's share of every
/// `k`-th position in the label vector sorted by class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle_seed: Option<u64>,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle_seed: None,
        }
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }
}

impl CrossValidator for StratifiedKFold {
    fn n_splits(&self) -> usize {
        self.n_splits
    }

    fn split(&self, labels: ArrayView1<'_, f32>) -> GsResult<Vec<Split>> {
        let n_samples = labels.len();
        check_split_count(self.n_splits, n_samples)?;

        let mut classes: Vec<f32> = Vec::new();
        let encoded: Vec<usize> = labels
            .iter()
            .map(|label| match classes.iter().position(|c| c.total_cmp(label).is_eq()) {
                Some(idx) => idx,
                None => {
                    classes.push(*label);
                    classes.len() - 1
                }
            })
            .collect();

        let mut counts = vec![0usize; classes.len()];
        for &class in &encoded {
            counts[class] += 1;
        }
        let largest = counts.iter().copied().max().unwrap_or(0);
        let smallest = counts.iter().copied().min().unwrap_or(0);
        if self.n_splits > largest {
            return Err(SearchError::InvalidSplit {
                message: format!(
                    "{} folds requested but no class has more than {} members",
                    self.n_splits, largest
                ),
            }
            .into());
        }
        if self.n_splits > smallest {
            tracing::warn!(
                "The least populated class has only {} members, fewer than {} folds",
                smallest,
                self.n_splits
            );
        }

        let mut sorted = encoded.clone();
        sorted.sort_unstable();
        // allocation[fold][class]: how many of the class land in each fold
        let mut allocation = vec![vec![0usize; classes.len()]; self.n_splits];
        for (position, &class) in sorted.iter().enumerate() {
            allocation[position % self.n_splits][class] += 1;
        }

        let mut rng = self.shuffle_seed.map(StdRng::seed_from_u64);
        let mut assignment = vec![0usize; n_samples];
        for class in 0..classes.len() {
            let mut folds_for_class: Vec<usize> = (0..self.n_splits)
                .flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][class]))
                .collect();
            if let Some(rng) = rng.as_mut() {
                folds_for_class.shuffle(rng);
            }
            let members = (0..n_samples).filter(|&i| encoded[i] == class);
            for (sample, fold) in members.zip(folds_for_class) {
                assignment[sample] = fold;
            }
        }

        Ok(splits_from_assignment(&assignment, self.n_splits))
    }

    fn name(&self) -> &str {
        "stratified_kfold"
    }
}

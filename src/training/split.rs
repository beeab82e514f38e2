//! Fixed-seed train/validation/test split (spec §4.D Open Question:
//! subject-disjoint splitting is out of scope — the decision record in
//! `DESIGN.md` explains why).

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A labeled training example: a window tagged with its owning user.
pub struct LabeledExample<T> {
    pub user_id: String,
    pub item: T,
}

pub struct Split<T> {
    pub train: Vec<LabeledExample<T>>,
    pub val: Vec<LabeledExample<T>>,
    pub test: Vec<LabeledExample<T>>,
}

/// Shuffle `examples` deterministically under `seed` and split
/// 70/15/15. Not subject-disjoint: a user's windows may appear in more
/// than one split, matching the enrollment-style evaluation this
/// system targets rather than a cross-subject generalization study.
pub fn split_examples<T>(mut examples: Vec<LabeledExample<T>>, seed: u64) -> Split<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    examples.shuffle(&mut rng);

    let n = examples.len();
    let train_end = (n as f64 * 0.70).round() as usize;
    let val_end = (n as f64 * 0.85).round() as usize;

    let mut iter = examples.into_iter();
    let train: Vec<_> = (&mut iter).take(train_end).collect();
    let val: Vec<_> = (&mut iter).take(val_end - train_end).collect();
    let test: Vec<_> = iter.collect();

    Split { train, val, test }
}

/// Group labeled examples by user id, for per-user prototype building
/// or batched metric-learning sampling.
pub fn group_by_user<T>(examples: Vec<LabeledExample<T>>) -> HashMap<String, Vec<T>> {
    let mut groups: HashMap<String, Vec<T>> = HashMap::new();
    for example in examples {
        groups.entry(example.user_id).or_default().push(example.item);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn examples(n: usize) -> Vec<LabeledExample<usize>> {
        (0..n)
            .map(|i| LabeledExample {
                user_id: format!("user-{}", i % 3),
                item: i,
            })
            .collect()
    }

    #[test]
    fn split_proportions_are_roughly_70_15_15() {
        let split = split_examples(examples(100), 42);
        assert_eq!(split.train.len() + split.val.len() + split.test.len(), 100);
        assert_eq!(split.train.len(), 70);
    }

    #[test]
    fn split_is_deterministic_for_fixed_seed() {
        let a = split_examples(examples(50), 7);
        let b = split_examples(examples(50), 7);
        let a_items: Vec<usize> = a.train.iter().map(|e| e.item).collect();
        let b_items: Vec<usize> = b.train.iter().map(|e| e.item).collect();
        assert_eq!(a_items, b_items);
    }

    #[test]
    fn group_by_user_buckets_correctly() {
        let groups = group_by_user(examples(6));
        assert_eq!(groups.len(), 3);
        assert_eq!(groups["user-0"].len(), 2);
    }
}

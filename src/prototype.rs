//! Per-user prototype construction (spec §4.E): cosine k-means++
//! clustering of a user's enrollment embeddings into `K >= 1`
//! unit-renormalized centroids.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::Embedding;

const KMEANS_MAX_ITERS: usize = 100;
const KMEANS_RESTARTS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrototypeSet {
    pub centroids: Vec<Vec<f32>>,
}

impl PrototypeSet {
    pub fn centroids(&self) -> Vec<Embedding> {
        self.centroids
            .iter()
            .map(|v| Embedding::from_raw(v.clone()).expect("stored centroids are unit-norm"))
            .collect()
    }

    /// Highest cosine similarity between `probe` and any centroid.
    pub fn best_similarity(&self, probe: &Embedding) -> f32 {
        self.centroids()
            .iter()
            .map(|c| c.cosine_similarity(probe))
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrototypeTable {
    pub users: std::collections::BTreeMap<String, PrototypeSet>,
}

impl PrototypeTable {
    pub fn get(&self, user_id: &str) -> Option<&PrototypeSet> {
        self.users.get(user_id)
    }

    pub fn insert(&mut self, user_id: String, set: PrototypeSet) {
        self.users.insert(user_id, set);
    }
}

/// Cluster `embeddings` into `config.prototypes_per_user` centroids
/// using cosine k-means++. Falls back to a single mean-renormalized
/// centroid if fewer embeddings are given than requested clusters.
pub fn build_prototypes(embeddings: &[Embedding], config: &Config) -> Result<PrototypeSet> {
    if embeddings.is_empty() {
        return Err(Error::Numeric("cannot build prototypes from zero embeddings".into()));
    }
    let k = config.prototypes_per_user.max(1).min(embeddings.len());
    if k == 1 {
        let mean = Embedding::mean_renormalized(embeddings)?;
        return Ok(PrototypeSet {
            centroids: vec![mean.as_slice().to_vec()],
        });
    }

    let mut best: Option<(f32, Vec<Embedding>)> = None;
    for restart in 0..KMEANS_RESTARTS {
        let centroids = cosine_kmeans(embeddings, k, restart as u64);
        let inertia = total_cosine_inertia(embeddings, &centroids);
        if best.as_ref().map(|(b, _)| inertia < *b).unwrap_or(true) {
            best = Some((inertia, centroids));
        }
    }
    let (_, centroids) = best.expect("at least one restart runs");

    Ok(PrototypeSet {
        centroids: centroids.iter().map(|c| c.as_slice().to_vec()).collect(),
    })
}

fn cosine_kmeans(embeddings: &[Embedding], k: usize, seed: u64) -> Vec<Embedding> {
    let mut centroids = kmeans_plus_plus_init(embeddings, k, seed);

    for _iter in 0..KMEANS_MAX_ITERS {
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); k];
        for (i, e) in embeddings.iter().enumerate() {
            let best = nearest_centroid(e, &centroids);
            buckets[best].push(i);
        }

        let mut new_centroids = Vec::with_capacity(k);
        let mut changed = false;
        for (cluster_idx, bucket) in buckets.iter().enumerate() {
            if bucket.is_empty() {
                new_centroids.push(centroids[cluster_idx].clone());
                continue;
            }
            let members: Vec<Embedding> = bucket.iter().map(|&i| embeddings[i].clone()).collect();
            let new_centroid = Embedding::mean_renormalized(&members).expect("non-empty bucket");
            if new_centroid.cosine_similarity(&centroids[cluster_idx]) < 1.0 - 1e-6 {
                changed = true;
            }
            new_centroids.push(new_centroid);
        }
        centroids = new_centroids;
        if !changed {
            break;
        }
    }
    centroids
}

fn kmeans_plus_plus_init(embeddings: &[Embedding], k: usize, seed: u64) -> Vec<Embedding> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = Vec::with_capacity(k);
    let first = rng.gen_range(0..embeddings.len());
    centroids.push(embeddings[first].clone());

    while centroids.len() < k {
        let weights: Vec<f32> = embeddings
            .iter()
            .map(|e| {
                let max_sim = centroids
                    .iter()
                    .map(|c| c.cosine_similarity(e))
                    .fold(f32::NEG_INFINITY, f32::max);
                (1.0 - max_sim).max(0.0).powi(2)
            })
            .collect();
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            centroids.push(embeddings[rng.gen_range(0..embeddings.len())].clone());
            continue;
        }
        let mut pick = rng.gen_range(0.0..total);
        let mut chosen = embeddings.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            if pick < *w {
                chosen = i;
                break;
            }
            pick -= w;
        }
        centroids.push(embeddings[chosen].clone());
    }
    centroids
}

/// Index of the centroid with the highest cosine similarity to `e`.
/// On ties, keeps the smallest index: only a strict improvement moves
/// the running best.
fn nearest_centroid(e: &Embedding, centroids: &[Embedding]) -> usize {
    let mut best_idx = 0;
    let mut best_sim = f32::NEG_INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let sim = c.cosine_similarity(e);
        if sim > best_sim {
            best_sim = sim;
            best_idx = i;
        }
    }
    best_idx
}

fn total_cosine_inertia(embeddings: &[Embedding], centroids: &[Embedding]) -> f32 {
    embeddings
        .iter()
        .map(|e| {
            let best = centroids
                .iter()
                .map(|c| c.cosine_similarity(e))
                .fold(f32::NEG_INFINITY, f32::max);
            1.0 - best
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding::from_raw(values).unwrap()
    }

    #[test]
    fn single_prototype_is_mean_renormalized() {
        let mut config = Config::default();
        config.prototypes_per_user = 1;
        let embeddings = vec![emb(vec![1.0, 0.0]), emb(vec![0.0, 1.0])];
        let set = build_prototypes(&embeddings, &config).unwrap();
        assert_eq!(set.centroids.len(), 1);
        let norm: f32 = set.centroids[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn multi_cluster_separates_distinct_groups() {
        let mut config = Config::default();
        config.prototypes_per_user = 2;
        let mut embeddings = Vec::new();
        for _ in 0..5 {
            embeddings.push(emb(vec![1.0, 0.01]));
        }
        for _ in 0..5 {
            embeddings.push(emb(vec![0.01, 1.0]));
        }
        let set = build_prototypes(&embeddings, &config).unwrap();
        assert_eq!(set.centroids.len(), 2);
        let sim = Embedding::from_raw(set.centroids[0].clone())
            .unwrap()
            .cosine_similarity(&Embedding::from_raw(set.centroids[1].clone()).unwrap());
        assert!(sim < 0.9, "clusters should be distinguishable, got sim={sim}");
    }

    #[test]
    fn fewer_embeddings_than_k_clamps_cluster_count() {
        let mut config = Config::default();
        config.prototypes_per_user = 5;
        let embeddings = vec![emb(vec![1.0, 0.0]), emb(vec![0.0, 1.0])];
        let set = build_prototypes(&embeddings, &config).unwrap();
        assert!(set.centroids.len() <= 2);
    }

    #[test]
    fn build_prototypes_rejects_empty_input() {
        let config = Config::default();
        assert!(build_prototypes(&[], &config).is_err());
    }
}

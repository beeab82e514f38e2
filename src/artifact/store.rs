//! Append-only attribution artifact store (spec §5): writes go
//! through a `parking_lot::Mutex` since the backing map is shared
//! across concurrent verification calls, even though each write uses
//! a fresh key and therefore never contends on content.

use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::verify::engine::AttributionArtifact;

#[derive(Default)]
pub struct ArtifactStore {
    artifacts: Mutex<HashMap<Uuid, AttributionArtifact>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly computed artifact, returning its id.
    pub fn put(&self, artifact: AttributionArtifact) -> Uuid {
        let id = Uuid::new_v4();
        self.artifacts.lock().insert(id, artifact);
        id
    }

    pub fn get(&self, id: Uuid) -> Result<AttributionArtifact> {
        self.artifacts
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::InputFormat(format!("no attribution artifact for id {id}")))
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::engine::Decision;
    use ndarray::Array2;

    fn sample_artifact() -> AttributionArtifact {
        AttributionArtifact {
            probe_id: Uuid::new_v4(),
            raw_score: 0.5,
            calibrated_probability: 0.5,
            spoof_score: 0.1,
            decision: Decision::Accept,
            importance: Array2::zeros((2, 2)),
            strategy: crate::attribution::AttributionStrategy::IntegratedGradients,
            error_kind: None,
        }
    }

    #[test]
    fn put_then_get_roundtrips() {
        let store = ArtifactStore::new();
        let id = store.put(sample_artifact());
        let fetched = store.get(id).unwrap();
        assert_eq!(fetched.raw_score, 0.5);
    }

    #[test]
    fn get_unknown_id_errors() {
        let store = ArtifactStore::new();
        assert!(store.get(Uuid::new_v4()).is_err());
    }

    #[test]
    fn each_put_uses_a_fresh_key() {
        let store = ArtifactStore::new();
        store.put(sample_artifact());
        store.put(sample_artifact());
        assert_eq!(store.len(), 2);
    }
}

//! Shared runtime state (spec §5): the active model bundle behind an
//! `ArcSwap` so hot reload is a single atomic pointer store, plus a
//! thin async wrapper around the synchronous, CPU-bound verification
//! core.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use burn::tensor::backend::AutodiffBackend;
use uuid::Uuid;

use crate::artifact::{ArtifactStore, ModelBundle};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::prototype::PrototypeTable;
use crate::types::Trial;
use crate::verify::engine::{OperatingThreshold, VerificationEngine, VerificationOutcome};

pub struct SharedState<B: AutodiffBackend> {
    bundle: ArcSwap<ModelBundle<B>>,
    artifacts: ArtifactStore,
    config: Config,
}

impl<B: AutodiffBackend> SharedState<B> {
    pub fn new(bundle: ModelBundle<B>, config: Config) -> Self {
        Self {
            bundle: ArcSwap::from_pointee(bundle),
            artifacts: ArtifactStore::new(),
            config,
        }
    }

    /// Atomically swap in a freshly loaded bundle. In-flight
    /// verifications against the old bundle keep running against it
    /// (they hold their own `Arc`); only new calls see the update.
    pub fn hot_reload(&self, bundle: ModelBundle<B>) {
        self.bundle.store(Arc::new(bundle));
    }

    fn engine(&self) -> VerificationEngine<B> {
        let bundle = self.bundle.load();
        VerificationEngine {
            encoder: bundle.encoder.clone(),
            autoencoder: bundle.autoencoder.clone(),
            prototypes: bundle.prototypes.clone(),
            calibrator: bundle.calibrator,
            threshold: bundle.threshold,
            tau_spoof: bundle.tau_spoof,
            config: self.config.clone(),
        }
    }

    pub fn verify(&self, user_id: &str, probe: &Trial, device: &B::Device) -> Result<VerificationOutcome> {
        self.engine().verify(user_id, probe, device, &self.artifacts)
    }

    pub fn verify_with_deadline(
        &self,
        user_id: &str,
        probe: &Trial,
        device: &B::Device,
        deadline: Instant,
    ) -> Result<VerificationOutcome> {
        self.engine()
            .verify_with_deadline(user_id, probe, device, &self.artifacts, Some(deadline))
    }

    pub fn fetch_attribution(&self, artifact_id: Uuid) -> Result<crate::verify::engine::AttributionArtifact> {
        self.artifacts.get(artifact_id)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl<B> SharedState<B>
where
    B: AutodiffBackend,
    B::Device: Clone + Send + Sync + 'static,
{
    /// Run `verify` on a blocking thread pool so it never stalls the
    /// async runtime; the verification core itself stays synchronous.
    pub async fn verify_async(
        self: Arc<Self>,
        user_id: String,
        probe: Trial,
        device: B::Device,
    ) -> Result<VerificationOutcome>
    where
        B: 'static,
    {
        tokio::task::spawn_blocking(move || self.verify(&user_id, &probe, &device))
            .await
            .map_err(|e| Error::Numeric(format!("verification task panicked: {e}")))?
    }

    /// Same as [`Self::verify_async`] but bounded by a soft budget
    /// (`Config::verify_soft_budget_ms`), returning `Error::Timeout`
    /// if the deadline passes before the engine finishes.
    pub async fn verify_async_with_budget(
        self: Arc<Self>,
        user_id: String,
        probe: Trial,
        device: B::Device,
    ) -> Result<VerificationOutcome>
    where
        B: 'static,
    {
        let budget = Duration::from_millis(self.config.verify_soft_budget_ms);
        let deadline = Instant::now() + budget;
        tokio::task::spawn_blocking(move || self.verify_with_deadline(&user_id, &probe, &device, deadline))
            .await
            .map_err(|e| Error::Numeric(format!("verification task panicked: {e}")))?
    }
}

/// Build a fresh `PrototypeTable`-backed bundle placeholder useful for
/// tests and for `enroll`'s "first ever prototype" path.
pub fn empty_threshold() -> OperatingThreshold {
    OperatingThreshold {
        tau_decision: 0.5,
        criterion: crate::config::DecisionCriterion::EqualErrorRate,
    }
}

pub fn empty_prototype_table() -> PrototypeTable {
    PrototypeTable::default()
}

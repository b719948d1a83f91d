//! Batch orchestration: six concurrent variant generations, independent
//! settlement, and manual per-variant regeneration.
//!
//! Every spawned task reports its outcome as a `(variant id, result)`
//! message into an mpsc channel; a single consumer loop owns the
//! authoritative variant list and applies each settlement as a
//! whole-record update. Variants never share a key, so one variant's
//! failure or late arrival can never disturb a sibling.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::thumbnail::{GenerationError, VariantGenerator};
use super::types::{
    AspectRatio, BATCH_SIZE, GenerationProgress, ThumbnailVariant, UserChoices, VariantStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("no variant with id {0}")]
    UnknownVariant(u32),

    #[error("no batch has been started")]
    NoActiveBatch,
}

/// Outcome counts for a settled batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: u32,
    pub failed: u32,
}

struct Settlement {
    id: u32,
    outcome: Result<String, GenerationError>,
}

struct BatchState {
    photo: Option<Arc<str>>,
    choices: Option<Arc<UserChoices>>,
    variants: Vec<ThumbnailVariant>,
    progress: GenerationProgress,
}

/// Owns the variant collection for the current batch. UI-facing callers
/// only ever see cloned snapshots; all writes go through
/// [`apply_settlement`](Self::apply_settlement) one record at a time.
pub struct GenerationOrchestrator {
    generator: Arc<dyn VariantGenerator>,
    state: Mutex<BatchState>,
}

impl GenerationOrchestrator {
    pub fn new(generator: Arc<dyn VariantGenerator>) -> Self {
        Self {
            generator,
            state: Mutex::new(BatchState {
                photo: None,
                choices: None,
                variants: Vec::new(),
                progress: GenerationProgress::default(),
            }),
        }
    }

    /// Dispatch a full batch and wait until all six variants settle.
    ///
    /// Failures are first-class: an errored variant counts toward progress
    /// like a successful one, and the batch always runs to completion.
    /// Snapshots taken concurrently (e.g. by a progress indicator) observe
    /// intermediate per-variant states.
    pub async fn run_batch(&self, photo: impl Into<Arc<str>>, choices: UserChoices) -> BatchSummary {
        let photo: Arc<str> = photo.into();
        let choices = Arc::new(choices);
        let variants = batch_variants();

        {
            let mut state = self.state.lock().expect("orchestrator state poisoned");
            state.photo = Some(photo.clone());
            state.choices = Some(choices.clone());
            state.variants = variants.clone();
            state.progress = GenerationProgress {
                current: 0,
                total: BATCH_SIZE,
            };
        }

        info!(total = BATCH_SIZE, "starting thumbnail batch");

        let (tx, mut rx) = mpsc::channel::<Settlement>(BATCH_SIZE as usize);
        for variant in variants {
            let generator = self.generator.clone();
            let photo = photo.clone();
            let choices = choices.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = generator
                    .generate(&photo, &choices, variant.aspect_ratio)
                    .await;
                // Receiver gone means the batch owner stopped listening;
                // there is nothing left to update.
                let _ = tx
                    .send(Settlement {
                        id: variant.id,
                        outcome,
                    })
                    .await;
            });
        }
        drop(tx);

        // Settle-all: the loop ends only once every sender is done.
        while let Some(settlement) = rx.recv().await {
            self.apply_settlement(settlement, true);
        }

        let summary = self.summary();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch complete"
        );
        summary
    }

    /// Re-run one variant with the inputs held from the original batch.
    ///
    /// Only that variant transitions back through `Pending`; siblings and
    /// the batch progress counter are untouched.
    pub async fn regenerate(&self, id: u32) -> Result<ThumbnailVariant, OrchestratorError> {
        let (photo, choices, aspect_ratio) = {
            let mut state = self.state.lock().expect("orchestrator state poisoned");
            let photo = state.photo.clone().ok_or(OrchestratorError::NoActiveBatch)?;
            let choices = state
                .choices
                .clone()
                .ok_or(OrchestratorError::NoActiveBatch)?;
            let variant = state
                .variants
                .iter_mut()
                .find(|v| v.id == id)
                .ok_or(OrchestratorError::UnknownVariant(id))?;
            let aspect_ratio = variant.aspect_ratio;
            variant.status = VariantStatus::Pending;
            (photo, choices, aspect_ratio)
        };

        info!(id, ratio = aspect_ratio.as_str(), "regenerating variant");
        let outcome = self.generator.generate(&photo, &choices, aspect_ratio).await;
        self.apply_settlement(Settlement { id, outcome }, false);

        let state = self.state.lock().expect("orchestrator state poisoned");
        state
            .variants
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or(OrchestratorError::UnknownVariant(id))
    }

    /// Read-only snapshot of the variant collection.
    pub fn variants(&self) -> Vec<ThumbnailVariant> {
        self.state
            .lock()
            .expect("orchestrator state poisoned")
            .variants
            .clone()
    }

    /// Variants that settled successfully, in id order.
    pub fn successful(&self) -> Vec<ThumbnailVariant> {
        self.variants()
            .into_iter()
            .filter(|v| v.url().is_some())
            .collect()
    }

    pub fn progress(&self) -> GenerationProgress {
        self.state
            .lock()
            .expect("orchestrator state poisoned")
            .progress
    }

    fn summary(&self) -> BatchSummary {
        let state = self.state.lock().expect("orchestrator state poisoned");
        let succeeded = state
            .variants
            .iter()
            .filter(|v| v.url().is_some())
            .count() as u32;
        let failed = state
            .variants
            .iter()
            .filter(|v| v.error().is_some())
            .count() as u32;
        BatchSummary { succeeded, failed }
    }

    /// Replace exactly one variant record. `count_progress` is true only
    /// for settlements belonging to the original batch; regeneration is a
    /// post-batch action and leaves the counter alone.
    fn apply_settlement(&self, settlement: Settlement, count_progress: bool) {
        let mut state = self.state.lock().expect("orchestrator state poisoned");
        if let Some(variant) = state.variants.iter_mut().find(|v| v.id == settlement.id) {
            variant.status = match settlement.outcome {
                Ok(url) => {
                    info!(id = settlement.id, "variant generated");
                    VariantStatus::Done { url }
                }
                Err(err) => {
                    warn!(id = settlement.id, error = %err, "variant failed");
                    VariantStatus::Failed {
                        error: user_facing_error(&err),
                    }
                }
            };
        }
        if count_progress {
            state.progress.current += 1;
        }
    }
}

/// Three landscape variants (ids 1-3) followed by three portrait ones
/// (ids 4-6); the assignment is fixed for the lifetime of the batch.
fn batch_variants() -> Vec<ThumbnailVariant> {
    (1..=3)
        .map(|id| ThumbnailVariant::pending(id, AspectRatio::Landscape))
        .chain((4..=6).map(|id| ThumbnailVariant::pending(id, AspectRatio::Portrait)))
        .collect()
}

/// Quota exhaustion is common enough to deserve a plain-language message;
/// everything else surfaces as-is for manual retry.
fn user_facing_error(err: &GenerationError) -> String {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("quota")
        || lowered.contains("resource_exhausted")
        || message.contains("429")
    {
        format!(
            "API quota exceeded for {} generation. Wait a moment and regenerate this variant.",
            err.aspect_ratio
        )
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;

    /// Succeeds or fails per call depending on `fail_calls`, returning a
    /// unique URL each time so regeneration results are distinguishable.
    struct StubGenerator {
        calls: AtomicU32,
        fail_calls: Vec<u32>,
        error_text: &'static str,
    }

    impl StubGenerator {
        fn new(fail_calls: Vec<u32>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_calls,
                error_text: "API request failed with status 500",
            }
        }
    }

    #[async_trait]
    impl VariantGenerator for StubGenerator {
        async fn generate(
            &self,
            _photo: &str,
            _choices: &UserChoices,
            aspect_ratio: AspectRatio,
        ) -> Result<String, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_calls.contains(&call) {
                Err(GenerationError {
                    aspect_ratio,
                    cause: self.error_text.into(),
                })
            } else {
                Ok(format!("data:image/jpeg;base64,stub{call}"))
            }
        }
    }

    fn choices() -> UserChoices {
        UserChoices {
            video_type: "Vlog".into(),
            style_mood: "Fun".into(),
            photo_placement: "Center".into(),
            prompt: "sunday market haul".into(),
        }
    }

    fn orchestrator(fail_calls: Vec<u32>) -> GenerationOrchestrator {
        GenerationOrchestrator::new(Arc::new(StubGenerator::new(fail_calls)))
    }

    #[tokio::test]
    async fn batch_assigns_three_of_each_ratio() {
        let orchestrator = orchestrator(vec![]);
        orchestrator.run_batch("data:image/jpeg;base64,AAAA", choices()).await;

        let variants = orchestrator.variants();
        assert_eq!(variants.len(), 6);
        let landscape = variants
            .iter()
            .filter(|v| v.aspect_ratio == AspectRatio::Landscape)
            .count();
        assert_eq!(landscape, 3);
        assert_eq!(variants.iter().map(|v| v.id).collect::<Vec<_>>(), vec![
            1, 2, 3, 4, 5, 6
        ]);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_variant() {
        let orchestrator = orchestrator(vec![2, 5]);
        let summary = orchestrator
            .run_batch("data:image/jpeg;base64,AAAA", choices())
            .await;

        assert_eq!(summary, BatchSummary { succeeded: 4, failed: 2 });
        let variants = orchestrator.variants();
        assert_eq!(variants.iter().filter(|v| v.url().is_some()).count(), 4);
        assert_eq!(variants.iter().filter(|v| v.error().is_some()).count(), 2);

        let progress = orchestrator.progress();
        assert_eq!(progress.current, 6);
        assert_eq!(progress.total, 6);
        assert!(progress.is_complete());
    }

    #[tokio::test]
    async fn every_settled_variant_has_exactly_one_payload() {
        let orchestrator = orchestrator(vec![1, 3, 6]);
        orchestrator.run_batch("data:image/jpeg;base64,AAAA", choices()).await;

        for variant in orchestrator.variants() {
            assert!(variant.is_settled());
            assert_ne!(variant.url().is_some(), variant.error().is_some());
        }
    }

    #[tokio::test]
    async fn regeneration_leaves_siblings_untouched() {
        let orchestrator = orchestrator(vec![3]);
        orchestrator.run_batch("data:image/jpeg;base64,AAAA", choices()).await;
        let before = orchestrator.variants();

        let regenerated = orchestrator.regenerate(3).await.unwrap();
        assert_eq!(regenerated.id, 3);

        let after = orchestrator.variants();
        for (prev, next) in before.iter().zip(after.iter()) {
            if prev.id == 3 {
                continue;
            }
            assert_eq!(prev, next);
        }
        // Progress is a batch-scoped counter; regeneration never reopens it.
        assert_eq!(orchestrator.progress(), GenerationProgress {
            current: 6,
            total: 6
        });
    }

    #[tokio::test]
    async fn regeneration_can_flip_a_failed_variant_to_done() {
        // Exactly one failure somewhere in the batch.
        let orchestrator = orchestrator(vec![4]);
        orchestrator.run_batch("data:image/jpeg;base64,AAAA", choices()).await;

        let failed_id = orchestrator
            .variants()
            .iter()
            .find(|v| v.error().is_some())
            .map(|v| v.id)
            .unwrap();

        let regenerated = orchestrator.regenerate(failed_id).await.unwrap();
        assert!(regenerated.url().is_some());
        assert!(regenerated.error().is_none());
    }

    #[tokio::test]
    async fn regenerate_rejects_unknown_ids_and_missing_batches() {
        let fresh = orchestrator(vec![]);
        assert!(matches!(
            fresh.regenerate(1).await,
            Err(OrchestratorError::NoActiveBatch)
        ));

        fresh.run_batch("data:image/jpeg;base64,AAAA", choices()).await;
        assert!(matches!(
            fresh.regenerate(42).await,
            Err(OrchestratorError::UnknownVariant(42))
        ));
    }

    #[tokio::test]
    async fn quota_errors_get_a_distinguished_message() {
        struct QuotaGenerator;

        #[async_trait]
        impl VariantGenerator for QuotaGenerator {
            async fn generate(
                &self,
                _photo: &str,
                _choices: &UserChoices,
                aspect_ratio: AspectRatio,
            ) -> Result<String, GenerationError> {
                Err(GenerationError {
                    aspect_ratio,
                    cause: "API request failed with status 429".into(),
                })
            }
        }

        let orchestrator = GenerationOrchestrator::new(Arc::new(QuotaGenerator));
        orchestrator.run_batch("data:image/jpeg;base64,AAAA", choices()).await;

        for variant in orchestrator.variants() {
            let error = variant.error().unwrap();
            assert!(error.contains("quota exceeded"), "got: {error}");
        }
    }
}

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tourdesk_core::query::{Predicate, QueryDescriptor};
use tourdesk_core::schema::number_value;
use tourdesk_core::{Aggregate, AppError, Document, DocumentId, DocumentStore};
use tracing::{debug, error, info, instrument, warn};

use super::locks::ParentLocks;
use crate::metrics::track_rating_recompute;
use crate::modules::resources::{MutationEvent, MutationObserver};

pub const PARENT_COLLECTION: &str = "tours";
pub const CHILD_COLLECTION: &str = "reviews";
pub const PARENT_FIELD: &str = "tour";
pub const RATING_FIELD: &str = "rating";
pub const QUANTITY_FIELD: &str = "ratingsQuantity";
pub const AVERAGE_FIELD: &str = "ratingsAverage";

/// Average shown for a tour without reviews.
pub const NEUTRAL_RATING: f64 = 4.2;

/// `(ratingsQuantity, ratingsAverage)` for an aggregate over a tour's reviews.
pub fn summarize(aggregate: Aggregate) -> (u64, f64) {
    match aggregate.mean {
        Some(mean) if aggregate.count > 0 => (aggregate.count, (mean * 10.0).round() / 10.0),
        _ => (0, NEUTRAL_RATING),
    }
}

/// Tours whose summary a review mutation may have changed.
pub fn affected_parents(event: &MutationEvent) -> Vec<DocumentId> {
    match event {
        MutationEvent::Created { after } => after.reference(PARENT_FIELD).into_iter().collect(),
        MutationEvent::Deleted { before } => before.reference(PARENT_FIELD).into_iter().collect(),
        MutationEvent::Updated { before, after } => {
            let (old, new) = (before.reference(PARENT_FIELD), after.reference(PARENT_FIELD));
            if old == new && before.fields.get(RATING_FIELD) == after.fields.get(RATING_FIELD) {
                return Vec::new();
            }

            let mut parents: Vec<DocumentId> = old.into_iter().collect();
            parents.extend(new.filter(|n| Some(*n) != old));
            parents
        }
    }
}

/// Keeps each tour's `ratingsQuantity`/`ratingsAverage` equal to the
/// aggregate over its reviews.
///
/// Recomputes for the same tour are serialized through a per-tour lock, so
/// the last write always reflects every review committed before it started.
pub struct RatingsMaintainer {
    store: Arc<dyn DocumentStore>,
    locks: ParentLocks,
}

impl RatingsMaintainer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            locks: ParentLocks::new(),
        }
    }

    #[instrument(skip(self))]
    pub async fn recompute(&self, tour_id: DocumentId) -> Result<(), AppError> {
        let _guard = self.locks.acquire(tour_id).await;

        let aggregate = self
            .store
            .aggregate(
                CHILD_COLLECTION,
                &[Predicate::eq(PARENT_FIELD, tour_id.to_value())],
                RATING_FIELD,
            )
            .await?;
        let (quantity, average) = summarize(aggregate);

        let mut patch = Map::new();
        patch.insert(QUANTITY_FIELD.to_string(), Value::from(quantity));
        patch.insert(AVERAGE_FIELD.to_string(), number_value(average));

        match self
            .store
            .update_by_id(PARENT_COLLECTION, tour_id, patch)
            .await?
        {
            Some(_) => {
                debug!(%tour_id, quantity, average, "rating summary updated");
                track_rating_recompute("updated");
            }
            None => {
                warn!(%tour_id, "rated tour no longer exists, skipping summary");
                track_rating_recompute("missing_parent");
            }
        }

        Ok(())
    }

    /// Recomputes every tour's summary. Returns how many tours were visited.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<usize, AppError> {
        let tours: Vec<Document> = self
            .store
            .find(PARENT_COLLECTION, &QueryDescriptor::unbounded(Vec::new()))
            .await?;

        for tour in &tours {
            self.recompute(tour.id).await?;
        }

        info!(tours = tours.len(), "rating summaries reconciled");
        Ok(tours.len())
    }

    /// Runs [`reconcile_all`](Self::reconcile_all) every `interval`. Failures
    /// are logged and the sweep keeps going.
    pub fn spawn_sweep(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = self.reconcile_all().await {
                    error!(error = %err.message, "rating reconciliation sweep failed");
                }
            }
        })
    }
}

#[async_trait]
impl MutationObserver for RatingsMaintainer {
    async fn on_mutation(&self, event: &MutationEvent) -> Result<(), AppError> {
        for tour_id in affected_parents(event) {
            self.recompute(tour_id).await?;
        }
        Ok(())
    }
}

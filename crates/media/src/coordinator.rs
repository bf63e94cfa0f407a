//! Resolution coordinator: concurrent, isolated, order-preserving.

use std::{sync::Arc, time::Duration};

use {
    futures::future::join_all,
    scrapbook_config::ExtractionConfig,
    tokio::{
        sync::Semaphore,
        time::{Instant, sleep_until, timeout_at},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    extractors::Extractor,
    types::{ExtractionOutcome, FailureReason, OutcomeStatus, Reference},
};

/// Fans references out to the extractor set and collects one outcome per
/// reference, in input order.
pub struct Coordinator {
    extractor: Arc<dyn Extractor>,
    max_in_flight: usize,
    reference_timeout: Duration,
    request_timeout: Duration,
}

impl Coordinator {
    pub fn new(extractor: Arc<dyn Extractor>, config: &ExtractionConfig) -> Self {
        Self::with_limits(
            extractor,
            config.max_in_flight,
            Duration::from_millis(config.reference_timeout_ms),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn with_limits(
        extractor: Arc<dyn Extractor>,
        max_in_flight: usize,
        reference_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            max_in_flight: max_in_flight.max(1),
            reference_timeout,
            request_timeout,
        }
    }

    pub async fn resolve(&self, references: Vec<Reference>) -> Vec<ExtractionOutcome> {
        self.resolve_with_cancel(references, CancellationToken::new())
            .await
    }

    /// Resolve every reference. Cancelling `cancel` (or reaching the
    /// request deadline) turns still-pending references into
    /// `Failed{cancelled}`; finished outcomes are kept.
    pub async fn resolve_with_cancel(
        &self,
        references: Vec<Reference>,
        cancel: CancellationToken,
    ) -> Vec<ExtractionOutcome> {
        if references.is_empty() {
            return Vec::new();
        }

        let started = Instant::now();
        let request_deadline = started + self.request_timeout;
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let token = cancel.child_token();
        let _guard = token.clone().drop_guard();

        let total = references.len();
        let handles: Vec<_> = references
            .into_iter()
            .map(|reference| {
                let task = tokio::spawn(resolve_one(
                    Arc::clone(&self.extractor),
                    Arc::clone(&semaphore),
                    token.clone(),
                    reference.clone(),
                    self.reference_timeout,
                    request_deadline,
                ));
                (reference, task)
            })
            .collect();

        let outcomes: Vec<ExtractionOutcome> =
            join_all(handles.into_iter().map(|(reference, task)| async move {
                match task.await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(url = %reference.source_url, error = %err, "extractor task aborted");
                        ExtractionOutcome::failed(reference, FailureReason::FetchError)
                    },
                }
            }))
            .await;

        let count = |status| outcomes.iter().filter(|o| o.status == status).count();
        info!(
            references = total,
            resolved = count(OutcomeStatus::Resolved),
            unsupported = count(OutcomeStatus::Unsupported),
            failed = count(OutcomeStatus::Failed),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "references resolved"
        );
        outcomes
    }
}

async fn resolve_one(
    extractor: Arc<dyn Extractor>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    reference: Reference,
    reference_timeout: Duration,
    request_deadline: Instant,
) -> ExtractionOutcome {
    let fallback = reference.clone();
    let work = async move {
        let Ok(_permit) = semaphore.acquire_owned().await else {
            return ExtractionOutcome::failed(reference, FailureReason::Cancelled);
        };
        // The reference clock starts once it holds a slot.
        let deadline = (Instant::now() + reference_timeout).min(request_deadline);
        match timeout_at(deadline, extractor.resolve(&reference, deadline)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(url = %reference.source_url, "reference deadline elapsed");
                ExtractionOutcome::failed(reference, FailureReason::Timeout)
            },
        }
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => ExtractionOutcome::failed(fallback, FailureReason::Cancelled),
        () = sleep_until(request_deadline) => {
            debug!(url = %fallback.source_url, "request deadline elapsed");
            ExtractionOutcome::failed(fallback, FailureReason::Cancelled)
        },
        outcome = work => outcome,
    }
}

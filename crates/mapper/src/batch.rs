use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crosswalk_catalog::Catalog;

use crate::aggregate::{aggregate, AggregatedControl};
use crate::error::Result;
use crate::mapping::{loaded_catalog, Mapper};
use crate::types::MappingResult;

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItemOutcome {
    pub index: usize,
    pub result: Result<MappingResult>,
}

/// Maps every item, up to `concurrency` at a time. Outcomes come back in input
/// order whatever the completion order, and a failing item never stops the rest.
pub fn map_batch(
    mapper: &Mapper<'_>,
    items: &[String],
    top_k: usize,
    persona: Option<&str>,
    concurrency: usize,
) -> Result<Vec<BatchItemOutcome>> {
    loaded_catalog(mapper.store())?;
    let run = |index: usize, text: &String| BatchItemOutcome {
        index,
        result: mapper.map(text, top_k, persona),
    };

    let workers = concurrency.max(1);
    let outcomes = if workers == 1 || items.len() <= 1 {
        items.iter().enumerate().map(|(i, t)| run(i, t)).collect()
    } else {
        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| {
                items
                    .par_iter()
                    .enumerate()
                    .map(|(i, t)| run(i, t))
                    .collect::<Vec<_>>()
            }),
            Err(err) => {
                warn!("worker pool unavailable, mapping sequentially: {err}");
                items.iter().enumerate().map(|(i, t)| run(i, t)).collect()
            }
        }
    };
    Ok(outcomes)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub items_total: usize,
    pub items_succeeded: usize,
    pub failed: Vec<BatchFailure>,
    pub controls: Vec<AggregatedControl>,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: &[BatchItemOutcome], catalog: &Catalog) -> Self {
        let mut failed = Vec::new();
        let mut succeeded = Vec::new();
        for outcome in outcomes {
            match &outcome.result {
                Ok(result) => succeeded.push((outcome.index, result)),
                Err(err) => {
                    warn!(index = outcome.index, "batch item failed: {err}");
                    failed.push(BatchFailure {
                        index: outcome.index,
                        error: err.to_string(),
                    });
                }
            }
        }
        failed.sort_by_key(|failure| failure.index);
        let items_succeeded = succeeded.len();
        let controls = aggregate(succeeded, catalog);
        info!(
            items = outcomes.len(),
            succeeded = items_succeeded,
            failed = failed.len(),
            controls = controls.len(),
            "batch aggregated"
        );
        Self {
            generated_at: Utc::now(),
            items_total: outcomes.len(),
            items_succeeded,
            failed,
            controls,
        }
    }

    pub fn all_failed(&self) -> bool {
        self.items_total > 0 && self.items_succeeded == 0
    }
}

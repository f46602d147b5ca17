//! The validate → normalize → persist pipeline every producer goes through.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::clock::Clock;
use crate::paths::{self, PathError};
use crate::store::{ReviewStore, StoreError};
use crate::types::{normalize_importance, Review};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("workingDirectory is required")]
    MissingWorkingDirectory,
    #[error("invalid workingDirectory: {0}")]
    InvalidWorkingDirectory(#[source] PathError),
    #[error(
        "hunk {file}:{start_line} in section {section:?} has invalid importance {value:?} \
         (expected high, medium or low)"
    )]
    InvalidHunkImportance { section: String, file: String, start_line: u32, value: String },
    #[error("duplicate section id {0:?}")]
    DuplicateSectionId(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Whether the producer can fix this by changing its payload.
    pub fn is_producer_error(&self) -> bool {
        !matches!(self, IngestError::Store(_))
    }
}

/// How strictly hunk importance is checked. Section ids must be unique
/// under either mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// MCP and generator paths: every importance must normalize to the
    /// canonical set.
    Strict,
    /// HTTP path: recognized aliases are canonicalized, anything else
    /// (including empty) is stored as given.
    Lenient,
}

/// Result of a successful submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResult {
    pub file_path: PathBuf,
}

/// Shared ingest service. Cheap to clone.
#[derive(Clone)]
pub struct IngestService {
    store: ReviewStore,
    clock: Arc<dyn Clock>,
}

impl IngestService {
    pub fn new(store: ReviewStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &ReviewStore {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Validates, normalizes and persists `review`.
    ///
    /// In order: rejects an empty working directory, canonicalizes it, stamps
    /// `createdAt` when absent or zero, rejects duplicate section ids, checks
    /// importance (per `validation`), then writes atomically through the store.
    ///
    /// # Errors
    ///
    /// Producer-correctable kinds are returned verbatim; store failures are
    /// wrapped unchanged in [`IngestError::Store`].
    pub async fn submit(
        &self,
        mut review: Review,
        validation: Validation,
    ) -> Result<SubmitResult, IngestError> {
        if review.working_directory.is_empty() {
            return Err(IngestError::MissingWorkingDirectory);
        }
        review.working_directory = paths::canonicalize(&review.working_directory)
            .map_err(IngestError::InvalidWorkingDirectory)?;

        if review.created_at.is_none_or(is_zero_time) {
            review.created_at = Some(self.clock.now());
        }

        normalize(&mut review, validation)?;

        let file_path = self.store.write(&review).await?;
        info!(
            dir = %review.working_directory,
            path = %file_path.display(),
            sections = review.sections.len(),
            hunks = review.hunk_count(),
            "review ingested"
        );
        Ok(SubmitResult { file_path })
    }
}

/// Zero-valued timestamps some producers emit instead of omitting the field:
/// `0001-01-01T00:00:00Z` and the Unix epoch, or anything before it.
fn is_zero_time(t: DateTime<Utc>) -> bool {
    t.timestamp() <= 0
}

fn normalize(review: &mut Review, validation: Validation) -> Result<(), IngestError> {
    let mut section_ids = HashSet::new();
    for section in &mut review.sections {
        if !section_ids.insert(section.id.clone()) {
            return Err(IngestError::DuplicateSectionId(section.id.clone()));
        }
        for hunk in &mut section.hunks {
            let canonical = normalize_importance(&hunk.importance);
            match (canonical.is_empty(), validation) {
                (false, _) => hunk.importance = canonical.to_owned(),
                (true, Validation::Lenient) => {}
                (true, Validation::Strict) => {
                    return Err(IngestError::InvalidHunkImportance {
                        section: section.id.clone(),
                        file: hunk.file.clone(),
                        start_line: hunk.start_line,
                        value: hunk.importance.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

//! LLM review generation.
//!
//! One generation runs the stages diff → parse → prompt → LLM → extract →
//! validate → write on the caller's task, publishing each stage on a
//! [`watch`] channel. A classification that fails validation is not an
//! error: it comes back as [`GenerationOutcome::NeedsRetry`] so the caller
//! can retry with an augmented prompt, proceed with the hunks that were
//! classified, or give up.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classify::{self, ClassificationReport};
use crate::extract::{self, ExtractError};
use crate::hunks::parse_hunks;
use crate::ingest::{IngestError, IngestService, SubmitResult, Validation};
use crate::paths::{self, PathError};
use crate::process::{DiffSource, LlmSource, ProcessError};
use crate::prompt;
use crate::types::{Importance, LlmResponse, ParsedHunk, Review, Section};

/// Id of the synthetic section that collects hunks the LLM left out.
pub const UNCLASSIFIED_SECTION_ID: &str = "unclassified";
/// Narrative of the synthetic section.
pub const UNCLASSIFIED_NARRATIVE: &str = "Hunks not classified by the LLM";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("no changes to review")]
    NoChanges,
    #[error("invalid working directory: {0}")]
    InvalidWorkingDirectory(#[source] PathError),
    #[error(transparent)]
    Subprocess(ProcessError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("classification has duplicate or invalid hunks; partial review not allowed")]
    PartialNotAllowed,
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("generation cancelled")]
    Cancelled,
}

impl From<ProcessError> for GenerateError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Cancelled => GenerateError::Cancelled,
            other => GenerateError::Subprocess(other),
        }
    }
}

/// Stage of the current (or last) generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Diffing,
    Parsing,
    Prompting,
    AwaitingLlm,
    Extracting,
    Validating,
    Writing,
    NeedsRetry,
    Error,
    Cancelled,
}

impl GenerationState {
    /// Whether a generation is in flight.
    pub fn is_running(self) -> bool {
        !matches!(
            self,
            GenerationState::Idle
                | GenerationState::NeedsRetry
                | GenerationState::Error
                | GenerationState::Cancelled
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            GenerationState::Idle => "idle",
            GenerationState::Diffing => "diffing",
            GenerationState::Parsing => "parsing",
            GenerationState::Prompting => "prompting",
            GenerationState::AwaitingLlm => "awaiting LLM",
            GenerationState::Extracting => "extracting",
            GenerationState::Validating => "validating",
            GenerationState::Writing => "writing",
            GenerationState::NeedsRetry => "needs retry",
            GenerationState::Error => "error",
            GenerationState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything a retry or a partial proceed needs from a failed validation.
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub diff: String,
    pub parsed: Vec<ParsedHunk>,
    pub response: LlmResponse,
    pub report: ClassificationReport,
}

#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Written(SubmitResult),
    NeedsRetry(Box<RetryContext>),
}

/// Runs generations for one working directory. Cheap to clone.
#[derive(Clone)]
pub struct Generator {
    dir: PathBuf,
    diff: Arc<dyn DiffSource>,
    llm: Arc<dyn LlmSource>,
    ingest: IngestService,
    state: Arc<watch::Sender<GenerationState>>,
}

impl Generator {
    /// Creates a generator for `dir`, which is canonicalized once here.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::InvalidWorkingDirectory`] when `dir` cannot
    /// be canonicalized.
    pub fn new(
        dir: &str,
        diff: Arc<dyn DiffSource>,
        llm: Arc<dyn LlmSource>,
        ingest: IngestService,
    ) -> Result<Self, GenerateError> {
        let dir = paths::canonicalize(dir).map_err(GenerateError::InvalidWorkingDirectory)?;
        let (state, _) = watch::channel(GenerationState::Idle);
        Ok(Self { dir: PathBuf::from(dir), diff, llm, ingest, state: Arc::new(state) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Subscribes to stage changes.
    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> GenerationState {
        *self.state.borrow()
    }

    /// Runs a full generation.
    ///
    /// # Errors
    ///
    /// [`GenerateError::NoChanges`] for an empty diff,
    /// [`GenerateError::Cancelled`] when `cancel` fires while a subprocess
    /// runs, and the stage error otherwise.
    pub async fn generate(&self, cancel: &CancellationToken) -> Result<GenerationOutcome, GenerateError> {
        let span = info_span!("generation", id = %Uuid::new_v4(), dir = %self.dir.display());
        let result = async {
            self.set(GenerationState::Diffing);
            let diff = self.diff.diff(&self.dir, cancel).await?;
            if diff.trim().is_empty() {
                return Err(GenerateError::NoChanges);
            }

            self.set(GenerationState::Parsing);
            let parsed = parse_hunks(&diff);
            if parsed.is_empty() {
                return Err(GenerateError::NoChanges);
            }
            info!(bytes = diff.len(), hunks = parsed.len(), "diff parsed");

            self.set(GenerationState::Prompting);
            let prompt = prompt::build_prompt(&diff, &parsed);
            self.classify(diff, parsed, prompt, cancel).await
        }
        .instrument(span)
        .await;
        self.settle(result)
    }

    /// Asks the LLM again with a prompt naming what went wrong last time.
    ///
    /// # Errors
    ///
    /// As [`generate`](Self::generate), minus the diff stage.
    pub async fn retry(
        &self,
        ctx: RetryContext,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, GenerateError> {
        let span = info_span!("generation", id = %Uuid::new_v4(), dir = %self.dir.display(), retry = true);
        let result = async move {
            self.set(GenerationState::Prompting);
            let prompt = prompt::build_retry_prompt(&ctx.diff, &ctx.parsed, &ctx.report);
            self.classify(ctx.diff, ctx.parsed, prompt, cancel).await
        }
        .instrument(span)
        .await;
        self.settle(result)
    }

    /// Writes the classified hunks plus a trailing section holding every
    /// hunk the LLM left out, at medium importance.
    ///
    /// # Errors
    ///
    /// [`GenerateError::PartialNotAllowed`] when the report has duplicates or
    /// invalid importance; ingest errors otherwise.
    pub async fn proceed_partial(&self, ctx: RetryContext) -> Result<SubmitResult, GenerateError> {
        let result = async {
            if !ctx.report.allows_partial() {
                return Err(GenerateError::PartialNotAllowed);
            }
            self.set(GenerationState::Writing);
            let mut review = self.assemble(&ctx.response, &ctx.parsed);

            let missing: HashSet<&str> = ctx.report.missing_ids.iter().map(String::as_str).collect();
            let hunks = ctx
                .parsed
                .iter()
                .filter(|h| missing.contains(h.id.as_str()))
                .map(|h| h.to_hunk(Importance::Medium))
                .collect::<Vec<_>>();
            if !hunks.is_empty() {
                let mut taken: HashSet<String> = review.sections.iter().map(|s| s.id.clone()).collect();
                review.sections.push(Section {
                    id: unique_id(&mut taken, UNCLASSIFIED_SECTION_ID),
                    narrative: UNCLASSIFIED_NARRATIVE.to_owned(),
                    hunks,
                    chapter_id: None,
                });
            }
            warn!(missing = ctx.report.missing_ids.len(), "writing partial classification");
            Ok(self.ingest.submit(review, Validation::Strict).await?)
        }
        .await;
        self.settle(result)
    }

    /// Gives up on a pending retry; the generation ends as cancelled.
    pub fn abandon(&self) {
        if self.state() == GenerationState::NeedsRetry {
            info!(dir = %self.dir.display(), "retry abandoned");
            self.set(GenerationState::Cancelled);
        }
    }

    /// Prompt → LLM → extract → validate → write.
    async fn classify(
        &self,
        diff: String,
        parsed: Vec<ParsedHunk>,
        prompt: String,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, GenerateError> {
        if cancel.is_cancelled() {
            return Err(GenerateError::Cancelled);
        }
        self.set(GenerationState::AwaitingLlm);
        let output = self.llm.complete(&self.dir, &prompt, cancel).await?;
        debug!(bytes = output.len(), "LLM responded");

        self.set(GenerationState::Extracting);
        let response = extract::extract_response(&output)?;

        self.set(GenerationState::Validating);
        let report = classify::validate(&parsed, &response);
        if !report.valid {
            warn!(
                missing = ?report.missing_ids,
                duplicate = ?report.duplicate_ids,
                invalid = ?report.invalid_importance,
                "classification failed validation"
            );
            self.set(GenerationState::NeedsRetry);
            return Ok(GenerationOutcome::NeedsRetry(Box::new(RetryContext {
                diff,
                parsed,
                response,
                report,
            })));
        }

        if cancel.is_cancelled() {
            return Err(GenerateError::Cancelled);
        }
        self.set(GenerationState::Writing);
        let review = self.assemble(&response, &parsed);
        let written = self.ingest.submit(review, Validation::Strict).await?;
        info!(path = %written.file_path.display(), "generated review written");
        Ok(GenerationOutcome::Written(written))
    }

    /// Replaces every hunk reference with the parsed hunk it names.
    ///
    /// References to unknown ids are skipped. Colliding section ids get a
    /// `#N` suffix so the review passes strict ingest.
    fn assemble(&self, response: &LlmResponse, parsed: &[ParsedHunk]) -> Review {
        let by_id: HashMap<&str, &ParsedHunk> = parsed.iter().map(|h| (h.id.as_str(), h)).collect();
        let mut taken = HashSet::new();

        let sections = response
            .sections
            .iter()
            .map(|section| {
                let hunks = section
                    .hunks
                    .iter()
                    .filter_map(|r| match by_id.get(r.id.as_str()) {
                        Some(hunk) => {
                            Some(hunk.to_hunk(Importance::parse(&r.importance).unwrap_or(Importance::Medium)))
                        }
                        None => {
                            warn!(id = %r.id, section = %section.id, "skipping reference to unknown hunk");
                            None
                        }
                    })
                    .collect();
                let base = if section.id.is_empty() { "section" } else { section.id.as_str() };
                Section {
                    id: unique_id(&mut taken, base),
                    narrative: section.narrative.clone(),
                    hunks,
                    chapter_id: section.chapter_id.clone(),
                }
            })
            .collect();

        Review {
            working_directory: self.dir.to_string_lossy().into_owned(),
            title: response.title.clone(),
            created_at: Some(self.ingest.clock().now()),
            sections,
        }
    }

    fn set(&self, state: GenerationState) {
        debug!(state = %state, "generation stage");
        self.state.send_replace(state);
    }

    /// Publishes the terminal state of a failed run.
    fn settle<T>(&self, result: Result<T, GenerateError>) -> Result<T, GenerateError> {
        match &result {
            Err(GenerateError::Cancelled) => self.set(GenerationState::Cancelled),
            Err(e) => {
                warn!(error = %e, "generation failed");
                self.set(GenerationState::Error);
            }
            Ok(_) => {}
        }
        result
    }
}

/// Returns `base`, or `base#2`, `base#3`, … whichever is free, and marks it taken.
fn unique_id(taken: &mut HashSet<String>, base: &str) -> String {
    let mut candidate = base.to_owned();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{base}#{n}");
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

//! Generator pipeline with scripted diff and LLM producers.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hunkwise_core::clock::FixedClock;
use hunkwise_core::generator::{
    GenerateError, GenerationOutcome, GenerationState, Generator, UNCLASSIFIED_NARRATIVE,
    UNCLASSIFIED_SECTION_ID,
};
use hunkwise_core::ingest::IngestService;
use hunkwise_core::process::{DiffSource, LlmSource, ProcessError};
use hunkwise_core::store::ReviewStore;
use tokio_util::sync::CancellationToken;

const DIFF: &str = "\
diff --git a/src/a.rs b/src/a.rs
--- a/src/a.rs
+++ b/src/a.rs
@@ -1,2 +1,3 @@
 fn a() {}
+fn b() {}
@@ -10,2 +11,3 @@
 fn c() {}
+fn d() { println!(\"{}\", 1); }
diff --git a/README.md b/README.md
--- a/README.md
+++ b/README.md
@@ -3 +3 @@
-old
+new
";

struct FixedDiff(&'static str);

#[async_trait]
impl DiffSource for FixedDiff {
    async fn diff(&self, _dir: &Path, _cancel: &CancellationToken) -> Result<String, ProcessError> {
        Ok(self.0.to_owned())
    }
}

/// Replies with the queued outputs in order and records every prompt.
struct ScriptedLlm {
    replies: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().rev().map(|s| (*s).to_owned()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmSource for ScriptedLlm {
    async fn complete(
        &self,
        _dir: &Path,
        prompt: &str,
        _cancel: &CancellationToken,
    ) -> Result<String, ProcessError> {
        self.prompts.lock().unwrap().push(prompt.to_owned());
        Ok(self.replies.lock().unwrap().pop().unwrap_or_default())
    }
}

/// Never answers until cancelled.
struct HangingLlm;

#[async_trait]
impl LlmSource for HangingLlm {
    async fn complete(
        &self,
        _dir: &Path,
        _prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProcessError> {
        cancel.cancelled().await;
        Err(ProcessError::Cancelled)
    }
}

fn generator(
    store_dir: &Path,
    work: &Path,
    diff: &'static str,
    llm: Arc<dyn LlmSource>,
) -> Generator {
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 5, 4, 3, 2, 1).unwrap());
    let ingest = IngestService::new(ReviewStore::new(store_dir), Arc::new(clock));
    Generator::new(work.to_str().unwrap(), Arc::new(FixedDiff(diff)), llm, ingest).unwrap()
}

const COMPLETE: &str = r#"Sure! Here is the review:
```json
{
  "title": "Add helpers",
  "sections": [
    {"id": "docs", "narrative": "Docs first.", "hunks": [{"id": "README.md::3", "importance": "minor"}]},
    {"id": "code", "narrative": "Then code with {braces}.", "hunks": [
      {"id": "src/a.rs::1", "importance": "high"},
      {"id": "src/a.rs::11", "importance": "medium"}
    ]}
  ]
}
```"#;

const MISSING: &str = r#"{"title": "Partial", "sections": [
  {"id": "code", "narrative": "Only one.", "hunks": [{"id": "src/a.rs::1", "importance": "low"}]}
]}"#;

const DUPLICATE: &str = r#"{"title": "Dup", "sections": [
  {"id": "a", "narrative": "", "hunks": [{"id": "src/a.rs::1", "importance": "low"}, {"id": "src/a.rs::11", "importance": "low"}]},
  {"id": "b", "narrative": "", "hunks": [{"id": "src/a.rs::1", "importance": "low"}, {"id": "README.md::3", "importance": "low"}]}
]}"#;

#[tokio::test]
async fn complete_classification_is_written() {
    let store_dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let llm = ScriptedLlm::new(&[COMPLETE]);
    let generator = generator(store_dir.path(), work.path(), DIFF, llm.clone());
    let mut states = generator.subscribe();

    let outcome = generator.generate(&CancellationToken::new()).await.unwrap();
    let GenerationOutcome::Written(written) = outcome else { panic!("expected a written review") };
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), GenerationState::Writing);

    let review = ReviewStore::new(store_dir.path())
        .read(work.path().to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(review.title, "Add helpers");
    assert_eq!(review.working_directory, generator.dir().to_str().unwrap());
    assert_eq!(review.created_at, Some(Utc.with_ymd_and_hms(2026, 5, 4, 3, 2, 1).unwrap()));
    let ids: Vec<&str> = review.sections.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["docs", "code"], "narrative order is kept");

    let docs = &review.sections[0].hunks[0];
    assert_eq!(docs.file, "README.md");
    assert_eq!(docs.diff, "@@ -3 +3 @@\n-old\n+new");
    assert_eq!(docs.importance, "low");
    let second = &review.sections[1].hunks[1];
    assert_eq!(second.start_line, 11);
    assert_eq!(second.diff, "@@ -10,2 +11,3 @@\n fn c() {}\n+fn d() { println!(\"{}\", 1); }");
    assert_eq!(review.hunk_count(), 3);
    assert!(written.file_path.exists());

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("- src/a.rs::11"));
    assert!(prompts[0].contains(DIFF));
}

#[tokio::test]
async fn missing_hunks_need_retry_then_proceed_partial() {
    let store_dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let generator =
        generator(store_dir.path(), work.path(), DIFF, ScriptedLlm::new(&[MISSING]));

    let outcome = generator.generate(&CancellationToken::new()).await.unwrap();
    let GenerationOutcome::NeedsRetry(ctx) = outcome else { panic!("expected NeedsRetry") };
    assert_eq!(generator.state(), GenerationState::NeedsRetry);
    assert!(!ctx.report.valid);
    assert_eq!(ctx.report.missing_ids, ["src/a.rs::11", "README.md::3"]);
    assert!(ctx.report.allows_partial());
    assert_eq!(ctx.parsed.len(), 3);
    assert!(
        std::fs::read_dir(store_dir.path()).map(|d| d.count()).unwrap_or(0) == 0,
        "nothing written before the user decides"
    );

    generator.proceed_partial(*ctx).await.unwrap();
    let review = ReviewStore::new(store_dir.path())
        .read(work.path().to_str().unwrap())
        .await
        .unwrap();
    let last = review.sections.last().unwrap();
    assert_eq!(last.id, UNCLASSIFIED_SECTION_ID);
    assert_eq!(last.narrative, UNCLASSIFIED_NARRATIVE);
    assert_eq!(last.hunks.len(), 2);
    assert!(last.hunks.iter().all(|h| h.importance == "medium"));
    assert_eq!(review.hunk_count(), 3, "no hunk is dropped");
}

#[tokio::test]
async fn retry_uses_augmented_prompt() {
    let store_dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let llm = ScriptedLlm::new(&[MISSING, COMPLETE]);
    let generator = generator(store_dir.path(), work.path(), DIFF, llm.clone());
    let cancel = CancellationToken::new();

    let GenerationOutcome::NeedsRetry(ctx) = generator.generate(&cancel).await.unwrap() else {
        panic!("expected NeedsRetry")
    };
    let outcome = generator.retry(*ctx, &cancel).await.unwrap();
    assert!(matches!(outcome, GenerationOutcome::Written(_)));

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("left out"));
    assert!(prompts[1].contains("Hunk ids you left out: src/a.rs::11, README.md::3"));
}

#[tokio::test]
async fn duplicates_block_partial_proceed() {
    let store_dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let generator =
        generator(store_dir.path(), work.path(), DIFF, ScriptedLlm::new(&[DUPLICATE]));

    let GenerationOutcome::NeedsRetry(ctx) =
        generator.generate(&CancellationToken::new()).await.unwrap()
    else {
        panic!("expected NeedsRetry")
    };
    assert_eq!(ctx.report.duplicate_ids, ["src/a.rs::1"]);
    assert!(!ctx.report.allows_partial());
    let err = generator.proceed_partial(*ctx).await.unwrap_err();
    assert!(matches!(err, GenerateError::PartialNotAllowed));
}

#[tokio::test]
async fn abandoning_a_retry_cancels_the_generation() {
    let store_dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let generator =
        generator(store_dir.path(), work.path(), DIFF, ScriptedLlm::new(&[MISSING]));

    let outcome = generator.generate(&CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, GenerationOutcome::NeedsRetry(_)));
    assert_eq!(generator.state(), GenerationState::NeedsRetry);

    generator.abandon();
    assert_eq!(generator.state(), GenerationState::Cancelled);
    assert!(std::fs::read_dir(store_dir.path()).map(|d| d.count()).unwrap_or(0) == 0);
}

#[tokio::test]
async fn empty_diff_is_no_changes() {
    let store_dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let llm = ScriptedLlm::new(&[COMPLETE]);
    let generator = generator(store_dir.path(), work.path(), "  \n", llm.clone());

    let err = generator.generate(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, GenerateError::NoChanges));
    assert_eq!(err.to_string(), "no changes to review");
    assert_eq!(generator.state(), GenerationState::Error);
    assert!(llm.prompts().is_empty(), "the LLM is never asked");
}

#[tokio::test]
async fn unparseable_output_is_an_error() {
    let store_dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let generator = generator(
        store_dir.path(),
        work.path(),
        DIFF,
        ScriptedLlm::new(&["I could not produce a review."]),
    );
    let err = generator.generate(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, GenerateError::Extract(_)));
}

#[tokio::test]
async fn cancellation_while_waiting_on_llm() {
    let store_dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let generator = generator(store_dir.path(), work.path(), DIFF, Arc::new(HangingLlm));
    let cancel = CancellationToken::new();

    let mut states = generator.subscribe();
    let running = {
        let generator = generator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { generator.generate(&cancel).await })
    };
    states.wait_for(|s| *s == GenerationState::AwaitingLlm).await.unwrap();
    cancel.cancel();

    let err = running.await.unwrap().unwrap_err();
    assert!(matches!(err, GenerateError::Cancelled));
    assert_eq!(generator.state(), GenerationState::Cancelled);
}

#[cfg(unix)]
#[tokio::test]
async fn failing_diff_command_carries_stderr() {
    use hunkwise_core::process::CommandSource;

    let store_dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let ingest = IngestService::new(
        ReviewStore::new(store_dir.path()),
        Arc::new(hunkwise_core::clock::SystemClock),
    );
    let diff = CommandSource::new(vec![
        "sh".into(),
        "-c".into(),
        "echo 'fatal: not a git repository' >&2; exit 128".into(),
    ]);
    let generator = Generator::new(
        work.path().to_str().unwrap(),
        Arc::new(diff),
        ScriptedLlm::new(&[]),
        ingest,
    )
    .unwrap();

    let err = generator.generate(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, GenerateError::Subprocess(_)));
    assert!(err.to_string().contains("not a git repository"), "{err}");
}

//! The viewer's background services and the glue between them and the UI:
//! the review watcher, the HTTP ingest endpoint, the progress database and
//! the generator.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use hunkwise_core::config::Config;
use hunkwise_core::db;
use hunkwise_core::generator::{GenerationOutcome, Generator, RetryContext};
use hunkwise_core::http::{self, HttpServer};
use hunkwise_core::types::Review;
use hunkwise_core::watcher::ReviewWatcher;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::AppState;
use crate::cli::ViewArgs;
use crate::commands;
use crate::event::{self, AppEvent};
use crate::ui::keybindings::KeyAction;

/// One unit of generator work run on its own task.
enum Job {
    Generate,
    Retry(RetryContext),
    Partial(RetryContext),
}

pub struct Viewer {
    tx: UnboundedSender<AppEvent>,
    generator: Generator,
    watcher: ReviewWatcher,
    db: Option<Connection>,
    /// Parent of every task the viewer spawns; cancelled on quit.
    shutdown: CancellationToken,
    /// Cancels the running generation only.
    generation: Option<CancellationToken>,
    http: Option<JoinHandle<std::io::Result<()>>>,
}

impl Viewer {
    /// Starts the background services for `canonical_dir`.
    ///
    /// The HTTP endpoint and the progress database are optional: failing to
    /// start them is reported in the status bar, not fatal.
    ///
    /// # Errors
    ///
    /// Fails when the generator or the watcher cannot be set up.
    pub async fn start(
        canonical_dir: &str,
        args: &ViewArgs,
        config: &Config,
        state: &mut AppState,
        tx: UnboundedSender<AppEvent>,
    ) -> anyhow::Result<Self> {
        let ingest = commands::ingest_service(config);
        let generator = commands::build_generator(canonical_dir, config, ingest.clone())?;
        let shutdown = CancellationToken::new();

        let mut http_task = None;
        if config.http_enabled && !args.no_http {
            let port = args.port.unwrap_or(config.http_port);
            let router = http::router(ingest, commands::http_validation(config));
            match HttpServer::bind(port, router).await {
                Ok(server) => {
                    state.http_port = Some(server.port());
                    info!(port = server.port(), "HTTP ingest listening");
                    http_task = Some(tokio::spawn(server.serve(shutdown.child_token())));
                }
                Err(e) => {
                    warn!(port, error = %e, "HTTP ingest disabled");
                    state.last_error = Some(format!("HTTP endpoint unavailable: {e}"));
                }
            }
        }

        let db = match open_progress_db().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!(error = %e, "review progress will not be saved");
                state.last_error = Some(format!("progress database unavailable: {e}"));
                None
            }
        };

        let (mut watcher, stream) = ReviewWatcher::new(canonical_dir, config.store())
            .with_context(|| format!("cannot watch the review of {canonical_dir}"))?;
        watcher.start().context("cannot start the review watcher")?;
        info!(target = %watcher.target().display(), "watching review file");
        event::forward_reviews(stream, tx.clone());
        event::forward_generation(generator.subscribe(), tx.clone());

        Ok(Self { tx, generator, watcher, db, shutdown, generation: None, http: http_task })
    }

    /// Shows a freshly loaded review and resumes its progress session.
    pub async fn show_review(&self, review: Review, state: &mut AppState) {
        let created = review.created_at.map(|t| t.to_rfc3339()).unwrap_or_default();
        let dir = review.working_directory.clone();
        state.set_review(review);

        let Some(conn) = &self.db else { return };
        let session = match db::detect_or_create_session(conn, &dir, &created).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "cannot open progress session");
                state.last_error = Some(format!("progress session unavailable: {e}"));
                return;
            }
        };
        let marks = db::load_hunk_marks(conn, &session.id).await;
        match marks {
            Ok(marks) => state.set_marks(session.id, marks),
            Err(e) => {
                warn!(error = %e, session = %session.id, "cannot load hunk marks");
                state.last_error = Some(format!("cannot load progress: {e}"));
            }
        }
    }

    /// Performs the follow-up of a key or mouse event. Returns `true` to quit.
    pub async fn handle_action(&mut self, action: KeyAction, state: &mut AppState) -> bool {
        match action {
            KeyAction::Continue => {}
            KeyAction::Quit => return true,
            KeyAction::ToggleReviewed(key) => self.toggle(&key, state).await,
            KeyAction::Generate => self.spawn(Job::Generate, state),
            KeyAction::Retry => {
                if let Some(ctx) = state.retry.take() {
                    self.spawn(Job::Retry(*ctx), state);
                }
            }
            KeyAction::ProceedPartial => {
                if let Some(ctx) = state.retry.take() {
                    self.spawn(Job::Partial(*ctx), state);
                }
            }
            KeyAction::AbandonRetry => self.generator.abandon(),
            KeyAction::CancelGeneration => {
                if let Some(cancel) = &self.generation {
                    info!("cancelling generation");
                    cancel.cancel();
                }
            }
        }
        false
    }

    /// Applies a finished job's result.
    pub fn finish_generation(
        &mut self,
        result: Result<GenerationOutcome, hunkwise_core::generator::GenerateError>,
        state: &mut AppState,
    ) {
        self.generation = None;
        state.finish_generation(result);
    }

    async fn toggle(&self, key: &str, state: &mut AppState) {
        let (Some(conn), Some(session_id)) = (&self.db, state.session_id.clone()) else {
            let reviewed = !state.reviewed.contains(key);
            state.apply_mark(key, reviewed);
            return;
        };
        match db::toggle_hunk_reviewed(conn, &session_id, key).await {
            Ok(reviewed) => state.apply_mark(key, reviewed),
            Err(e) => {
                warn!(error = %e, hunk = %key, "cannot save hunk mark");
                state.last_error = Some(format!("cannot save progress: {e}"));
            }
        }
    }

    fn spawn(&mut self, job: Job, state: &mut AppState) {
        if self.generation.is_some() {
            return;
        }
        let cancel = self.shutdown.child_token();
        self.generation = Some(cancel.clone());
        state.begin_generation();

        let generator = self.generator.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match job {
                Job::Generate => generator.generate(&cancel).await,
                Job::Retry(ctx) => generator.retry(ctx, &cancel).await,
                Job::Partial(ctx) => generator.proceed_partial(ctx).await.map(GenerationOutcome::Written),
            };
            let _ = tx.send(AppEvent::Generated(result));
        });
    }

    /// Cancels everything, saves the session timestamp and drains the HTTP
    /// endpoint.
    pub async fn shutdown(mut self, state: &AppState) {
        self.shutdown.cancel();
        self.watcher.close();

        if let (Some(conn), Some(session_id)) = (&self.db, &state.session_id) {
            if let Err(e) = db::update_session_timestamp(conn, session_id).await {
                warn!(error = %e, "cannot update session timestamp");
            }
        }
        if let Some(task) = self.http.take() {
            match tokio::time::timeout(Duration::from_secs(5), task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!(error = %e, "HTTP server stopped with an error"),
                Ok(Err(e)) => warn!(error = %e, "HTTP server task failed"),
                Err(_) => warn!("HTTP server did not drain in time"),
            }
        }
    }
}

/// Opens the progress database at its default location, creating the
/// directory first.
async fn open_progress_db() -> anyhow::Result<Connection> {
    let path = db::default_db_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let path = path_str(&path)?;
    Ok(db::open_db(path).await?)
}

fn path_str(path: &Path) -> anyhow::Result<&str> {
    path.to_str().with_context(|| format!("non-UTF-8 path {}", path.display()))
}

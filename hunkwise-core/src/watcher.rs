//! Directory watcher that turns store writes into a live review stream.
//!
//! The watcher observes the *store directory* rather than the review file so
//! that creation is observable. Events on other paths (other reviews, `.tmp`
//! files of in-flight writes) are ignored. Because the store writes by
//! rename, `rename` and `create` on the target are treated as content
//! arrival; `remove` means the review was cleared.
//!
//! Three capacity-one channels carry the output: `reviews`, `cleared` and
//! `errors`. Review and error sends wait for the consumer or for shutdown,
//! whichever comes first. A `cleared` that finds the slot full is dropped
//! since an identical signal is already pending.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::paths::{self, PathError};
use crate::store::{ReviewStore, StoreError};
use crate::types::Review;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    InvalidPath(#[from] PathError),
    #[error("could not prepare store directory {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("filesystem watcher: {0}")]
    Notify(#[from] notify::Error),
    #[error("reloading review: {0}")]
    Reload(#[source] StoreError),
    #[error("watcher already started")]
    AlreadyStarted,
}

/// One observation delivered to the viewer.
#[derive(Debug)]
pub enum ReviewEvent {
    /// A freshly loaded review (created or replaced).
    Review(Box<Review>),
    /// The review file was removed.
    Cleared,
    /// A non-fatal observation error.
    Error(WatchError),
}

/// Consumer side of a [`ReviewWatcher`].
pub struct ReviewStream {
    pub reviews: mpsc::Receiver<Review>,
    pub cleared: mpsc::Receiver<()>,
    pub errors: mpsc::Receiver<WatchError>,
}

impl ReviewStream {
    /// Waits for the next event on any of the three channels.
    ///
    /// Returns `None` once the watcher has shut down and every channel is
    /// drained.
    pub async fn recv(&mut self) -> Option<ReviewEvent> {
        tokio::select! {
            Some(review) = self.reviews.recv() => Some(ReviewEvent::Review(Box::new(review))),
            Some(()) = self.cleared.recv() => Some(ReviewEvent::Cleared),
            Some(err) = self.errors.recv() => Some(ReviewEvent::Error(err)),
            else => None,
        }
    }
}

#[derive(Clone)]
struct Senders {
    reviews: mpsc::Sender<Review>,
    cleared: mpsc::Sender<()>,
    errors: mpsc::Sender<WatchError>,
}

/// What an event on the target file asks the watcher to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Reload,
    Cleared,
    Ignore,
}

/// Watches the stored review of one working directory.
pub struct ReviewWatcher {
    target: PathBuf,
    store: ReviewStore,
    senders: Option<Senders>,
    done: CancellationToken,
    fs_watcher: Option<RecommendedWatcher>,
}

impl ReviewWatcher {
    /// Creates a watcher for the review of `working_dir` and its stream.
    ///
    /// Nothing is observed until [`start`](Self::start) is called.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidPath`] when the directory cannot be
    /// canonicalized.
    pub fn new(working_dir: &str, store: ReviewStore) -> Result<(Self, ReviewStream), WatchError> {
        let canonical = paths::canonicalize(working_dir)?;
        let target = store.path_for_canonical(&canonical);

        let (reviews_tx, reviews) = mpsc::channel(1);
        let (cleared_tx, cleared) = mpsc::channel(1);
        let (errors_tx, errors) = mpsc::channel(1);

        let watcher = Self {
            target,
            store,
            senders: Some(Senders { reviews: reviews_tx, cleared: cleared_tx, errors: errors_tx }),
            done: CancellationToken::new(),
            fs_watcher: None,
        };
        Ok((watcher, ReviewStream { reviews, cleared, errors }))
    }

    /// The review file this watcher follows.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Subscribes to the store directory and spawns the initial load and the
    /// event loop. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails when the store directory cannot be created, the OS watcher
    /// cannot be set up, or the watcher was already started.
    pub fn start(&mut self) -> Result<(), WatchError> {
        let senders = self.senders.take().ok_or(WatchError::AlreadyStarted)?;
        let base = self.store.base().to_path_buf();
        std::fs::create_dir_all(&base)
            .map_err(|source| WatchError::Prepare { path: base.clone(), source })?;

        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut fs_watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.send(res);
            },
            notify::Config::default(),
        )?;
        fs_watcher.watch(&base, RecursiveMode::NonRecursive)?;
        self.fs_watcher = Some(fs_watcher);

        info!(target = %self.target.display(), "watching review file");

        tokio::spawn(initial_load(
            self.store.clone(),
            self.target.clone(),
            senders.clone(),
            self.done.clone(),
        ));
        tokio::spawn(event_loop(
            self.store.clone(),
            self.target.clone(),
            event_rx,
            senders,
            self.done.clone(),
        ));
        Ok(())
    }

    /// Stops every task and the OS watcher. No events are emitted afterwards.
    /// Idempotent.
    pub fn close(&mut self) {
        self.done.cancel();
        self.fs_watcher.take();
        self.senders.take();
    }
}

impl Drop for ReviewWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

async fn initial_load(store: ReviewStore, target: PathBuf, tx: Senders, done: CancellationToken) {
    match store.read_file(&target).await {
        Ok(review) => {
            deliver(&tx.reviews, review, &done).await;
        }
        Err(StoreError::NotFound(_)) => debug!("no review stored yet"),
        Err(e) => {
            deliver(&tx.errors, WatchError::Reload(e), &done).await;
        }
    }
}

async fn event_loop(
    store: ReviewStore,
    target: PathBuf,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    tx: Senders,
    done: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = done.cancelled() => break,
            next = events.recv() => next,
        };
        let Some(result) = next else { break };

        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "filesystem watcher error");
                if !deliver(&tx.errors, WatchError::Notify(e), &done).await {
                    break;
                }
                continue;
            }
        };

        if !touches(&event, &target) {
            continue;
        }

        let delivered = match classify(&event.kind) {
            Action::Ignore => true,
            Action::Cleared => clear(&tx.cleared),
            Action::Reload => match store.read_file(&target).await {
                Ok(review) => deliver(&tx.reviews, review, &done).await,
                Err(StoreError::NotFound(_)) => clear(&tx.cleared),
                Err(e) => {
                    warn!(error = %e, "review reload failed");
                    deliver(&tx.errors, WatchError::Reload(e), &done).await
                }
            },
        };
        if !delivered {
            break;
        }
    }
    debug!(target = %target.display(), "review watcher stopped");
}

/// Maps a filesystem event kind on the target to a watcher action.
///
/// `RenameMode::Both` is ignored: backends that report it also report the
/// `To` half separately, and reacting to both would double-deliver one write.
fn classify(kind: &EventKind) -> Action {
    match kind {
        EventKind::Create(_) => Action::Reload,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Action::Ignore,
        EventKind::Modify(ModifyKind::Metadata(_)) => Action::Ignore,
        EventKind::Modify(_) => Action::Reload,
        EventKind::Remove(_) => Action::Cleared,
        _ => Action::Ignore,
    }
}

fn touches(event: &Event, target: &Path) -> bool {
    let name = target.file_name();
    event.paths.iter().any(|p| p.file_name() == name)
}

/// Sends `value` unless shutdown wins first. Returns `false` when the
/// watcher should stop (shutdown or consumer gone).
async fn deliver<T>(tx: &mpsc::Sender<T>, value: T, done: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = done.cancelled() => false,
        sent = tx.send(value) => sent.is_ok(),
    }
}

/// Non-blocking `cleared` signal; a full slot already carries the same news.
fn clear(tx: &mpsc::Sender<()>) -> bool {
    match tx.try_send(()) {
        Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
        Err(mpsc::error::TrySendError::Closed(())) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    #[test]
    fn event_kinds_map_to_actions() {
        assert_eq!(classify(&EventKind::Create(CreateKind::File)), Action::Reload);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Action::Reload
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Any))),
            Action::Reload
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Action::Ignore
        );
        assert_eq!(classify(&EventKind::Remove(RemoveKind::File)), Action::Cleared);
    }

    #[test]
    fn temp_files_do_not_touch_target() {
        let target = PathBuf::from("/cache/abc.json");
        let tmp = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/cache/abc.json.tmp"));
        let real = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/cache/abc.json"));
        assert!(!touches(&tmp, &target));
        assert!(touches(&real, &target));
    }
}

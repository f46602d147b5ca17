//! Event bus for hunkwise.
//!
//! All user input, timer ticks, and background-task results are normalised into
//! a single `AppEvent` enum and sent over a tokio unbounded MPSC channel. The
//! main loop receives from this channel and dispatches accordingly.
//!
//! Two independent intervals drive the render and logic cycles:
//! - **Render interval** (33 ms ≈ 30 FPS) triggers a `terminal.draw()` call.
//! - **Tick interval** (250 ms = 4 Hz) triggers application-state updates.
//!
//! Background producers (the review watcher, the generator's stage channel and
//! the generation task itself) each get a clone of the sender through the
//! `forward_*` helpers below.

use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind, MouseEvent};
use futures::{FutureExt, StreamExt};
use hunkwise_core::generator::{GenerateError, GenerationOutcome, GenerationState};
use hunkwise_core::types::Review;
use hunkwise_core::watcher::{ReviewEvent, ReviewStream};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;

/// All events the application can receive from any source.
#[derive(Debug)]
#[non_exhaustive]
pub enum AppEvent {
    /// A key press from the terminal (`KeyEventKind::Press` only).
    ///
    /// Release and repeat events are filtered in [`spawn_event_task`] to avoid
    /// double-firing on Windows, which synthesises both press and release for
    /// every keystroke.
    Key(KeyEvent),
    /// A mouse event from the terminal (click, scroll, move).
    Mouse(MouseEvent),
    /// Terminal was resized to (columns, rows).
    Resize(u16, u16),
    /// Logic tick for state updates (4 Hz / 250 ms).
    Tick,
    /// Render tick: triggers a `terminal.draw()` call (≈30 FPS / 33 ms).
    Render,
    /// The stored review for the watched directory was (re)written.
    ReviewLoaded(Box<Review>),
    /// The stored review was removed.
    ReviewCleared,
    /// The watcher could not load the review file.
    WatchFailed(String),
    /// The generator entered a new stage.
    Generation(GenerationState),
    /// A generation, retry or partial proceed finished.
    Generated(Result<GenerationOutcome, GenerateError>),
}

/// Holds the sender and receiver ends of the unified event channel.
///
/// The sender (`tx`) is cloned and distributed to background tasks;
/// the receiver (`rx`) is owned by the main event loop.
pub struct EventHandler {
    /// Send half: clone this for each background task that produces events.
    pub tx: mpsc::UnboundedSender<AppEvent>,
    /// Receive half: owned by the main loop.
    pub rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    /// Creates a new `EventHandler` with a fresh unbounded channel.
    ///
    /// Unbounded is fine here: terminal input and timers arrive at a bounded
    /// hardware rate, and the watcher side is already capacity-one.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the background tokio task that drives terminal input and timers.
///
/// The task runs until the receiver is dropped. Two independent
/// `tokio::time::interval` timers drive the render and logic cycles; crossterm
/// input is polled via `EventStream`.
///
/// - `reader.next().fuse()` keeps `tokio::select!` from polling a completed
///   future if the crossterm stream terminates.
/// - `KeyEventKind::Press` filter: Windows fires both `Press` and `Release`
///   for every keystroke.
pub fn spawn_event_task(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut tick_interval = interval(Duration::from_millis(250));
        let mut render_interval = interval(Duration::from_millis(33));
        let mut reader = EventStream::new();

        loop {
            let tick_tick = tick_interval.tick();
            let render_tick = render_interval.tick();
            let crossterm_event = reader.next().fuse();

            let sent = tokio::select! {
                _ = tick_tick => tx.send(AppEvent::Tick),
                _ = render_tick => tx.send(AppEvent::Render),
                maybe_event = crossterm_event => match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        tx.send(AppEvent::Key(key))
                    }
                    Some(Ok(Event::Resize(w, h))) => tx.send(AppEvent::Resize(w, h)),
                    Some(Ok(Event::Mouse(mouse))) => tx.send(AppEvent::Mouse(mouse)),
                    _ => Ok(()),
                },
            };
            if sent.is_err() {
                break;
            }
        }
    });
}

/// Forwards watcher events onto the bus until the watcher shuts down.
pub fn forward_reviews(mut stream: ReviewStream, tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        while let Some(event) = stream.recv().await {
            let app_event = match event {
                ReviewEvent::Review(review) => AppEvent::ReviewLoaded(review),
                ReviewEvent::Cleared => AppEvent::ReviewCleared,
                ReviewEvent::Error(e) => AppEvent::WatchFailed(e.to_string()),
            };
            if tx.send(app_event).is_err() {
                break;
            }
        }
    });
}

/// Forwards generator stage changes onto the bus.
pub fn forward_generation(
    mut states: watch::Receiver<GenerationState>,
    tx: mpsc::UnboundedSender<AppEvent>,
) {
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            if tx.send(AppEvent::Generation(state)).is_err() {
                break;
            }
        }
    });
}

//! hunkwise: read a change as a narrated, importance-tagged review.
//!
//! With no subcommand the binary opens the terminal viewer on a working
//! directory. `generate`, `serve` and `path` run headless.
//!
//! # Viewer startup order
//!
//! 1. Config, theme and background services (watcher, HTTP endpoint,
//!    progress database) come up before the terminal is touched, so a
//!    fatal setup error prints normally.
//! 2. `install_panic_hook()` before `init_tui()`, so a panic restores the
//!    terminal before its message prints.
//! 3. `register_sigterm()`, polled by the 50ms heartbeat in the event loop.
//! 4. `init_tui()`, then the input task.
//!
//! The event loop runs in its own function and returns its error instead of
//! propagating it, so `restore_tui()` is reached on every exit path.

mod app;
mod cli;
mod commands;
mod event;
mod highlight;
mod logging;
mod theme;
mod tui;
mod ui;
mod viewer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hunkwise_core::config::Config;
use hunkwise_core::paths;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::app::AppState;
use crate::cli::{Cli, Command, ViewArgs};
use crate::event::AppEvent;
use crate::viewer::Viewer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        None => view(cli.view).await,
        Some(Command::View(args)) => view(args).await,
        Some(command) => {
            logging::init_stderr();
            commands::run(command, Config::load()).await
        }
    }
}

async fn view(args: ViewArgs) -> anyhow::Result<()> {
    let _log_guard = logging::init_viewer();
    let config = Config::load();

    let dir = paths::canonicalize(&args.dir)
        .with_context(|| format!("cannot open {}", args.dir))?;
    info!(dir = %dir, "starting viewer");

    let mut state = AppState::new(theme::Theme::from_name(&config.theme), dir.clone());
    let handler = event::EventHandler::new();
    let mut viewer = Viewer::start(&dir, &args, &config, &mut state, handler.tx.clone()).await?;

    highlight::warm_up();

    tui::install_panic_hook();
    let term_flag = tui::register_sigterm().context("cannot register SIGTERM handler")?;
    let mut terminal = tui::init_tui().context("cannot initialise the terminal")?;
    event::spawn_event_task(handler.tx.clone());

    let result = event_loop(&mut terminal, handler.rx, &mut viewer, &mut state, &term_flag).await;

    let restored = tui::restore_tui();
    viewer.shutdown(&state).await;
    info!("viewer closed");
    result?;
    restored.context("cannot restore the terminal")
}

async fn event_loop(
    terminal: &mut tui::Tui,
    mut rx: UnboundedReceiver<AppEvent>,
    viewer: &mut Viewer,
    state: &mut AppState,
    term_flag: &AtomicBool,
) -> anyhow::Result<()> {
    'event_loop: loop {
        tokio::select! {
            // A quiescent terminal sends nothing; the heartbeat still polls SIGTERM.
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else { break 'event_loop };
                match event {
                    AppEvent::Render => {
                        terminal.draw(|frame| ui::render(frame, state))?;
                    }
                    AppEvent::Key(key) => {
                        let action = ui::keybindings::handle_key(key, state);
                        if viewer.handle_action(action, state).await {
                            break 'event_loop;
                        }
                    }
                    AppEvent::Mouse(mouse) => {
                        let action = ui::keybindings::handle_mouse(mouse, state);
                        if viewer.handle_action(action, state).await {
                            break 'event_loop;
                        }
                    }
                    AppEvent::ReviewLoaded(review) => {
                        info!(sections = review.sections.len(), "review loaded");
                        viewer.show_review(*review, state).await;
                    }
                    AppEvent::ReviewCleared => {
                        info!("review removed");
                        state.clear_review();
                    }
                    AppEvent::WatchFailed(message) => {
                        warn!(error = %message, "cannot load review");
                        state.last_error = Some(message);
                    }
                    AppEvent::Generation(stage) => state.generation = stage,
                    AppEvent::Generated(result) => viewer.finish_generation(result, state),
                    AppEvent::Resize(_, _) | AppEvent::Tick => {}
                }
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
        }
    }
    Ok(())
}

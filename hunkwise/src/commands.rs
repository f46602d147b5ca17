//! Headless subcommands: `generate`, `serve` and `path`.

use std::sync::Arc;

use anyhow::{bail, Context};
use hunkwise_core::clock::SystemClock;
use hunkwise_core::config::Config;
use hunkwise_core::generator::{GenerateError, GenerationOutcome, Generator};
use hunkwise_core::http::{self, HttpServer};
use hunkwise_core::ingest::{IngestService, Validation};
use hunkwise_core::process::CommandSource;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::Command;

/// The ingest service every surface shares, over the configured store.
pub fn ingest_service(config: &Config) -> IngestService {
    IngestService::new(config.store(), Arc::new(SystemClock))
}

/// HTTP validation mode from config.
pub fn http_validation(config: &Config) -> Validation {
    if config.strict_http {
        Validation::Strict
    } else {
        Validation::Lenient
    }
}

/// A generator for `dir` running the configured diff and LLM commands.
///
/// # Errors
///
/// Fails when `dir` cannot be canonicalized.
pub fn build_generator(dir: &str, config: &Config, ingest: IngestService) -> anyhow::Result<Generator> {
    let generator = Generator::new(
        dir,
        Arc::new(CommandSource::new(config.diff_command.clone())),
        Arc::new(CommandSource::new(config.llm_command.clone())),
        ingest,
    )
    .with_context(|| format!("cannot generate a review for {dir}"))?;
    Ok(generator)
}

/// Cancels `token` on Ctrl-C or SIGTERM.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot listen for SIGTERM");
                    let _ = tokio::signal::ctrl_c().await;
                    token.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        token.cancel();
    });
}

pub async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    match command {
        Command::Generate { dir, partial } => generate(&dir, partial, &config).await,
        Command::Serve { port } => serve(port.unwrap_or(config.http_port), &config).await,
        Command::Path { dir } => {
            let path = config.store().path_for(&dir).with_context(|| format!("invalid directory {dir}"))?;
            println!("{}", path.display());
            Ok(())
        }
        Command::View(_) => bail!("view runs in the terminal viewer"),
    }
}

async fn generate(dir: &str, partial: bool, config: &Config) -> anyhow::Result<()> {
    let generator = build_generator(dir, config, ingest_service(config))?;
    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());

    let ctx = match generator.generate(&cancel).await {
        Ok(GenerationOutcome::Written(written)) => {
            println!("{}", written.file_path.display());
            return Ok(());
        }
        Ok(GenerationOutcome::NeedsRetry(ctx)) => ctx,
        Err(GenerateError::NoChanges) => {
            eprintln!("no changes to review");
            return Ok(());
        }
        Err(e) => return Err(e).context("generation failed"),
    };

    let report = &ctx.report;
    if partial && report.allows_partial() {
        let written = generator.proceed_partial(*ctx).await.context("partial write failed")?;
        println!("{}", written.file_path.display());
        return Ok(());
    }

    eprintln!("the LLM's classification does not cover every hunk exactly once");
    for (label, ids) in [
        ("missing", &report.missing_ids),
        ("duplicate", &report.duplicate_ids),
        ("invalid importance", &report.invalid_importance),
    ] {
        if !ids.is_empty() {
            eprintln!("  {label}: {}", ids.join(", "));
        }
    }
    if partial {
        bail!("cannot proceed partially: the classification has duplicates or invalid importance");
    }
    bail!("classification incomplete; rerun with --partial to keep what was classified");
}

async fn serve(port: u16, config: &Config) -> anyhow::Result<()> {
    let router = http::router(ingest_service(config), http_validation(config));
    let server = HttpServer::bind(port, router)
        .await
        .with_context(|| format!("cannot bind 127.0.0.1:{port}"))?;
    println!("listening on http://{}/review", server.local_addr());
    info!(port = server.port(), store = %config.store().base().display(), "serving");

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());
    server.serve(shutdown).await.context("HTTP server failed")?;
    info!("HTTP server drained");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_http_switch() {
        let mut config = Config::default();
        assert_eq!(http_validation(&config), Validation::Lenient);
        config.strict_http = true;
        assert_eq!(http_validation(&config), Validation::Strict);
    }

    #[tokio::test]
    async fn path_prints_store_location() {
        let store_dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let config = Config { store_dir: Some(store_dir.path().to_path_buf()), ..Config::default() };

        let expected = config.store().path_for(work.path().to_str().unwrap()).unwrap();
        assert!(expected.starts_with(store_dir.path()));
        assert_eq!(expected.extension().and_then(|e| e.to_str()), Some("json"));

        let command = Command::Path { dir: work.path().to_string_lossy().into_owned() };
        run(command, config).await.unwrap();
    }

    #[test]
    fn generator_requires_an_existing_directory() {
        let config = Config::default();
        let config_ingest = ingest_service(&config);
        assert!(build_generator("/definitely/not/here", &config, config_ingest).is_err());
    }
}

//! hunkwise-core — the review ingest and fanout core shared by the `hunkwise`
//! viewer and the `hunkwise-mcp` server.
//!
//! Every producer (the LLM generator, the loopback HTTP endpoint and the MCP
//! tool call) builds a [`types::Review`] and hands it to
//! [`ingest::IngestService::submit`]. The service canonicalizes the working
//! directory, validates importance values and writes the review atomically
//! through [`store::ReviewStore`]. A [`watcher::ReviewWatcher`] observing the
//! store directory turns the resulting filesystem events into a
//! [`watcher::ReviewStream`] for the viewer.

pub mod classify;
pub mod clock;
pub mod config;
pub mod db;
pub mod extract;
pub mod generator;
pub mod http;
pub mod hunks;
pub mod ingest;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod schema;
pub mod store;
pub mod types;
pub mod watcher;

/// Application name used for cache, config and data directories.
pub const APP_NAME: &str = "hunkwise";

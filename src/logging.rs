//! Log sink construction
//!
//! A [`Logger`] is an explicit handle to a `tracing` dispatcher. The listener
//! attaches it to every session future, so the protocol core never depends
//! on a process-wide subscriber being installed.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::Dispatch;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LogOutput, LoggingConfig};

/// Handle to the log sink sessions report to
#[derive(Debug, Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// Build the sink described by `config`.
    ///
    /// `RUST_LOG`, when set, takes precedence over the configured level.
    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .with_context(|| format!("Invalid log level: {}", config.level))?;

        let dispatch = match &config.output {
            LogOutput::Stdout => build_dispatch(filter, config.format, true, std::io::stdout),
            LogOutput::Stderr => build_dispatch(filter, config.format, true, std::io::stderr),
            LogOutput::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file: {}", path.display()))?;
                build_dispatch(filter, config.format, false, Mutex::new(file))
            }
        };

        Ok(Self { dispatch })
    }

    /// Build a sink writing to an arbitrary writer, without ANSI colors
    pub fn with_writer<W>(level: &str, format: LogFormat, writer: W) -> Result<Self>
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let filter = EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level: {}", level))?;
        Ok(Self {
            dispatch: build_dispatch(filter, format, false, writer),
        })
    }

    /// A sink that drops every event
    pub fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Underlying dispatcher
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Install this sink as the process-wide default
    pub fn install_global(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .context("Failed to install global log dispatcher")
    }
}

fn build_dispatch<W>(filter: EnvFilter, format: LogFormat, ansi: bool, writer: W) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => Dispatch::new(
            registry.with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(ansi),
            ),
        ),
        LogFormat::Json => Dispatch::new(
            registry.with(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(false)
                    .with_current_span(true)
                    .with_span_list(false),
            ),
        ),
    }
}

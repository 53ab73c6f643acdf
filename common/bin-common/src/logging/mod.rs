// Copyright 2022-2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::io::IsTerminal;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Directive applied when `RUST_LOG` is not set, for example `debug` or
    /// `nym_credential_issuance=trace`.
    #[serde(default = "default_log_level")]
    pub default_directive: String,

    /// Include source file and line in every log line.
    #[serde(default)]
    pub source_location: bool,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            default_directive: default_log_level(),
            source_location: true,
        }
    }
}

// don't call init so that we could attach additional layers
#[cfg(feature = "basic_tracing")]
pub fn build_tracing_logger(
    settings: &LoggingSettings,
) -> impl tracing_subscriber::layer::SubscriberExt {
    use tracing_subscriber::prelude::*;

    tracing_subscriber::registry()
        .with(default_tracing_fmt_layer(
            std::io::stderr,
            settings.source_location,
        ))
        .with(tracing_env_filter(&settings.default_directive))
}

#[cfg(feature = "basic_tracing")]
pub fn default_tracing_env_filter() -> tracing_subscriber::filter::EnvFilter {
    tracing_env_filter(DEFAULT_LOG_LEVEL)
}

#[cfg(feature = "basic_tracing")]
fn tracing_env_filter(default_directive: &str) -> tracing_subscriber::filter::EnvFilter {
    if ::std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::filter::EnvFilter::from_default_env()
    } else {
        // if the env value was not found, fall back to the configured directive rather than `ERROR`
        tracing_subscriber::filter::EnvFilter::builder()
            .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
            .parse_lossy(default_directive)
    }
}

#[cfg(feature = "basic_tracing")]
pub fn default_tracing_fmt_layer<S, W>(
    writer: W,
    source_location: bool,
) -> impl tracing_subscriber::Layer<S> + Sync + Send + 'static
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Sync + Send + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        // Use a more compact, abbreviated log format
        .compact()
        // Display source code file paths
        .with_file(source_location)
        // Display source code line numbers
        .with_line_number(source_location)
        // Don't display the event's target (module path)
        .with_target(false)
}

#[cfg(feature = "basic_tracing")]
pub fn setup_tracing_logger() {
    setup_tracing_logger_with(&LoggingSettings::default())
}

#[cfg(feature = "basic_tracing")]
pub fn setup_tracing_logger_with(settings: &LoggingSettings) {
    use tracing_subscriber::util::SubscriberInitExt;
    // another subscriber might have already been installed (e.g. by a test harness)
    let _ = build_tracing_logger(settings).try_init();
}

pub fn banner(crate_name: &str, crate_version: &str) -> String {
    format!(
        r#"

      _ __  _   _ _ __ ___
     | '_ \| | | | '_ \ _ \
     | | | | |_| | | | | | |
     |_| |_|\__, |_| |_| |_|
            |___/

             ({crate_name} - version {crate_version})

    "#
    )
}

pub fn maybe_print_banner(crate_name: &str, crate_version: &str) {
    if std::io::stdout().is_terminal() {
        println!("{}", banner(crate_name, crate_version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_fall_back_to_defaults() {
        let settings: LoggingSettings = toml::from_str("").unwrap();
        assert_eq!(settings.default_directive, "info");
        assert!(!settings.source_location);

        let settings: LoggingSettings =
            toml::from_str("default_directive = \"nym_credential_issuance=debug\"").unwrap();
        assert_eq!(settings.default_directive, "nym_credential_issuance=debug");

        assert!(toml::from_str::<LoggingSettings>("verbosity = 3").is_err());
    }

    #[test]
    fn banner_mentions_the_binary() {
        let banner = banner("nym-credential-cli", "0.1.0");
        assert!(banner.contains("nym-credential-cli - version 0.1.0"));
    }
}

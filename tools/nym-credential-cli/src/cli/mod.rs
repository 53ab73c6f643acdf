// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, Subcommand};
use nym_bin_common::logging::{maybe_print_banner, setup_tracing_logger_with, LoggingSettings};
use std::path::PathBuf;

mod demo;
mod init;
mod worker;

pub(crate) const DEFAULT_CONFIG_PATH: &str = "issuance.toml";

#[derive(Parser, Debug)]
#[command(name = "nym-credential-cli")]
#[command(about = "Threshold issuance and spending of anonymous credentials against a local deployment")]
#[command(version)]
pub(crate) struct Cli {
    /// Path to the issuance config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Logging directive used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    log_directive: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Write a fresh issuance config file.
    Init(init::Args),

    /// Run a complete issuance and spend round against an in-process deployment.
    Demo(demo::Args),

    /// Serve JSON encoded worker requests read from stdin, one per line.
    Worker(worker::Args),
}

impl Cli {
    pub(crate) async fn execute(self) -> anyhow::Result<()> {
        let logging = LoggingSettings {
            default_directive: self.log_directive,
            source_location: false,
        };
        setup_tracing_logger_with(&logging);

        match self.command {
            Commands::Init(args) => init::execute(&self.config, args),
            Commands::Demo(args) => {
                maybe_print_banner(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                demo::execute(&self.config, args).await
            }
            Commands::Worker(args) => worker::execute(&self.config, args).await,
        }
    }
}

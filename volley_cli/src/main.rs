mod cli;
mod error_fmt;
mod logging;
mod run;

use std::path::Path;

use clap::Parser;
use eyre::{Result, WrapErr};
use volley_core::error::VolleyError;

use crate::cli::{Cli, JSON_MODE};
use crate::error_fmt::{format_error_json, humanize};

fn main() {
    // Usage errors exit with 2 from clap.
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let json = cli.json;

    let result = real_main(cli);
    if let Err(e) = &result {
        tracing::error!(error = %e, "volley failed");
        if json {
            eprintln!("{}", format_error_json(e));
        } else {
            eprintln!("{}", humanize(e));
        }
    }
    // process::exit skips destructors, so the file writer is flushed first.
    logging::flush();
    if result.is_err() {
        std::process::exit(1);
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = volley_config::load_file(&cli.config)?;
    cfg.validate()
        .map_err(|e| eyre::Report::new(VolleyError::Config(e.to_string())))?;

    let base = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    logging::init(&cfg.logging, base, cli.log_level.as_deref(), cli.json)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to start async runtime")?;
    runtime.block_on(run::execute(cli.cmd, &cfg))
}

pub mod board;
pub mod cli;
pub mod codec;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod kv;
pub mod prompt;
pub mod query;
pub mod render;
pub mod store;
pub mod task;
pub mod theme;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskdeck"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let kv = kv::FileStore::open(
    &data_dir
  )
  .with_context(|| {
    format!(
      "failed to open task storage at \
       {}",
      data_dir.display()
    )
  })?;

  let theme = theme::Theme::load(&kv);
  let renderer =
    render::Renderer::new(&cfg, theme)?;
  let command =
    cli.command.unwrap_or_else(|| {
      cli::Command::List(
        cli::ListArgs::default()
      )
    });

  let mut out = io::stdout().lock();
  commands::dispatch(
    kv,
    &cfg,
    &renderer,
    command,
    Utc::now(),
    &mut out
  )?;

  info!("done");
  Ok(())
}

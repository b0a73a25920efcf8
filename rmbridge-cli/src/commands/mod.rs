pub mod changeset;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use rmbridge_changeset::{pipeline::ModuleChange, ChangeSetOptions, Policy};
use rmbridge_core::{
    load::{load_config_at, load_snapshot_at},
    Config, Snapshot,
};
use rmbridge_model::{load_model_at, Model};

/// Inputs shared by every command.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Sync configuration (model path and module list).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Snapshot exported from the requirements-management tool.
    #[arg(short, long)]
    pub snapshot: PathBuf,

    /// Keep the actions of valid items when other items are invalid.
    #[arg(long)]
    pub force: bool,

    /// Log errors as they occur instead of collecting them.
    #[arg(long)]
    pub no_gather_logs: bool,
}

pub struct Inputs {
    pub config: Config,
    pub snapshot: Snapshot,
    pub model: Model,
    pub model_path: PathBuf,
}

impl InputArgs {
    pub fn options(&self) -> ChangeSetOptions {
        ChangeSetOptions {
            policy: if self.force { Policy::Force } else { Policy::Safe },
            gather_logs: !self.no_gather_logs,
        }
    }

    pub fn load(&self) -> Result<Inputs> {
        let config = load_config_at(&self.config)
            .with_context(|| format!("failed to load config {}", self.config.display()))?;
        let snapshot = load_snapshot_at(&self.snapshot)
            .with_context(|| format!("failed to load snapshot {}", self.snapshot.display()))?;
        let model_path = config.model_path(&self.config);
        let model = load_model_at(&model_path)
            .with_context(|| format!("failed to load model {}", model_path.display()))?;
        tracing::info!(
            "loaded {} snapshot module(s) and {} model object(s)",
            snapshot.modules.len(),
            model.len()
        );
        Ok(Inputs {
            config,
            snapshot,
            model,
            model_path,
        })
    }
}

/// Print the error banners of every module to stderr.
pub fn print_errors(changes: &[ModuleChange]) {
    for change in changes {
        if let Some(report) = change.change_set.report() {
            eprintln!("{}", report.red());
        }
    }
}

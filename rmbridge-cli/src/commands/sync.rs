//! `rm-bridge sync`: compile, write and apply change sets.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use rmbridge_changeset::{
    pipeline::{self, ModuleChange},
    writer, ChangeSet, WriteResult,
};
use rmbridge_model::{apply, save_model_at, ApplyReport};
use tabled::{settings::Style, Table, Tabled};

use super::{print_errors, InputArgs, Inputs};

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Compile and apply in memory, but write nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Directory receiving one change-set file per module.
    #[arg(long, default_value = "change-sets")]
    pub output_dir: PathBuf,

    /// File receiving the error banners of the run.
    #[arg(long, default_value = "change-errors.txt")]
    pub error_log: PathBuf,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "module")]
    module: String,
    #[tabled(rename = "status")]
    status: &'static str,
    #[tabled(rename = "actions")]
    actions: usize,
    #[tabled(rename = "created")]
    created: usize,
    #[tabled(rename = "modified")]
    modified: usize,
    #[tabled(rename = "moved")]
    moved: usize,
    #[tabled(rename = "deleted")]
    deleted: usize,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let Inputs {
            config,
            snapshot,
            mut model,
            model_path,
        } = self.input.load()?;
        let changes = pipeline::run(&model, &config, &snapshot, self.input.options());

        let mut rows = Vec::with_capacity(changes.len());
        let mut applied = false;
        for change in &changes {
            let change_set = &change.change_set;
            if !change_set.is_empty() {
                let write = writer::write_change_set(&self.output_dir, change_set, self.dry_run)
                    .with_context(|| {
                        format!("failed to write change set of '{}'", change_set.module_id)
                    })?;
                print_write(&write);
            }
            let report = apply(&mut model, &change_set.actions).with_context(|| {
                format!("failed to apply change set of '{}'", change_set.module_id)
            })?;
            applied |= !change_set.is_empty();
            rows.push(summary_row(change_set, &report));
        }

        if applied && !self.dry_run {
            save_model_at(&model_path, &model)
                .with_context(|| format!("failed to save model {}", model_path.display()))?;
        }

        print_summary(rows, self.dry_run);
        finish(&changes, &self.error_log, self.dry_run)
    }
}

fn summary_row(change_set: &ChangeSet, report: &ApplyReport) -> SummaryRow {
    let status = if change_set.skipped {
        "SKIPPED"
    } else if change_set.has_errors() {
        "PARTIAL"
    } else if change_set.is_empty() {
        "UNCHANGED"
    } else {
        "SYNCED"
    };
    SummaryRow {
        module: change_set.module_id.clone(),
        status,
        actions: change_set.actions.len(),
        created: report.created,
        modified: report.modified,
        moved: report.moved,
        deleted: report.deleted,
    }
}

fn print_write(write: &WriteResult) {
    match write {
        WriteResult::Written { path } => println!("  ✎  {}", path.display()),
        WriteResult::WouldWrite { path } => println!("  ~  {}", path.display()),
        WriteResult::Unchanged { path } => println!("  ·  {}", path.display()),
    }
}

fn print_summary(rows: Vec<SummaryRow>, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    if rows.is_empty() {
        println!("{prefix}No modules in snapshot.");
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{prefix}Sync summary");
    println!("{table}");
}

fn finish(changes: &[ModuleChange], error_log: &std::path::Path, dry_run: bool) -> Result<()> {
    print_errors(changes);
    let report = pipeline::error_report(changes);
    if let Some(write) = writer::write_error_log(error_log, report.as_deref(), dry_run)
        .with_context(|| format!("failed to write error log {}", error_log.display()))?
    {
        print_write(&write);
    }

    let failed = changes
        .iter()
        .filter(|change| change.change_set.has_errors())
        .count();
    if failed > 0 {
        bail!("{failed} module(s) reported errors");
    }
    Ok(())
}

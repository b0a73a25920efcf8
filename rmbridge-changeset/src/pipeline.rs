//! Multi-tracker entrypoint shared by the CLI commands.

use rmbridge_core::{Config, ObjectId, Snapshot, TrackerConfig};
use rmbridge_model::ModelQuery;

use crate::compiler::{calculate_change_set, ChangeSet, ChangeSetOptions};

/// Change set of one snapshot module together with its target.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleChange {
    /// UUID of the target module, when configured.
    pub target: Option<ObjectId>,
    pub change_set: ChangeSet,
}

/// Compile every snapshot module against the config entry at the same
/// position. Trackers are independent: a fatal error only skips its own.
pub fn run(
    model: &dyn ModelQuery,
    config: &Config,
    snapshot: &Snapshot,
    options: ChangeSetOptions,
) -> Vec<ModuleChange> {
    if config.modules.len() != snapshot.modules.len() {
        tracing::warn!(
            "config lists {} module(s), snapshot has {}",
            config.modules.len(),
            snapshot.modules.len()
        );
    }

    snapshot
        .modules
        .iter()
        .enumerate()
        .map(|(index, tracker)| {
            let tracker_config = config.modules.get(index).cloned().unwrap_or_default();
            let change_set = calculate_change_set(model, &tracker_config, tracker, options);
            ModuleChange {
                target: tracker_config.capella_uuid.clone(),
                change_set,
            }
        })
        .collect()
}

/// Overall outcome of a run.
pub fn has_errors(changes: &[ModuleChange]) -> bool {
    changes.iter().any(|change| change.change_set.has_errors())
}

/// Every error banner of a run, one block per module.
pub fn error_report(changes: &[ModuleChange]) -> Option<String> {
    let reports: Vec<String> = changes
        .iter()
        .filter_map(|change| change.change_set.report())
        .collect();
    (!reports.is_empty()).then(|| reports.join("\n\n"))
}

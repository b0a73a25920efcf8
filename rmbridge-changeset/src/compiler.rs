//! Change-Set Compiler: per-tracker orchestration and error policy.

use rmbridge_core::{Action, Collection, Extension, Field, FieldChange, NewElement, Ref,
    TrackerConfig, TrackerSnapshot};
use rmbridge_model::ModelQuery;

use crate::context::{TrackerContext, TYPES_FOLDER_IDENTIFIER};
use crate::error::ChangeSetError;
use crate::find::Finder;
use crate::schema::reconcile_schema;
use crate::tree::reconcile_tree;

/// Module id used in messages when the snapshot has none.
pub const MISSING_ID: &str = "MISSING ID";

/// What happens to a tracker's actions when recoverable errors occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Discard every action of the tracker.
    #[default]
    Safe,
    /// Keep the actions of all valid items.
    Force,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSetOptions {
    pub policy: Policy,
    /// Collect recoverable errors into [`ChangeSet::errors`] instead of
    /// logging them as they occur.
    pub gather_logs: bool,
}

impl Default for ChangeSetOptions {
    fn default() -> Self {
        Self {
            policy: Policy::Safe,
            gather_logs: true,
        }
    }
}

/// Result of compiling one tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    pub module_id: String,
    pub actions: Vec<Action>,
    /// Gathered error messages, each prefixed with the module id.
    pub errors: Vec<String>,
    /// Errors seen, gathered or logged.
    pub error_count: usize,
    /// The tracker's actions were discarded.
    pub skipped: bool,
}

impl ChangeSet {
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The actions as a change-set YAML document.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.actions)
    }

    /// Gathered errors wrapped in a banner, or `None` without any.
    ///
    /// ```text
    /// Skipping module: 25093
    /// ======================
    /// 25093: Invalid workitem 'REQ-1'. ...
    /// ====================================
    /// ```
    pub fn report(&self) -> Option<String> {
        let last = self.errors.last()?;
        let start = if self.skipped {
            format!("Skipping module: {}", self.module_id)
        } else {
            format!("Encountered error(s) in '{}'", self.module_id)
        };
        let mut lines = Vec::with_capacity(self.errors.len() + 3);
        lines.push(start.clone());
        lines.push("=".repeat(start.chars().count()));
        lines.extend(self.errors.iter().cloned());
        lines.push("=".repeat(last.chars().count()));
        Some(lines.join("\n"))
    }
}

/// Compile one tracker, surfacing fatal conditions as errors.
///
/// Recoverable errors are recorded on the returned [`ChangeSet`]; no policy
/// is applied.
pub fn try_calculate(
    model: &dyn ModelQuery,
    config: &TrackerConfig,
    tracker: &TrackerSnapshot,
    gather_logs: bool,
) -> Result<ChangeSet, ChangeSetError> {
    let finder = Finder::new(model);
    let uuid = config
        .capella_uuid
        .as_ref()
        .ok_or(ChangeSetError::InvalidTrackerConfig)?;
    let module = finder
        .module(uuid)?
        .ok_or_else(|| ChangeSetError::MissingModule { uuid: uuid.clone() })?;
    let module_id = tracker
        .id
        .as_ref()
        .ok_or(ChangeSetError::InvalidSnapshotModule)?
        .as_str();

    let types_folder = finder.types_folder(TYPES_FOLDER_IDENTIFIER, &module.uuid)?;
    let mut ctx = TrackerContext::new(finder, tracker, module_id, module, types_folder, gather_logs);

    let schema = reconcile_schema(&mut ctx);

    let mut module_action = Action::new(Ref::existing(&module.uuid));
    if module.identifier != module_id {
        module_action.set(Field::Identifier, FieldChange::text(module_id));
    }
    if let Some(long_name) = &tracker.long_name {
        if module.long_name != *long_name {
            module_action.set(Field::LongName, FieldChange::text(long_name));
        }
    }
    if let Some(folder) = schema.types_folder {
        module_action.push_extend(
            Collection::RequirementTypesFolders,
            Extension::Create(NewElement::TypesFolder(folder)),
        );
    }
    let content = reconcile_tree(&mut ctx, &mut module_action);

    let mut actions = schema.actions;
    if !module_action.is_empty() {
        actions.push(module_action);
    }
    actions.extend(content);

    let (errors, error_count) = ctx.into_errors();
    tracing::debug!(
        "module '{module_id}': {} action(s), {error_count} error(s)",
        actions.len()
    );
    Ok(ChangeSet {
        module_id: module_id.to_owned(),
        actions,
        errors,
        error_count,
        skipped: false,
    })
}

/// Compile one tracker and apply the error policy.
///
/// Fatal conditions skip the tracker: they become its only error message
/// when gathering, or are logged right away otherwise.
pub fn calculate_change_set(
    model: &dyn ModelQuery,
    config: &TrackerConfig,
    tracker: &TrackerSnapshot,
    options: ChangeSetOptions,
) -> ChangeSet {
    let module_id = tracker
        .id
        .as_ref()
        .map_or_else(|| MISSING_ID.to_owned(), ToString::to_string);

    match try_calculate(model, config, tracker, options.gather_logs) {
        Ok(mut change_set) => {
            if change_set.has_errors() && options.policy == Policy::Safe {
                change_set.actions.clear();
                change_set.skipped = true;
            }
            change_set
        }
        Err(e) => {
            let mut errors = Vec::new();
            if options.gather_logs {
                errors.push(e.to_string());
            } else {
                tracing::error!("Skipping module: {module_id}. {e}");
            }
            ChangeSet {
                module_id,
                actions: Vec::new(),
                errors,
                error_count: 1,
                skipped: true,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Per-tracker accumulator shared by the reconcilers.

use std::collections::HashSet;

use rmbridge_core::{ObjectId, TrackerSnapshot};
use rmbridge_model::{Element, ElementKind, ModelQuery};

use crate::find::{FindError, Finder};

/// Identifier of the types folder below a module.
pub(crate) const TYPES_FOLDER_IDENTIFIER: &str = "-2";
pub(crate) const TYPES_FOLDER_NAME: &str = "Types";

/// State owned by one tracker's change-set calculation.
pub(crate) struct TrackerContext<'m, 's> {
    pub finder: Finder<'m>,
    pub tracker: &'s TrackerSnapshot,
    pub module: &'m Element,
    pub types_folder: Option<&'m Element>,
    /// Attribute definition promises that could not be created.
    pub faulty_promises: HashSet<String>,
    /// Enum values of data types queued for deletion.
    pub invalid_enum_values: HashSet<ObjectId>,
    /// Attribute definitions queued for deletion, replaced ones included.
    pub dropped_definitions: HashSet<ObjectId>,
    module_id: &'s str,
    gather_logs: bool,
    errors: Vec<String>,
    error_count: usize,
}

impl<'m, 's> TrackerContext<'m, 's> {
    pub fn new(
        finder: Finder<'m>,
        tracker: &'s TrackerSnapshot,
        module_id: &'s str,
        module: &'m Element,
        types_folder: Option<&'m Element>,
        gather_logs: bool,
    ) -> Self {
        Self {
            finder,
            tracker,
            module,
            types_folder,
            faulty_promises: HashSet::new(),
            invalid_enum_values: HashSet::new(),
            dropped_definitions: HashSet::new(),
            module_id,
            gather_logs,
            errors: Vec::new(),
            error_count: 0,
        }
    }

    pub fn model(&self) -> &'m dyn ModelQuery {
        self.finder.model()
    }

    pub fn types_folder_id(&self) -> Option<&'m ObjectId> {
        self.types_folder.map(|tf| &tf.uuid)
    }

    /// Data type definition below the types folder.
    pub fn data_type(&self, name: &str) -> Result<Option<&'m Element>, FindError> {
        match self.types_folder {
            Some(tf) => self.finder.data_type(name, &tf.uuid),
            None => Ok(None),
        }
    }

    pub fn requirement_type(&self, identifier: &str) -> Result<Option<&'m Element>, FindError> {
        match self.types_folder {
            Some(tf) => self.finder.requirement_type(identifier, &tf.uuid),
            None => Ok(None),
        }
    }

    pub fn attribute_definition(
        &self,
        kind: ElementKind,
        identifier: &str,
    ) -> Result<Option<&'m Element>, FindError> {
        match self.types_folder {
            Some(tf) => self.finder.attribute_definition(kind, identifier, &tf.uuid),
            None => Ok(None),
        }
    }

    /// Record a recoverable error: gathered, or logged right away.
    pub fn report(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.error_count += 1;
        if self.gather_logs {
            self.errors.push(format!("{}: {message}", self.module_id));
        } else {
            tracing::error!("Invalid module '{}'. {message}", self.module_id);
        }
    }

    /// Number of errors seen so far, gathered or logged.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_errors(self) -> (Vec<String>, usize) {
        (self.errors, self.error_count)
    }
}

//! Object Finder: the single place model lookups by key happen.

use std::collections::HashMap;

use rmbridge_core::{ItemKind, ObjectId};
use rmbridge_model::{Element, ElementKind, ModelQuery};
use thiserror::Error;

/// The element attribute a lookup matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKey {
    Identifier,
    Uuid,
    LongName,
}

impl MatchKey {
    fn name(self) -> &'static str {
        match self {
            MatchKey::Identifier => "identifier",
            MatchKey::Uuid => "uuid",
            MatchKey::LongName => "long_name",
        }
    }

    fn matches(self, element: &Element, value: &str) -> bool {
        match self {
            MatchKey::Identifier => element.identifier == value,
            MatchKey::Uuid => element.uuid.0 == value,
            MatchKey::LongName => element.long_name == value,
        }
    }
}

/// More than one object matched a key that must be unique.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Ambiguous {kinds} lookup: {count} objects with {key} '{value}'")]
pub struct FindError {
    pub kinds: String,
    pub key: &'static str,
    pub value: String,
    pub count: usize,
}

/// Read-only lookups against a model.
///
/// Folders and requirements are indexed by identifier once; the model must
/// not change while a finder is alive.
#[derive(Clone)]
pub struct Finder<'m> {
    model: &'m dyn ModelQuery,
    work_items: HashMap<&'m str, Vec<&'m Element>>,
}

impl<'m> Finder<'m> {
    pub fn new(model: &'m dyn ModelQuery) -> Self {
        let mut work_items: HashMap<&'m str, Vec<&'m Element>> = HashMap::new();
        for element in model.search(&ElementKind::WORK_ITEMS, None) {
            work_items
                .entry(element.identifier.as_str())
                .or_default()
                .push(element);
        }
        Self { model, work_items }
    }

    pub fn model(&self) -> &'m dyn ModelQuery {
        self.model
    }

    /// The unique object of one of `kinds` whose `key` equals `value`,
    /// searched below `below` (or the whole model).
    ///
    /// Zero matches is `Ok(None)`; several matches is an error.
    pub fn find(
        &self,
        kinds: &[ElementKind],
        key: MatchKey,
        value: &str,
        below: Option<&ObjectId>,
    ) -> Result<Option<&'m Element>, FindError> {
        let indexed = key == MatchKey::Identifier
            && below.is_none()
            && kinds.iter().all(|k| ElementKind::WORK_ITEMS.contains(k));
        let matches: Vec<&'m Element> = if indexed {
            self.work_items
                .get(value)
                .into_iter()
                .flatten()
                .copied()
                .filter(|e| kinds.contains(&e.kind()))
                .collect()
        } else if key == MatchKey::Uuid {
            self.model
                .get(&ObjectId::from(value))
                .filter(|e| kinds.contains(&e.kind()))
                .filter(|e| below.map_or(true, |root| self.is_below(e, root)))
                .into_iter()
                .collect()
        } else {
            self.model
                .search(kinds, below)
                .into_iter()
                .filter(|e| key.matches(e, value))
                .collect()
        };

        match matches.as_slice() {
            [] => {
                tracing::debug!(
                    "No {} found with {}: '{}'",
                    kind_names(kinds),
                    key.name(),
                    value
                );
                Ok(None)
            }
            [single] => Ok(Some(*single)),
            many => Err(FindError {
                kinds: kind_names(kinds),
                key: key.name(),
                value: value.to_owned(),
                count: many.len(),
            }),
        }
    }

    pub fn module(&self, uuid: &ObjectId) -> Result<Option<&'m Element>, FindError> {
        self.find(&[ElementKind::Module], MatchKey::Uuid, &uuid.0, None)
    }

    pub fn types_folder(
        &self,
        identifier: &str,
        module: &ObjectId,
    ) -> Result<Option<&'m Element>, FindError> {
        self.find(
            &[ElementKind::TypesFolder],
            MatchKey::Identifier,
            identifier,
            Some(module),
        )
    }

    /// A folder or requirement anywhere in the model; both share one
    /// identifier namespace, the snapshot item's shape picks the kind.
    pub fn work_item(
        &self,
        kind: ItemKind,
        identifier: &str,
    ) -> Result<Option<&'m Element>, FindError> {
        let kind = match kind {
            ItemKind::Folder => ElementKind::Folder,
            ItemKind::Requirement => ElementKind::Requirement,
        };
        self.find(&[kind], MatchKey::Identifier, identifier, None)
    }

    pub fn requirement_type(
        &self,
        identifier: &str,
        below: &ObjectId,
    ) -> Result<Option<&'m Element>, FindError> {
        self.find(
            &[ElementKind::RequirementType],
            MatchKey::Identifier,
            identifier,
            Some(below),
        )
    }

    /// Data type by identifier, falling back to its long name.
    pub fn data_type(
        &self,
        name: &str,
        below: &ObjectId,
    ) -> Result<Option<&'m Element>, FindError> {
        let kinds = [ElementKind::DataTypeDefinition];
        match self.find(&kinds, MatchKey::Identifier, name, Some(below))? {
            Some(found) => Ok(Some(found)),
            None => self.find(&kinds, MatchKey::LongName, name, Some(below)),
        }
    }

    pub fn enum_value(
        &self,
        long_name: &str,
        data_type: &ObjectId,
    ) -> Result<Option<&'m Element>, FindError> {
        self.find(
            &[ElementKind::EnumValue],
            MatchKey::LongName,
            long_name,
            Some(data_type),
        )
    }

    pub fn attribute_definition(
        &self,
        kind: ElementKind,
        identifier: &str,
        below: &ObjectId,
    ) -> Result<Option<&'m Element>, FindError> {
        self.find(&[kind], MatchKey::Identifier, identifier, Some(below))
    }

    fn is_below(&self, element: &Element, root: &ObjectId) -> bool {
        let mut cursor = element.parent.as_ref();
        while let Some(parent) = cursor {
            if parent == root {
                return true;
            }
            cursor = self.model.get(parent).and_then(|p| p.parent.as_ref());
        }
        false
    }
}

fn kind_names(kinds: &[ElementKind]) -> String {
    kinds
        .iter()
        .map(ElementKind::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! In-memory model arena.
//!
//! Elements live in an insertion-ordered map keyed by uuid; each element
//! keeps the ordered uuids of its children so traversal follows document
//! order. [`ModelQuery`] is the read-only view the compiler works against.

use indexmap::IndexMap;
use rmbridge_core::ObjectId;

use crate::element::{Element, ElementKind};
use crate::error::ModelError;

/// Read access to a requirements model.
pub trait ModelQuery {
    /// Look up one object by uuid.
    fn get(&self, id: &ObjectId) -> Option<&Element>;

    /// Direct children of `parent` of the given kind, in order.
    fn children(&self, parent: &ObjectId, kind: ElementKind) -> Vec<&Element>;

    /// Pre-order descendants of `below` (or of every root) whose kind is in
    /// `kinds`. `below` itself is not included.
    fn search(&self, kinds: &[ElementKind], below: Option<&ObjectId>) -> Vec<&Element>;
}

/// The model arena.
#[derive(Debug, Clone, Default)]
pub struct Model {
    elements: IndexMap<ObjectId, Element>,
    roots: Vec<ObjectId>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = &Element> {
        self.roots.iter().filter_map(|id| self.elements.get(id))
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.elements.contains_key(id)
    }

    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }

    /// Insert `element` as the last child of `parent` (or as a root).
    pub fn insert(
        &mut self,
        parent: Option<&ObjectId>,
        mut element: Element,
    ) -> Result<ObjectId, ModelError> {
        if self.elements.contains_key(&element.uuid) {
            return Err(ModelError::DuplicateUuid(element.uuid));
        }
        let id = element.uuid.clone();
        element.parent = parent.cloned();
        element.children.clear();
        match parent {
            Some(parent_id) => self
                .elements
                .get_mut(parent_id)
                .ok_or_else(|| ModelError::UnknownObject(parent_id.clone()))?
                .children
                .push(id.clone()),
            None => self.roots.push(id.clone()),
        }
        self.elements.insert(id.clone(), element);
        Ok(id)
    }

    /// Remove an element and its whole subtree; returns the number removed.
    pub fn remove(&mut self, id: &ObjectId) -> Result<usize, ModelError> {
        if !self.elements.contains_key(id) {
            return Err(ModelError::UnknownObject(id.clone()));
        }
        self.detach(id);
        let mut stack = vec![id.clone()];
        let mut removed = 0;
        while let Some(next) = stack.pop() {
            if let Some(element) = self.elements.shift_remove(&next) {
                stack.extend(element.children);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Re-parent `id` as the last child of `new_parent`.
    pub fn move_to(&mut self, id: &ObjectId, new_parent: &ObjectId) -> Result<(), ModelError> {
        if !self.elements.contains_key(id) {
            return Err(ModelError::UnknownObject(id.clone()));
        }
        if !self.elements.contains_key(new_parent) {
            return Err(ModelError::UnknownObject(new_parent.clone()));
        }
        if self.is_same_or_ancestor(id, new_parent) {
            return Err(ModelError::Cycle(id.clone()));
        }
        self.detach(id);
        if let Some(parent) = self.elements.get_mut(new_parent) {
            parent.children.push(id.clone());
        }
        if let Some(element) = self.elements.get_mut(id) {
            element.parent = Some(new_parent.clone());
        }
        Ok(())
    }

    /// All elements in pre-order document order.
    pub fn iter_preorder(&self) -> Vec<&Element> {
        let mut out = Vec::with_capacity(self.elements.len());
        for root in &self.roots {
            self.collect_preorder(root, &mut out);
        }
        out
    }

    fn collect_preorder<'a>(&'a self, id: &ObjectId, out: &mut Vec<&'a Element>) {
        if let Some(element) = self.elements.get(id) {
            out.push(element);
            for child in &element.children {
                self.collect_preorder(child, out);
            }
        }
    }

    fn detach(&mut self, id: &ObjectId) {
        let parent = self.elements.get(id).and_then(|e| e.parent.clone());
        match parent.and_then(|p| self.elements.get_mut(&p)) {
            Some(parent) => parent.children.retain(|c| c != id),
            None => self.roots.retain(|c| c != id),
        }
    }

    fn is_same_or_ancestor(&self, candidate: &ObjectId, of: &ObjectId) -> bool {
        let mut cursor = Some(of.clone());
        while let Some(current) = cursor {
            if &current == candidate {
                return true;
            }
            cursor = self.elements.get(&current).and_then(|e| e.parent.clone());
        }
        false
    }
}

impl ModelQuery for Model {
    fn get(&self, id: &ObjectId) -> Option<&Element> {
        self.elements.get(id)
    }

    fn children(&self, parent: &ObjectId, kind: ElementKind) -> Vec<&Element> {
        let Some(parent) = self.elements.get(parent) else {
            return Vec::new();
        };
        parent
            .children
            .iter()
            .filter_map(|id| self.elements.get(id))
            .filter(|e| e.kind() == kind)
            .collect()
    }

    fn search(&self, kinds: &[ElementKind], below: Option<&ObjectId>) -> Vec<&Element> {
        let mut visited = Vec::new();
        match below {
            Some(root) => {
                if let Some(element) = self.elements.get(root) {
                    for child in &element.children {
                        self.collect_preorder(child, &mut visited);
                    }
                }
            }
            None => {
                for root in &self.roots {
                    self.collect_preorder(root, &mut visited);
                }
            }
        }
        visited.retain(|e| kinds.contains(&e.kind()));
        visited
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

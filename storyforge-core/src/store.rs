//! Requirement Store
//!
//! Ordered, value-semantics collection of requirements. Every lifecycle
//! operation borrows the current list and returns a new one, leaving the
//! original untouched so callers can compare old and new values.

use crate::models::{Requirement, RequirementId, RequirementStatus};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by lifecycle operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Requirement not found: {0}")]
    RequirementNotFound(RequirementId),

    #[error("No non-empty lines to add")]
    NothingToAdd,

    #[error("Split needs at least one derived requirement")]
    EmptySplit,
}

/// Splits raw text into trimmed, non-empty lines
fn non_empty_lines(raw: &str) -> Vec<&str> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Ordered list of requirements plus the id counter that produced them.
///
/// Only built through [`RequirementList::new`] and the lifecycle operations,
/// so `next_id` is always above every id in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementList {
    requirements: Vec<Requirement>,
    next_id: u64,
}

impl Default for RequirementList {
    fn default() -> Self {
        Self::new()
    }
}

impl RequirementList {
    /// Creates an empty list
    pub fn new() -> Self {
        Self {
            requirements: Vec::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter()
    }

    pub fn as_slice(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Gets a requirement by ID
    pub fn get(&self, id: RequirementId) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == id)
    }

    /// Zero-based position of a requirement in the list
    pub fn position(&self, id: RequirementId) -> Option<usize> {
        self.requirements.iter().position(|r| r.id == id)
    }

    pub fn contains(&self, id: RequirementId) -> bool {
        self.position(id).is_some()
    }

    /// Approved requirements in list order
    pub fn approved(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(|r| r.is_approved())
    }

    /// Requirements split off from `id`
    pub fn children_of(&self, id: RequirementId) -> impl Iterator<Item = &Requirement> {
        self.requirements
            .iter()
            .filter(move |r| r.derived_from == Some(id))
    }

    /// Resolves the back-reference of a derived requirement.
    ///
    /// Returns `None` when the requirement has no parent or the parent was
    /// removed after the split.
    pub fn parent_of(&self, id: RequirementId) -> Option<&Requirement> {
        let parent_id = self.get(id)?.derived_from?;
        self.get(parent_id)
    }

    /// One-based display position of the parent, as in "derived from #2"
    pub fn parent_ordinal(&self, id: RequirementId) -> Option<usize> {
        let parent_id = self.get(id)?.derived_from?;
        self.position(parent_id).map(|idx| idx + 1)
    }

    fn allocate_id(&mut self) -> RequirementId {
        let id = RequirementId(self.next_id);
        self.next_id += 1;
        id
    }

    fn with_updated<F>(&self, id: RequirementId, update: F) -> Result<Self, StoreError>
    where
        F: FnOnce(&mut Requirement),
    {
        let mut next = self.clone();
        let req = next
            .requirements
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::RequirementNotFound(id))?;
        update(req);
        Ok(next)
    }

    /// Adds one pending requirement per non-empty line of `raw_text`
    pub fn intake(&self, raw_text: &str) -> Result<Self, StoreError> {
        let lines = non_empty_lines(raw_text);
        if lines.is_empty() {
            return Err(StoreError::NothingToAdd);
        }

        let mut next = self.clone();
        for line in lines {
            let id = next.allocate_id();
            next.requirements.push(Requirement::new(id, line));
        }
        debug!(added = next.len() - self.len(), "Intake appended requirements");
        Ok(next)
    }

    /// Replaces the text of a requirement and marks it edited
    pub fn edit(&self, id: RequirementId, new_text: &str) -> Result<Self, StoreError> {
        self.with_updated(id, |req| {
            req.text = new_text.to_string();
            req.status = RequirementStatus::Edited;
        })
    }

    /// Rewrites a requirement and appends the derived lines at the tail.
    ///
    /// The list is left as-is when `derived_lines` has no non-empty line.
    pub fn split(
        &self,
        id: RequirementId,
        edited_base_text: &str,
        derived_lines: &str,
    ) -> Result<Self, StoreError> {
        let lines = non_empty_lines(derived_lines);
        if lines.is_empty() {
            return Err(StoreError::EmptySplit);
        }

        let mut next = self.edit(id, edited_base_text)?;
        for line in lines {
            let child_id = next.allocate_id();
            next.requirements
                .push(Requirement::derived(child_id, line, id));
        }
        debug!(%id, derived = next.len() - self.len(), "Split requirement");
        Ok(next)
    }

    /// Marks a requirement approved. Unknown ids leave the list unchanged.
    pub fn approve(&self, id: RequirementId) -> Self {
        match self.with_updated(id, |req| req.status = RequirementStatus::Approved) {
            Ok(next) => next,
            Err(_) => {
                warn!(%id, "Approve ignored: requirement not found");
                self.clone()
            }
        }
    }

    /// Removes a requirement. Derived children keep their back-reference.
    pub fn remove(&self, id: RequirementId) -> Self {
        if !self.contains(id) {
            warn!(%id, "Remove ignored: requirement not found");
            return self.clone();
        }

        let mut next = self.clone();
        next.requirements.retain(|r| r.id != id);
        next
    }
}

impl<'a> IntoIterator for &'a RequirementList {
    type Item = &'a Requirement;
    type IntoIter = std::slice::Iter<'a, Requirement>;

    fn into_iter(self) -> Self::IntoIter {
        self.requirements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(list: &RequirementList) -> Vec<&str> {
        list.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_intake_trims_and_skips_blank_lines() {
        let list = RequirementList::new().intake("a\n\nb \n  ").unwrap();

        assert_eq!(texts(&list), vec!["a", "b"]);
        assert!(list
            .iter()
            .all(|r| r.status == RequirementStatus::Pending));
    }

    #[test]
    fn test_intake_appends_in_rounds() {
        let first = RequirementList::new().intake("uno\r\ndos").unwrap();
        let second = first.intake("tres").unwrap();

        assert_eq!(texts(&first), vec!["uno", "dos"]);
        assert_eq!(texts(&second), vec!["uno", "dos", "tres"]);
    }

    #[test]
    fn test_intake_assigns_unique_increasing_ids() {
        let list = RequirementList::new()
            .intake("a\nb")
            .unwrap()
            .intake("c")
            .unwrap();
        let ids: Vec<u64> = list.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_intake_rejects_blank_input() {
        let list = RequirementList::new();
        assert_eq!(list.intake(" \n\t\n"), Err(StoreError::NothingToAdd));
    }

    #[test]
    fn test_ids_are_not_reused_after_remove() {
        let list = RequirementList::new().intake("a\nb").unwrap();
        let last = list.as_slice()[1].id;
        let list = list.remove(last).intake("c").unwrap();
        assert_ne!(list.as_slice()[1].id, last);
    }

    #[test]
    fn test_ids_stay_unique_across_lifecycle() {
        let list = RequirementList::new().intake("a\nb\nc").unwrap();
        let ids: Vec<RequirementId> = list.iter().map(|r| r.id).collect();
        let list = list
            .split(ids[0], "a1", "a2\na3")
            .unwrap()
            .remove(ids[2])
            .intake("d\ne")
            .unwrap();

        let mut seen = std::collections::HashSet::new();
        for req in &list {
            assert!(seen.insert(req.id), "duplicate id {}", req.id);
            assert!(req.id > ids[2] || ids.contains(&req.id));
        }
        assert_eq!(list.len(), 6);
    }

    #[test]
    fn test_edit_downgrades_approved() {
        let list = RequirementList::new().intake("old text").unwrap();
        let id = list.as_slice()[0].id;
        let approved = list.approve(id);
        assert_eq!(approved.get(id).unwrap().status, RequirementStatus::Approved);

        let edited = approved.edit(id, "new text").unwrap();
        let req = edited.get(id).unwrap();
        assert_eq!(req.text, "new text");
        assert_eq!(req.status, RequirementStatus::Edited);

        // previous value is untouched
        assert_eq!(approved.get(id).unwrap().text, "old text");
    }

    #[test]
    fn test_edit_unknown_id() {
        let list = RequirementList::new().intake("a").unwrap();
        assert_eq!(
            list.edit(RequirementId(99), "x"),
            Err(StoreError::RequirementNotFound(RequirementId(99)))
        );
    }

    #[test]
    fn test_split_appends_derived_at_tail() {
        let list = RequirementList::new().intake("x\ny").unwrap();
        let x = list.as_slice()[0].id;

        let split = list.split(x, "base", "d1\nd2").unwrap();

        assert_eq!(texts(&split), vec!["base", "y", "d1", "d2"]);
        let base = split.get(x).unwrap();
        assert_eq!(base.status, RequirementStatus::Edited);

        let children: Vec<&Requirement> = split.children_of(x).collect();
        assert_eq!(children.len(), 2);
        for child in children {
            assert_eq!(child.status, RequirementStatus::Derived);
            assert_eq!(child.derived_from, Some(x));
        }
    }

    #[test]
    fn test_split_with_blank_lines_is_rejected() {
        let list = RequirementList::new().intake("x").unwrap();
        let x = list.as_slice()[0].id;
        let before = list.clone();

        assert_eq!(list.split(x, "base", "   \n  "), Err(StoreError::EmptySplit));
        assert_eq!(list, before);
    }

    #[test]
    fn test_split_unknown_id() {
        let list = RequirementList::new().intake("x").unwrap();
        assert_eq!(
            list.split(RequirementId(42), "base", "d1"),
            Err(StoreError::RequirementNotFound(RequirementId(42)))
        );
    }

    #[test]
    fn test_approve_is_idempotent() {
        let list = RequirementList::new().intake("a").unwrap();
        let id = list.as_slice()[0].id;
        let once = list.approve(id);
        let twice = once.approve(id);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_approve_unknown_id_is_noop() {
        let list = RequirementList::new().intake("a").unwrap();
        assert_eq!(list.approve(RequirementId(99)), list);
    }

    #[test]
    fn test_remove_keeps_dangling_children() {
        let list = RequirementList::new().intake("parent\nother").unwrap();
        let parent = list.as_slice()[0].id;
        let list = list.split(parent, "parent", "child").unwrap();
        let child = list.as_slice()[2].id;
        assert_eq!(list.parent_ordinal(child), Some(1));

        let list = list.remove(parent);

        assert!(!list.contains(parent));
        assert_eq!(list.get(child).unwrap().derived_from, Some(parent));
        assert!(list.parent_of(child).is_none());
        assert!(list.parent_ordinal(child).is_none());
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let list = RequirementList::new().intake("a").unwrap();
        assert_eq!(list.remove(RequirementId(5)), list);
    }

    #[test]
    fn test_parent_ordinal_follows_position() {
        let list = RequirementList::new().intake("a\nb").unwrap();
        let b = list.as_slice()[1].id;
        let list = list.split(b, "b", "b1").unwrap();
        let b1 = list.as_slice()[2].id;
        assert_eq!(list.parent_ordinal(b1), Some(2));

        let a = list.as_slice()[0].id;
        let list = list.remove(a);
        assert_eq!(list.parent_ordinal(b1), Some(1));
        assert_eq!(list.parent_of(b1).map(|r| r.text.as_str()), Some("b"));
    }

    #[test]
    fn test_approved_filters_in_order() {
        let list = RequirementList::new().intake("a\nb\nc").unwrap();
        let ids: Vec<RequirementId> = list.iter().map(|r| r.id).collect();
        let list = list.approve(ids[2]).approve(ids[0]);

        let approved: Vec<&str> = list.approved().map(|r| r.text.as_str()).collect();
        assert_eq!(approved, vec!["a", "c"]);
    }
}

use emberlink_schema::{ElementKind, SchemaRef};

use crate::element::{Element, ElementId};
use crate::error::{Result, TreeError};
use crate::state::RequestState;

/// Something observable about an element changed during the last unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    Value(ElementId),
    Online(ElementId),
    Description(ElementId),
    /// The node's live children view gained or lost an entry.
    Children(ElementId),
}

impl Change {
    pub fn element(&self) -> ElementId {
        match *self {
            Change::Value(id)
            | Change::Online(id)
            | Change::Description(id)
            | Change::Children(id) => id,
        }
    }
}

/// Arena owning every element of one mirrored provider tree.
///
/// Elements are never removed; an [`ElementId`] stays valid for the lifetime
/// of the tree it came from.
#[derive(Debug, Clone)]
pub struct Tree {
    elements: Vec<Element>,
    changes: Vec<Change>,
}

impl Tree {
    pub const ROOT: ElementId = ElementId(0);

    pub fn new() -> Self {
        let root = Element::new(0, String::new(), None, SchemaRef::ROOT, ElementKind::Node);
        Self {
            elements: vec![root],
            changes: Vec::new(),
        }
    }

    pub fn root(&self) -> ElementId {
        Self::ROOT
    }

    /// Number of elements, including the root and offline elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if nothing but the root is known.
    pub fn is_empty(&self) -> bool {
        self.elements.len() == 1
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.index())
    }

    pub fn state(&self, id: ElementId) -> RequestState {
        self.get(id).map_or(RequestState::None, Element::state)
    }

    /// Attach an application value to an element.
    pub fn set_tag(&mut self, id: ElementId, tag: Option<u64>) -> bool {
        match self.elements.get_mut(id.index()) {
            Some(element) => {
                element.tag = tag;
                true
            }
            None => false,
        }
    }

    /// All known children of a node, online or not, in ascending number order.
    pub fn children(&self, id: ElementId) -> Vec<ElementId> {
        self.get(id)
            .and_then(Element::as_node)
            .map(|node| node.children().collect())
            .unwrap_or_default()
    }

    /// Children that are online and have been verified, in ascending number order.
    pub fn live_children(&self, id: ElementId) -> Vec<ElementId> {
        let Some(node) = self.get(id).and_then(Element::as_node) else {
            return Vec::new();
        };
        node.live
            .iter()
            .filter_map(|number| node.child(*number))
            .collect()
    }

    pub fn child_by_number(&self, parent: ElementId, number: u32) -> Option<ElementId> {
        self.get(parent)?.as_node()?.child(number)
    }

    /// Resolve a `/`-separated identifier path over live children.
    ///
    /// The empty path (or `/`) is the root.
    pub fn find(&self, path: &str) -> Option<ElementId> {
        let mut current = Self::ROOT;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self
                .live_children(current)
                .into_iter()
                .find(|id| self.elements[id.index()].identifier == segment)?;
        }
        Some(current)
    }

    /// Resolve a numeric path over all known children.
    pub fn find_by_numbers(&self, path: &[u32]) -> Option<ElementId> {
        path.iter()
            .try_fold(Self::ROOT, |id, number| self.child_by_number(id, *number))
    }

    /// Identifier path of an element, e.g. `Mixer/Channel 1/Gain`. The root is `""`.
    pub fn path_of(&self, id: ElementId) -> String {
        let mut segments: Vec<&str> = self
            .ancestry(id)
            .map(|element| element.identifier.as_str())
            .collect();
        segments.reverse();
        segments.join("/")
    }

    /// Numeric path of an element as used by qualified Glow records.
    pub fn number_path(&self, id: ElementId) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.ancestry(id).map(|element| element.number).collect();
        numbers.reverse();
        numbers
    }

    /// Take the changes recorded since the last call, in the order they happened.
    pub fn drain_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    pub(crate) fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.index()]
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.index()]
    }

    pub(crate) fn insert(&mut self, parent: ElementId, element: Element) -> Result<ElementId> {
        let id = element_id(self.elements.len())?;
        let number = element.number;
        self.elements.push(element);
        if let Some(node) = self.element_mut(parent).node_mut() {
            node.children.insert(number, id);
        }
        Ok(id)
    }

    pub(crate) fn record(&mut self, change: Change) {
        if !self.changes.contains(&change) {
            self.changes.push(change);
        }
    }

    // Elements from `id` up to, but excluding, the root.
    fn ancestry(&self, id: ElementId) -> impl Iterator<Item = &Element> + '_ {
        std::iter::successors(self.get(id), |element| {
            element.parent.and_then(|parent| self.get(parent))
        })
        .filter(|element| element.parent.is_some())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

fn element_id(index: usize) -> Result<ElementId> {
    u32::try_from(index)
        .map(ElementId)
        .map_err(|_| TreeError::TooManyElements { max: u32::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(tree: &mut Tree, parent: ElementId, number: u32, identifier: &str, kind: ElementKind) -> ElementId {
        let element = Element::new(
            number,
            identifier.to_string(),
            Some(parent),
            SchemaRef::UNCONSTRAINED,
            kind,
        );
        tree.insert(parent, element).unwrap()
    }

    fn make_live(tree: &mut Tree, parent: ElementId, number: u32) {
        tree.element_mut(parent).node_mut().unwrap().live.insert(number);
    }

    #[test]
    fn paths_are_rendered_from_the_root() {
        let mut tree = Tree::new();
        let mixer = add(&mut tree, Tree::ROOT, 1, "Mixer", ElementKind::Node);
        let gain = add(&mut tree, mixer, 7, "Gain", ElementKind::Parameter);

        assert_eq!(tree.path_of(gain), "Mixer/Gain");
        assert_eq!(tree.number_path(gain), vec![1, 7]);
        assert_eq!(tree.path_of(Tree::ROOT), "");
        assert!(tree.number_path(Tree::ROOT).is_empty());
        assert_eq!(tree.find_by_numbers(&[1, 7]), Some(gain));
        assert_eq!(tree.find_by_numbers(&[1, 8]), None);
    }

    #[test]
    fn find_only_walks_live_children() {
        let mut tree = Tree::new();
        let mixer = add(&mut tree, Tree::ROOT, 1, "Mixer", ElementKind::Node);
        let gain = add(&mut tree, mixer, 2, "Gain", ElementKind::Parameter);

        assert_eq!(tree.find("Mixer/Gain"), None);
        make_live(&mut tree, Tree::ROOT, 1);
        make_live(&mut tree, mixer, 2);
        assert_eq!(tree.find("Mixer/Gain"), Some(gain));
        assert_eq!(tree.find("/Mixer/"), Some(mixer));
        assert_eq!(tree.find(""), Some(Tree::ROOT));
        assert_eq!(tree.children(mixer), vec![gain]);
    }

    #[test]
    fn children_are_ordered_by_number() {
        let mut tree = Tree::new();
        let b = add(&mut tree, Tree::ROOT, 9, "b", ElementKind::Parameter);
        let a = add(&mut tree, Tree::ROOT, 3, "a", ElementKind::Parameter);
        assert_eq!(tree.children(Tree::ROOT), vec![a, b]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn changes_are_deduplicated_and_drained() {
        let mut tree = Tree::new();
        let id = add(&mut tree, Tree::ROOT, 1, "x", ElementKind::Parameter);
        tree.record(Change::Value(id));
        tree.record(Change::Online(id));
        tree.record(Change::Value(id));

        assert_eq!(tree.drain_changes(), vec![Change::Value(id), Change::Online(id)]);
        assert!(tree.drain_changes().is_empty());
    }

    #[test]
    fn tags_are_stored_per_element() {
        let mut tree = Tree::new();
        let id = add(&mut tree, Tree::ROOT, 1, "x", ElementKind::Function);
        assert!(tree.set_tag(id, Some(42)));
        assert_eq!(tree.get(id).unwrap().tag(), Some(42));
        assert!(!tree.set_tag(ElementId(99), Some(1)));
    }

    #[test]
    fn element_ids_are_bounded_by_u32() {
        assert_eq!(element_id(7).unwrap(), ElementId(7));
        assert_eq!(element_id(u32::MAX as usize).unwrap(), ElementId(u32::MAX));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn arena_overflow_is_an_error() {
        let index = u32::MAX as usize + 1;
        assert!(matches!(
            element_id(index),
            Err(TreeError::TooManyElements { max: u32::MAX })
        ));
    }
}

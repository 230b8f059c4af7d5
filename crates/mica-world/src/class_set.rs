//! The subtype DAG.
//!
//! A `ClassSet` extends a hierarchy node with the *foreign* subtype roots:
//! nodes whose class implements but does not extend the set's class
//! (including the mixin-application-as-subtype edge). The two domains are
//! disjoint by construction, so a subtype traversal is simply the subclass
//! traversal followed by each foreign root's subclass traversal, with no
//! deduplication needed.

use mica_common::ids::ClassId;

use crate::hierarchy::{HierarchyArena, Instantiation, IterationStep, NodeId, SubclassIter};

/// Is `node` inside the subclass subtree rooted at `root`?
fn tree_contains(arena: &HierarchyArena, root: NodeId, node: NodeId) -> bool {
    let root_depth = arena.node(root).depth();
    let mut current = Some(node);
    while let Some(id) = current {
        let n = arena.node(id);
        if n.depth() < root_depth {
            return false;
        }
        if id == root {
            return true;
        }
        current = n.parent();
    }
    false
}

#[derive(Debug)]
pub struct ClassSet {
    node: NodeId,
    /// Foreign subtype roots, in registration order.
    subtypes: Vec<NodeId>,
}

impl ClassSet {
    pub fn new(node: NodeId) -> Self {
        ClassSet {
            node,
            subtypes: Vec::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn foreign_subtypes(&self) -> &[NodeId] {
        &self.subtypes
    }

    /// Record a foreign subtype root. The root list is kept as an antichain
    /// of the subclass tree: nodes already covered (by the set's own subtree
    /// or an existing root) are skipped, and a new root subsumes any
    /// existing roots inside its subtree. This is what makes subtype
    /// traversals duplicate-free without a deduplication set.
    pub fn add_subtype(&mut self, node: NodeId, arena: &HierarchyArena) {
        if tree_contains(arena, self.node, node) {
            return;
        }
        let mut remaining = Vec::with_capacity(self.subtypes.len() + 1);
        for &other in &self.subtypes {
            if other == node || tree_contains(arena, other, node) {
                return;
            }
            if tree_contains(arena, node, other) {
                continue;
            }
            remaining.push(other);
        }
        remaining.push(node);
        self.subtypes = remaining;
    }

    /// Lazy traversal over all subtypes matching `mask`: the subclass
    /// subtree first, then each foreign root's subtree in registration
    /// order. `strict` excludes only the set's own class.
    pub fn subtypes_by_mask<'a>(
        &'a self,
        arena: &'a HierarchyArena,
        mask: Instantiation,
        strict: bool,
    ) -> SubtypeIter<'a> {
        SubtypeIter {
            arena,
            mask,
            inner: arena.subclasses_by_mask(self.node, mask, strict),
            pending: self.subtypes.iter(),
        }
    }

    /// Pre-order traversal over the full subtype set with caller-controlled
    /// pruning, mirroring the subclass walk.
    pub fn for_each_subtype(
        &self,
        arena: &HierarchyArena,
        mask: Instantiation,
        strict: bool,
        f: &mut dyn FnMut(ClassId) -> IterationStep,
    ) -> IterationStep {
        if arena.for_each_subclass(self.node, mask, strict, f) == IterationStep::Stop {
            return IterationStep::Stop;
        }
        for &root in &self.subtypes {
            if arena.for_each_subclass(root, mask, false, f) == IterationStep::Stop {
                return IterationStep::Stop;
            }
        }
        IterationStep::Continue
    }

    pub fn any_subtype(
        &self,
        arena: &HierarchyArena,
        mask: Instantiation,
        strict: bool,
        predicate: &mut dyn FnMut(ClassId) -> bool,
    ) -> bool {
        let mut found = false;
        self.for_each_subtype(arena, mask, strict, &mut |cls| {
            if predicate(cls) {
                found = true;
                IterationStep::Stop
            } else {
                IterationStep::Continue
            }
        });
        found
    }

    /// Directly-instantiated subtypes, including the class itself.
    pub fn instantiated_subtype_count(&self, arena: &HierarchyArena) -> u32 {
        let node = arena.node(self.node);
        let mut count = node.instantiated_subclass_count()
            + if node.is_directly_instantiated() { 1 } else { 0 };
        for &root in &self.subtypes {
            let n = arena.node(root);
            count += n.instantiated_subclass_count() + if n.is_directly_instantiated() { 1 } else { 0 };
        }
        count
    }

    /// True when no foreign subtype is instantiated: every live subtype of
    /// the class is also a subclass of it.
    pub fn has_only_instantiated_subclasses(&self, arena: &HierarchyArena) -> bool {
        self.subtypes.iter().all(|&root| !arena.node(root).is_instantiated())
    }

    /// The dominator walk of the subclass tree, generalized to the subtype
    /// traversal: a live foreign root is an immediate split, so the walk
    /// stops at the set's own class.
    pub fn lub_of_instantiated_subtypes(&self, arena: &HierarchyArena) -> Option<ClassId> {
        if self
            .subtypes
            .iter()
            .any(|&root| arena.node(root).is_instantiated())
        {
            return Some(arena.node(self.node).cls());
        }
        arena.lub_of_instantiated_subclasses(self.node)
    }
}

/// See `ClassSet::subtypes_by_mask`.
pub struct SubtypeIter<'a> {
    arena: &'a HierarchyArena,
    mask: Instantiation,
    inner: SubclassIter<'a>,
    pending: std::slice::Iter<'a, NodeId>,
}

impl<'a> SubtypeIter<'a> {
    /// An iterator that yields nothing, for queries on unregistered classes.
    pub(crate) fn empty(arena: &'a HierarchyArena) -> Self {
        const NO_ROOTS: &[NodeId] = &[];
        SubtypeIter {
            arena,
            mask: Instantiation::ALL,
            inner: arena.empty_subclasses(),
            pending: NO_ROOTS.iter(),
        }
    }
}

impl Iterator for SubtypeIter<'_> {
    type Item = ClassId;

    fn next(&mut self) -> Option<ClassId> {
        loop {
            if let Some(cls) = self.inner.next() {
                return Some(cls);
            }
            let &root = self.pending.next()?;
            self.inner = self.arena.subclasses_by_mask(root, self.mask, false);
        }
    }
}

#[cfg(test)]
#[path = "tests/class_set_tests.rs"]
mod tests;

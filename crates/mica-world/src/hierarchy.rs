//! The subclass tree.
//!
//! One `ClassHierarchyNode` per registered class, arena-backed and linked to
//! its superclass node. Child lists preserve insertion order; traversal order
//! is observable downstream (code generation iterates these), so a hash-set
//! backing is not acceptable here.

use bitflags::bitflags;
use mica_common::ids::ClassId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::db::ElementDatabase;

/// Index of a node in the `HierarchyArena`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

bitflags! {
    /// Instantiation state of a node, doubling as a traversal filter.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Instantiation: u8 {
        const DIRECTLY_INSTANTIATED = 1 << 0;
        const INDIRECTLY_INSTANTIATED = 1 << 1;
        const UNINSTANTIATED = 1 << 2;
    }
}

impl Instantiation {
    pub const ALL: Instantiation = Instantiation::all();
}

/// Control value returned by traversal callbacks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IterationStep {
    Continue,
    /// Prune the current node's subtree but keep walking its siblings.
    SkipSubclasses,
    /// Abort the whole walk.
    Stop,
}

/// Per-class node of the subclass tree.
#[derive(Debug)]
pub struct ClassHierarchyNode {
    cls: ClassId,
    parent: Option<NodeId>,
    depth: u32,
    directly_instantiated: bool,
    /// Number of strict descendants that are directly instantiated.
    indirectly_instantiated_count: u32,
    children: SmallVec<[NodeId; 4]>,
}

impl ClassHierarchyNode {
    pub fn cls(&self) -> ClassId {
        self.cls
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_directly_instantiated(&self) -> bool {
        self.directly_instantiated
    }

    pub fn is_indirectly_instantiated(&self) -> bool {
        self.indirectly_instantiated_count > 0
    }

    pub fn is_instantiated(&self) -> bool {
        self.directly_instantiated || self.indirectly_instantiated_count > 0
    }

    /// Directly-instantiated strict descendants. By the counter invariant
    /// this is exactly `indirectly_instantiated_count`.
    pub fn instantiated_subclass_count(&self) -> u32 {
        self.indirectly_instantiated_count
    }

    pub fn instantiation(&self) -> Instantiation {
        if self.directly_instantiated {
            Instantiation::DIRECTLY_INSTANTIATED
        } else if self.indirectly_instantiated_count > 0 {
            Instantiation::INDIRECTLY_INSTANTIATED
        } else {
            Instantiation::UNINSTANTIATED
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Owner of all hierarchy nodes. Node ids are stable for the lifetime of the
/// arena; nodes are created once and never removed.
#[derive(Default)]
pub struct HierarchyArena {
    nodes: Vec<ClassHierarchyNode>,
    by_class: FxHashMap<ClassId, NodeId>,
}

impl HierarchyArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> &ClassHierarchyNode {
        &self.nodes[id.0 as usize]
    }

    /// Node for an already-canonicalized class handle.
    pub fn node_for(&self, cls: ClassId) -> Option<NodeId> {
        self.by_class.get(&cls).copied()
    }

    /// All nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ClassHierarchyNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get or create the node for `cls`, creating the superclass chain up to
    /// the root first. New nodes are appended to their parent's child list,
    /// preserving registration order.
    pub fn ensure_node(&mut self, cls: ClassId, db: &dyn ElementDatabase) -> NodeId {
        let cls = db.class_declaration(cls);
        if let Some(&id) = self.by_class.get(&cls) {
            return id;
        }
        let parent = db.superclass(cls).map(|superclass| self.ensure_node(superclass, db));
        let depth = db.hierarchy_depth(cls);
        let id = NodeId(self.nodes.len() as u32);
        if let Some(parent) = parent {
            debug_assert!(self.node(parent).depth < depth);
            self.nodes[parent.0 as usize].children.push(id);
        }
        self.nodes.push(ClassHierarchyNode {
            cls,
            parent,
            depth,
            directly_instantiated: false,
            indirectly_instantiated_count: 0,
            children: SmallVec::new(),
        });
        self.by_class.insert(cls, id);
        id
    }

    /// Mark a node directly instantiated and bump the indirect counter of
    /// every strict ancestor. Idempotent: a second call is a no-op, which
    /// keeps the counter invariant intact.
    pub fn mark_directly_instantiated(&mut self, id: NodeId) -> bool {
        if self.nodes[id.0 as usize].directly_instantiated {
            return false;
        }
        self.nodes[id.0 as usize].directly_instantiated = true;
        let mut parent = self.nodes[id.0 as usize].parent;
        while let Some(p) = parent {
            self.nodes[p.0 as usize].indirectly_instantiated_count += 1;
            parent = self.nodes[p.0 as usize].parent;
        }
        true
    }

    /// Lazy pre-order walk over the subtree rooted at `root`, yielding the
    /// classes whose instantiation state intersects `mask`. `strict`
    /// excludes the root itself. The sequence is finite and non-restartable.
    pub fn subclasses_by_mask(
        &self,
        root: NodeId,
        mask: Instantiation,
        strict: bool,
    ) -> SubclassIter<'_> {
        SubclassIter {
            arena: self,
            mask,
            stack: vec![root],
            skip_next: strict,
        }
    }

    /// An iterator that yields nothing, for queries on unregistered classes.
    pub fn empty_subclasses(&self) -> SubclassIter<'_> {
        SubclassIter {
            arena: self,
            mask: Instantiation::ALL,
            stack: Vec::new(),
            skip_next: false,
        }
    }

    /// Pre-order traversal with caller-controlled pruning. The callback is
    /// only invoked for nodes matching `mask`, but pruning decisions apply
    /// to the whole subtree of the visited node.
    pub fn for_each_subclass(
        &self,
        root: NodeId,
        mask: Instantiation,
        strict: bool,
        f: &mut dyn FnMut(ClassId) -> IterationStep,
    ) -> IterationStep {
        self.for_each_impl(root, mask, !strict, f)
    }

    fn for_each_impl(
        &self,
        id: NodeId,
        mask: Instantiation,
        include_self: bool,
        f: &mut dyn FnMut(ClassId) -> IterationStep,
    ) -> IterationStep {
        let node = self.node(id);
        if include_self && mask.intersects(node.instantiation()) {
            match f(node.cls) {
                IterationStep::Stop => return IterationStep::Stop,
                IterationStep::SkipSubclasses => return IterationStep::Continue,
                IterationStep::Continue => {}
            }
        }
        for &child in node.children() {
            if self.for_each_impl(child, mask, true, f) == IterationStep::Stop {
                return IterationStep::Stop;
            }
        }
        IterationStep::Continue
    }

    /// Short-circuiting existence check over the same traversal.
    pub fn any_subclass(
        &self,
        root: NodeId,
        mask: Instantiation,
        strict: bool,
        predicate: &mut dyn FnMut(ClassId) -> bool,
    ) -> bool {
        let mut found = false;
        self.for_each_subclass(root, mask, strict, &mut |cls| {
            if predicate(cls) {
                found = true;
                IterationStep::Stop
            } else {
                IterationStep::Continue
            }
        });
        found
    }

    /// The most specific ancestor-or-self dominating every directly
    /// instantiated descendant: walk down through the unique live child
    /// until a split or a directly instantiated node is reached. None when
    /// no descendant is instantiated.
    pub fn lub_of_instantiated_subclasses(&self, root: NodeId) -> Option<ClassId> {
        if !self.node(root).is_instantiated() {
            return None;
        }
        let mut current = root;
        loop {
            let node = self.node(current);
            if node.is_directly_instantiated() {
                return Some(node.cls);
            }
            let mut live_child = None;
            let mut live_count = 0;
            for &child in node.children() {
                if self.node(child).is_instantiated() {
                    live_count += 1;
                    live_child = Some(child);
                }
            }
            match (live_count, live_child) {
                (1, Some(child)) => current = child,
                _ => return Some(node.cls),
            }
        }
    }

    /// Deterministic plain-text rendering of the subtree rooted at `id`,
    /// one class per line, children indented one space per tree level.
    pub fn print_on(
        &self,
        id: NodeId,
        out: &mut String,
        level: usize,
        instantiated_only: bool,
        related: Option<&dyn Fn(ClassId) -> bool>,
        db: &dyn ElementDatabase,
    ) {
        let node = self.node(id);
        let included = related.map_or(true, |related| related(node.cls));
        if included && (!instantiated_only || node.is_instantiated()) {
            for _ in 0..level {
                out.push(' ');
            }
            out.push_str(&db.class_name(node.cls));
            if node.is_directly_instantiated() {
                out.push_str(" (directly instantiated)");
            } else if node.is_indirectly_instantiated() {
                out.push_str(" (indirectly instantiated)");
            }
            out.push('\n');
        }
        for &child in node.children() {
            self.print_on(child, out, level + 1, instantiated_only, related, db);
        }
    }
}

/// See `HierarchyArena::subclasses_by_mask`.
pub struct SubclassIter<'a> {
    arena: &'a HierarchyArena,
    mask: Instantiation,
    stack: Vec<NodeId>,
    skip_next: bool,
}

impl Iterator for SubclassIter<'_> {
    type Item = ClassId;

    fn next(&mut self) -> Option<ClassId> {
        while let Some(id) = self.stack.pop() {
            let node = self.arena.node(id);
            for &child in node.children().iter().rev() {
                self.stack.push(child);
            }
            let skip = std::mem::take(&mut self.skip_next);
            if !skip && self.mask.intersects(node.instantiation()) {
                return Some(node.cls());
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "tests/hierarchy_tests.rs"]
mod tests;

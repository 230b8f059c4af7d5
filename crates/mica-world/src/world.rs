//! The class-world façade.
//!
//! The resolver registers classes, typedefs, mixin uses, and used elements
//! against the open world; `close()` stamps instantiation facts into the
//! hierarchy and freezes the structural indices. After that, the back end
//! asks hierarchy, mixin, devirtualization, and side-effect questions
//! against a stable snapshot.
//!
//! The only structural mutation admitted after the phase transition is
//! `register_closure_class`: closure classes are synthesized while the IR is
//! built, long after resolution ends. The side-effect registries also stay
//! writable; type inference refines them against the closed hierarchy.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexSet;
use mica_common::ids::{ClassId, ElementId, TypedefId};
use mica_common::{CompilerOptions, Reporter};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::class_set::{ClassSet, SubtypeIter};
use crate::db::{Backend, CoreClasses, ElementDatabase, OrderedTypeSet, ResolverWorld};
use crate::error::WorldError;
use crate::function_set::FunctionSet;
use crate::hierarchy::{ClassHierarchyNode, HierarchyArena, Instantiation, NodeId, SubclassIter};
use crate::mask::{Selector, TypeMask};
use crate::mixins::MixinIndex;
use crate::side_effects::{SideEffectRegistry, SideEffects};

/// Flag-indexed canonicalization slots owned by the mask lattice.
const MASK_CACHE_SLOTS: usize = 8;

pub struct World {
    db: Rc<dyn ElementDatabase>,
    backend: Rc<dyn Backend>,
    resolver: Rc<dyn ResolverWorld>,
    reporter: Rc<dyn Reporter>,
    core: CoreClasses,
    options: CompilerOptions,
    dynamic_mask: Rc<dyn TypeMask>,

    closed: bool,
    hierarchy: HierarchyArena,
    class_sets: FxHashMap<ClassId, ClassSet>,
    typedefs: IndexSet<TypedefId>,
    mixin_index: MixinIndex,
    function_set: FunctionSet,
    side_effects: SideEffectRegistry,
    /// For each strict superclass of an instantiated class, everything the
    /// instantiated class implements. Built during `close()`.
    types_implemented_by_subclasses: FxHashMap<ClassId, IndexSet<ClassId>>,
    /// Live mixin uses, derived once on first access after close.
    live_mixin_uses: RefCell<Option<FxHashMap<ClassId, Vec<ClassId>>>>,
    /// Memo for `every_subtype_is_subclass_of_or_mixin_use_of`; entries are
    /// installed on first query and never evicted.
    subtype_coverage_cache: RefCell<FxHashMap<ClassId, FxHashMap<ClassId, bool>>>,
    /// Guards repeated `close()` population under incremental compilation.
    already_populated: FxHashSet<ClassId>,
    /// Storage for the mask lattice's canonicalization cache; opaque to the
    /// world itself.
    pub canonicalized_type_masks:
        [RefCell<FxHashMap<ClassId, Rc<dyn TypeMask>>>; MASK_CACHE_SLOTS],
}

impl World {
    pub fn new(
        db: Rc<dyn ElementDatabase>,
        backend: Rc<dyn Backend>,
        resolver: Rc<dyn ResolverWorld>,
        reporter: Rc<dyn Reporter>,
        core: CoreClasses,
        options: CompilerOptions,
        dynamic_mask: Rc<dyn TypeMask>,
    ) -> Self {
        World {
            db,
            backend,
            resolver,
            reporter,
            core,
            options,
            dynamic_mask,
            closed: false,
            hierarchy: HierarchyArena::new(),
            class_sets: FxHashMap::default(),
            typedefs: IndexSet::new(),
            mixin_index: MixinIndex::new(),
            function_set: FunctionSet::new(),
            side_effects: SideEffectRegistry::new(),
            types_implemented_by_subclasses: FxHashMap::default(),
            live_mixin_uses: RefCell::new(None),
            subtype_coverage_cache: RefCell::new(FxHashMap::default()),
            already_populated: FxHashSet::default(),
            canonicalized_type_masks: std::array::from_fn(|_| RefCell::new(FxHashMap::default())),
        }
    }

    pub fn database(&self) -> &dyn ElementDatabase {
        self.db.as_ref()
    }

    pub fn core_classes(&self) -> &CoreClasses {
        &self.core
    }

    pub fn dynamic_mask(&self) -> &Rc<dyn TypeMask> {
        &self.dynamic_mask
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// False under incremental compilation: the world can still be closed,
    /// but consumers must not rely on exhaustiveness.
    pub fn has_closed_world_assumption(&self) -> bool {
        !self.options.has_incremental_support
    }

    #[inline]
    fn assert_closed(&self) {
        assert!(self.closed, "closed-world query on an open world");
    }

    fn node_for(&self, cls: ClassId) -> Option<NodeId> {
        self.hierarchy.node_for(self.db.class_declaration(cls))
    }

    // ------------------------------------------------------------------
    // Open-world interface.
    // ------------------------------------------------------------------

    /// Ensure the hierarchy node and class set for `cls`. Does not mark the
    /// class instantiated.
    pub fn register_class(&mut self, cls: ClassId) {
        assert!(!self.closed, "class registered on a closed world");
        self.ensure_class_set(cls);
    }

    /// Register a closure class and mark it directly instantiated. Closure
    /// classes are synthesized during IR construction, so this is valid on
    /// a closed world as well.
    pub fn register_closure_class(&mut self, cls: ClassId) {
        debug!(?cls, "registering closure class");
        self.add_directly_instantiated(cls);
    }

    pub fn register_typedef(&mut self, typedef: TypedefId) {
        assert!(!self.closed, "typedef registered on a closed world");
        self.typedefs.insert(typedef);
    }

    /// Concrete instance members become candidates for dynamic dispatch.
    pub fn register_used_element(&mut self, element: ElementId) {
        let element = self.db.element_declaration(element);
        if self.db.is_instance_member(element) && !self.db.is_abstract(element) {
            self.function_set.add(self.db.element_name(element), element);
        }
    }

    pub fn register_mixin_use(&mut self, application: ClassId, mixin: ClassId) {
        assert!(!self.closed, "mixin use registered on a closed world");
        // Patched classes are not supported as mixins.
        assert!(
            self.db.is_class_declaration(mixin),
            "mixin handles must be declarations"
        );
        let application = self.db.class_declaration(application);
        self.mixin_index.register_use(application, mixin);
    }

    /// Freeze the structural indices and stamp instantiation facts from the
    /// resolver's directly-instantiated set. A second call fails.
    pub fn close(&mut self) -> Result<(), WorldError> {
        if self.closed {
            return Err(WorldError::AlreadyClosed);
        }
        let classes = self.resolver.directly_instantiated_classes();
        debug!(count = classes.len(), "closing the class world");
        for cls in classes {
            let decl = self.db.class_declaration(cls);
            if self.options.has_incremental_support && !self.already_populated.insert(decl) {
                continue;
            }
            if !self.db.is_class_declaration(cls) || !self.db.is_class_resolved(decl) {
                let name = self.db.class_name(decl);
                self.reporter
                    .internal_error(Some(decl), &format!("class `{name}` is not resolved"));
            }
            self.add_directly_instantiated(decl);
        }
        self.register_callable_classes();
        self.closed = true;
        Ok(())
    }

    /// Get or create the class set for `cls`, wiring the class into the
    /// subtype DAG: every strict supertype's set learns about this node as a
    /// foreign subtype (the set itself drops nodes already reachable through
    /// the subclass tree).
    fn ensure_class_set(&mut self, cls: ClassId) -> NodeId {
        let db = Rc::clone(&self.db);
        let cls = db.class_declaration(cls);
        if let Some(set) = self.class_sets.get(&cls) {
            return set.node();
        }
        let node = self.hierarchy.ensure_node(cls, db.as_ref());
        self.class_sets.insert(cls, ClassSet::new(node));
        let supertypes = db.ordered_supertypes(cls);
        for supertype in supertypes.supertypes() {
            let supertype = db.class_declaration(supertype);
            self.ensure_class_set(supertype);
            let hierarchy = &self.hierarchy;
            if let Some(set) = self.class_sets.get_mut(&supertype) {
                set.add_subtype(node, hierarchy);
            }
        }
        node
    }

    /// Steps 1c-1e of the phase transition, shared with post-close closure
    /// registration: mark the node, propagate the indirect counters, and
    /// record what the class implements on each strict superclass.
    fn add_directly_instantiated(&mut self, cls: ClassId) {
        let db = Rc::clone(&self.db);
        let decl = db.class_declaration(cls);
        let node = self.ensure_class_set(decl);
        if !self.hierarchy.mark_directly_instantiated(node) {
            return;
        }
        trace!(?decl, "directly instantiated");
        let supertypes = db.ordered_supertypes(decl);
        let mut superclass = db.superclass(decl).map(|s| db.class_declaration(s));
        while let Some(current) = superclass {
            let implemented = self
                .types_implemented_by_subclasses
                .entry(current)
                .or_default();
            for supertype in supertypes.supertypes() {
                implemented.insert(db.class_declaration(supertype));
            }
            superclass = db.superclass(current).map(|s| db.class_declaration(s));
        }
    }

    /// Classes with a synthetic `call` method are structurally functions:
    /// wire them into `Function`'s class set as foreign subtypes.
    fn register_callable_classes(&mut self) {
        let db = Rc::clone(&self.db);
        let callable: Vec<NodeId> = self
            .hierarchy
            .iter()
            .filter(|(_, node)| db.has_call_type(node.cls()))
            .map(|(id, _)| id)
            .collect();
        if callable.is_empty() {
            return;
        }
        let function_class = db.class_declaration(self.core.function_class);
        self.ensure_class_set(function_class);
        let hierarchy = &self.hierarchy;
        if let Some(set) = self.class_sets.get_mut(&function_class) {
            for node in callable {
                set.add_subtype(node, hierarchy);
            }
        }
    }

    // ------------------------------------------------------------------
    // Class-world interface: instantiation.
    // ------------------------------------------------------------------

    pub fn is_directly_instantiated(&self, cls: ClassId) -> bool {
        self.assert_closed();
        self.node_for(cls)
            .is_some_and(|node| self.hierarchy.node(node).is_directly_instantiated())
    }

    pub fn is_indirectly_instantiated(&self, cls: ClassId) -> bool {
        self.assert_closed();
        self.node_for(cls)
            .is_some_and(|node| self.hierarchy.node(node).is_indirectly_instantiated())
    }

    pub fn is_instantiated(&self, cls: ClassId) -> bool {
        self.assert_closed();
        self.node_for(cls)
            .is_some_and(|node| self.hierarchy.node(node).is_instantiated())
    }

    pub fn is_implemented(&self, cls: ClassId) -> bool {
        self.assert_closed();
        self.resolver.is_implemented(self.db.class_declaration(cls))
    }

    // ------------------------------------------------------------------
    // Class-world interface: subclass and subtype relations.
    // ------------------------------------------------------------------

    pub fn is_subclass_of(&self, x: ClassId, y: ClassId) -> bool {
        self.assert_closed();
        let db = self.db.as_ref();
        let x = db.class_declaration(x);
        let y = db.class_declaration(y);
        if y == self.core.object_class {
            return true;
        }
        if x == self.core.object_class {
            return false;
        }
        let y_depth = db.hierarchy_depth(y);
        let mut current = Some(x);
        while let Some(cls) = current {
            if db.hierarchy_depth(cls) < y_depth {
                return false;
            }
            if cls == y {
                return true;
            }
            current = db.superclass(cls).map(|s| db.class_declaration(s));
        }
        false
    }

    pub fn is_subtype_of(&self, x: ClassId, y: ClassId) -> bool {
        self.assert_closed();
        let db = self.db.as_ref();
        let x = db.class_declaration(x);
        let y = db.class_declaration(y);
        if y == self.core.object_class {
            return true;
        }
        if x == self.core.object_class {
            return false;
        }
        if db.ordered_supertypes(x).contains(y) {
            return true;
        }
        // Structural function types: a class with a call method is a
        // subtype of `Function` without declaring it.
        y == self.core.function_class && db.has_call_type(x)
    }

    /// Directly-instantiated subclasses of `cls`, including `cls` itself
    /// when it is directly instantiated. Empty for unregistered classes.
    pub fn subclasses_of(&self, cls: ClassId) -> SubclassIter<'_> {
        self.assert_closed();
        match self.node_for(cls) {
            Some(node) => {
                self.hierarchy
                    .subclasses_by_mask(node, Instantiation::DIRECTLY_INSTANTIATED, false)
            }
            None => self.hierarchy.empty_subclasses(),
        }
    }

    pub fn strict_subclasses_of(&self, cls: ClassId) -> SubclassIter<'_> {
        self.assert_closed();
        match self.node_for(cls) {
            Some(node) => {
                self.hierarchy
                    .subclasses_by_mask(node, Instantiation::DIRECTLY_INSTANTIATED, true)
            }
            None => self.hierarchy.empty_subclasses(),
        }
    }

    pub fn strict_subclass_count(&self, cls: ClassId) -> u32 {
        self.assert_closed();
        self.node_for(cls)
            .map_or(0, |node| self.hierarchy.node(node).instantiated_subclass_count())
    }

    pub fn has_any_strict_subclass(&self, cls: ClassId) -> bool {
        self.strict_subclass_count(cls) > 0
    }

    /// Directly-instantiated subtypes of `cls`: the subclass traversal
    /// followed by every foreign subtype root's traversal.
    pub fn subtypes_of(&self, cls: ClassId) -> SubtypeIter<'_> {
        self.assert_closed();
        match self.class_sets.get(&self.db.class_declaration(cls)) {
            Some(set) => {
                set.subtypes_by_mask(&self.hierarchy, Instantiation::DIRECTLY_INSTANTIATED, false)
            }
            None => SubtypeIter::empty(&self.hierarchy),
        }
    }

    pub fn strict_subtypes_of(&self, cls: ClassId) -> SubtypeIter<'_> {
        self.assert_closed();
        match self.class_sets.get(&self.db.class_declaration(cls)) {
            Some(set) => {
                set.subtypes_by_mask(&self.hierarchy, Instantiation::DIRECTLY_INSTANTIATED, true)
            }
            None => SubtypeIter::empty(&self.hierarchy),
        }
    }

    pub fn strict_subtype_count(&self, cls: ClassId) -> u32 {
        self.assert_closed();
        match self.class_sets.get(&self.db.class_declaration(cls)) {
            Some(set) => {
                let total = set.instantiated_subtype_count(&self.hierarchy);
                let own = self.hierarchy.node(set.node()).is_directly_instantiated();
                total - if own { 1 } else { 0 }
            }
            None => 0,
        }
    }

    pub fn has_any_strict_subtype(&self, cls: ClassId) -> bool {
        self.strict_subtype_count(cls) > 0
    }

    /// True when every live subtype of `cls` is also a subclass of it.
    pub fn has_only_subclasses(&self, cls: ClassId) -> bool {
        self.assert_closed();
        match self.class_sets.get(&self.db.class_declaration(cls)) {
            Some(set) => set.has_only_instantiated_subclasses(&self.hierarchy),
            None => true,
        }
    }

    pub fn have_any_common_subtypes(&self, a: ClassId, b: ClassId) -> bool {
        self.assert_closed();
        let set_a = self.class_sets.get(&self.db.class_declaration(a));
        let set_b = self.class_sets.get(&self.db.class_declaration(b));
        let (Some(set_a), Some(set_b)) = (set_a, set_b) else {
            return false;
        };
        let count_a = set_a.instantiated_subtype_count(&self.hierarchy);
        let count_b = set_b.instantiated_subtype_count(&self.hierarchy);
        if count_a == 0 || count_b == 0 {
            return false;
        }
        // Materialize the smaller side and probe with the other traversal.
        let (small, large) = if count_a <= count_b {
            (set_a, set_b)
        } else {
            (set_b, set_a)
        };
        let probe: FxHashSet<ClassId> = small
            .subtypes_by_mask(&self.hierarchy, Instantiation::DIRECTLY_INSTANTIATED, false)
            .collect();
        large
            .subtypes_by_mask(&self.hierarchy, Instantiation::DIRECTLY_INSTANTIATED, false)
            .any(|cls| probe.contains(&cls))
    }

    /// The supertypes shared by all input classes, most specific first,
    /// terminated by the root class. Empty input yields an empty list.
    pub fn common_supertypes_of(&self, classes: &[ClassId]) -> Vec<ClassId> {
        self.assert_closed();
        let db = self.db.as_ref();
        let Some((&first, rest)) = classes.split_first() else {
            return Vec::new();
        };
        let first_set = db.ordered_supertypes(db.class_declaration(first));
        if rest.is_empty() {
            return first_set.iter_from(first_set.max_depth()).collect();
        }
        let other_sets: Vec<Rc<OrderedTypeSet>> = rest
            .iter()
            .map(|&cls| db.ordered_supertypes(db.class_declaration(cls)))
            .collect();
        let mut depth = first_set.max_depth();
        for set in &other_sets {
            depth = depth.min(set.max_depth());
        }
        let object = self.core.object_class;
        let mut common = Vec::new();
        for candidate in first_set.iter_from(depth) {
            if candidate == object {
                break;
            }
            if other_sets.iter().all(|set| set.contains(candidate)) {
                common.push(candidate);
            }
        }
        common.push(object);
        common
    }

    /// Memoized: does every live subtype of `x` extend `y` or sit below a
    /// mixin application of `y`?
    pub fn every_subtype_is_subclass_of_or_mixin_use_of(&self, x: ClassId, y: ClassId) -> bool {
        self.assert_closed();
        let x = self.db.class_declaration(x);
        let y = self.db.class_declaration(y);
        if let Some(cached) = self
            .subtype_coverage_cache
            .borrow()
            .get(&x)
            .and_then(|inner| inner.get(&y))
            .copied()
        {
            return cached;
        }
        let result = self
            .subtypes_of(x)
            .all(|cls| self.is_subclass_of(cls, y) || self.is_subclass_of_mixin_use_of(cls, y));
        self.subtype_coverage_cache
            .borrow_mut()
            .entry(x)
            .or_default()
            .insert(y, result);
        result
    }

    /// Lookup in the table built during `close()`.
    pub fn has_any_subclass_that_implements(&self, superclass: ClassId, ty: ClassId) -> bool {
        self.assert_closed();
        self.types_implemented_by_subclasses
            .get(&self.db.class_declaration(superclass))
            .is_some_and(|types| types.contains(&self.db.class_declaration(ty)))
    }

    // ------------------------------------------------------------------
    // Class-world interface: least upper bounds.
    // ------------------------------------------------------------------

    pub fn get_lub_of_instantiated_subclasses(&self, cls: ClassId) -> Option<ClassId> {
        self.assert_closed();
        if self.backend.is_js_interop(cls) {
            return Some(self.backend.host_object_class());
        }
        self.node_for(cls)
            .and_then(|node| self.hierarchy.lub_of_instantiated_subclasses(node))
    }

    pub fn get_lub_of_instantiated_subtypes(&self, cls: ClassId) -> Option<ClassId> {
        self.assert_closed();
        if self.backend.is_js_interop(cls) {
            return Some(self.backend.host_object_class());
        }
        self.class_sets
            .get(&self.db.class_declaration(cls))
            .and_then(|set| set.lub_of_instantiated_subtypes(&self.hierarchy))
    }

    // ------------------------------------------------------------------
    // Class-world interface: mixins.
    // ------------------------------------------------------------------

    /// All recorded applications of `mixin`, live or not.
    pub fn all_mixin_uses_of(&self, mixin: ClassId) -> Vec<ClassId> {
        self.mixin_index
            .all_uses_of(self.db.class_declaration(mixin))
            .collect()
    }

    /// Live applications of `mixin`: instantiated applications, found
    /// transitively through named mixin applications. Using a named mixin
    /// application `C = S with M` as a mixin is equivalent to mixing `M`,
    /// so `C`'s uses are discoverable from `M`.
    pub fn mixin_uses_of(&self, mixin: ClassId) -> Vec<ClassId> {
        self.assert_closed();
        self.ensure_live_mixin_uses();
        let mixin = self.db.class_declaration(mixin);
        self.live_mixin_uses
            .borrow()
            .as_ref()
            .and_then(|live| live.get(&mixin))
            .cloned()
            .unwrap_or_default()
    }

    fn ensure_live_mixin_uses(&self) {
        if self.live_mixin_uses.borrow().is_some() {
            return;
        }
        let mut live: FxHashMap<ClassId, Vec<ClassId>> = FxHashMap::default();
        for (mixin, applications) in self.mixin_index.iter() {
            let mut uses = Vec::new();
            for &application in applications {
                self.collect_live_uses(application, &mut uses);
            }
            if !uses.is_empty() {
                live.insert(mixin, uses);
            }
        }
        *self.live_mixin_uses.borrow_mut() = Some(live);
    }

    fn collect_live_uses(&self, application: ClassId, out: &mut Vec<ClassId>) {
        let application = self.db.class_declaration(application);
        let instantiated = self
            .hierarchy
            .node_for(application)
            .is_some_and(|node| self.hierarchy.node(node).is_instantiated());
        if instantiated {
            out.push(application);
        }
        if self.db.is_named_mixin_application(application) {
            for use_of_application in self.mixin_index.all_uses_of(application) {
                self.collect_live_uses(use_of_application, out);
            }
        }
    }

    /// Does `cls` or one of its superclasses mix `mixin` in?
    pub fn is_subclass_of_mixin_use_of(&self, cls: ClassId, mixin: ClassId) -> bool {
        self.assert_closed();
        let db = self.db.as_ref();
        let mixin = db.class_declaration(mixin);
        if !self.mixin_index.is_used_as_mixin(mixin) {
            return false;
        }
        let mut current = Some(db.class_declaration(cls));
        while let Some(candidate) = current {
            if db.is_mixin_application(candidate) {
                if let Some(m) = db.mixin_of(candidate) {
                    if db.class_declaration(m) == mixin {
                        return true;
                    }
                }
            }
            current = db.superclass(candidate).map(|s| db.class_declaration(s));
        }
        false
    }

    pub fn has_any_subclass_that_mixes(&self, superclass: ClassId, mixin: ClassId) -> bool {
        self.assert_closed();
        self.mixin_uses_of(mixin)
            .iter()
            .any(|&application| self.is_subclass_of(application, superclass))
    }

    pub fn has_any_subclass_of_mixin_use_that_implements(
        &self,
        cls: ClassId,
        ty: ClassId,
    ) -> bool {
        self.assert_closed();
        self.mixin_uses_of(cls)
            .iter()
            .any(|&mixin_use| self.has_any_subclass_that_implements(mixin_use, ty))
    }

    // ------------------------------------------------------------------
    // Class-world interface: devirtualization.
    // ------------------------------------------------------------------

    /// The unique target of `selector` on receivers in `mask`, or None on a
    /// miss or ambiguity. A missing mask is the dynamic (top) mask.
    pub fn locate_single_element(
        &self,
        selector: &Selector,
        mask: Option<&dyn TypeMask>,
    ) -> Option<ElementId> {
        self.assert_closed();
        mask.unwrap_or(self.dynamic_mask.as_ref())
            .locate_single_element(selector, self)
    }

    pub fn locate_single_field(
        &self,
        selector: &Selector,
        mask: Option<&dyn TypeMask>,
    ) -> Option<ElementId> {
        self.locate_single_element(selector, mask)
            .filter(|&element| self.db.is_field(element))
    }

    /// Broaden `mask` to the dynamic top when reflective invocation could
    /// route the call through `noSuchMethod` handling.
    pub fn extend_mask_if_reaches_all(
        &self,
        selector: &Selector,
        mask: Option<Rc<dyn TypeMask>>,
    ) -> Rc<dyn TypeMask> {
        self.assert_closed();
        match mask {
            None => Rc::clone(&self.dynamic_mask),
            Some(mask) => {
                if self.options.enable_invoke_on
                    && mask.needs_no_such_method_handling(selector, self)
                {
                    Rc::clone(&self.dynamic_mask)
                } else {
                    mask
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Class-world interface: side effects of call sites.
    // ------------------------------------------------------------------

    /// Union of the side effects of every member `selector` can reach
    /// through `mask`. Closure calls are not tracked and report no effects.
    pub fn get_side_effects_of_selector(
        &self,
        selector: &Selector,
        mask: Option<&dyn TypeMask>,
    ) -> SideEffects {
        self.assert_closed();
        if selector.is_closure_call() {
            return SideEffects::empty();
        }
        let db = self.db.as_ref();
        let mut effects = SideEffects::empty();
        for element in self.function_set.filter(selector, mask, self) {
            if db.is_field(element) {
                if selector.is_getter() {
                    if !self.field_never_changes(element) {
                        effects |= SideEffects::DEPENDS_ON_INSTANCE_PROPERTY_STORE;
                    }
                } else if selector.is_setter() {
                    effects |= SideEffects::CHANGES_INSTANCE_PROPERTY;
                } else {
                    // A field invoked as a function: the stored closure is
                    // unknown, so assume everything.
                    debug_assert!(selector.is_call());
                    effects |= SideEffects::all();
                }
            } else {
                effects |= self.side_effects.currently_known_side_effects(element, db);
            }
        }
        effects
    }

    /// A field that is provably never written after initialization. Native
    /// fields always report false: they may alias changing host state.
    pub fn field_never_changes(&self, element: ElementId) -> bool {
        let db = self.db.as_ref();
        let element = db.element_declaration(element);
        if !db.is_field(element) {
            return false;
        }
        if self.backend.is_native_member(element) {
            return false;
        }
        if db.is_final(element) || db.is_const(element) {
            return true;
        }
        if db.is_instance_member(element) {
            return !self.resolver.has_invoked_setter(element, self)
                && !self.resolver.has_field_setter(element);
        }
        false
    }

    // ------------------------------------------------------------------
    // Closed-world-refiner interface.
    // ------------------------------------------------------------------

    pub fn register_side_effects(&mut self, element: ElementId, effects: SideEffects) {
        self.side_effects
            .register_side_effects(element, effects, self.db.as_ref());
    }

    pub fn register_side_effects_free(&mut self, element: ElementId) {
        self.side_effects
            .register_side_effects_free(element, self.db.as_ref());
    }

    pub fn get_side_effects_of_element(&mut self, element: ElementId) -> SideEffects {
        self.side_effects.side_effects_of(element, self.db.as_ref())
    }

    pub fn get_currently_known_side_effects(&self, element: ElementId) -> SideEffects {
        self.side_effects
            .currently_known_side_effects(element, self.db.as_ref())
    }

    pub fn register_cannot_throw(&mut self, element: ElementId) {
        self.side_effects
            .register_cannot_throw(element, self.db.as_ref());
    }

    pub fn get_cannot_throw(&self, element: ElementId) -> bool {
        self.side_effects.cannot_throw(element, self.db.as_ref())
    }

    pub fn add_function_called_in_loop(&mut self, element: ElementId) {
        self.side_effects
            .add_called_in_loop(element, self.db.as_ref());
    }

    pub fn is_called_in_loop(&self, element: ElementId) -> bool {
        self.side_effects
            .is_called_in_loop(element, self.db.as_ref())
    }

    pub fn register_might_be_passed_to_apply(&mut self, element: ElementId) {
        self.side_effects
            .register_might_be_passed_to_apply(element, self.db.as_ref());
    }

    pub fn get_might_be_passed_to_apply(&self, element: ElementId) -> bool {
        self.side_effects
            .might_be_passed_to_apply(element, self.db.as_ref())
    }

    pub fn get_currently_known_might_be_passed_to_apply(&self, element: ElementId) -> bool {
        self.side_effects
            .currently_known_might_be_passed_to_apply(element, self.db.as_ref())
    }

    // ------------------------------------------------------------------
    // Introspection.
    // ------------------------------------------------------------------

    /// Test-only accessor for the raw hierarchy node.
    pub fn class_hierarchy_node(&self, cls: ClassId) -> Option<&ClassHierarchyNode> {
        self.node_for(cls).map(|node| self.hierarchy.node(node))
    }

    /// Test-only accessor for the raw class set.
    pub fn class_set(&self, cls: ClassId) -> Option<&ClassSet> {
        self.class_sets.get(&self.db.class_declaration(cls))
    }

    /// Test-only accessor for the node arena backing both indices.
    pub fn hierarchy(&self) -> &HierarchyArena {
        &self.hierarchy
    }

    /// Function-set membership, for registration round-trip checks.
    pub fn function_set(&self) -> &FunctionSet {
        &self.function_set
    }

    pub fn all_typedefs(&self) -> impl Iterator<Item = TypedefId> + '_ {
        self.typedefs.iter().copied()
    }

    /// Deterministic plain-text rendering of the closed world: either all
    /// instantiated classes, or the classes related to `cls`.
    pub fn dump(&self, cls: Option<ClassId>) -> String {
        self.assert_closed();
        let db = self.db.as_ref();
        let mut out = String::new();
        match cls {
            Some(cls) => {
                let decl = db.class_declaration(cls);
                out.push_str(&format!(
                    "Classes in the closed world related to {}:\n",
                    db.class_name(decl)
                ));
                if let Some(root) = self.node_for(self.core.object_class) {
                    let related = |other: ClassId| {
                        other == decl
                            || self.is_subtype_of(other, decl)
                            || self.is_subtype_of(decl, other)
                    };
                    self.hierarchy
                        .print_on(root, &mut out, 0, false, Some(&related), db);
                }
            }
            None => {
                out.push_str("Instantiated classes in the closed world:\n");
                if let Some(root) = self.node_for(self.core.object_class) {
                    self.hierarchy.print_on(root, &mut out, 0, true, None, db);
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "tests/world_tests.rs"]
mod tests;

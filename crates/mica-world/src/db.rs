//! Element database abstraction for the class world.
//!
//! The resolver owns all class and element facts; the world reads them
//! through this trait so the engine never depends on concrete front-end
//! storage. Everything here is a pure lookup - the world caches nothing it
//! can read back from the database.

use mica_common::ids::{ClassId, ElementId};
use mica_common::Atom;
use rustc_hash::FxHashSet;
use std::rc::Rc;

use crate::mask::Selector;
use crate::world::World;

/// The depth-grouped transitive supertype set of a class, including the
/// class itself at its own hierarchy depth. Built by the resolver when the
/// class is resolved; deduplicated.
///
/// Level `d` holds the supertypes whose hierarchy depth is `d`; within a
/// level the class itself comes first, then interfaces in resolution order.
#[derive(Debug, Clone)]
pub struct OrderedTypeSet {
    cls: ClassId,
    levels: Vec<Vec<ClassId>>,
    members: FxHashSet<ClassId>,
}

impl OrderedTypeSet {
    /// Build a set for `cls` at hierarchy depth `depth` from its strict
    /// supertypes. Duplicate entries are ignored.
    pub fn new(cls: ClassId, depth: u32, supertypes: &[(ClassId, u32)]) -> Self {
        let mut levels = vec![Vec::new(); depth as usize + 1];
        let mut members = FxHashSet::default();
        members.insert(cls);
        levels[depth as usize].push(cls);
        for &(supertype, supertype_depth) in supertypes {
            debug_assert!(supertype_depth <= depth);
            if members.insert(supertype) {
                levels[supertype_depth as usize].push(supertype);
            }
        }
        OrderedTypeSet {
            cls,
            levels,
            members,
        }
    }

    /// Hierarchy depth of the class itself; the deepest populated level.
    pub fn max_depth(&self) -> u32 {
        self.levels.len() as u32 - 1
    }

    /// Membership test; this is the `as_instance_of` question without type
    /// arguments. Includes the class itself.
    pub fn contains(&self, cls: ClassId) -> bool {
        self.members.contains(&cls)
    }

    /// All strict supertypes, deepest level first.
    pub fn supertypes(&self) -> impl Iterator<Item = ClassId> + '_ {
        let cls = self.cls;
        self.iter_from(self.max_depth()).filter(move |&c| c != cls)
    }

    /// All entries at depth `depth` and above, deepest level first, ending
    /// with the root. Within a level, insertion order.
    pub fn iter_from(&self, depth: u32) -> impl Iterator<Item = ClassId> + '_ {
        self.levels[..=depth as usize]
            .iter()
            .rev()
            .flatten()
            .copied()
    }
}

/// Read-only facts about classes and elements, as established by resolution.
pub trait ElementDatabase {
    // Class facts.

    /// Canonical identity of a class. Queries on patched or forwarding
    /// variants must resolve to the same tables as the declaration.
    fn class_declaration(&self, cls: ClassId) -> ClassId;
    /// Source name, used only for diagnostics and `dump`.
    fn class_name(&self, cls: ClassId) -> String;
    fn superclass(&self, cls: ClassId) -> Option<ClassId>;
    /// Depth in the subclass tree; the root class has depth 0 and children
    /// are strictly deeper.
    fn hierarchy_depth(&self, cls: ClassId) -> u32;
    fn ordered_supertypes(&self, cls: ClassId) -> Rc<OrderedTypeSet>;
    fn is_class_resolved(&self, cls: ClassId) -> bool;
    fn is_class_declaration(&self, cls: ClassId) -> bool;
    fn is_mixin_application(&self, cls: ClassId) -> bool;
    /// True for mixin applications that were declared under their own name
    /// (`class C = S with M;`) rather than synthesized.
    fn is_named_mixin_application(&self, cls: ClassId) -> bool;
    /// The mixed-in class, for mixin applications.
    fn mixin_of(&self, cls: ClassId) -> Option<ClassId>;
    /// True when the class has a synthetic `call` method and is therefore
    /// structurally a function.
    fn has_call_type(&self, cls: ClassId) -> bool;

    // Element facts.

    fn element_declaration(&self, element: ElementId) -> ElementId;
    fn element_name(&self, element: ElementId) -> Atom;
    fn enclosing_class(&self, element: ElementId) -> Option<ClassId>;
    fn is_instance_member(&self, element: ElementId) -> bool;
    fn is_abstract(&self, element: ElementId) -> bool;
    fn is_field(&self, element: ElementId) -> bool;
    fn is_final(&self, element: ElementId) -> bool;
    fn is_const(&self, element: ElementId) -> bool;
    fn is_getter(&self, element: ElementId) -> bool;
    fn is_setter(&self, element: ElementId) -> bool;
    fn is_generative_constructor_body(&self, element: ElementId) -> bool;
    /// For the synthesized `call` method of a closure class, the element of
    /// the originating closure expression.
    fn closure_call_origin(&self, element: ElementId) -> Option<ElementId>;
    /// Signature compatibility between a member and a call-site selector.
    /// Language-level overload rules stay on the resolver's side of this
    /// seam; the world only combines the answer with receiver reachability.
    fn applies(&self, element: ElementId, selector: &Selector) -> bool;
}

/// Canonical handles for the built-in classes the world special-cases.
#[derive(Debug, Clone, Copy)]
pub struct CoreClasses {
    pub object_class: ClassId,
    pub function_class: ClassId,
}

/// Back-end facts the world consults.
pub trait Backend {
    /// Native members alias host state; their fields are never assumed
    /// stable.
    fn is_native_member(&self, element: ElementId) -> bool;
    /// JS-interop classes have no meaningful instantiated-subclass structure;
    /// their LUB is the designated host-object class.
    fn is_js_interop(&self, cls: ClassId) -> bool;
    /// Foreign elements are implemented outside the program being compiled.
    fn is_foreign(&self, element: ElementId) -> bool;
    fn host_object_class(&self) -> ClassId;
}

/// The resolver's view of the program, as input to `close()` and to field
/// stability queries.
pub trait ResolverWorld {
    /// Classes proven directly instantiated by resolution, in deterministic
    /// resolution order.
    fn directly_instantiated_classes(&self) -> Vec<ClassId>;
    fn is_implemented(&self, cls: ClassId) -> bool;
    /// Whether resolution has seen a setter *invocation* for this member.
    fn has_invoked_setter(&self, element: ElementId, world: &World) -> bool;
    /// Whether resolution has recorded a field-setter access for this member.
    fn has_field_setter(&self, element: ElementId) -> bool;
}

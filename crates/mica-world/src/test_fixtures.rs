//! Shared test fixtures.
//!
//! `TestUniverse` plays the resolver: it owns class and element facts,
//! implements the capability traits, and offers builder methods so tests can
//! assemble small hierarchies without boilerplate. Two mask implementations
//! cover the devirtualization paths: the dynamic top and an exact-class
//! receiver.

use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::rc::Rc;

use mica_common::ids::{ClassId, ElementId};
use mica_common::{Atom, CompilerOptions, PanicReporter, StringInterner};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::db::{Backend, CoreClasses, ElementDatabase, OrderedTypeSet, ResolverWorld};
use crate::mask::{Selector, SelectorKind, TypeMask};
use crate::world::World;

/// Default options, created once.
pub static DEFAULT_OPTIONS: Lazy<CompilerOptions> = Lazy::new(CompilerOptions::default);

#[derive(Clone)]
struct ClassData {
    name: Atom,
    superclass: Option<ClassId>,
    interfaces: Vec<ClassId>,
    depth: u32,
    is_resolved: bool,
    is_mixin_application: bool,
    is_named_mixin_application: bool,
    mixin: Option<ClassId>,
    has_call_type: bool,
}

#[derive(Clone, PartialEq, Eq)]
enum ElementKind {
    Method { arity: u32 },
    Getter,
    Setter,
    Field { is_final: bool, is_const: bool },
    ConstructorBody,
}

#[derive(Clone)]
struct ElementData {
    name: Atom,
    kind: ElementKind,
    enclosing: Option<ClassId>,
    is_abstract: bool,
    is_native: bool,
    closure_origin: Option<ElementId>,
}

pub struct TestUniverse {
    pub interner: StringInterner,
    classes: RefCell<Vec<ClassData>>,
    elements: RefCell<Vec<ElementData>>,
    supertype_cache: RefCell<FxHashMap<ClassId, Rc<OrderedTypeSet>>>,
    pub object_class: ClassId,
    pub function_class: ClassId,
    pub host_object_class: ClassId,
    directly_instantiated: RefCell<Vec<ClassId>>,
    implemented: RefCell<FxHashSet<ClassId>>,
    invoked_setters: RefCell<FxHashSet<ElementId>>,
    field_setters: RefCell<FxHashSet<ElementId>>,
    js_interop: RefCell<FxHashSet<ClassId>>,
}

impl TestUniverse {
    pub fn new() -> Rc<TestUniverse> {
        let interner = StringInterner::new();
        let object = ClassData {
            name: interner.intern_string("Object"),
            superclass: None,
            interfaces: Vec::new(),
            depth: 0,
            is_resolved: true,
            is_mixin_application: false,
            is_named_mixin_application: false,
            mixin: None,
            has_call_type: false,
        };
        let function = ClassData {
            name: interner.intern_string("Function"),
            superclass: Some(ClassId(0)),
            depth: 1,
            ..object.clone()
        };
        let host_object = ClassData {
            name: interner.intern_string("HostObject"),
            superclass: Some(ClassId(0)),
            depth: 1,
            ..object.clone()
        };
        Rc::new(TestUniverse {
            interner,
            classes: RefCell::new(vec![object, function, host_object]),
            elements: RefCell::new(Vec::new()),
            supertype_cache: RefCell::new(FxHashMap::default()),
            object_class: ClassId(0),
            function_class: ClassId(1),
            host_object_class: ClassId(2),
            directly_instantiated: RefCell::new(Vec::new()),
            implemented: RefCell::new(FxHashSet::default()),
            invoked_setters: RefCell::new(FxHashSet::default()),
            field_setters: RefCell::new(FxHashSet::default()),
            js_interop: RefCell::new(FxHashSet::default()),
        })
    }

    pub fn core_classes(&self) -> CoreClasses {
        CoreClasses {
            object_class: self.object_class,
            function_class: self.function_class,
        }
    }

    pub fn name(&self, s: &str) -> Atom {
        self.interner.intern_string(s)
    }

    fn push_class(&self, data: ClassData) -> ClassId {
        let mut classes = self.classes.borrow_mut();
        let id = ClassId(classes.len() as u32);
        classes.push(data);
        id
    }

    pub fn add_class(&self, name: &str, superclass: Option<ClassId>, interfaces: &[ClassId]) -> ClassId {
        let depth = superclass.map_or(0, |s| self.classes.borrow()[s.0 as usize].depth + 1);
        self.push_class(ClassData {
            name: self.interner.intern_string(name),
            superclass,
            interfaces: interfaces.to_vec(),
            depth,
            is_resolved: true,
            is_mixin_application: false,
            is_named_mixin_application: false,
            mixin: None,
            has_call_type: false,
        })
    }

    /// The synthetic class for `superclass with mixin`; `named` when it was
    /// declared under its own name.
    pub fn add_mixin_application(
        &self,
        name: &str,
        superclass: ClassId,
        mixin: ClassId,
        named: bool,
    ) -> ClassId {
        let depth = self.classes.borrow()[superclass.0 as usize].depth + 1;
        self.push_class(ClassData {
            name: self.interner.intern_string(name),
            superclass: Some(superclass),
            interfaces: vec![mixin],
            depth,
            is_resolved: true,
            is_mixin_application: true,
            is_named_mixin_application: named,
            mixin: Some(mixin),
            has_call_type: false,
        })
    }

    /// A class with a synthetic `call` method, structurally a function.
    pub fn add_callable_class(&self, name: &str, superclass: Option<ClassId>) -> ClassId {
        let cls = self.add_class(name, superclass, &[]);
        self.classes.borrow_mut()[cls.0 as usize].has_call_type = true;
        cls
    }

    pub fn set_unresolved(&self, cls: ClassId) {
        self.classes.borrow_mut()[cls.0 as usize].is_resolved = false;
    }

    pub fn mark_js_interop(&self, cls: ClassId) {
        self.js_interop.borrow_mut().insert(cls);
    }

    /// Record a `new C()` discovered by resolution.
    pub fn instantiate(&self, cls: ClassId) {
        self.directly_instantiated.borrow_mut().push(cls);
    }

    pub fn mark_implemented(&self, cls: ClassId) {
        self.implemented.borrow_mut().insert(cls);
    }

    fn push_element(&self, data: ElementData) -> ElementId {
        let mut elements = self.elements.borrow_mut();
        let id = ElementId(elements.len() as u32);
        elements.push(data);
        id
    }

    pub fn add_method(&self, cls: ClassId, name: &str, arity: u32) -> ElementId {
        self.push_element(ElementData {
            name: self.interner.intern_string(name),
            kind: ElementKind::Method { arity },
            enclosing: Some(cls),
            is_abstract: false,
            is_native: false,
            closure_origin: None,
        })
    }

    pub fn add_abstract_method(&self, cls: ClassId, name: &str, arity: u32) -> ElementId {
        let element = self.add_method(cls, name, arity);
        self.elements.borrow_mut()[element.0 as usize].is_abstract = true;
        element
    }

    pub fn add_getter(&self, cls: ClassId, name: &str) -> ElementId {
        self.push_element(ElementData {
            name: self.interner.intern_string(name),
            kind: ElementKind::Getter,
            enclosing: Some(cls),
            is_abstract: false,
            is_native: false,
            closure_origin: None,
        })
    }

    pub fn add_setter(&self, cls: ClassId, name: &str) -> ElementId {
        self.push_element(ElementData {
            name: self.interner.intern_string(name),
            kind: ElementKind::Setter,
            enclosing: Some(cls),
            is_abstract: false,
            is_native: false,
            closure_origin: None,
        })
    }

    pub fn add_field(&self, cls: ClassId, name: &str, is_final: bool, is_const: bool) -> ElementId {
        self.push_element(ElementData {
            name: self.interner.intern_string(name),
            kind: ElementKind::Field { is_final, is_const },
            enclosing: Some(cls),
            is_abstract: false,
            is_native: false,
            closure_origin: None,
        })
    }

    pub fn add_constructor_body(&self, cls: ClassId, name: &str) -> ElementId {
        self.push_element(ElementData {
            name: self.interner.intern_string(name),
            kind: ElementKind::ConstructorBody,
            enclosing: Some(cls),
            is_abstract: false,
            is_native: false,
            closure_origin: None,
        })
    }

    /// The synthesized `call` method of a closure class, forwarding to the
    /// originating closure expression.
    pub fn add_closure_call_method(
        &self,
        cls: ClassId,
        arity: u32,
        origin: ElementId,
    ) -> ElementId {
        self.push_element(ElementData {
            name: self.interner.intern_string("call"),
            kind: ElementKind::Method { arity },
            enclosing: Some(cls),
            is_abstract: false,
            is_native: false,
            closure_origin: Some(origin),
        })
    }

    pub fn add_top_level_function(&self, name: &str, arity: u32) -> ElementId {
        self.push_element(ElementData {
            name: self.interner.intern_string(name),
            kind: ElementKind::Method { arity },
            enclosing: None,
            is_abstract: false,
            is_native: false,
            closure_origin: None,
        })
    }

    pub fn set_native(&self, element: ElementId) {
        self.elements.borrow_mut()[element.0 as usize].is_native = true;
    }

    pub fn record_invoked_setter(&self, element: ElementId) {
        self.invoked_setters.borrow_mut().insert(element);
    }

    pub fn record_field_setter(&self, element: ElementId) {
        self.field_setters.borrow_mut().insert(element);
    }

    fn class(&self, cls: ClassId) -> ClassData {
        self.classes.borrow()[cls.0 as usize].clone()
    }

    fn element(&self, element: ElementId) -> ElementData {
        self.elements.borrow()[element.0 as usize].clone()
    }

    fn collect_supertypes(
        &self,
        cls: ClassId,
        out: &mut Vec<(ClassId, u32)>,
        seen: &mut FxHashSet<ClassId>,
    ) {
        let data = self.class(cls);
        if let Some(superclass) = data.superclass {
            if seen.insert(superclass) {
                out.push((superclass, self.class(superclass).depth));
                self.collect_supertypes(superclass, out, seen);
            }
        }
        for &interface in &data.interfaces {
            if seen.insert(interface) {
                out.push((interface, self.class(interface).depth));
                self.collect_supertypes(interface, out, seen);
            }
        }
    }
}

impl ElementDatabase for TestUniverse {
    fn class_declaration(&self, cls: ClassId) -> ClassId {
        cls
    }

    fn class_name(&self, cls: ClassId) -> String {
        self.interner.resolve_atom(self.class(cls).name)
    }

    fn superclass(&self, cls: ClassId) -> Option<ClassId> {
        self.class(cls).superclass
    }

    fn hierarchy_depth(&self, cls: ClassId) -> u32 {
        self.class(cls).depth
    }

    fn ordered_supertypes(&self, cls: ClassId) -> Rc<OrderedTypeSet> {
        if let Some(cached) = self.supertype_cache.borrow().get(&cls) {
            return Rc::clone(cached);
        }
        let mut supertypes = Vec::new();
        let mut seen = FxHashSet::default();
        seen.insert(cls);
        self.collect_supertypes(cls, &mut supertypes, &mut seen);
        let set = Rc::new(OrderedTypeSet::new(cls, self.class(cls).depth, &supertypes));
        self.supertype_cache
            .borrow_mut()
            .insert(cls, Rc::clone(&set));
        set
    }

    fn is_class_resolved(&self, cls: ClassId) -> bool {
        self.class(cls).is_resolved
    }

    fn is_class_declaration(&self, _cls: ClassId) -> bool {
        true
    }

    fn is_mixin_application(&self, cls: ClassId) -> bool {
        self.class(cls).is_mixin_application
    }

    fn is_named_mixin_application(&self, cls: ClassId) -> bool {
        self.class(cls).is_named_mixin_application
    }

    fn mixin_of(&self, cls: ClassId) -> Option<ClassId> {
        self.class(cls).mixin
    }

    fn has_call_type(&self, cls: ClassId) -> bool {
        self.class(cls).has_call_type
    }

    fn element_declaration(&self, element: ElementId) -> ElementId {
        element
    }

    fn element_name(&self, element: ElementId) -> Atom {
        self.element(element).name
    }

    fn enclosing_class(&self, element: ElementId) -> Option<ClassId> {
        self.element(element).enclosing
    }

    fn is_instance_member(&self, element: ElementId) -> bool {
        let data = self.element(element);
        data.enclosing.is_some() && data.kind != ElementKind::ConstructorBody
    }

    fn is_abstract(&self, element: ElementId) -> bool {
        self.element(element).is_abstract
    }

    fn is_field(&self, element: ElementId) -> bool {
        matches!(self.element(element).kind, ElementKind::Field { .. })
    }

    fn is_final(&self, element: ElementId) -> bool {
        matches!(
            self.element(element).kind,
            ElementKind::Field { is_final: true, .. }
        )
    }

    fn is_const(&self, element: ElementId) -> bool {
        matches!(
            self.element(element).kind,
            ElementKind::Field { is_const: true, .. }
        )
    }

    fn is_getter(&self, element: ElementId) -> bool {
        self.element(element).kind == ElementKind::Getter
    }

    fn is_setter(&self, element: ElementId) -> bool {
        self.element(element).kind == ElementKind::Setter
    }

    fn is_generative_constructor_body(&self, element: ElementId) -> bool {
        self.element(element).kind == ElementKind::ConstructorBody
    }

    fn closure_call_origin(&self, element: ElementId) -> Option<ElementId> {
        self.element(element).closure_origin
    }

    fn applies(&self, element: ElementId, selector: &Selector) -> bool {
        let data = self.element(element);
        if data.name != selector.name {
            return false;
        }
        match selector.kind {
            SelectorKind::Call => match data.kind {
                ElementKind::Method { arity } => arity == selector.arity,
                // Fields and getters can hold closures; invocation goes
                // through the stored value.
                ElementKind::Field { .. } | ElementKind::Getter => true,
                _ => false,
            },
            SelectorKind::Getter => matches!(
                data.kind,
                ElementKind::Field { .. } | ElementKind::Getter | ElementKind::Method { .. }
            ),
            SelectorKind::Setter => match data.kind {
                ElementKind::Setter => true,
                ElementKind::Field { is_final, is_const } => !is_final && !is_const,
                _ => false,
            },
            SelectorKind::ClosureCall => false,
        }
    }
}

impl Backend for TestUniverse {
    fn is_native_member(&self, element: ElementId) -> bool {
        self.element(element).is_native
    }

    fn is_js_interop(&self, cls: ClassId) -> bool {
        self.js_interop.borrow().contains(&cls)
    }

    fn is_foreign(&self, _element: ElementId) -> bool {
        false
    }

    fn host_object_class(&self) -> ClassId {
        self.host_object_class
    }
}

impl ResolverWorld for TestUniverse {
    fn directly_instantiated_classes(&self) -> Vec<ClassId> {
        self.directly_instantiated.borrow().clone()
    }

    fn is_implemented(&self, cls: ClassId) -> bool {
        self.implemented.borrow().contains(&cls)
    }

    fn has_invoked_setter(&self, element: ElementId, _world: &World) -> bool {
        self.invoked_setters.borrow().contains(&element)
    }

    fn has_field_setter(&self, element: ElementId) -> bool {
        self.field_setters.borrow().contains(&element)
    }
}

/// The top of the mask lattice: every receiver, every member.
pub struct DynamicMask;

impl TypeMask for DynamicMask {
    fn can_hit(&self, _element: ElementId, _selector: &Selector, _world: &World) -> bool {
        true
    }

    fn locate_single_element(&self, selector: &Selector, world: &World) -> Option<ElementId> {
        let mut candidates = world.function_set().filter(selector, None, world);
        let first = candidates.next()?;
        if candidates.next().is_some() {
            None
        } else {
            Some(first)
        }
    }

    fn needs_no_such_method_handling(&self, _selector: &Selector, _world: &World) -> bool {
        true
    }
}

/// Receivers are `cls` and its subclasses.
pub struct ExactClassMask {
    pub cls: ClassId,
}

impl TypeMask for ExactClassMask {
    fn can_hit(&self, element: ElementId, _selector: &Selector, world: &World) -> bool {
        world
            .database()
            .enclosing_class(element)
            .is_some_and(|enclosing| world.is_subclass_of(self.cls, enclosing))
    }

    fn locate_single_element(&self, selector: &Selector, world: &World) -> Option<ElementId> {
        let mut candidates = world.function_set().filter(selector, Some(self), world);
        let first = candidates.next()?;
        if candidates.next().is_some() {
            None
        } else {
            Some(first)
        }
    }

    fn needs_no_such_method_handling(&self, selector: &Selector, world: &World) -> bool {
        world
            .function_set()
            .filter(selector, Some(self), world)
            .next()
            .is_none()
    }
}

/// A fresh open world over `universe` with the root class registered.
pub fn world(universe: &Rc<TestUniverse>) -> World {
    world_with_options(universe, DEFAULT_OPTIONS.clone())
}

pub fn world_with_options(universe: &Rc<TestUniverse>, options: CompilerOptions) -> World {
    let mut world = World::new(
        Rc::clone(universe) as Rc<dyn ElementDatabase>,
        Rc::clone(universe) as Rc<dyn Backend>,
        Rc::clone(universe) as Rc<dyn ResolverWorld>,
        Rc::new(PanicReporter),
        universe.core_classes(),
        options,
        Rc::new(DynamicMask),
    );
    world.register_class(universe.object_class);
    world
}

//! Selectors and the receiver-mask capability.
//!
//! A `Selector` describes a call site: name, arity, and kind. A `TypeMask`
//! approximates the receiver's class set; the mask lattice itself lives in
//! the type-inference subsystem and is consumed here as a capability.

use mica_common::ids::ElementId;
use mica_common::Atom;

use crate::world::World;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    Getter,
    Setter,
    Call,
    /// Invocation of a closure value; side effects of these are not tracked.
    ClosureCall,
}

/// A call-site descriptor used for method resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Selector {
    pub name: Atom,
    pub kind: SelectorKind,
    /// Positional argument count. Getters and setters have fixed shapes
    /// (0 and 1); the field is kept uniform so call sites compare cheaply.
    pub arity: u32,
}

impl Selector {
    pub fn getter(name: Atom) -> Self {
        Selector {
            name,
            kind: SelectorKind::Getter,
            arity: 0,
        }
    }

    pub fn setter(name: Atom) -> Self {
        Selector {
            name,
            kind: SelectorKind::Setter,
            arity: 1,
        }
    }

    pub fn call(name: Atom, arity: u32) -> Self {
        Selector {
            name,
            kind: SelectorKind::Call,
            arity,
        }
    }

    pub fn closure_call(name: Atom, arity: u32) -> Self {
        Selector {
            name,
            kind: SelectorKind::ClosureCall,
            arity,
        }
    }

    pub fn is_getter(&self) -> bool {
        self.kind == SelectorKind::Getter
    }

    pub fn is_setter(&self) -> bool {
        self.kind == SelectorKind::Setter
    }

    pub fn is_call(&self) -> bool {
        self.kind == SelectorKind::Call
    }

    pub fn is_closure_call(&self) -> bool {
        self.kind == SelectorKind::ClosureCall
    }
}

/// Abstract value over the class lattice, approximating a receiver.
///
/// The world never allocates masks; it holds the injected dynamic (top)
/// mask and delegates mask-sensitive questions back to the lattice.
pub trait TypeMask {
    /// Can a call through this mask reach `element`?
    fn can_hit(&self, element: ElementId, selector: &Selector, world: &World) -> bool;
    /// The unique target of `selector` on receivers in this mask, or None
    /// on a miss or ambiguity.
    fn locate_single_element(&self, selector: &Selector, world: &World) -> Option<ElementId>;
    /// Whether some receiver in this mask fails to respond to `selector`,
    /// routing the call through `noSuchMethod` handling.
    fn needs_no_such_method_handling(&self, selector: &Selector, world: &World) -> bool;
}

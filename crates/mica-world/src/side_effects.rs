//! Side-effect and call-site registries.
//!
//! These tables stay writable after the class world closes: type inference
//! refines them while it runs over the closed hierarchy. All keys are
//! canonicalized to element declarations before storage or lookup.

use bitflags::bitflags;
use mica_common::ids::ElementId;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::db::ElementDatabase;

bitflags! {
    /// What a piece of code may change and what stores it may observe.
    /// Union is monotone; `all()` is the conservative answer.
    #[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct SideEffects: u8 {
        const CHANGES_INSTANCE_PROPERTY = 1 << 0;
        const CHANGES_STATIC_PROPERTY = 1 << 1;
        const CHANGES_INDEX = 1 << 2;
        const DEPENDS_ON_INSTANCE_PROPERTY_STORE = 1 << 3;
        const DEPENDS_ON_STATIC_PROPERTY_STORE = 1 << 4;
        const DEPENDS_ON_INDEX_STORE = 1 << 5;
    }
}

impl SideEffects {
    pub const CHANGES_ALL: SideEffects = SideEffects::CHANGES_INSTANCE_PROPERTY
        .union(SideEffects::CHANGES_STATIC_PROPERTY)
        .union(SideEffects::CHANGES_INDEX);
    pub const DEPENDS_ON_ALL: SideEffects = SideEffects::DEPENDS_ON_INSTANCE_PROPERTY_STORE
        .union(SideEffects::DEPENDS_ON_STATIC_PROPERTY_STORE)
        .union(SideEffects::DEPENDS_ON_INDEX_STORE);

    pub fn changes_anything(&self) -> bool {
        self.intersects(SideEffects::CHANGES_ALL)
    }

    pub fn depends_on_anything(&self) -> bool {
        self.intersects(SideEffects::DEPENDS_ON_ALL)
    }
}

#[derive(Default)]
pub struct SideEffectRegistry {
    side_effects: FxHashMap<ElementId, SideEffects>,
    /// Elements proven side-effect free. Once set, later registrations for
    /// the element are ignored.
    free_elements: FxHashSet<ElementId>,
    cannot_throw: FxHashSet<ElementId>,
    called_in_loop: FxHashSet<ElementId>,
    might_be_passed_to_apply: FxHashSet<ElementId>,
}

impl SideEffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_side_effects(
        &mut self,
        element: ElementId,
        effects: SideEffects,
        db: &dyn ElementDatabase,
    ) {
        let element = db.element_declaration(element);
        if self.free_elements.contains(&element) {
            return;
        }
        self.side_effects.insert(element, effects);
    }

    pub fn register_side_effects_free(&mut self, element: ElementId, db: &dyn ElementDatabase) {
        let element = db.element_declaration(element);
        self.side_effects.insert(element, SideEffects::empty());
        self.free_elements.insert(element);
    }

    pub fn is_side_effects_free(&self, element: ElementId, db: &dyn ElementDatabase) -> bool {
        self.free_elements.contains(&db.element_declaration(element))
    }

    /// Stored side effects of an element, installing the empty default on
    /// first access so later callers observe a consistent value. Fields and
    /// generative constructor bodies are outside this registry's model.
    pub fn side_effects_of(
        &mut self,
        element: ElementId,
        db: &dyn ElementDatabase,
    ) -> SideEffects {
        assert!(
            !db.is_generative_constructor_body(element),
            "side effects of a generative constructor body are attributed to its constructor"
        );
        assert!(
            !db.is_field(element),
            "field stores are tracked per selector, not per element"
        );
        let element = db.element_declaration(element);
        *self.side_effects.entry(element).or_default()
    }

    /// Non-installing read, for refiners that only want the current state.
    pub fn currently_known_side_effects(
        &self,
        element: ElementId,
        db: &dyn ElementDatabase,
    ) -> SideEffects {
        self.side_effects
            .get(&db.element_declaration(element))
            .copied()
            .unwrap_or_default()
    }

    pub fn register_cannot_throw(&mut self, element: ElementId, db: &dyn ElementDatabase) {
        self.cannot_throw.insert(db.element_declaration(element));
    }

    pub fn cannot_throw(&self, element: ElementId, db: &dyn ElementDatabase) -> bool {
        self.cannot_throw.contains(&db.element_declaration(element))
    }

    pub fn add_called_in_loop(&mut self, element: ElementId, db: &dyn ElementDatabase) {
        self.called_in_loop.insert(db.element_declaration(element));
    }

    pub fn is_called_in_loop(&self, element: ElementId, db: &dyn ElementDatabase) -> bool {
        self.called_in_loop.contains(&db.element_declaration(element))
    }

    pub fn register_might_be_passed_to_apply(
        &mut self,
        element: ElementId,
        db: &dyn ElementDatabase,
    ) {
        self.might_be_passed_to_apply
            .insert(db.element_declaration(element));
    }

    /// Whether the element may escape to reflective invocation. The
    /// synthesized `call` method of a closure class forwards to the
    /// originating closure expression.
    pub fn might_be_passed_to_apply(
        &self,
        element: ElementId,
        db: &dyn ElementDatabase,
    ) -> bool {
        let element = match db.closure_call_origin(element) {
            Some(origin) => origin,
            None => element,
        };
        self.might_be_passed_to_apply
            .contains(&db.element_declaration(element))
    }

    /// Raw membership without closure forwarding, for refiners inspecting
    /// the current state of the set.
    pub fn currently_known_might_be_passed_to_apply(
        &self,
        element: ElementId,
        db: &dyn ElementDatabase,
    ) -> bool {
        self.might_be_passed_to_apply
            .contains(&db.element_declaration(element))
    }
}

#[cfg(test)]
#[path = "tests/side_effects_tests.rs"]
mod tests;

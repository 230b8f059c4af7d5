//! Selector-indexed live instance members.
//!
//! Used elements that are concrete instance members land here, bucketed by
//! name. A call-site query filters a bucket down to the members whose
//! signature accepts the selector and whose enclosing class is reachable
//! through the receiver mask. Bucket iteration order is registration order.

use indexmap::{IndexMap, IndexSet};
use mica_common::ids::ElementId;
use mica_common::Atom;

use crate::mask::{Selector, TypeMask};
use crate::world::World;

#[derive(Default)]
pub struct FunctionSet {
    nodes: IndexMap<Atom, IndexSet<ElementId>>,
}

impl FunctionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: Atom, element: ElementId) {
        self.nodes.entry(name).or_default().insert(element);
    }

    pub fn contains(&self, name: Atom, element: ElementId) -> bool {
        self.nodes.get(&name).is_some_and(|bucket| bucket.contains(&element))
    }

    /// The members that could respond to `selector` on receivers in `mask`.
    /// A missing mask means the dynamic (top) mask: everything is reachable.
    pub fn filter<'a>(
        &'a self,
        selector: &'a Selector,
        mask: Option<&'a dyn TypeMask>,
        world: &'a World,
    ) -> impl Iterator<Item = ElementId> + 'a {
        self.nodes
            .get(&selector.name)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |&element| {
                world.database().applies(element, selector)
                    && mask.map_or(true, |mask| mask.can_hit(element, selector, world))
            })
    }
}

#[cfg(test)]
#[path = "tests/function_set_tests.rs"]
mod tests;

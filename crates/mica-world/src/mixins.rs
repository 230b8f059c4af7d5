//! The mixin-use index.
//!
//! Maps each mixin class to the mixin applications that use it, in
//! registration order. The *live* projection (only instantiated
//! applications, found transitively through named mixin applications) is
//! derived by the world once the class hierarchy is closed.

use indexmap::{IndexMap, IndexSet};
use mica_common::ids::ClassId;

#[derive(Default)]
pub struct MixinIndex {
    uses: IndexMap<ClassId, IndexSet<ClassId>>,
}

impl MixinIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `application` mixes in `mixin`. `mixin` must already be
    /// a declaration handle.
    pub fn register_use(&mut self, application: ClassId, mixin: ClassId) {
        self.uses.entry(mixin).or_default().insert(application);
    }

    /// Whether any application mixes `mixin` in, live or not.
    pub fn is_used_as_mixin(&self, mixin: ClassId) -> bool {
        self.uses.get(&mixin).is_some_and(|apps| !apps.is_empty())
    }

    /// All recorded applications of `mixin`, including non-live ones.
    pub fn all_uses_of(&self, mixin: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        self.uses.get(&mixin).into_iter().flatten().copied()
    }

    /// All (mixin, applications) pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &IndexSet<ClassId>)> {
        self.uses.iter().map(|(&mixin, apps)| (mixin, apps))
    }
}

#[cfg(test)]
#[path = "tests/mixin_index_tests.rs"]
mod tests;

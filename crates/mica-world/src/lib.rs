//! Closed-world class-hierarchy analysis for the mica compiler.
//!
//! This crate answers the hierarchy questions that drive devirtualization,
//! inlining, and side-effect tracking in the back end:
//! - `World` - the façade with its open/closed lifecycle
//! - `ClassHierarchyNode` / `HierarchyArena` - the subclass tree
//! - `ClassSet` - the subtype DAG on top of the tree
//! - `FunctionSet` - selector-indexed live instance members
//! - `SideEffectRegistry` - per-element side effects and call-site facts
//!
//! Class and element *facts* are owned by the resolver and read through the
//! `ElementDatabase` trait; receiver approximations come in through the
//! `TypeMask` trait. The engine stores only its own indices.

pub mod class_set;
pub mod db;
pub mod error;
pub mod function_set;
pub mod hierarchy;
pub mod mask;
pub mod mixins;
pub mod side_effects;
pub mod world;

#[cfg(test)]
pub mod test_fixtures;

pub use class_set::ClassSet;
pub use db::{Backend, CoreClasses, ElementDatabase, OrderedTypeSet, ResolverWorld};
pub use error::WorldError;
pub use function_set::FunctionSet;
pub use hierarchy::{ClassHierarchyNode, HierarchyArena, Instantiation, IterationStep, NodeId};
pub use mask::{Selector, SelectorKind, TypeMask};
pub use side_effects::{SideEffectRegistry, SideEffects};
pub use world::World;

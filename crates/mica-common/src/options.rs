//! Compiler options consulted by whole-program analysis.
//!
//! This lives in mica-common so that the resolver and the analysis crates can
//! reference the same options without a circular dependency.

/// Options that change what the class world may assume.
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    /// When true, compilation is incremental: the class world can still be
    /// closed, but it no longer guarantees that every reachable class is
    /// known. Consumers must check `has_closed_world_assumption` before
    /// applying optimizations that rely on exhaustiveness.
    pub has_incremental_support: bool,
    /// When true, reflective invocation through `invokeOn` is enabled and
    /// receiver masks must be widened for selectors that can end up in
    /// `noSuchMethod` handling.
    pub enable_invoke_on: bool,
}

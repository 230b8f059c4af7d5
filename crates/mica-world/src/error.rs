//! Error types for the class world.

use thiserror::Error;

/// Errors surfaced by the world's phase transition.
///
/// Everything else in this crate is either a fatal assertion (caller bug) or
/// a documented empty/false/None answer for unknown classes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldError {
    #[error("the class world is already closed")]
    AlreadyClosed,
}

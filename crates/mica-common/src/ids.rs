//! Entity id newtypes.
//!
//! Program entities are referred to by lightweight `u32` handles owned by the
//! resolver. Equality is O(1); the handles carry no structure themselves, so
//! all semantic questions go through a database trait.

use serde::Serialize;

/// Handle to a class. All analysis tables key on the *declaration* handle;
/// patched or forwarding variants must be canonicalized before lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ClassId(pub u32);

/// Handle to a named program element that is not a class: a function, field,
/// constructor, getter, or setter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ElementId(pub u32);

/// Handle to a typedef.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TypedefId(pub u32);

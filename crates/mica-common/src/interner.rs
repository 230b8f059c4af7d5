//! String interning.
//!
//! Names are interned once and compared as `Atom` handles afterwards.
//! The interner is single-threaded; the compiler driver owns it and hands
//! atoms to every phase.

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::cell::RefCell;
use std::sync::Arc;

/// A lightweight handle to an interned string. Equality is O(1).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Atom(pub u32);

#[derive(Default)]
pub struct StringInterner {
    map: RefCell<FxHashMap<Arc<str>, Atom>>,
    strings: RefCell<Vec<Arc<str>>>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_string(&self, s: &str) -> Atom {
        if let Some(&atom) = self.map.borrow().get(s) {
            return atom;
        }
        let mut strings = self.strings.borrow_mut();
        let atom = Atom(strings.len() as u32);
        let shared: Arc<str> = Arc::from(s);
        strings.push(Arc::clone(&shared));
        self.map.borrow_mut().insert(shared, atom);
        atom
    }

    pub fn resolve_atom(&self, atom: Atom) -> String {
        self.strings.borrow()[atom.0 as usize].to_string()
    }

    pub fn resolve_atom_ref(&self, atom: Atom) -> Arc<str> {
        Arc::clone(&self.strings.borrow()[atom.0 as usize])
    }
}

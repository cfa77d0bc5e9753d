//! String interner for identifier storage.
//!
//! Symbol tables are keyed by [`Name`] handles rather than strings, so name
//! lookups during analysis and emission are integer comparisons.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// An interned string identifier.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Serialize)]
pub struct Name(pub u32);

#[derive(Debug, Default)]
struct Internal {
    map: HashMap<Arc<str>, Name>,
    vec: Vec<Arc<str>>,
}

/// A thread-safe string interner.
///
/// Interning the same string twice returns the same [`Name`].
#[derive(Debug, Default)]
pub struct Interner {
    data: Mutex<Internal>,
}

impl Interner {
    pub fn new() -> Interner {
        Interner::default()
    }

    /// Intern a string, returning its unique [`Name`].
    pub fn intern(&self, name: &str) -> Name {
        let mut data = self.data.lock();

        if let Some(&existing) = data.map.get(name) {
            return existing;
        }

        let key: Arc<str> = Arc::from(name);
        let value = Name(data.vec.len() as u32);
        data.vec.push(key.clone());
        data.map.insert(key, value);
        value
    }

    /// Get the string for a previously interned [`Name`].
    pub fn str(&self, name: Name) -> Arc<str> {
        let data = self.data.lock();
        data.vec[name.0 as usize].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_stable() {
        let interner = Interner::new();

        assert_eq!(Name(0), interner.intern("add"));
        assert_eq!(Name(0), interner.intern("add"));
        assert_eq!(Name(1), interner.intern("sub"));

        assert_eq!(&*interner.str(Name(0)), "add");
        assert_eq!(&*interner.str(Name(1)), "sub");
    }
}

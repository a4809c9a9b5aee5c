//! Garbage collection bookkeeping
//!
//! There is no tracing collector here: every heap value is `Rc`-counted and
//! freed the moment its last reference drops. The `Heap` exists to intern
//! strings, so that two string literals (or concatenation results) with the
//! same contents share one allocation and compare by pointer rather than by
//! walking bytes.

use std::collections::HashSet;
use std::rc::Rc;

/// String interning table
#[derive(Debug, Default)]
pub struct Heap {
    strings: HashSet<Rc<str>>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string, returning the shared allocation for it
    pub fn intern(&mut self, value: impl AsRef<str>) -> Rc<str> {
        let value = value.as_ref();

        if let Some(existing) = self.strings.get(value) {
            return existing.clone();
        }

        let rc: Rc<str> = Rc::from(value);
        self.strings.insert(rc.clone());
        rc
    }

    /// Emits a `tracing::warn!` for every interned string that still has
    /// outstanding references beyond the heap's own, when the
    /// `gc_leak_check` feature is enabled. A no-op otherwise.
    #[cfg(feature = "gc_leak_check")]
    pub fn assert_no_leaks(&self) {
        for string in &self.strings {
            let count = Rc::strong_count(string) - 1;
            if count > 0 {
                tracing::warn!("leaking {} strong reference(s) to string '{}'", count, string);
            }
        }
    }

    #[cfg(not(feature = "gc_leak_check"))]
    pub fn assert_no_leaks(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_contents_shares_one_allocation() {
        let mut heap = Heap::new();
        let a = heap.intern("orchard");
        let b = heap.intern("orchard");
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_contents_do_not_share_an_allocation() {
        let mut heap = Heap::new();
        let a = heap.intern("orchard");
        let b = heap.intern("grove");
        assert!(!Rc::ptr_eq(&a, &b));
    }
}

//! Arena allocation for evaluation scratch
//!
//! Uses bumpalo for fast bump allocation. An arena is owned by a single
//! evaluation: non-thread-safe, reset (or dropped) when the evaluation
//! ends. Results are Arc-shared values and never borrow from the arena,
//! so a caller may also reuse one arena across many evaluations.
//!
//! The `Allocator` façade is the only allocation API the evaluator and
//! standard library touch; it uniformly exposes arena-backed or
//! heap-backed scratch.

use bumpalo::Bump;
use std::sync::Arc;

/// Scoped bump-allocation pool.
pub struct Arena {
    bump: Bump,
}

impl Arena {
    pub fn new() -> Self {
        Arena { bump: Bump::new() }
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Arena {
            bump: Bump::with_capacity(bytes),
        }
    }

    /// Copy a string into the arena.
    pub fn alloc_str(&self, s: &str) -> &str {
        self.bump.alloc_str(s)
    }

    /// Copy a slice into the arena.
    pub fn alloc_slice<T: Copy>(&self, slice: &[T]) -> &[T] {
        self.bump.alloc_slice_copy(slice)
    }

    /// Move a destructor-bearing object into the arena. The returned box
    /// runs the destructor when dropped; plain bump allocations do not.
    pub fn owned<T>(&self, value: T) -> bumpalo::boxed::Box<'_, T> {
        bumpalo::boxed::Box::new_in(value, &self.bump)
    }

    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Free everything at once. Requires exclusive access, which is what
    /// ends an evaluation's use of the arena.
    pub fn reset(&mut self) {
        self.bump.reset();
    }

    fn bump(&self) -> &Bump {
        &self.bump
    }
}

impl Default for Arena {
    fn default() -> Self {
        Arena::new()
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}

/// Uniform allocation façade: heap-backed or arena-backed scratch.
#[derive(Debug, Default, Clone, Copy)]
pub enum Allocator<'a> {
    #[default]
    Heap,
    Pool(&'a Arena),
}

impl<'a> Allocator<'a> {
    pub fn arena(&self) -> Option<&'a Arena> {
        match self {
            Allocator::Heap => None,
            Allocator::Pool(arena) => Some(arena),
        }
    }

    /// Join string parts. The scratch buffer lives in the arena when one
    /// is present; the final shared value is copied out exactly once.
    pub fn concat_str(&self, parts: &[&str]) -> Arc<str> {
        let total: usize = parts.iter().map(|p| p.len()).sum();
        match self {
            Allocator::Heap => {
                let mut out = String::with_capacity(total);
                for p in parts {
                    out.push_str(p);
                }
                Arc::from(out)
            }
            Allocator::Pool(arena) => {
                let mut out =
                    bumpalo::collections::String::with_capacity_in(total, arena.bump());
                for p in parts {
                    out.push_str(p);
                }
                Arc::from(out.as_str())
            }
        }
    }

    /// Join byte parts, same discipline as `concat_str`.
    pub fn concat_bytes(&self, parts: &[&[u8]]) -> Arc<[u8]> {
        let total: usize = parts.iter().map(|p| p.len()).sum();
        match self {
            Allocator::Heap => {
                let mut out = Vec::with_capacity(total);
                for p in parts {
                    out.extend_from_slice(p);
                }
                Arc::from(out)
            }
            Allocator::Pool(arena) => {
                let mut out =
                    bumpalo::collections::Vec::with_capacity_in(total, arena.bump());
                for p in parts {
                    out.extend_from_slice(p);
                }
                Arc::from(&out[..])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_reset() {
        let mut arena = Arena::new();
        let s = arena.alloc_str("hello");
        assert_eq!(s, "hello");
        assert!(arena.allocated_bytes() > 0);

        arena.reset();
        let before = arena.allocated_bytes();
        let _ = arena.alloc_str("again");
        assert!(arena.allocated_bytes() >= before);
    }

    #[test]
    fn test_owned_runs_destructor() {
        use std::sync::atomic::{AtomicBool, Ordering};
        static DROPPED: AtomicBool = AtomicBool::new(false);

        struct Flag;
        impl Drop for Flag {
            fn drop(&mut self) {
                DROPPED.store(true, Ordering::SeqCst);
            }
        }

        let arena = Arena::new();
        {
            let _flag = arena.owned(Flag);
        }
        assert!(DROPPED.load(Ordering::SeqCst), "boxed arena value must drop");
    }

    #[test]
    fn test_concat_matches_across_backends() {
        let arena = Arena::new();
        let pooled = Allocator::Pool(&arena);
        let heap = Allocator::Heap;
        let parts = ["ab", "", "cd"];
        assert_eq!(pooled.concat_str(&parts), heap.concat_str(&parts));
        assert_eq!(&*pooled.concat_str(&parts), "abcd");
        assert!(arena.allocated_bytes() > 0, "pooled scratch must hit the arena");
    }
}

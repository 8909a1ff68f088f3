//! packmap: a packed variable-length byte map and a tree-structured
//! command-line argument parser built on it.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build the parser in small, separately verifiable layers so
//!   each piece carries one precise contract.
//! - Layers:
//!   - GrowBuffer<T>: reallocation-growable storage with explicit
//!     doubling capacity management; backs every other component.
//!   - VarMap: a fixed-bucket-count hash map whose keys and values are
//!     byte strings of arbitrary length, packed back-to-back into one
//!     GrowBuffer per bucket. Replace, remove and lookup recompute
//!     offsets from the bucket base on every call; nothing holds a raw
//!     address across a mutation.
//!   - ArgTree: a tree of parser contexts (root plus nested
//!     subcommands), each resolving its short and long flag spellings
//!     through two VarMaps into a tree-wide, slot-stable option arena.
//!     Recursive-descent parsing, typed values, required-flag
//!     validation, structured errors, and a two-pass aligned usage
//!     renderer.
//!
//! Constraints
//! - Single-threaded and fully synchronous; no internal locking. A map
//!   must not be mutated while iterated — the borrow checker enforces
//!   this rather than a runtime guard.
//! - The bucket count of a VarMap is fixed for its lifetime; there is
//!   no rehashing. Costs are proportional to bucket occupancy, not
//!   total map size.
//! - Option-entry and context handles are slot keys and stay valid for
//!   the tree's lifetime regardless of later configuration.
//!
//! Error boundaries
//! - User input problems are data: `ArgTree::parse` returns a single
//!   `ParseError` carrying the failure kind, the offending entry and
//!   token, and the originating context.
//! - Configuration misuse is a programmer error: it logs through
//!   `tracing` and panics.
//!
//! Collaborators
//! - `path` normalizes `path`-typed flag values (realpath semantics);
//!   `span` is a small tokenizer exported alongside the core but
//!   consumed by nothing in it.

mod args;
mod grow_buffer;
pub mod path;
pub mod span;
mod usage;
mod var_map;
mod var_map_proptest;

// Public surface
pub use args::{ArgTree, ContextKey, ErrorKind, FlagSpec, OptionKey, ParseError, ValueKind};
pub use grow_buffer::GrowBuffer;
pub use var_map::{
    cmp_bytes, cmp_ignore_trailing_nul, hash_djb2, CompareFn, DropFn, Entry, HashFn, Iter, VarMap,
};

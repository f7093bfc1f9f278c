/*!

Types/type aliases that abstract over the implementing backing type.

A motivating example is the `IString` type, an interned string type. A number of external crates
could provide this functionality. This module redirects to whatever chosen implementation we want.
To use the [`ustr` crate](https://crates.io/crates/ustr), we just define `IString` as an alias for
`ustr::Ustr`. Everything downstream only assumes an interned, cheaply clonable, `Display`-able
string type.

The same goes for `NatSet` (a set of small natural numbers, used for sets of variable indices),
the `Counter` type backing the fresh-id allocators, and the `log` module, whose public interface
is just the usual leveled macros regardless of which logging framework backs them.

*/

mod counter;
mod string_util;

pub mod log;

// Interned string. `ustr` keeps a global cache that can be used across threads.
pub use ustr::Ustr as IString;

// A set of (small) natural numbers. Used for variable-index sets.
pub use bit_set::BitSet as NatSet;

// For vectors that are expected to have few elements, e.g. per-nonterminal rule lists.
pub use smallvec::{smallvec, SmallVec};

pub use std::collections::{HashMap, HashSet};

pub use counter::Counter;
pub use string_util::{join_iter, join_string};

// Logging is backed by `tracing`; re-exported for subscribers installed by front ends.
pub use tracing;

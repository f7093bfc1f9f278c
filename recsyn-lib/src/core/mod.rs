/*!

The object language: sorts and their registry, typed terms, and the pattern-matching recursion
scheme (PMRS) representation with its reduction engine. Everything here is solver-free; the
synthesis layer in [`crate::synth`] drives it.

*/

pub mod context;
pub mod pmrs;
pub mod problem;
pub mod sort;
pub mod term;

pub use context::Context;
pub use problem::Problem;

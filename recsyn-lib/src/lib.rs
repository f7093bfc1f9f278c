/*!

The recsyn core: given a *reference* function `f`, a *representation* function `r` and a *target
recursion skeleton* `g` with unknown scalar functions (holes), fill the holes so that `g = f ∘ r`
on all inputs.

The crate is organized around the refinement loop in [`synth::refinement`]:

- [`core`] holds the term and sort model, the pattern-matching recursion scheme (PMRS)
  representation and its reduction engine;
- [`synth`] derives first-order equations from finite sets of representative terms, translates
  them to syntax-guided synthesis queries, verifies candidates by bounded checking, and
  synthesizes per-term invariants on failure;
- [`ports`] isolates every interaction with external SyGuS/SMT solver binaries behind small,
  version-tagged adapters so that the loop itself stays synchronous and deterministic.

*/

pub mod config;
pub mod core;
pub mod error;
pub mod ports;
pub mod stats;
pub mod synth;

pub use config::Config;
pub use error::Error;

/*!

Error taxonomy. Only input errors and internal invariant violations are fatal to a solve;
resource and solver failures are recovered by the refinement loop and downgrade the final
answer to `Unknown`. Unification failures are ordinary values produced by `core::sort::unify`
and only become errors when a caller cannot proceed without the substitution.

*/

use recsyn_abs::IString;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SortError {
  #[error("cannot unify `{0}` with `{1}`")]
  Mismatch(String, String),

  #[error("occurs check: sort variable ?{0} appears inside `{1}`")]
  Occurs(u32, String),

  #[error("unknown data type `{0}`")]
  UnknownType(IString),

  #[error("unknown variant `{0}`")]
  UnknownVariant(IString),

  #[error("variant `{0}` already declared by data type `{1}`")]
  DuplicateVariant(IString, IString),

  #[error("data type `{0}` applied to {1} arguments, expected {2}")]
  Arity(IString, usize, usize),
}

#[derive(Debug, Clone, Error)]
pub enum PmrsError {
  #[error("main symbol `{0}` must take exactly one recursion argument")]
  MainArity(IString),

  #[error("nonterminal `{nt}` does not cover variant `{variant}`")]
  MissingVariant { nt: IString, variant: IString },

  #[error("nonterminal `{0}` mixes pattern rules with pattern-free rules")]
  MixedRules(IString),

  #[error("parameter `{0}` collides with a nonterminal or free variable")]
  ParamCollision(IString),

  #[error("rule references unknown nonterminal `{0}`")]
  UnknownNonterminal(IString),

  #[error("pattern-free nonterminal `{0}` has more than one rule")]
  OverlappingRules(IString),
}

/// Incomplete reduction is a diagnostic, not a fatal condition: the loop drops the affected
/// equation and reports `Unknown` if nothing is left to work with.
#[derive(Debug, Clone, Copy, Error)]
pub enum ReduceError {
  #[error("rewrite limit of {limit} steps reached")]
  LimitReached { limit: usize },
}

#[derive(Debug, Error)]
pub enum SolverError {
  #[error("failed to launch solver `{command}`: {source}")]
  Spawn {
    command: String,
    source:  std::io::Error,
  },

  #[error("solver i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("solver call timed out")]
  Timeout,

  #[error("solver call was cancelled")]
  Cancelled,

  #[error("unparsable solver output: {0}")]
  Unparsable(String),

  #[error("solver exited abnormally: {0}")]
  Crashed(String),
}

#[derive(Debug, Clone, Copy, Error)]
pub enum ResourceError {
  #[error("reduction limit exhausted")]
  ReductionLimit,

  #[error("verification bound exhausted")]
  VerifierBound,

  #[error("lemma attempt bound exhausted")]
  LemmaAttempts,

  #[error("refinement step bound exhausted")]
  RefinementSteps,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Sort(#[from] SortError),

  #[error(transparent)]
  Pmrs(#[from] PmrsError),

  #[error(transparent)]
  Reduce(#[from] ReduceError),

  #[error(transparent)]
  Solver(#[from] SolverError),

  #[error(transparent)]
  Resource(#[from] ResourceError),

  /// Parse or type-check failure in the problem definition. Fatal to this problem.
  #[error("input error: {0}")]
  Input(String),

  /// A state the loop cannot reach unless there is a bug.
  #[error("internal invariant violation: {0}")]
  Internal(String),
}

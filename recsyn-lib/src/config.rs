/*!

Parameters governing how the solver functions. One `Config` value is threaded through a solve;
the refinement loop's single weakened retry (`Config::weakened`) is the only place a
configuration is derived from another mid-run.

*/

use serde::{Deserialize, Serialize};

// region Enums used in `Config`

/// Which dialect quirks a subprocess adapter should apply. The core emits the common
/// SMT-LIB2/SyGuS-IF v2 subset; adapters only adjust launch flags and response framing.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub enum SolverKind {
  /// CVC4 and CVC5. Both accept `--lang sygus2` / `--lang smt2`.
  Cvc,
  /// Z3, SMT only.
  Z3,
}

// endregion

/// An external solver binary together with its launch arguments.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct SolverCommand {
  pub kind:    SolverKind,
  pub program: String,
  pub args:    Vec<String>,
}

impl SolverCommand {
  pub fn cvc_sygus() -> Self {
    SolverCommand {
      kind:    SolverKind::Cvc,
      program: "cvc5".into(),
      args:    vec!["--lang".into(), "sygus2".into()],
    }
  }

  pub fn cvc_smt() -> Self {
    SolverCommand {
      kind:    SolverKind::Cvc,
      program: "cvc5".into(),
      args:    vec!["--lang".into(), "smt2".into(), "--incremental".into()],
    }
  }

  pub fn z3_smt() -> Self {
    SolverCommand {
      kind:    SolverKind::Z3,
      program: "z3".into(),
      args:    vec!["-in".into(), "-smt2".into()],
    }
  }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Config {
  // Reduction and expansion bounds
  pub reduction_limit     : usize,
  pub expand_depth        : usize,
  pub expand_cut          : usize,
  pub num_expansions_check: usize,
  pub max_refinement_steps: usize,

  // Lemma synthesis
  pub max_lemma_attempts    : usize,
  /// Seconds granted to the unbounded (inductive) lemma check.
  pub induction_proof_tlimit: u64,
  /// Seconds granted to the bounded/unbounded race as a whole.
  pub wait_parallel_tlimit  : u64,

  // Lifting
  pub attempt_lifting     : bool,
  pub max_lifting_attempts: usize,

  // Optimizations. The retry after `IncorrectAssumptions` clears
  // `use_syntactic_definitions` and `assume_partial_correctness`.
  pub simple_init               : bool,
  pub use_deduction             : bool,
  pub use_syntactic_definitions : bool,
  pub assume_partial_correctness: bool,
  pub detupling                 : bool,
  pub simplify_equations        : bool,

  // Grammar
  pub mul_by_constant: bool,
  pub allow_nonlinear: bool,

  // Solvers
  pub sygus_solver: SolverCommand,
  pub smt_solver  : SolverCommand,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      reduction_limit     : 400,
      expand_depth        : 3,
      expand_cut          : 64,
      num_expansions_check: 16,
      max_refinement_steps: 64,

      max_lemma_attempts    : 4,
      induction_proof_tlimit: 5,
      wait_parallel_tlimit  : 60,

      attempt_lifting     : true,
      max_lifting_attempts: 2,

      simple_init               : false,
      use_deduction             : true,
      use_syntactic_definitions : true,
      assume_partial_correctness: false,
      detupling                 : true,
      simplify_equations        : true,

      mul_by_constant: true,
      allow_nonlinear: false,

      sygus_solver: SolverCommand::cvc_sygus(),
      smt_solver  : SolverCommand::z3_smt(),
    }
  }
}

impl Config {
  /// The configuration used for the single retry after `IncorrectAssumptions`.
  pub fn weakened(&self) -> Config {
    Config {
      use_syntactic_definitions : false,
      assume_partial_correctness: false,
      ..self.clone()
    }
  }
}

/*!

Per-solve statistics, persisted as JSON alongside the solution. The phase-transition trace
doubles as the observable behavior of the refinement state machine, which the cross-component
tests assert on.

*/

use std::time::Instant;

use serde::Serialize;

use crate::synth::refinement::Phase;

#[derive(Clone, Debug, Default, Serialize)]
pub struct Stats {
  pub elapsed_s             : f64,
  pub verification_elapsed_s: f64,
  pub refinement_steps      : usize,
  pub reduction_cache_hits  : usize,
  pub sygus_calls           : usize,
  pub smt_calls             : usize,
  pub lemmas_proven         : usize,
  pub equations_dropped     : usize,
  pub transitions           : Vec<(Phase, Phase)>,
}

impl Stats {
  pub fn record_transition(&mut self, from: Phase, to: Phase) {
    recsyn_abs::debug!(?from, ?to, "refinement transition");
    self.transitions.push((from, to));
  }

  /// True when the trace contains the given transition at least once.
  pub fn saw_transition(&self, from: Phase, to: Phase) -> bool {
    self.transitions.iter().any(|&(f, t)| f == from && t == to)
  }

  pub fn to_json(&self) -> String {
    // Serialization of this struct cannot fail.
    serde_json::to_string_pretty(self).expect("stats serialization")
  }
}

/// Small stopwatch for the elapsed-time fields.
pub struct Timer(Instant);

impl Timer {
  pub fn start() -> Timer {
    Timer(Instant::now())
  }

  pub fn elapsed_s(&self) -> f64 {
    self.0.elapsed().as_secs_f64()
  }
}

/*!

Problem loading and solve orchestration for the CLI: text → AST → problem, then one call into
the refinement loop with whatever ports the caller supplies. Kept separate from `main` so the
cross-component tests can drive the same path with mock ports.

*/

use recsyn_abs::join_string;
use recsyn_lib::core::context::Context;
use recsyn_lib::core::problem::Problem;
use recsyn_lib::error::Error;
use recsyn_lib::stats::Stats;
use recsyn_lib::synth::refinement::{solve, Ports, SynthOutcome};
use recsyn_lib::Config;

use crate::parser::{construct_problem, parse_program, FunctionRoles};

/// Parses and constructs a problem from source text. The context must be fresh or `reinit`ed;
/// construction registers the program's data types into it.
pub fn load_problem(ctx: &mut Context, text: &str, roles: &FunctionRoles) -> Result<Problem, Error> {
  let items = parse_program(text)?;
  construct_problem(ctx, &items, roles)
}

/// Runs the refinement loop on a loaded problem.
pub fn run(ctx: &Context, cfg: &Config, problem: &Problem, ports: &mut Ports<'_>) -> (SynthOutcome, Stats) {
  solve(ctx, cfg, problem, ports)
}

/// The textual solution format: one `name args = body` line per hole.
pub fn render_solutions(outcome: &SynthOutcome) -> String {
  match outcome {
    SynthOutcome::Realizable(solutions) => {
      join_string(solutions.iter(), "\n")
    }
    _ => String::new(),
  }
}

/// Exit code mapping: 0 realizable, 2 unrealizable (a successful negative answer, but
/// distinguishable), 1 anything undetermined.
pub fn exit_code(outcome: &SynthOutcome) -> i32 {
  match outcome {
    SynthOutcome::Realizable(_) => 0,
    SynthOutcome::Unrealizable(_) => 2,
    SynthOutcome::Unknown(_) | SynthOutcome::Failed(_) => 1,
  }
}

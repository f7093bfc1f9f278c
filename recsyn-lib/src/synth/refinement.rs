/*!

The refinement loop: the state machine orchestrating expansion, equation building, deduction,
synthesis, verification and lemma synthesis.

```text
Init → BuildEqs → Solve ─success→ Verify ─Correct→ Done(Realizable)
         ↑          │                │ Ctexs→ BuildEqs (T enlarged)
         │          └─failure→ LemmaSynth ─Progress→ BuildEqs
         │                        │ certificate + lifting budget → Lift → BuildEqs
         │                        └ otherwise → Done(Unrealizable | Unknown)
         └────────────────────────────────────────────────────────┘
```

Every external call is fallible and every failure is soft: rewrite-limit, verifier-bound and
lemma-budget breaches downgrade the answer to `Unknown` instead of crashing. The single
weakened retry (clearing `use_syntactic_definitions` and the partial-correctness assumption)
happens exactly once, when verification reports `IncorrectAssumptions`.

*/

use recsyn_abs::HashMap;
use serde::Serialize;

use crate::config::Config;
use crate::core::context::Context;
use crate::core::pmrs::mgt::most_general_terms;
use crate::core::pmrs::HoleSolution;
use crate::core::problem::Problem;
use crate::core::term::Term;
use crate::error::ResourceError;
use crate::stats::{Stats, Timer};

use super::deduction::{deduce_hole, Deduced, Skeleton};
use super::eqsolver::{solve_equations, SygusResponse};
use super::equation::{build_equations, Equation};
use super::expansion::Expansion;
use super::lemmas::{synthesize_lemmas, LemmaOutcome, LemmaProver};
use super::lifting::widen;
use super::state::{CexModel, RefinementState};
use super::verify::{check_candidate, Verification};

use crate::ports::smt::SmtPort;
use crate::ports::sygus::SygusPort;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub enum Phase {
  Init,
  BuildEqs,
  Solve,
  Verify,
  LemmaSynth,
  Lift,
  Done,
}

/// The external capabilities a solve needs, bundled so tests can inject mocks for all three.
pub struct Ports<'a> {
  pub sygus:        &'a mut dyn SygusPort,
  pub smt:          &'a mut dyn SmtPort,
  pub lemma_prover: &'a mut dyn LemmaProver,
}

/// What the equation set proves when no filling exists: the ground equations themselves plus
/// any classified counterexample valuations.
#[derive(Clone, Debug, Default)]
pub struct UnrealizabilityCertificate {
  pub equations: Vec<Equation>,
  pub examples:  Vec<CexModel>,
}

#[derive(Clone, Debug)]
pub enum SynthOutcome {
  /// One solution per hole, in hole declaration order.
  Realizable(Vec<HoleSolution>),
  Unrealizable(UnrealizabilityCertificate),
  /// A resource or solver budget was exhausted before an answer was certain.
  Unknown(ResourceError),
  Failed(String),
}

/// Solves a single problem to completion. Always returns the statistics gathered, whatever
/// the outcome.
pub fn solve(ctx: &Context, cfg: &Config, problem: &Problem, ports: &mut Ports<'_>) -> (SynthOutcome, Stats) {
  let timer = Timer::start();
  let mut stats = Stats::default();

  let mut cfg = cfg.clone();
  let mut problem = problem.clone();
  let mut retried = false;
  let mut lift_attempts = 0usize;

  let outcome = 'outer: loop {
    let mut state = RefinementState::new();
    state.lift.attempts = lift_attempts;
    stats.record_transition(Phase::Init, Phase::BuildEqs);
    initialize(ctx, &cfg, &problem, &mut state);

    loop {
      if stats.refinement_steps >= cfg.max_refinement_steps {
        break 'outer SynthOutcome::Unknown(ResourceError::RefinementSteps);
      }
      stats.refinement_steps += 1;

      let (equations, dropped) = build_equations(ctx, &cfg, &problem, &mut state);
      stats.equations_dropped += dropped;
      if equations.is_empty() {
        break 'outer SynthOutcome::Unknown(ResourceError::ReductionLimit);
      }
      stats.record_transition(Phase::BuildEqs, Phase::Solve);

      // Solver-free deduction first.
      let mut deduced: HashMap<u32, HoleSolution> = HashMap::default();
      let mut guesses: HashMap<u32, Skeleton> = HashMap::default();
      if cfg.use_deduction {
        for hole in problem.holes() {
          if state.syntactic_defs.contains_key(&hole.id) {
            continue;
          }
          match deduce_hole(ctx, hole, &equations, ports.smt) {
            Ok(Deduced::Solution(solution)) => {
              deduced.insert(hole.id, solution);
            }
            Ok(Deduced::Skeleton(skeleton)) => {
              guesses.insert(hole.id, skeleton);
            }
            Ok(Deduced::Inconclusive) => {}
            Err(error) => {
              recsyn_abs::warning!(hole = %hole.name, %error, "deduction attempt failed");
            }
          }
        }
      }
      if cfg.use_syntactic_definitions {
        for (id, solution) in &deduced {
          state.syntactic_defs.insert(*id, solution.clone());
        }
      }

      let mut assignment: HashMap<u32, HoleSolution> = state.syntactic_defs.clone();
      for (id, solution) in &deduced {
        assignment.insert(*id, solution.clone());
      }

      let mut infeasible = false;
      let candidate = if problem.holes().iter().all(|h| assignment.contains_key(&h.id)) {
        Some(assignment)
      } else {
        stats.sygus_calls += 1;
        match solve_equations(
          ctx,
          &cfg,
          &problem,
          &equations,
          &guesses,
          &state.syntactic_defs,
          ports.sygus,
        ) {
          Ok(SygusResponse::Success(solved)) => {
            for (id, solution) in solved {
              assignment.insert(id, solution);
            }
            Some(assignment)
          }
          Ok(SygusResponse::Infeasible) => {
            infeasible = true;
            None
          }
          Ok(SygusResponse::Fail) | Ok(SygusResponse::Unknown) => None,
          Err(error) => {
            recsyn_abs::warning!(%error, "synthesis call failed; treating as a failed step");
            None
          }
        }
      };

      match candidate {
        Some(assignment) => {
          stats.record_transition(Phase::Solve, Phase::Verify);
          let verification_timer = Timer::start();
          stats.smt_calls += 1;
          let verdict = check_candidate(ctx, &cfg, &problem, &assignment, &state, ports.smt);
          stats.verification_elapsed_s += verification_timer.elapsed_s();

          match verdict {
            Ok(Verification::Correct) => {
              stats.record_transition(Phase::Verify, Phase::Done);
              let solutions = problem
                .holes()
                .iter()
                .filter_map(|hole| assignment.get(&hole.id).cloned())
                .collect();
              break 'outer SynthOutcome::Realizable(solutions);
            }
            Ok(Verification::CounterExamples { new_t, witnesses }) => {
              // Partial correctness: keep the equations whose representatives survived this
              // candidate as assumptions for the next rounds.
              if cfg.assume_partial_correctness {
                let refuted: Vec<&Term> = witnesses.iter().map(|(t, _)| t).collect();
                state.assumptions = equations
                  .iter()
                  .filter(|e| !refuted.contains(&&e.term))
                  .cloned()
                  .collect();
              }
              state.absorb(new_t, []);
              stats.record_transition(Phase::Verify, Phase::BuildEqs);
            }
            Ok(Verification::IncorrectAssumptions) => {
              if retried {
                break 'outer SynthOutcome::Failed(
                  "assumptions remained inconsistent after the weakened retry".into(),
                );
              }
              retried = true;
              cfg = cfg.weakened();
              stats.record_transition(Phase::Verify, Phase::Init);
              continue 'outer;
            }
            Ok(Verification::BoundExhausted) => {
              break 'outer SynthOutcome::Unknown(ResourceError::VerifierBound);
            }
            Err(error) => {
              recsyn_abs::warning!(%error, "verification call failed");
              break 'outer SynthOutcome::Unknown(ResourceError::VerifierBound);
            }
          }
        }

        None => {
          stats.record_transition(Phase::Solve, Phase::LemmaSynth);
          let lemma_outcome = synthesize_lemmas(
            ctx,
            &cfg,
            &problem,
            &mut state,
            ports.sygus,
            ports.smt,
            ports.lemma_prover,
          );
          match lemma_outcome {
            Ok(LemmaOutcome::Progress) => {
              stats.lemmas_proven += 1;
              stats.record_transition(Phase::LemmaSynth, Phase::BuildEqs);
            }
            Ok(LemmaOutcome::Unrealizable(examples)) => {
              if cfg.attempt_lifting && lift_attempts < cfg.max_lifting_attempts {
                lift_attempts += 1;
                problem = widen(&problem);
                stats.record_transition(Phase::LemmaSynth, Phase::Lift);
                stats.record_transition(Phase::Lift, Phase::BuildEqs);
                continue 'outer;
              }
              break 'outer SynthOutcome::Unrealizable(UnrealizabilityCertificate {
                equations,
                examples,
              });
            }
            Ok(LemmaOutcome::NoProgress) => {
              if infeasible {
                // The system itself is the certificate: no filling satisfies these ground
                // equations, and no invariant could be found to restrict them.
                let examples = collect_examples(&state);
                break 'outer SynthOutcome::Unrealizable(UnrealizabilityCertificate {
                  equations,
                  examples,
                });
              }
              break 'outer SynthOutcome::Unknown(ResourceError::LemmaAttempts);
            }
            Err(error) => {
              recsyn_abs::warning!(%error, "lemma synthesis failed");
              break 'outer SynthOutcome::Unknown(ResourceError::LemmaAttempts);
            }
          }
        }
      }
    }
  };

  stats.elapsed_s = timer.elapsed_s();
  (outcome, stats)
}

/// Seeds T and U: the most general terms of the target skeleton, or a single fresh variable of
/// the input sort under `simple_init`, expanded to maximal reducibility.
fn initialize(ctx: &Context, cfg: &Config, problem: &Problem, state: &mut RefinementState) {
  let seeds = if cfg.simple_init {
    vec![Term::var(ctx.fresh_var("x", problem.theta.clone()))]
  } else {
    most_general_terms(ctx, &problem.target)
  };
  let oracle = Expansion::new(ctx, cfg, problem);
  let (t_set, u_set) = oracle.expand_loop(&seeds);
  state.absorb(t_set, u_set);
}

fn collect_examples(state: &RefinementState) -> Vec<CexModel> {
  let mut examples = Vec::new();
  for detail in state.details.values() {
    examples.extend(detail.positives.iter().cloned());
    examples.extend(detail.negatives.iter().cloned());
  }
  examples
}

#[cfg(test)]
mod tests {
  use recsyn_abs::IString;

  use crate::core::sort::Sort;
  use crate::ports::sexpr::parse_all;
  use crate::ports::sygus::SygusReply;
  use crate::synth::deduction::tests::MockSmt;
  use crate::synth::eqsolver::tests::MockSygus;
  use crate::synth::equation::tests::sum_problem;
  use crate::synth::lemmas::tests::MockProver;
  use crate::synth::lemmas::LemmaCheck;

  use super::*;

  fn mock_ports<'a>(
    sygus: &'a mut MockSygus,
    smt: &'a mut MockSmt,
    prover: &'a mut MockProver,
  ) -> Ports<'a> {
    Ports { sygus, smt, lemma_prover: prover }
  }

  #[test]
  fn list_sum_skeleton_is_realizable_by_deduction_alone() {
    let (ctx, problem) = sum_problem();
    let cfg = Config::default();

    let mut sygus = MockSygus::replying(vec![]);
    let mut smt = MockSmt::unsat();
    let mut prover = MockProver { outcomes: vec![], calls: 0 };
    let mut ports = mock_ports(&mut sygus, &mut smt, &mut prover);

    let (outcome, stats) = solve(&ctx, &cfg, &problem, &mut ports);
    let SynthOutcome::Realizable(solutions) = outcome else {
      panic!("expected realizable, got {:?}", outcome);
    };
    // c0 = 0 and odot a0 a1 = a0 + a1, straight from the equations.
    assert_eq!(solutions.len(), 2);
    let odot = solutions.iter().find(|s| s.name.as_str() == "odot").unwrap();
    assert_eq!(odot.body.to_string(), "a0 + a1");
    let c0 = solutions.iter().find(|s| s.name.as_str() == "c0").unwrap();
    assert_eq!(c0.body, Term::int(0));

    // The whole solve never needed the synthesis port.
    assert!(sygus.scripts.is_empty());
    assert!(stats.saw_transition(Phase::Solve, Phase::Verify));
    assert!(stats.saw_transition(Phase::Verify, Phase::Done));
    assert!(stats.refinement_steps >= 1);
  }

  #[test]
  fn the_solver_path_realizes_without_deduction() {
    let (ctx, problem) = sum_problem();
    let mut cfg = Config::default();
    cfg.use_deduction = false;

    let reply = SygusReply::Solutions(
      parse_all("(define-fun c0 () Int 0) (define-fun odot ((p0 Int) (p1 Int)) Int (+ p0 p1))")
        .unwrap(),
    );
    let mut sygus = MockSygus::replying(vec![reply]);
    let mut smt = MockSmt::unsat();
    let mut prover = MockProver { outcomes: vec![], calls: 0 };
    let mut ports = mock_ports(&mut sygus, &mut smt, &mut prover);

    let (outcome, stats) = solve(&ctx, &cfg, &problem, &mut ports);
    assert!(matches!(outcome, SynthOutcome::Realizable(_)), "got {:?}", outcome);
    assert_eq!(stats.sygus_calls, 1);
  }

  #[test]
  fn infeasible_systems_surface_an_unrealizability_certificate() {
    let (ctx, problem) = sum_problem();
    let mut cfg = Config::default();
    cfg.use_deduction = false;
    cfg.attempt_lifting = false;

    let mut sygus = MockSygus::replying(vec![SygusReply::Infeasible]);
    let mut smt = MockSmt::unsat();
    let mut prover = MockProver { outcomes: vec![], calls: 0 };
    let mut ports = mock_ports(&mut sygus, &mut smt, &mut prover);

    let (outcome, _stats) = solve(&ctx, &cfg, &problem, &mut ports);
    let SynthOutcome::Unrealizable(certificate) = outcome else {
      panic!("expected unrealizable, got {:?}", outcome);
    };
    assert!(!certificate.equations.is_empty());
  }

  #[test]
  fn verifier_bound_downgrades_to_unknown() {
    let (ctx, problem) = sum_problem();
    let mut cfg = Config::default();
    cfg.num_expansions_check = 1;

    let mut sygus = MockSygus::replying(vec![]);
    let mut smt = MockSmt::unsat();
    let mut prover = MockProver { outcomes: vec![], calls: 0 };
    let mut ports = mock_ports(&mut sygus, &mut smt, &mut prover);

    let (outcome, _stats) = solve(&ctx, &cfg, &problem, &mut ports);
    assert!(
      matches!(outcome, SynthOutcome::Unknown(ResourceError::VerifierBound)),
      "got {:?}",
      outcome
    );
  }

  /// The sum problem with a trivial `tinv`, so the lemma machinery has an invariant to work
  /// from.
  fn guarded_sum_problem() -> (Context, Problem) {
    use crate::core::pmrs::tests::list_sum_fixture;
    use crate::core::pmrs::{Pmrs, RewriteRule};
    use crate::synth::equation::tests::skeleton_target;

    let (ctx, reference) = list_sum_fixture();
    let list = Sort::Named(IString::from("list"));

    let repr_main = ctx.named_var("repr", Sort::arrow(&[list.clone()], list.clone()));
    let rx = ctx.named_var("x", list.clone());
    let repr = Pmrs::assemble(
      IString::from("repr"),
      vec![],
      vec![repr_main],
      0,
      vec![RewriteRule { nt: 0, args: vec![rx.clone()], pattern: None, rhs: Term::var(rx) }],
    )
    .unwrap();

    let tinv_main = ctx.named_var("tinv", Sort::arrow(&[list.clone()], Sort::Bool));
    let tx = ctx.named_var("x", list.clone());
    let tinv = Pmrs::assemble(
      IString::from("tinv"),
      vec![],
      vec![tinv_main],
      0,
      vec![RewriteRule {
        nt:      0,
        args:    vec![tx],
        pattern: None,
        rhs:     Term::bool_const(true),
      }],
    )
    .unwrap();

    let target = skeleton_target(&ctx);
    let problem = Problem::new(&ctx, reference, target, repr, Some(tinv)).unwrap();
    (ctx, problem)
  }

  #[test]
  fn lemma_progress_reenters_equation_building() {
    let (ctx, problem) = guarded_sum_problem();
    let mut cfg = Config::default();
    cfg.use_deduction = false;

    // Round 1: the solver gives up, a lemma is synthesized and proven. Round 2: solved.
    let lemma_reply =
      SygusReply::Solutions(parse_all("(define-fun lem ((z Int)) Bool (>= z 0))").unwrap());
    let solution_reply = SygusReply::Solutions(
      parse_all("(define-fun c0 () Int 0) (define-fun odot ((p0 Int) (p1 Int)) Int (+ p0 p1))")
        .unwrap(),
    );
    let mut sygus = MockSygus::replying(vec![SygusReply::Fail, lemma_reply, solution_reply]);

    // Seeding: the positive classification query is satisfiable, the negated one is not.
    let mut smt = MockSmt::scripted(vec![
      crate::ports::smt::SatAnswer::Sat,
      crate::ports::smt::SatAnswer::Unsat,
    ]);
    let mut prover = MockProver { outcomes: vec![LemmaCheck::Valid], calls: 0 };
    let mut ports = mock_ports(&mut sygus, &mut smt, &mut prover);

    let (outcome, stats) = solve(&ctx, &cfg, &problem, &mut ports);
    assert!(matches!(outcome, SynthOutcome::Realizable(_)), "got {:?}", outcome);
    assert!(stats.saw_transition(Phase::Solve, Phase::LemmaSynth));
    assert!(stats.saw_transition(Phase::LemmaSynth, Phase::BuildEqs));
    assert_eq!(stats.lemmas_proven, 1);
  }

  #[test]
  fn certified_unrealizability_tries_lifting_first() {
    let (ctx, problem) = guarded_sum_problem();
    let mut cfg = Config::default();
    cfg.use_deduction = false;
    cfg.max_lifting_attempts = 1;

    // The equation system and the lemma system are both infeasible; after the lifting budget
    // is spent the loop gives up.
    let mut sygus = MockSygus::replying(vec![SygusReply::Infeasible; 8]);
    let mut smt = MockSmt::scripted(vec![crate::ports::smt::SatAnswer::Sat; 8]);
    let mut prover = MockProver { outcomes: vec![], calls: 0 };
    let mut ports = mock_ports(&mut sygus, &mut smt, &mut prover);

    let (outcome, stats) = solve(&ctx, &cfg, &problem, &mut ports);
    assert!(stats.saw_transition(Phase::LemmaSynth, Phase::Lift));
    assert!(stats.saw_transition(Phase::Lift, Phase::BuildEqs));
    assert!(matches!(outcome, SynthOutcome::Unrealizable(_)), "got {:?}", outcome);
  }

  #[test]
  fn step_budget_terminates_the_loop() {
    let (ctx, problem) = sum_problem();
    let mut cfg = Config::default();
    cfg.use_deduction = false;
    cfg.max_refinement_steps = 2;

    // The solver keeps giving up; lemma synthesis cannot help without counterexamples.
    let mut sygus = MockSygus::replying(vec![SygusReply::Fail; 8]);
    let mut smt = MockSmt::unsat();
    let mut prover = MockProver { outcomes: vec![LemmaCheck::Undecided; 8], calls: 0 };
    let mut ports = mock_ports(&mut sygus, &mut smt, &mut prover);

    let (outcome, stats) = solve(&ctx, &cfg, &problem, &mut ports);
    assert!(matches!(outcome, SynthOutcome::Unknown(_)), "got {:?}", outcome);
    assert!(stats.refinement_steps <= 2);
  }
}

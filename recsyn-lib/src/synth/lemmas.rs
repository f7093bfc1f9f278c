/*!

Per-term invariant synthesis, entered when the equation system is infeasible or the solver gave
up. Each representative term with counterexamples gets a boolean synth-fun over its
recursion-elimination scalars; positive counterexamples constrain the lemma to hold, negative
ones to fail. Candidate lemmas are verified in two racing modes — *bounded* (instantiate every
expansion of the term up to the configured depth, check `¬lemma` UNSAT under `tinv`, the
recursion-elimination equations and the current precondition) and *unbounded* (the same query
on the representative itself, discharged by SMT induction under a time limit) — first result
wins and cancels the other. A SAT answer feeds the model back as a positive example for the
next synthesis round; UNSAT accepts the lemma into the term's precondition with the
`pre ⇒ lemma` framing.

An infeasible lemma query is an unrealizability certificate: the counterexample set itself is
jointly unsatisfiable with any filling from the grammar.

*/

use std::time::Duration;

use recsyn_abs::{HashMap, IString};

use crate::config::{Config, SolverCommand};
use crate::core::context::Context;
use crate::core::problem::Problem;
use crate::core::sort::Sort;
use crate::core::term::{match_term, Constant, Term, VarSubst, Variable};
use crate::error::SolverError;
use crate::ports::encode::{
  constant_to_sexp, declare_datatypes, define_systems, min_max_prelude, parse_model, sort_to_sexp,
  term_to_sexp, term_to_sexp_with,
};
use crate::ports::process::{run_once, CancelHandle};
use crate::ports::race::race_first;
use crate::ports::sexpr::{parse_all, render_script, Sexp};
use crate::ports::smt::{SatAnswer, SmtPort};
use crate::ports::sygus::{SygusPort, SygusReply};

use super::expansion::expand_once;
use super::grammar::{boolean_grammar, synth_fun, GrammarParams};
use super::state::{CexModel, RefinementState, TermDetail};

#[derive(Clone, Debug)]
pub enum LemmaOutcome {
  /// A lemma was proven and conjoined; the loop should rebuild equations.
  Progress,
  /// The counterexample set certifies unrealizability.
  Unrealizable(Vec<CexModel>),
  /// Nothing provable within the budget; the loop downgrades to Unknown.
  NoProgress,
}

/// Result of checking one candidate lemma.
#[derive(Clone, Debug)]
pub enum LemmaCheck {
  Valid,
  Refuted(CexModel),
  Undecided,
}

/// The checking side of lemma synthesis, kept behind a trait so the refinement loop can be
/// driven with mock provers in tests.
pub trait LemmaProver {
  fn prove(
    &mut self,
    bounded_scripts: &[String],
    unbounded_script: &str,
    scalars: &[Variable],
  ) -> Result<LemmaCheck, SolverError>;
}

/// The production prover: bounded and unbounded checks race on two subprocesses; whichever
/// resolves first wins and the loser's solver is killed.
pub struct RacingProver {
  pub command: SolverCommand,
  pub timeout: Duration,
}

impl LemmaProver for RacingProver {
  fn prove(
    &mut self,
    bounded_scripts: &[String],
    unbounded_script: &str,
    scalars: &[Variable],
  ) -> Result<LemmaCheck, SolverError> {
    let scalar_names: Vec<(u32, IString)> = scalars.iter().map(|s| (s.id, s.name)).collect();

    let bounded_command = self.command.clone();
    let bounded_scripts = bounded_scripts.to_vec();
    let names_left = scalar_names.clone();
    let bounded = move |handle: &CancelHandle| -> Result<LemmaCheck, SolverError> {
      for script in &bounded_scripts {
        match run_check(&bounded_command, script, handle, &names_left)? {
          LemmaCheck::Valid => continue,
          other => return Ok(other),
        }
      }
      Ok(LemmaCheck::Valid)
    };

    let unbounded_command = self.command.clone();
    let unbounded_script = unbounded_script.to_string();
    let names_right = scalar_names;
    let unbounded = move |handle: &CancelHandle| -> Result<LemmaCheck, SolverError> {
      run_check(&unbounded_command, &unbounded_script, handle, &names_right)
    };

    match race_first(bounded, unbounded, self.timeout) {
      Ok((_winner, result)) => result,
      Err(SolverError::Timeout) => Ok(LemmaCheck::Undecided),
      Err(error) => Err(error),
    }
  }
}

/// Runs one `(check-sat)(get-model)` script to completion and interprets the answer.
fn run_check(
  command: &SolverCommand,
  script: &str,
  handle: &CancelHandle,
  scalar_names: &[(u32, IString)],
) -> Result<LemmaCheck, SolverError> {
  let output = run_once(command, script, None, handle)?;
  let mut lines = output.trim().lines();
  let verdict = lines.next().unwrap_or_default().trim();
  match verdict {
    "unsat" => Ok(LemmaCheck::Valid),
    "unknown" | "timeout" => Ok(LemmaCheck::Undecided),
    "sat" => {
      let rest: String = lines.collect::<Vec<_>>().join("\n");
      let bindings = parse_all(&rest).map(|sexps| parse_model(&sexps)).unwrap_or_default();
      let mut model = CexModel::new();
      for (name, value) in bindings {
        if let Some((id, _)) = scalar_names.iter().find(|(_, n)| *n == name) {
          model.insert(*id, value);
        }
      }
      Ok(LemmaCheck::Refuted(model))
    }
    other => Err(SolverError::Unparsable(format!("check-sat answered `{}`", other))),
  }
}

/// The lemma synthesis pass over every representative with counterexamples.
pub fn synthesize_lemmas(
  ctx: &Context,
  cfg: &Config,
  problem: &Problem,
  state: &mut RefinementState,
  sygus: &mut dyn SygusPort,
  smt: &mut dyn SmtPort,
  prover: &mut dyn LemmaProver,
) -> Result<LemmaOutcome, SolverError> {
  let terms: Vec<Term> = state.t_set.iter().cloned().collect();
  let mut progressed = false;

  for term in terms {
    // Representatives without recursion scalars carry nothing to constrain.
    if state.detail_mut(&term).scalars.is_empty() {
      continue;
    }

    if needs_seed(state.detail_mut(&term)) {
      seed_counterexamples(ctx, problem, state.detail_mut(&term), smt)?;
    }
    let detail = state.detail_mut(&term);
    if detail.positives.is_empty() && detail.negatives.is_empty() {
      continue;
    }

    for _attempt in 0..cfg.max_lemma_attempts {
      let detail = state.detail_mut(&term);
      let candidate = match synthesize_candidate(ctx, cfg, detail, sygus)? {
        CandidateOutcome::Candidate(lemma) => lemma,
        CandidateOutcome::Infeasible => {
          let detail = state.detail_mut(&term);
          let mut witnesses = detail.positives.clone();
          witnesses.extend(detail.negatives.clone());
          return Ok(LemmaOutcome::Unrealizable(witnesses));
        }
        CandidateOutcome::GaveUp => break,
      };
      state.detail_mut(&term).lemma_candidate = Some(candidate.clone());

      let (bounded, unbounded, scalars) =
        verification_scripts(ctx, cfg, problem, state.detail_mut(&term), &candidate);
      match prover.prove(&bounded, &unbounded, &scalars)? {
        LemmaCheck::Valid => {
          state.detail_mut(&term).add_lemma(candidate);
          progressed = true;
          break;
        }
        LemmaCheck::Refuted(model) => {
          // A reachable state violating the candidate: it must be allowed next round.
          state.detail_mut(&term).positives.push(model);
        }
        LemmaCheck::Undecided => break,
      }
    }
  }

  if progressed {
    Ok(LemmaOutcome::Progress)
  } else {
    Ok(LemmaOutcome::NoProgress)
  }
}

fn needs_seed(detail: &TermDetail) -> bool {
  detail.positives.is_empty() && detail.negatives.is_empty()
}

/// Classifies initial examples for a term through the SMT port: a model of the
/// recursion-elimination equations under `tinv` is a positive example; a model violating
/// `tinv` is a negative one. Negative classification matches the reference-image predicate:
/// the state is not reachable from any well-formed input.
fn seed_counterexamples(
  ctx: &Context,
  problem: &Problem,
  detail: &mut TermDetail,
  smt: &mut dyn SmtPort,
) -> Result<(), SolverError> {
  let Some(tinv) = &problem.tinv else {
    return Ok(());
  };

  let mut systems = problem.lhs_systems();
  systems.push(tinv);
  let (defs, renames) = define_systems(ctx, &systems);

  for negate in [false, true] {
    smt.push()?;
    if let Some(decl) = declare_datatypes(ctx, &[&problem.theta, &problem.tau]) {
      smt.exec(&decl)?;
    }
    for command in min_max_prelude() {
      smt.exec(&command)?;
    }
    for command in &defs {
      smt.exec(command)?;
    }

    let mut variables: Vec<Variable> = detail.term.free_variables();
    variables.extend(detail.scalars.iter().cloned());
    for variable in &variables {
      smt.exec(&Sexp::list(vec![
        Sexp::atom("declare-const"),
        Sexp::atom(variable.name.as_str()),
        sort_to_sexp(&variable.sort),
      ]))?;
    }

    for assertion in elimination_equations(problem, detail, &renames) {
      smt.assert(&assertion)?;
    }

    let invariant = term_to_sexp_with(&tinv.apply_main(detail.term.clone()), &renames);
    if negate {
      smt.assert(&Sexp::list(vec![Sexp::atom("not"), invariant]))?;
    } else {
      smt.assert(&invariant)?;
    }

    let answer = smt.check_sat()?;
    if answer == SatAnswer::Sat {
      let bindings = smt.get_model()?;
      let mut model = CexModel::new();
      for (name, value) in bindings {
        if let Some(scalar) = detail.scalars.iter().find(|s| s.name == name) {
          model.insert(scalar.id, value);
        }
      }
      if !model.is_empty() {
        if negate {
          detail.negatives.push(model);
        } else {
          detail.positives.push(model);
        }
      }
    }
    smt.pop()?;
  }
  Ok(())
}

/// `(= sᵢ (F (R xᵢ)))` for every recursion-elimination pair of the term.
fn elimination_equations(
  problem: &Problem,
  detail: &TermDetail,
  renames: &HashMap<u32, IString>,
) -> Vec<Sexp> {
  detail
    .recurs_elim
    .iter()
    .map(|(subterm, scalar)| {
      let image = problem.lhs_term(subterm);
      Sexp::list(vec![
        Sexp::atom("="),
        Sexp::atom(scalar.name.as_str()),
        term_to_sexp_with(&image, renames),
      ])
    })
    .collect()
}

enum CandidateOutcome {
  Candidate(Term),
  Infeasible,
  GaveUp,
}

/// One SyGuS round for a per-term lemma: boolean-parametric grammar over the scalars,
/// positives as `(constraint (lemma …))`, negatives negated.
fn synthesize_candidate(
  ctx: &Context,
  cfg: &Config,
  detail: &TermDetail,
  sygus: &mut dyn SygusPort,
) -> Result<CandidateOutcome, SolverError> {
  let name = ctx.fresh_name("lemma");
  let params = GrammarParams::from_config(cfg);
  let grammar = boolean_grammar(&detail.scalars, &params);

  let mut script = vec![Sexp::list(vec![Sexp::atom("set-logic"), Sexp::atom("LIA")])];
  script.push(synth_fun(name.as_str(), &detail.scalars, &Sort::Bool, Some(&grammar)));

  let apply = |model: &CexModel| -> Sexp {
    let mut items = vec![Sexp::atom(name.as_str())];
    for scalar in &detail.scalars {
      let value = model.get(&scalar.id).cloned().unwrap_or(Constant::Int(0));
      items.push(constant_to_sexp(&value));
    }
    if items.len() == 1 {
      items.remove(0)
    } else {
      Sexp::List(items)
    }
  };

  for positive in &detail.positives {
    script.push(Sexp::list(vec![Sexp::atom("constraint"), apply(positive)]));
  }
  for negative in &detail.negatives {
    script.push(Sexp::list(vec![
      Sexp::atom("constraint"),
      Sexp::list(vec![Sexp::atom("not"), apply(negative)]),
    ]));
  }
  script.push(Sexp::list(vec![Sexp::atom("check-synth")]));

  match sygus.check_synth(&render_script(&script))? {
    SygusReply::Infeasible => Ok(CandidateOutcome::Infeasible),
    SygusReply::Fail | SygusReply::Unknown => Ok(CandidateOutcome::GaveUp),
    SygusReply::Solutions(defs) => {
      let def = defs
        .first()
        .ok_or_else(|| SolverError::Unparsable("empty lemma solution".into()))?;
      let solution = crate::ports::encode::decode_define_fun(ctx, def)?;
      // Re-align the decoded parameters with the term's scalars by position.
      let subst: VarSubst = solution
        .args
        .iter()
        .zip(&detail.scalars)
        .map(|(arg, scalar)| (arg.id, Term::var(scalar.clone())))
        .collect();
      Ok(CandidateOutcome::Candidate(solution.body.substitute(&subst)))
    }
  }
}

/// Renders the bounded and unbounded verification scripts for a candidate lemma.
fn verification_scripts(
  ctx: &Context,
  cfg: &Config,
  problem: &Problem,
  detail: &TermDetail,
  candidate: &Term,
) -> (Vec<String>, String, Vec<Variable>) {
  let mut systems = problem.lhs_systems();
  if let Some(tinv) = &problem.tinv {
    systems.push(tinv);
  }
  let (defs, renames) = define_systems(ctx, &systems);

  let script_for = |instance: &Term, induction: bool| -> String {
    let mut script = Vec::new();
    script.push(Sexp::list(vec![Sexp::atom("set-logic"), Sexp::atom("ALL")]));
    if induction {
      script.push(Sexp::list(vec![
        Sexp::atom("set-option"),
        Sexp::atom(":quant-ind"),
        Sexp::atom("true"),
      ]));
      script.push(Sexp::list(vec![
        Sexp::atom("set-option"),
        Sexp::atom(":tlimit"),
        Sexp::atom(&(cfg.induction_proof_tlimit * 1000).to_string()),
      ]));
    }
    if let Some(decl) = declare_datatypes(ctx, &[&problem.theta, &problem.tau]) {
      script.push(decl);
    }
    script.extend(min_max_prelude());
    script.extend(defs.iter().cloned());

    // The instance is an expansion of the representative; its match substitution carries the
    // recursion-elimination equations over.
    let sigma = match_term(&detail.term, instance).unwrap_or_default();

    let mut variables: Vec<Variable> = instance.free_variables();
    variables.extend(detail.scalars.iter().cloned());
    for variable in &variables {
      script.push(Sexp::list(vec![
        Sexp::atom("declare-const"),
        Sexp::atom(variable.name.as_str()),
        sort_to_sexp(&variable.sort),
      ]));
    }

    for (subterm, scalar) in &detail.recurs_elim {
      let image = problem.lhs_term(&subterm.substitute(&sigma));
      script.push(Sexp::list(vec![
        Sexp::atom("assert"),
        Sexp::list(vec![
          Sexp::atom("="),
          Sexp::atom(scalar.name.as_str()),
          term_to_sexp_with(&image, &renames),
        ]),
      ]));
    }
    if let Some(tinv) = &problem.tinv {
      script.push(Sexp::list(vec![
        Sexp::atom("assert"),
        term_to_sexp_with(&tinv.apply_main(instance.clone()), &renames),
      ]));
    }
    if let Some(precond) = &detail.precond {
      script.push(Sexp::list(vec![Sexp::atom("assert"), term_to_sexp(precond)]));
    }
    script.push(Sexp::list(vec![
      Sexp::atom("assert"),
      Sexp::list(vec![Sexp::atom("not"), term_to_sexp(candidate)]),
    ]));
    script.push(Sexp::list(vec![Sexp::atom("check-sat")]));
    script.push(Sexp::list(vec![Sexp::atom("get-model")]));
    render_script(&script)
  };

  let mut instances = vec![detail.term.clone()];
  let mut frontier = vec![detail.term.clone()];
  for _ in 0..cfg.expand_depth {
    let mut next = Vec::new();
    for term in &frontier {
      next.extend(expand_once(ctx, term));
    }
    instances.extend(next.iter().cloned());
    frontier = next;
  }

  let bounded: Vec<String> = instances.iter().map(|i| script_for(i, false)).collect();
  let unbounded = script_for(&detail.term, true);
  (bounded, unbounded, detail.scalars.clone())
}

#[cfg(test)]
pub(crate) mod tests {
  use crate::synth::deduction::tests::MockSmt;
  use crate::synth::eqsolver::tests::MockSygus;
  use crate::synth::equation::tests::sum_problem;

  use super::*;

  /// A prover with scripted outcomes, for driving the loop without solver binaries.
  pub(crate) struct MockProver {
    pub outcomes: Vec<LemmaCheck>,
    pub calls:    usize,
  }

  impl LemmaProver for MockProver {
    fn prove(
      &mut self,
      _bounded: &[String],
      _unbounded: &str,
      _scalars: &[Variable],
    ) -> Result<LemmaCheck, SolverError> {
      let outcome = if self.calls < self.outcomes.len() {
        self.outcomes[self.calls].clone()
      } else {
        LemmaCheck::Valid
      };
      self.calls += 1;
      Ok(outcome)
    }
  }

  fn detail_with_examples(ctx: &Context) -> (Term, TermDetail) {
    let list = Sort::Named(IString::from("list"));
    let hd = Term::var(ctx.fresh_var("hd", Sort::Int));
    let tl = ctx.fresh_var("tl", list.clone());
    let term = Term::data(IString::from("Cons"), vec![hd, Term::var(tl.clone())], list);

    let mut detail = TermDetail::new(term.clone());
    let scalar = detail.scalar_for(ctx, &tl, &Sort::Int);

    let mut positive = CexModel::new();
    positive.insert(scalar.id, Constant::Int(3));
    detail.positives.push(positive);
    let mut negative = CexModel::new();
    negative.insert(scalar.id, Constant::Int(-2));
    detail.negatives.push(negative);
    (term, detail)
  }

  #[test]
  fn lemma_constraints_follow_the_example_polarity() {
    let (ctx, _problem) = sum_problem();
    let cfg = Config::default();
    let (_term, detail) = detail_with_examples(&ctx);

    let mut sygus = MockSygus::replying(vec![SygusReply::Unknown]);
    let outcome = synthesize_candidate(&ctx, &cfg, &detail, &mut sygus).unwrap();
    assert!(matches!(outcome, CandidateOutcome::GaveUp));

    let script = &sygus.scripts[0];
    assert!(script.contains("(synth-fun lemma"));
    assert!(script.contains("Bool"));
    assert!(script.contains("(constraint (lemma"));
    assert!(script.contains("(constraint (not (lemma"));
    assert!(script.contains("(- 2)"));
  }

  #[test]
  fn accepted_lemmas_join_the_precondition() {
    let (ctx, problem) = sum_problem();
    let cfg = Config::default();
    let mut state = RefinementState::new();
    let (term, detail) = detail_with_examples(&ctx);
    let scalar_name = detail.scalars[0].name;
    state.t_set.insert(term.clone());
    state.details.insert(term.clone(), detail);

    let lemma_reply = SygusReply::Solutions(
      parse_all(&format!("(define-fun lemma0 (({} Int)) Bool (>= {} 0))", scalar_name, scalar_name))
        .unwrap(),
    );
    let mut sygus = MockSygus::replying(vec![lemma_reply]);
    let mut smt = MockSmt::unsat();
    let mut prover = MockProver { outcomes: vec![LemmaCheck::Valid], calls: 0 };

    let outcome =
      synthesize_lemmas(&ctx, &cfg, &problem, &mut state, &mut sygus, &mut smt, &mut prover).unwrap();
    assert!(matches!(outcome, LemmaOutcome::Progress));

    let detail = &state.details[&term];
    assert_eq!(detail.lemmas.len(), 1);
    let precond = detail.precond.as_ref().unwrap();
    assert!(precond.to_string().contains(">= 0") || precond.to_string().contains(">="));
  }

  #[test]
  fn refuting_models_become_positive_examples() {
    let (ctx, problem) = sum_problem();
    let mut cfg = Config::default();
    cfg.max_lemma_attempts = 2;
    let mut state = RefinementState::new();
    let (term, detail) = detail_with_examples(&ctx);
    let scalar = detail.scalars[0].clone();
    state.t_set.insert(term.clone());
    state.details.insert(term.clone(), detail);

    let reply = |name: &str| {
      SygusReply::Solutions(
        parse_all(&format!("(define-fun {} (({} Int)) Bool (> {} 0))", name, scalar.name, scalar.name))
          .unwrap(),
      )
    };
    let mut sygus = MockSygus::replying(vec![reply("lemma0"), reply("lemma1")]);
    let mut smt = MockSmt::unsat();

    let mut refuted = CexModel::new();
    refuted.insert(scalar.id, Constant::Int(0));
    let mut prover = MockProver {
      outcomes: vec![LemmaCheck::Refuted(refuted), LemmaCheck::Valid],
      calls:    0,
    };

    let outcome =
      synthesize_lemmas(&ctx, &cfg, &problem, &mut state, &mut sygus, &mut smt, &mut prover).unwrap();
    assert!(matches!(outcome, LemmaOutcome::Progress));
    assert_eq!(prover.calls, 2);
    // The refuting model was absorbed as a positive example.
    assert_eq!(state.details[&term].positives.len(), 2);
  }

  #[test]
  fn infeasible_lemma_synthesis_certifies_unrealizability() {
    let (ctx, problem) = sum_problem();
    let cfg = Config::default();
    let mut state = RefinementState::new();
    let (term, detail) = detail_with_examples(&ctx);
    state.t_set.insert(term.clone());
    state.details.insert(term, detail);

    let mut sygus = MockSygus::replying(vec![SygusReply::Infeasible]);
    let mut smt = MockSmt::unsat();
    let mut prover = MockProver { outcomes: vec![], calls: 0 };

    let outcome =
      synthesize_lemmas(&ctx, &cfg, &problem, &mut state, &mut sygus, &mut smt, &mut prover).unwrap();
    let LemmaOutcome::Unrealizable(witnesses) = outcome else {
      panic!("expected unrealizability, got {:?}", outcome);
    };
    assert_eq!(witnesses.len(), 2);
  }
}

/*!

Bounded verification of a candidate solution. The target skeleton is instantiated with the
candidate hole fillings, and the representatives in T ∪ U are expanded breadth-first; every
maximally reducible expansion is checked, structurally first and through the SMT port when the
two normal forms differ syntactically. A SAT answer yields a generalized counterexample — the
expansion term plus the model — which the loop absorbs into T; every such term is one expansion
step away from an existing representative.

`num_expansions_check` bounds the number of checked terms. A budget too small to revisit every
representative and its immediate expansions cannot certify anything and is reported as
[`Verification::BoundExhausted`], which the loop downgrades to `Unknown` — never a false
positive.

*/

use std::collections::VecDeque;

use recsyn_abs::HashMap;

use crate::config::Config;
use crate::core::context::Context;
use crate::core::pmrs::HoleSolution;
use crate::core::problem::Problem;
use crate::core::term::{simplify, Term, Variable};
use crate::error::SolverError;
use crate::ports::encode::{min_max_prelude, sort_to_sexp, term_to_sexp};
use crate::ports::sexpr::Sexp;
use crate::ports::smt::{SatAnswer, SmtPort};

use super::equation::main_equivalents;
use super::expansion::{expand_once, Expansion};
use super::state::{CexModel, RefinementState, TermDetail};

#[derive(Clone, Debug)]
pub enum Verification {
  /// No counterexample within the bound, with the frontier explored past every representative.
  Correct,
  /// Generalized counterexamples to absorb into T.
  CounterExamples {
    new_t:     Vec<Term>,
    witnesses: Vec<(Term, CexModel)>,
  },
  /// The partial-correctness assumptions over-constrained the system.
  IncorrectAssumptions,
  /// The bound was too small to even revisit the representatives.
  BoundExhausted,
}

pub fn check_candidate(
  ctx: &Context,
  cfg: &Config,
  problem: &Problem,
  assignment: &HashMap<u32, HoleSolution>,
  state: &RefinementState,
  smt: &mut dyn SmtPort,
) -> Result<Verification, SolverError> {
  let instantiated = problem.target.instantiate(assignment);
  let oracle = Expansion::with_target(ctx, cfg, problem, &instantiated);

  // Recursion elimination for the instantiated system works exactly like equation building;
  // the target's delegation closure is recomputed because instantiation rebuilt the rules.
  let elim = EliminationContext::new(problem, &instantiated);

  let mut frontier: VecDeque<(Term, usize)> = VecDeque::new();
  for seed in state.t_set.iter().chain(state.u_set.iter()) {
    frontier.push_back((seed.clone(), 0));
  }

  let mut checked = 0usize;
  let mut witnesses: Vec<(Term, CexModel)> = Vec::new();
  let mut had_unknown = false;
  let frontier_cap = 4 * (cfg.num_expansions_check + 1);

  while let Some((term, depth)) = frontier.pop_front() {
    if checked >= cfg.num_expansions_check {
      frontier.push_front((term, depth));
      break;
    }

    if oracle.is_mr(&term) {
      checked += 1;
      if let Some(model) = check_one(ctx, problem, &oracle, &elim, state, &term, smt)? {
        match model {
          CheckOutcome::Refuted(model) => witnesses.push((term.clone(), model)),
          CheckOutcome::Undecided => had_unknown = true,
        }
      }
    }

    if frontier.len() < frontier_cap {
      for expansion in expand_once(ctx, &term) {
        frontier.push_back((expansion, depth + 1));
      }
    }
  }

  if !witnesses.is_empty() {
    // Assumption equations were supposed to pin the representatives; a refuted representative
    // means they over-constrained the system.
    if !state.assumptions.is_empty()
      && witnesses.iter().any(|(term, _)| state.t_set.contains(term))
    {
      return Ok(Verification::IncorrectAssumptions);
    }
    let new_t = witnesses.iter().map(|(term, _)| term.clone()).collect();
    return Ok(Verification::CounterExamples { new_t, witnesses });
  }

  // No counterexample. Certify only if the search got past the representatives themselves.
  let shallow_left = frontier.iter().any(|(_, depth)| *depth <= 1);
  if shallow_left || had_unknown || checked == 0 {
    return Ok(Verification::BoundExhausted);
  }
  Ok(Verification::Correct)
}

enum CheckOutcome {
  Refuted(CexModel),
  Undecided,
}

/// Recursion-elimination id sets for the verifier, mirroring the equation builder but against
/// the instantiated target.
struct EliminationContext {
  reference_mains: recsyn_abs::NatSet,
  target_mains:    recsyn_abs::NatSet,
  repr_ids:        recsyn_abs::NatSet,
  all_ids:         recsyn_abs::NatSet,
}

impl EliminationContext {
  fn new(problem: &Problem, instantiated: &crate::core::pmrs::Pmrs) -> EliminationContext {
    let mut all_ids = problem.all_nonterminal_ids();
    all_ids.union_with(&instantiated.nonterminal_ids());
    EliminationContext {
      reference_mains: main_equivalents(&problem.reference),
      target_mains: main_equivalents(instantiated),
      repr_ids: problem.repr.nonterminal_ids(),
      all_ids,
    }
  }
}

/// Checks one expansion term; `None` means the sides agreed structurally.
fn check_one(
  ctx: &Context,
  problem: &Problem,
  oracle: &Expansion<'_>,
  elim: &EliminationContext,
  state: &RefinementState,
  term: &Term,
  smt: &mut dyn SmtPort,
) -> Result<Option<CheckOutcome>, SolverError> {
  let (lhs_result, rhs_result) = oracle.reduce_sides(term);
  let (Ok(lhs_nf), Ok(rhs_nf)) = (lhs_result, rhs_result) else {
    // Rewrite-limit breach during verification is a soft failure.
    return Ok(Some(CheckOutcome::Undecided));
  };

  let mut detail = TermDetail::new(term.clone());
  let lhs = simplify(&eliminate(ctx, &mut detail, &lhs_nf, problem, elim));
  let rhs = simplify(&eliminate(ctx, &mut detail, &rhs_nf, problem, elim));
  if lhs == rhs {
    return Ok(None);
  }

  // The precondition of the representative this expansion descends from, if any.
  let precond = state
    .details
    .values()
    .find(|d| crate::core::term::matches_subpattern(&d.term, term).is_some())
    .and_then(|d| d.precond.clone());

  let mut variables: Vec<Variable> = Vec::new();
  for v in lhs.free_variables().into_iter().chain(rhs.free_variables()) {
    if !variables.iter().any(|seen| seen.id == v.id) {
      variables.push(v);
    }
  }

  smt.push()?;
  for command in min_max_prelude() {
    smt.exec(&command)?;
  }
  for variable in &variables {
    smt.exec(&Sexp::list(vec![
      Sexp::atom("declare-const"),
      Sexp::atom(variable.name.as_str()),
      sort_to_sexp(&variable.sort),
    ]))?;
  }
  if let Some(precond) = &precond {
    smt.assert(&term_to_sexp(precond))?;
  }
  smt.assert(&Sexp::list(vec![
    Sexp::atom("not"),
    Sexp::list(vec![Sexp::atom("="), term_to_sexp(&lhs), term_to_sexp(&rhs)]),
  ]))?;
  let answer = smt.check_sat()?;

  let outcome = match answer {
    SatAnswer::Unsat => None,
    SatAnswer::Unknown => Some(CheckOutcome::Undecided),
    SatAnswer::Sat => {
      let bindings = smt.get_model()?;
      let mut model = CexModel::new();
      for (name, value) in bindings {
        if let Some(variable) = variables.iter().find(|v| v.name == name) {
          model.insert(variable.id, value);
        }
      }
      Some(CheckOutcome::Refuted(model))
    }
  };
  smt.pop()?;
  Ok(outcome)
}

/// Recursion elimination against the instantiated target (same scheme as the equation
/// builder, with a throwaway detail since verification scalars are local to the check).
fn eliminate(
  ctx: &Context,
  detail: &mut TermDetail,
  t: &Term,
  problem: &Problem,
  elim: &EliminationContext,
) -> Term {
  use crate::core::term::TermKind;

  if let TermKind::App(head, args) = t.kind() {
    if let TermKind::Var(head_var) = head.kind() {
      if elim.all_ids.contains(head_var.id as usize) {
        let is_main = elim.reference_mains.contains(head_var.id as usize)
          || elim.target_mains.contains(head_var.id as usize);
        if is_main {
          if let Some(base) = shallow_base(t, &elim.repr_ids) {
            return Term::var(detail.scalar_for(ctx, &base, &problem.alpha));
          }
        }
        let rebuilt_args: Vec<Term> = args
          .iter()
          .map(|a| eliminate(ctx, detail, a, problem, elim))
          .collect();
        let key = Term::app(head.clone(), rebuilt_args);
        let return_sort = head_var.sort.return_after(args.len());
        return Term::var(detail.scalar_for_call(ctx, key, &return_sort));
      }
    }
  }

  let children: Vec<Term> = t
    .children()
    .iter()
    .map(|c| eliminate(ctx, detail, c, problem, elim))
    .collect();
  crate::core::pmrs::rebuild_with_children(t, children)
}

/// `x` of a composition-shaped call `F x` or `F (R x)`.
fn shallow_base(t: &Term, repr_ids: &recsyn_abs::NatSet) -> Option<Variable> {
  use crate::core::term::TermKind;
  let TermKind::App(_, args) = t.kind() else {
    return None;
  };
  match args.last()?.kind() {
    TermKind::Var(x) => Some(x.clone()),
    TermKind::App(inner_head, inner_args) => {
      if let TermKind::Var(r) = inner_head.kind() {
        if repr_ids.contains(r.id as usize) {
          if let Some(TermKind::Var(x)) = inner_args.last().map(Term::kind) {
            return Some(x.clone());
          }
        }
      }
      None
    }
    _ => None,
  }
}

/*!

Equation derivation. For each representative `t ∈ T`, both sides of `f ∘ r = g` are reduced on
`t` and every remaining recursive call is replaced by a scalar variable, identically on both
sides:

- a call of a *main-equivalent* symbol on an expansion variable `x` — the target's directly,
  the reference's through `r` — stands for the common image `f(r(x)) = g(x)` and is replaced by
  the scalar keyed to `x` alone, which is what ties the two sides together;
- any other stuck call (an auxiliary nonterminal recursing on a variable) gets a scalar keyed
  to the whole application, so identical calls share a scalar and distinct ones stay apart.

Main-equivalence is the delegation closure: `main x → h x` makes `h` answer for `main`. The
result must be pure first-order; an equation still mentioning a nonterminal after elimination
means the rewrite limit was hit and it is dropped with a diagnostic rather than emitted wrong.

*/

use std::fmt::{Display, Formatter};

use recsyn_abs::NatSet;

use crate::config::Config;
use crate::core::context::Context;
use crate::core::pmrs::Pmrs;
use crate::core::problem::Problem;
use crate::core::sort::Sort;
use crate::core::term::{simplify, Term, TermKind, Variable};
use crate::synth::expansion::Expansion;
use crate::synth::state::{RefinementState, TermDetail};

/// A pure first-order equation between reductions of the two sides, together with the
/// representative it came from and its current precondition.
#[derive(Clone, PartialEq, Debug)]
pub struct Equation {
  pub term:    Term,
  pub precond: Option<Term>,
  pub lhs:     Term,
  pub rhs:     Term,
}

impl Display for Equation {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match &self.precond {
      Some(precond) => write!(f, "{} ⟹ {} = {}", precond, self.lhs, self.rhs),
      None => write!(f, "{} = {}", self.lhs, self.rhs),
    }
  }
}

impl Equation {
  /// Free variables of both sides and the precondition, in first-occurrence order.
  pub fn free_variables(&self) -> Vec<Variable> {
    let mut seen: NatSet = NatSet::default();
    let mut result = Vec::new();
    let mut visit = |t: &Term| {
      for v in t.free_variables() {
        if !seen.contains(v.id as usize) {
          seen.insert(v.id as usize);
          result.push(v);
        }
      }
    };
    if let Some(precond) = &self.precond {
      visit(precond);
    }
    visit(&self.lhs);
    visit(&self.rhs);
    result
  }
}

/// The delegation closure of the main symbol: every nonterminal reachable from `main` through
/// single pattern-free rules of the shape `M x → N x`.
pub fn main_equivalents(p: &Pmrs) -> NatSet {
  let mut equivalent = NatSet::default();
  equivalent.insert(p.main_var().id as usize);

  let mut changed = true;
  while changed {
    changed = false;
    for nt in &p.nonterminals {
      if !equivalent.contains(nt.var.id as usize) || nt.rules.len() != 1 {
        continue;
      }
      let rule = &p.rules[nt.rules[0]];
      if rule.pattern.is_some() || rule.args.len() != 1 {
        continue;
      }
      // rhs must be exactly `N x` for the rule's own argument x.
      if let TermKind::App(head, args) = rule.rhs.kind() {
        if let (TermKind::Var(callee), [arg]) = (head.kind(), args.as_slice()) {
          let delegates = matches!(arg.kind(), TermKind::Var(v) if v.id == rule.args[0].id);
          if delegates
            && p.nt_index_of(callee.id).is_some()
            && !equivalent.contains(callee.id as usize)
          {
            equivalent.insert(callee.id as usize);
            changed = true;
          }
        }
      }
    }
  }
  equivalent
}

/// Id sets steering recursion elimination, computed once per build.
struct EliminationSets {
  reference_mains: NatSet,
  target_mains:    NatSet,
  repr_ids:        NatSet,
  all_nt_ids:      NatSet,
}

impl EliminationSets {
  fn new(problem: &Problem) -> EliminationSets {
    EliminationSets {
      reference_mains: main_equivalents(&problem.reference),
      target_mains:    main_equivalents(&problem.target),
      repr_ids:        problem.repr.nonterminal_ids(),
      all_nt_ids:      problem.all_nonterminal_ids(),
    }
  }
}

/// Derives the equation system for the current T set, plus the accumulated assumption
/// equations. Returns the equations and the number of impure equations dropped.
pub fn build_equations(
  ctx: &Context,
  cfg: &Config,
  problem: &Problem,
  state: &mut RefinementState,
) -> (Vec<Equation>, usize) {
  let oracle = Expansion::new(ctx, cfg, problem);
  let sets = EliminationSets::new(problem);

  let mut equations = Vec::new();
  let mut dropped = 0usize;

  let terms: Vec<Term> = state.t_set.iter().cloned().collect();
  for t in terms {
    let reduced = match state.cached_reduction(&t) {
      Some(pair) => Some(pair),
      None => match oracle.reduce_sides(&t) {
        (Ok(lhs), Ok(rhs)) => {
          state.cache_reduction(t.clone(), lhs.clone(), rhs.clone());
          Some((lhs, rhs))
        }
        _ => None,
      },
    };
    let Some((lhs_nf, rhs_nf)) = reduced else {
      recsyn_abs::warning!(term = %t, "dropping equation: rewrite limit hit during reduction");
      dropped += 1;
      continue;
    };

    let alpha = problem.alpha.clone();
    let detail = state.detail_mut(&t);
    let lhs = eliminate_recursion(ctx, detail, &lhs_nf, &alpha, &sets);
    let rhs = eliminate_recursion(ctx, detail, &rhs_nf, &alpha, &sets);

    // Purity: no application of reference, target or representation may survive.
    if lhs.mentions_any(&sets.all_nt_ids) || rhs.mentions_any(&sets.all_nt_ids) {
      recsyn_abs::warning!(term = %t, "dropping impure equation: {} = {}", lhs, rhs);
      dropped += 1;
      continue;
    }

    let (lhs, rhs) = if cfg.simplify_equations {
      (simplify(&lhs), simplify(&rhs))
    } else {
      (lhs, rhs)
    };
    let precond = detail.precond.clone();

    // Detupling of literal tuples: one equation per component.
    match (lhs.kind(), rhs.kind()) {
      (TermKind::Tuple(ls), TermKind::Tuple(rs)) if cfg.detupling && ls.len() == rs.len() => {
        for (l, r) in ls.iter().zip(rs) {
          equations.push(Equation {
            term:    t.clone(),
            precond: precond.clone(),
            lhs:     l.clone(),
            rhs:     r.clone(),
          });
        }
      }
      _ => equations.push(Equation { term: t.clone(), precond, lhs, rhs }),
    }
  }

  equations.extend(state.assumptions.iter().cloned());
  (equations, dropped)
}

/// The expansion variable a main-equivalent call is recursing on, if the call has the
/// composition shape: `G x`, `F x`, or `F (R x)` with `R` a representation nonterminal.
fn composition_base(t: &Term, sets: &EliminationSets) -> Option<Variable> {
  let TermKind::App(head, args) = t.kind() else {
    return None;
  };
  let TermKind::Var(head_var) = head.kind() else {
    return None;
  };
  let is_main = sets.reference_mains.contains(head_var.id as usize)
    || sets.target_mains.contains(head_var.id as usize);
  if !is_main {
    return None;
  }
  match args.last()?.kind() {
    TermKind::Var(x) => Some(x.clone()),
    TermKind::App(inner_head, inner_args) => {
      // Through the representation: F (R x).
      if let TermKind::Var(r) = inner_head.kind() {
        if sets.repr_ids.contains(r.id as usize) {
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

/// Replaces every stuck recursive call by its scalar: main-equivalent composition calls are
/// keyed by the recursion variable (shared between the sides), anything else by the whole
/// application term.
fn eliminate_recursion(
  ctx: &Context,
  detail: &mut TermDetail,
  t: &Term,
  alpha: &Sort,
  sets: &EliminationSets,
) -> Term {
  if let TermKind::App(head, args) = t.kind() {
    if let TermKind::Var(head_var) = head.kind() {
      if sets.all_nt_ids.contains(head_var.id as usize) {
        if let Some(base) = composition_base(t, sets) {
          return Term::var(detail.scalar_for(ctx, &base, alpha));
        }
        // An auxiliary recursion: eliminate inside the arguments first so nested main calls
        // share their scalars, then key the scalar by the rebuilt application.
        let rebuilt_args: Vec<Term> = args
          .iter()
          .map(|a| eliminate_recursion(ctx, detail, a, alpha, sets))
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
    .map(|c| eliminate_recursion(ctx, detail, c, alpha, sets))
    .collect();
  crate::core::pmrs::rebuild_with_children(t, children)
}

#[cfg(test)]
pub(crate) mod tests {
  use recsyn_abs::IString;

  use crate::core::pmrs::tests::list_sum_fixture;
  use crate::core::pmrs::{CtorPattern, Pmrs, RewriteRule};
  use crate::core::problem::Problem;

  use super::*;

  fn identity_repr(ctx: &Context, over: Sort) -> Pmrs {
    let main_var = ctx.named_var("repr", Sort::arrow(&[over.clone()], over.clone()));
    let x = ctx.named_var("x", over);
    Pmrs::assemble(
      IString::from("repr"),
      vec![],
      vec![main_var],
      0,
      vec![RewriteRule { nt: 0, args: vec![x.clone()], pattern: None, rhs: Term::var(x) }],
    )
    .unwrap()
  }

  /// `target` with holes c0 and odot over the same list sort as `list_sum`.
  pub(crate) fn skeleton_target(ctx: &Context) -> Pmrs {
    let list = Sort::Named(IString::from("list"));
    let main_var = ctx.named_var("target", Sort::arrow(&[list.clone()], Sort::Int));
    let h_var = ctx.named_var("h", Sort::arrow(&[list.clone()], Sort::Int));
    let c0 = ctx.named_var("c0", Sort::Int);
    let odot = ctx.named_var("odot", Sort::arrow(&[Sort::Int, Sort::Int], Sort::Int));
    let x = ctx.named_var("x", list.clone());
    let hd = ctx.named_var("hd", Sort::Int);
    let tl = ctx.named_var("tl", list.clone());

    let rules = vec![
      RewriteRule {
        nt:      0,
        args:    vec![x.clone()],
        pattern: None,
        rhs:     Term::app(Term::var(h_var.clone()), vec![Term::var(x)]),
      },
      RewriteRule {
        nt:      1,
        args:    vec![],
        pattern: Some(CtorPattern { ctor: IString::from("Nil"), binders: vec![] }),
        rhs:     Term::var(c0.clone()),
      },
      RewriteRule {
        nt:      1,
        args:    vec![],
        pattern: Some(CtorPattern {
          ctor:    IString::from("Cons"),
          binders: vec![hd.clone(), tl.clone()],
        }),
        rhs:     Term::app(
          Term::var(odot.clone()),
          vec![
            Term::var(hd),
            Term::app(Term::var(h_var.clone()), vec![Term::var(tl)]),
          ],
        ),
      },
    ];

    Pmrs::assemble(IString::from("target"), vec![c0, odot], vec![main_var, h_var], 0, rules).unwrap()
  }

  pub(crate) fn sum_problem() -> (Context, Problem) {
    let (ctx, reference) = list_sum_fixture();
    let list = Sort::Named(IString::from("list"));
    let repr = identity_repr(&ctx, list);
    let target = skeleton_target(&ctx);
    let problem = Problem::new(&ctx, reference, target, repr, None).unwrap();
    (ctx, problem)
  }

  #[test]
  fn delegation_closure_reaches_inner_nonterminals() {
    let (ctx, problem) = sum_problem();
    let _ = ctx;
    let mains = main_equivalents(&problem.target);
    // Both `target` and `h` answer for the main symbol.
    assert_eq!(mains.len(), 2);
  }

  #[test]
  fn equations_are_pure_and_share_scalars() {
    let (ctx, problem) = sum_problem();
    let cfg = Config::default();
    let mut state = RefinementState::new();

    // T = { Nil, Cons(hd, tl) } with tl a list variable.
    let list = Sort::Named(IString::from("list"));
    let nil = Term::data(IString::from("Nil"), vec![], list.clone());
    let hd = Term::var(ctx.fresh_var("hd", Sort::Int));
    let tl = Term::var(ctx.fresh_var("tl", list.clone()));
    let cons = Term::data(IString::from("Cons"), vec![hd.clone(), tl.clone()], list);
    state.absorb([nil, cons], []);

    let (equations, dropped) = build_equations(&ctx, &cfg, &problem, &mut state);
    assert_eq!(dropped, 0);
    assert_eq!(equations.len(), 2);

    // Purity: no nonterminal application survives anywhere.
    let nt_ids = problem.all_nonterminal_ids();
    for equation in &equations {
      assert!(!equation.lhs.mentions_any(&nt_ids), "impure lhs: {}", equation.lhs);
      assert!(!equation.rhs.mentions_any(&nt_ids), "impure rhs: {}", equation.rhs);
    }

    // Nil: 0 = c0.
    assert_eq!(equations[0].lhs, Term::int(0));

    // Cons: hd + s = odot hd s, with the SAME scalar on both sides.
    let cons_eq = &equations[1];
    let lhs_vars = cons_eq.lhs.free_variables();
    let rhs_vars = cons_eq.rhs.free_variables();
    let lhs_scalar = lhs_vars.iter().find(|v| v.name.as_str().starts_with("s_")).unwrap();
    assert!(
      rhs_vars.iter().any(|v| v.id == lhs_scalar.id),
      "scalar not shared: {} vs {}",
      cons_eq.lhs,
      cons_eq.rhs
    );
  }

  #[test]
  fn rewrite_limit_drops_the_equation() {
    let (ctx, problem) = sum_problem();
    let mut cfg = Config::default();
    cfg.reduction_limit = 1;
    let mut state = RefinementState::new();

    let list = Sort::Named(IString::from("list"));
    let hd = Term::var(ctx.fresh_var("hd", Sort::Int));
    let tl = Term::var(ctx.fresh_var("tl", list.clone()));
    let cons = Term::data(IString::from("Cons"), vec![hd, tl], list);
    state.absorb([cons], []);

    let (equations, dropped) = build_equations(&ctx, &cfg, &problem, &mut state);
    assert!(equations.is_empty());
    assert_eq!(dropped, 1);
  }

  #[test]
  fn reduction_cache_reports_hits() {
    let (ctx, problem) = sum_problem();
    let cfg = Config::default();
    let mut state = RefinementState::new();

    let list = Sort::Named(IString::from("list"));
    let nil = Term::data(IString::from("Nil"), vec![], list);
    state.absorb([nil], []);

    let _ = build_equations(&ctx, &cfg, &problem, &mut state);
    assert_eq!(state.cache_hits, 0);
    let _ = build_equations(&ctx, &cfg, &problem, &mut state);
    assert_eq!(state.cache_hits, 1);
  }
}

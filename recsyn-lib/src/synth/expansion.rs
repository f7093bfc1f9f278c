/*!

Bounded pointwise expansion. Expanding a term replaces its leftmost shallowest data-sorted
variable by every variant of that variable's sort (with fresh binders), producing the one-step
expansion family. [`Expansion::to_maximally_reducible`] partitions that family into the terms
that reduce fully on both sides of the problem (T′) and those still carrying recursion (U′);
[`Expansion::expand_loop`] iterates with the `expand_depth` and `expand_cut` cutoffs.

Tie-breaks are fixed for reproducibility: candidates are taken in breadth-first order, variants
in declaration order, and fresh variable ids increase monotonically with traversal order.

*/

use std::collections::VecDeque;

use indexmap::IndexSet;

use crate::config::Config;
use crate::core::context::Context;
use crate::core::pmrs::reduce::Reducer;
use crate::core::problem::Problem;
use crate::core::term::{Term, TermKind, VarSubst, Variable};

/// Finds the leftmost shallowest variable of a registered data sort.
fn expansion_target(ctx: &Context, t: &Term) -> Option<Variable> {
  let mut queue = VecDeque::new();
  queue.push_back(t.clone());
  while let Some(current) = queue.pop_front() {
    if let TermKind::Var(v) = current.kind() {
      if ctx.sorts.is_data(&v.sort) {
        return Some(v.clone());
      }
    }
    for child in current.children() {
      queue.push_back(child);
    }
  }
  None
}

/// The one-step expansions of `t`, in variant declaration order. Empty when `t` has no
/// expandable variable.
pub fn expand_once(ctx: &Context, t: &Term) -> Vec<Term> {
  let Some(variable) = expansion_target(ctx, t) else {
    return Vec::new();
  };
  let Some(variants) = ctx.sorts.variants_of(&variable.sort) else {
    return Vec::new();
  };

  let mut expansions = Vec::new();
  for variant in variants {
    let payload: Vec<Term> = variant
      .payload
      .iter()
      .map(|sort| Term::var(ctx.fresh_var("e", sort.clone())))
      .collect();
    let replacement = Term::data(variant.name, payload, variable.sort.clone());
    let subst: VarSubst = [(variable.id, replacement)].into_iter().collect();
    expansions.push(t.substitute(&subst));
  }
  expansions
}

/// Reducibility oracle for a problem: a term counts as maximally reducible only when both the
/// composed reference side and the target side reduce fully on it.
pub struct Expansion<'a> {
  ctx:         &'a Context,
  problem:     &'a Problem,
  lhs_reducer: Reducer<'a>,
  rhs_reducer: Reducer<'a>,
  cfg:         &'a Config,
}

impl<'a> Expansion<'a> {
  pub fn new(ctx: &'a Context, cfg: &'a Config, problem: &'a Problem) -> Expansion<'a> {
    let lhs_reducer = Reducer::new(&problem.lhs_systems(), cfg.reduction_limit);
    let rhs_reducer = Reducer::new(&[&problem.target], cfg.reduction_limit);
    Expansion { ctx, problem, lhs_reducer, rhs_reducer, cfg }
  }

  /// Oracle over a different target (used by the verifier with an instantiated skeleton).
  pub fn with_target(
    ctx: &'a Context,
    cfg: &'a Config,
    problem: &'a Problem,
    target: &'a crate::core::pmrs::Pmrs,
  ) -> Expansion<'a> {
    let lhs_reducer = Reducer::new(&problem.lhs_systems(), cfg.reduction_limit);
    let rhs_reducer = Reducer::new(&[target], cfg.reduction_limit);
    Expansion { ctx, problem, lhs_reducer, rhs_reducer, cfg }
  }

  pub fn is_mr(&self, t: &Term) -> bool {
    matches!(t.kind(), TermKind::Data(..))
      && self.lhs_reducer.reduces_first_order(&self.problem.lhs_term(t))
      && self.rhs_reducer.reduces_first_order(&self.problem.rhs_term(t))
  }

  pub fn is_mr_all(&self, terms: &[Term]) -> bool {
    terms.iter().all(|t| self.is_mr(t))
  }

  /// Reduces both sides of the problem on `t` without committing to reducibility.
  pub fn reduce_sides(&self, t: &Term) -> (Result<Term, crate::error::ReduceError>, Result<Term, crate::error::ReduceError>) {
    (
      self.lhs_reducer.reduce(&self.problem.lhs_term(t)),
      self.rhs_reducer.reduce(&self.problem.rhs_term(t)),
    )
  }

  /// Partitions the one-step expansions of `t` into (maximally reducible, still recursive).
  pub fn to_maximally_reducible(&self, t: &Term) -> (Vec<Term>, Vec<Term>) {
    let mut mr = Vec::new();
    let mut non_mr = Vec::new();
    for expansion in expand_once(self.ctx, t) {
      if self.is_mr(&expansion) {
        mr.push(expansion);
      } else {
        non_mr.push(expansion);
      }
    }
    (mr, non_mr)
  }

  /// Iterated expansion from the seeds: breadth-first with a depth cutoff (`expand_depth`) and
  /// a cumulative size cutoff (`expand_cut`). Returns the collected (T, U) sets; U holds the
  /// frontier that was never expanded to maximal reducibility.
  pub fn expand_loop(&self, seeds: &[Term]) -> (IndexSet<Term>, IndexSet<Term>) {
    let mut t_set = IndexSet::new();
    let mut u_set = IndexSet::new();
    let mut queue: VecDeque<(Term, usize)> = seeds.iter().map(|s| (s.clone(), 0)).collect();

    while let Some((term, depth)) = queue.pop_front() {
      if t_set.len() >= self.cfg.expand_cut {
        // Whatever remains unexplored stays on the frontier.
        u_set.insert(term);
        for (left_over, _) in queue.drain(..) {
          u_set.insert(left_over);
        }
        break;
      }

      if self.is_mr(&term) {
        t_set.insert(term);
        continue;
      }
      if depth >= self.cfg.expand_depth {
        u_set.insert(term);
        continue;
      }

      let (mr, non_mr) = self.to_maximally_reducible(&term);
      if mr.is_empty() && non_mr.is_empty() {
        // Nothing to expand (no data-sorted variable) yet not reducible: park it.
        u_set.insert(term);
        continue;
      }
      for expansion in mr {
        if t_set.len() < self.cfg.expand_cut {
          t_set.insert(expansion);
        } else {
          u_set.insert(expansion);
        }
      }
      for expansion in non_mr {
        queue.push_back((expansion, depth + 1));
      }
    }

    (t_set, u_set)
  }
}

#[cfg(test)]
mod tests {
  use recsyn_abs::IString;

  use crate::core::pmrs::tests::list_sum_fixture;
  use crate::core::problem::Problem;
  use crate::core::sort::Sort;

  use super::*;

  fn identity_repr(ctx: &Context, over: Sort) -> crate::core::pmrs::Pmrs {
    use crate::core::pmrs::{Pmrs, RewriteRule};
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

  fn trivial_problem() -> (Context, Problem) {
    let (ctx, reference) = list_sum_fixture();
    let repr = identity_repr(&ctx, Sort::Named(IString::from("list")));
    let target = reference.clone();
    let problem = Problem::new(&ctx, reference, target, repr, None).unwrap();
    (ctx, problem)
  }

  #[test]
  fn expands_a_list_variable_into_both_variants() {
    let (ctx, _problem) = trivial_problem();
    let x = Term::var(ctx.fresh_var("x", Sort::Named(IString::from("list"))));
    let expansions = expand_once(&ctx, &x);
    assert_eq!(expansions.len(), 2);
    assert!(expansions[0].to_string().starts_with("Nil"));
    assert!(expansions[1].to_string().starts_with("Cons"));
  }

  #[test]
  fn partitions_expansions_by_reducibility() {
    let (ctx, problem) = trivial_problem();
    let cfg = Config::default();
    let oracle = Expansion::new(&ctx, &cfg, &problem);

    let x = Term::var(ctx.fresh_var("x", Sort::Named(IString::from("list"))));
    let (mr, non_mr) = oracle.to_maximally_reducible(&x);
    // Nil reduces fully and Cons(h, tail-var) recurses only on the tail variable, so both
    // one-step expansions are maximally reducible.
    assert_eq!(mr.len(), 2);
    assert!(non_mr.is_empty());
    assert!(mr[0].to_string().starts_with("Nil"));
    assert!(mr[1].to_string().starts_with("Cons"));
  }

  #[test]
  fn expand_loop_respects_the_cut() {
    let (ctx, problem) = trivial_problem();
    let mut cfg = Config::default();
    cfg.expand_cut = 1;
    cfg.expand_depth = 10;
    let oracle = Expansion::new(&ctx, &cfg, &problem);

    let x = Term::var(ctx.fresh_var("x", Sort::Named(IString::from("list"))));
    let (t_set, u_set) = oracle.expand_loop(&[x]);
    assert_eq!(t_set.len(), 1);
    assert!(!u_set.is_empty());
    assert!(oracle.is_mr_all(&t_set.iter().cloned().collect::<Vec<_>>()));
  }

  #[test]
  fn expansion_depth_bounds_the_frontier() {
    let (ctx, problem) = trivial_problem();
    let mut cfg = Config::default();
    cfg.expand_depth = 0;
    cfg.expand_cut = 64;
    let oracle = Expansion::new(&ctx, &cfg, &problem);

    // A bare variable is never maximally reducible, and depth 0 forbids expanding it.
    let x = Term::var(ctx.fresh_var("x", Sort::Named(IString::from("list"))));
    let (t_set, u_set) = oracle.expand_loop(&[x]);
    assert!(t_set.is_empty());
    assert_eq!(u_set.len(), 1);
  }
}

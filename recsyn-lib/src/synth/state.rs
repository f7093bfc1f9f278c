/*!

Refinement-loop state: the maximally-reducible representative set T, the non-MR frontier U, the
per-term detail map, accumulated assumptions and syntactic definitions, and the reduction memo
cache. The state is monotone within a loop: term sets and counterexample stores only grow, and
insertion order is preserved everywhere so re-runs emit identical solver queries.

*/

use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use recsyn_abs::HashMap;

use crate::core::context::Context;
use crate::core::pmrs::HoleSolution;
use crate::core::sort::Sort;
use crate::core::term::{Constant, Term, Variable};

use super::equation::Equation;
use super::lifting::LiftState;

/// A counterexample model: variable id → value. Ordered so iteration (and hence constraint
/// emission) is reproducible.
pub type CexModel = BTreeMap<u32, Constant>;

/// Everything the loop knows about one representative term.
#[derive(Clone, Debug)]
pub struct TermDetail {
  pub term: Term,
  /// Recursion elimination: (recursive subterm, the scalar variable standing for its image).
  pub recurs_elim: Vec<(Term, Variable)>,
  /// The scalar variables introduced by recursion elimination, in introduction order.
  pub scalars: Vec<Variable>,
  pub positives: Vec<CexModel>,
  pub negatives: Vec<CexModel>,
  /// Conjunction of the proven lemmas, used as the equation precondition.
  pub precond: Option<Term>,
  pub lemmas: Vec<Term>,
  pub lemma_candidate: Option<Term>,
}

impl TermDetail {
  pub fn new(term: Term) -> TermDetail {
    TermDetail {
      term,
      recurs_elim: Vec::new(),
      scalars: Vec::new(),
      positives: Vec::new(),
      negatives: Vec::new(),
      precond: None,
      lemmas: Vec::new(),
      lemma_candidate: None,
    }
  }

  /// The scalar standing for the recursive image of `base`, minting one on first use. The same
  /// base variable always maps to the same scalar, which is what makes the left and right
  /// rewrites agree.
  pub fn scalar_for(&mut self, ctx: &Context, base: &Variable, alpha: &Sort) -> Variable {
    self.scalar_for_call(ctx, Term::var(base.clone()), alpha)
  }

  /// The scalar standing for an arbitrary recursive call, keyed by the call term itself.
  pub fn scalar_for_call(&mut self, ctx: &Context, key: Term, sort: &Sort) -> Variable {
    if let Some((_, scalar)) = self.recurs_elim.iter().find(|(t, _)| *t == key) {
      return scalar.clone();
    }
    let scalar = ctx.fresh_var("s", sort.clone());
    self.recurs_elim.push((key, scalar.clone()));
    self.scalars.push(scalar.clone());
    scalar
  }

  /// Conjoins an accepted lemma into the precondition (the `pre ⇒ lemma` framing: the stored
  /// precondition is the conjunction of everything proven).
  pub fn add_lemma(&mut self, lemma: Term) {
    self.lemmas.push(lemma.clone());
    self.precond = Some(match self.precond.take() {
      None => lemma,
      Some(previous) => Term::bin(crate::core::term::Binop::And, previous, lemma),
    });
    self.lemma_candidate = None;
  }
}

#[derive(Default)]
pub struct RefinementState {
  /// Maximally-reducible representatives currently driving equations.
  pub t_set: IndexSet<Term>,
  /// The non-MR frontier, still carrying recursion.
  pub u_set: IndexSet<Term>,
  pub details: IndexMap<Term, TermDetail>,
  /// Assumption equations accumulated from partial correctness.
  pub assumptions: Vec<Equation>,
  /// Hole solutions committed as `define-fun`s (deduced syntactic definitions).
  pub syntactic_defs: HashMap<u32, HoleSolution>,
  pub lift: LiftState,

  reduction_cache: HashMap<Term, (Term, Term)>,
  pub cache_hits:  usize,
}

impl RefinementState {
  pub fn new() -> RefinementState {
    RefinementState::default()
  }

  pub fn detail_mut(&mut self, term: &Term) -> &mut TermDetail {
    self
      .details
      .entry(term.clone())
      .or_insert_with(|| TermDetail::new(term.clone()))
  }

  /// Absorbs new representatives, preserving first-insertion order.
  pub fn absorb(&mut self, new_t: impl IntoIterator<Item = Term>, new_u: impl IntoIterator<Item = Term>) {
    for t in new_t {
      self.t_set.insert(t);
    }
    for u in new_u {
      self.u_set.insert(u);
    }
  }

  /// Looks up the cached (lhs, rhs) normal forms for a representative.
  pub fn cached_reduction(&mut self, term: &Term) -> Option<(Term, Term)> {
    match self.reduction_cache.get(term) {
      Some(pair) => {
        self.cache_hits += 1;
        Some(pair.clone())
      }
      None => None,
    }
  }

  pub fn cache_reduction(&mut self, term: Term, lhs: Term, rhs: Term) {
    self.reduction_cache.insert(term, (lhs, rhs));
  }

  /// Restarts for an outer retry: term sets and caches are rebuilt from scratch, as if the
  /// loop had just been entered with the weakened configuration.
  pub fn restart(&mut self) {
    *self = RefinementState::default();
  }
}

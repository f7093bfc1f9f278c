/*!

The problem definition: a reference PMRS `f : τ → α`, a target skeleton `g : θ → α` with holes,
a representation PMRS `r : θ → τ` translating the concrete domain into the reference's domain,
and optionally a `tinv : θ → bool` precondition restricting well-formed inputs. Construction
unifies the three signatures and commits the resulting sort substitution to every system, so a
well-formed `Problem` has fully agreeing domains. An identity representation is detected once
and cached: it lets the equation builder skip the inner `r` call.

*/

use recsyn_abs::NatSet;

use crate::error::Error;

use super::context::Context;
use super::pmrs::Pmrs;
use super::sort::{unify, Sort};
use super::term::{Term, Variable};

#[derive(Clone, Debug)]
pub struct Problem {
  pub reference: Pmrs,
  pub target:    Pmrs,
  pub repr:      Pmrs,
  pub tinv:      Option<Pmrs>,

  /// Input sort of the target (the concrete domain).
  pub theta: Sort,
  /// Input sort of the reference (the abstract domain).
  pub tau:   Sort,
  /// Common output sort.
  pub alpha: Sort,

  pub repr_is_identity: bool,
}

impl Problem {
  pub fn new(
    ctx: &Context,
    reference: Pmrs,
    target: Pmrs,
    repr: Pmrs,
    tinv: Option<Pmrs>,
  ) -> Result<Problem, Error> {
    // Domain agreement: r : θ → τ composes the two systems, and outputs must coincide.
    let mut equations = vec![
      (repr.input_sort.clone(), target.input_sort.clone()),
      (repr.output_sort.clone(), reference.input_sort.clone()),
      (reference.output_sort.clone(), target.output_sort.clone()),
    ];
    if let Some(inv) = &tinv {
      equations.push((inv.input_sort.clone(), target.input_sort.clone()));
      equations.push((inv.output_sort.clone(), Sort::Bool));
    }
    let subst = unify(equations).map_err(Error::Sort)?;

    let reference = reference.apply_sort_subst(&subst);
    let target = target.apply_sort_subst(&subst);
    let repr = repr.apply_sort_subst(&subst);
    let tinv = tinv.map(|inv| inv.apply_sort_subst(&subst));

    reference.validate(ctx).map_err(Error::Pmrs)?;
    target.validate(ctx).map_err(Error::Pmrs)?;
    repr.validate(ctx).map_err(Error::Pmrs)?;
    if let Some(inv) = &tinv {
      inv.validate(ctx).map_err(Error::Pmrs)?;
    }

    let theta = target.input_sort.clone();
    let tau = reference.input_sort.clone();
    let alpha = target.output_sort.clone();
    let repr_is_identity = repr.is_identity();

    Ok(Problem {
      reference,
      target,
      repr,
      tinv,
      theta,
      tau,
      alpha,
      repr_is_identity,
    })
  }

  /// The unknowns to synthesize.
  #[inline(always)]
  pub fn holes(&self) -> &[Variable] {
    &self.target.params
  }

  /// `f (r t)`, collapsing the inner call for an identity representation.
  pub fn lhs_term(&self, t: &Term) -> Term {
    if self.repr_is_identity {
      self.reference.apply_main(t.clone())
    } else {
      self.reference.apply_main(self.repr.apply_main(t.clone()))
    }
  }

  /// `g t`.
  pub fn rhs_term(&self, t: &Term) -> Term {
    self.target.apply_main(t.clone())
  }

  /// The systems involved in reducing the left-hand side.
  pub fn lhs_systems(&self) -> Vec<&Pmrs> {
    if self.repr_is_identity {
      vec![&self.reference]
    } else {
      vec![&self.reference, &self.repr]
    }
  }

  /// Every system of the definition, for purity checks.
  pub fn all_systems(&self) -> Vec<&Pmrs> {
    let mut systems = vec![&self.reference, &self.target, &self.repr];
    if let Some(inv) = &self.tinv {
      systems.push(inv);
    }
    systems
  }

  /// Union of all nonterminal variable ids across the definition.
  pub fn all_nonterminal_ids(&self) -> NatSet {
    let mut ids = NatSet::default();
    for system in self.all_systems() {
      ids.union_with(&system.nonterminal_ids());
    }
    ids
  }
}

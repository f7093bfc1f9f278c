/*!

Reduction under one or more PMRSs: outermost-leftmost rewriting up to a step limit. A redex is
either an application of a nonterminal whose arguments saturate one of its rules (with the
recursion argument already exposing the matched constructor), or a builtin operator applied to
constant operands. Holes are ordinary parameters, never redexes, so a system with unknowns
reduces to normal forms that still apply its holes.

Hitting the step limit is reported as [`ReduceError::LimitReached`]; the caller decides whether
that is fatal (it never is inside the refinement loop, which drops the offending equation).

*/

use recsyn_abs::{HashMap, NatSet};

use crate::core::term::{fold_root, Term, TermKind, VarSubst};
use crate::error::ReduceError;

use super::{rebuild_with_children, NtIndex, Pmrs};

pub struct Reducer<'a> {
  systems:   Vec<&'a Pmrs>,
  /// nonterminal variable id → (system index, nonterminal index)
  nt_lookup: HashMap<u32, (usize, NtIndex)>,
  /// Union of all systems' nonterminal ids.
  nt_ids:    NatSet,
  limit:     usize,
}

impl<'a> Reducer<'a> {
  pub fn new(systems: &[&'a Pmrs], limit: usize) -> Reducer<'a> {
    let mut nt_lookup = HashMap::default();
    let mut nt_ids = NatSet::default();
    for (sys, p) in systems.iter().enumerate() {
      for (index, nt) in p.nonterminals.iter().enumerate() {
        nt_lookup.insert(nt.var.id, (sys, index));
        nt_ids.insert(nt.var.id as usize);
      }
    }
    Reducer { systems: systems.to_vec(), nt_lookup, nt_ids, limit }
  }

  /// Reduces to normal form, outermost-leftmost, within the step limit.
  pub fn reduce(&self, t: &Term) -> Result<Term, ReduceError> {
    let mut current = t.clone();
    let mut steps = 0usize;
    while let Some(next) = self.rewrite_once(&current) {
      steps += 1;
      if steps >= self.limit {
        return Err(ReduceError::LimitReached { limit: self.limit });
      }
      current = next;
    }
    Ok(current)
  }

  /// One outermost-leftmost rewrite step, or `None` at normal form.
  fn rewrite_once(&self, t: &Term) -> Option<Term> {
    if let Some(next) = self.rewrite_root(t) {
      return Some(next);
    }
    let children = t.children();
    for (index, child) in children.iter().enumerate() {
      if let Some(next) = self.rewrite_once(child) {
        let mut rebuilt = children.clone();
        rebuilt[index] = next;
        return Some(rebuild_with_children(t, rebuilt));
      }
    }
    None
  }

  fn rewrite_root(&self, t: &Term) -> Option<Term> {
    if let TermKind::App(head, args) = t.kind() {
      if let TermKind::Var(v) = head.kind() {
        if let Some(&(sys, nt)) = self.nt_lookup.get(&v.id) {
          if let Some(next) = self.apply_rules(self.systems[sys], nt, args) {
            return Some(next);
          }
        }
      }
    }
    fold_root(t)
  }

  fn apply_rules(&self, p: &Pmrs, nt: NtIndex, args: &[Term]) -> Option<Term> {
    for &rule_index in &p.nonterminals[nt].rules {
      let rule = &p.rules[rule_index];
      let needed = rule.arity();
      if args.len() < needed {
        continue;
      }

      let mut subst = VarSubst::default();
      for (param, arg) in rule.args.iter().zip(args) {
        subst.insert(param.id, arg.clone());
      }

      if let Some(pattern) = &rule.pattern {
        let scrutinee = &args[rule.args.len()];
        match scrutinee.kind() {
          TermKind::Data(ctor, payload) if *ctor == pattern.ctor => {
            debug_assert_eq!(
              payload.len(),
              pattern.binders.len(),
              "constructor {} arity drifted from its pattern",
              ctor
            );
            for (binder, value) in pattern.binders.iter().zip(payload) {
              subst.insert(binder.id, value.clone());
            }
          }
          // Not (yet) the matched constructor; the scrutinee may still reduce below.
          _ => continue,
        }
      }

      let mut result = rule.rhs.substitute(&subst);
      if args.len() > needed {
        result = Term::app(result, args[needed..].to_vec());
      }
      return Some(result);
    }
    None
  }

  /// Does `applied` reduce to a normal form free of every tracked nonterminal?
  pub fn reduces_fully(&self, applied: &Term) -> bool {
    match self.reduce(applied) {
      Ok(normal_form) => !normal_form.mentions_any(&self.nt_ids),
      Err(_) => false,
    }
  }

  /// Does `applied` reduce to a first-order normal form: one where every remaining recursive
  /// call bottoms out on a plain variable? Such calls are exactly what recursion elimination
  /// replaces by scalars; a call stuck on constructor material means the term must be expanded
  /// further instead.
  pub fn reduces_first_order(&self, applied: &Term) -> bool {
    match self.reduce(applied) {
      Ok(normal_form) => self.only_variable_recursion(&normal_form),
      Err(_) => false,
    }
  }

  fn only_variable_recursion(&self, t: &Term) -> bool {
    match t.kind() {
      // A bare nonterminal value cannot be eliminated to a scalar.
      TermKind::Var(v) => !self.nt_ids.contains(v.id as usize),
      TermKind::App(head, args) => {
        if let TermKind::Var(v) = head.kind() {
          if self.nt_ids.contains(v.id as usize) {
            return base_variable(t).is_some() && args.iter().all(|a| self.only_variable_recursion(a));
          }
        }
        self.only_variable_recursion(head) && args.iter().all(|a| self.only_variable_recursion(a))
      }
      _ => t.children().iter().all(|c| self.only_variable_recursion(c)),
    }
  }

  /// A term `t` is maximally reducible under `p` iff it is constructor-headed and reducing
  /// `main t` leaves recursion only on variables.
  pub fn is_mr(&self, p: &Pmrs, t: &Term) -> bool {
    matches!(t.kind(), TermKind::Data(..)) && self.reduces_first_order(&p.apply_main(t.clone()))
  }
}

/// The variable a stuck recursive call chain bottoms out on: the last argument of the
/// application, followed through nested applications (`f (r x)` bottoms out on `x`).
pub fn base_variable(t: &Term) -> Option<crate::core::term::Variable> {
  match t.kind() {
    TermKind::App(_, args) => {
      let last = args.last()?;
      match last.kind() {
        TermKind::Var(v) => Some(v.clone()),
        TermKind::App(..) => base_variable(last),
        _ => None,
      }
    }
    _ => None,
  }
}

/// Convenience wrapper for single-system reduction.
pub fn reduce_under(p: &Pmrs, t: &Term, limit: usize) -> Result<Term, ReduceError> {
  Reducer::new(&[p], limit).reduce(t)
}

#[cfg(test)]
mod tests {
  use recsyn_abs::IString;

  use crate::core::pmrs::tests::list_sum_fixture;
  use crate::core::sort::Sort;

  use super::*;

  fn list_sort() -> Sort {
    Sort::Named(IString::from("list"))
  }

  fn nil() -> Term {
    Term::data(IString::from("Nil"), vec![], list_sort())
  }

  fn cons(head: i64, tail: Term) -> Term {
    Term::data(IString::from("Cons"), vec![Term::int(head), tail], list_sort())
  }

  #[test]
  fn reduces_list_sum_to_constant() {
    let (_ctx, pmrs) = list_sum_fixture();
    let input = cons(1, cons(2, nil()));
    let result = reduce_under(&pmrs, &pmrs.apply_main(input), 100).unwrap();
    assert_eq!(result, Term::int(3));
  }

  #[test]
  fn normal_forms_are_fixed_points() {
    let (_ctx, pmrs) = list_sum_fixture();
    let input = cons(4, nil());
    let reducer = Reducer::new(&[&pmrs], 100);
    let once = reducer.reduce(&pmrs.apply_main(input)).unwrap();
    assert_eq!(reducer.reduce(&once).unwrap(), once);
  }

  #[test]
  fn limit_exhaustion_is_reported() {
    let (_ctx, pmrs) = list_sum_fixture();
    let input = cons(1, cons(2, cons(3, nil())));
    let result = reduce_under(&pmrs, &pmrs.apply_main(input), 2);
    assert!(matches!(result, Err(ReduceError::LimitReached { limit: 2 })));
  }

  #[test]
  fn maximal_reducibility() {
    let (ctx, pmrs) = list_sum_fixture();
    let reducer = Reducer::new(&[&pmrs], 100);

    assert!(reducer.is_mr(&pmrs, &nil()));
    assert!(reducer.is_mr(&pmrs, &cons(1, nil())));

    // A variable tail leaves recursion stuck on a variable, which recursion elimination can
    // absorb, so the term is still maximally reducible.
    let tail = Term::var(ctx.fresh_var("l", list_sort()));
    assert!(reducer.is_mr(&pmrs, &cons(1, tail)));

    // A bare variable is not: there is no constructor to drive any rule.
    let bare = Term::var(ctx.fresh_var("l", list_sort()));
    assert!(!reducer.is_mr(&pmrs, &bare));
  }

  #[test]
  fn reduction_is_deterministic() {
    // Reduction is a function of the input: two runs produce identical normal forms.
    let (_ctx, pmrs) = list_sum_fixture();
    let input = cons(5, cons(7, nil()));
    let a = reduce_under(&pmrs, &pmrs.apply_main(input.clone()), 100).unwrap();
    let b = reduce_under(&pmrs, &pmrs.apply_main(input), 100).unwrap();
    assert_eq!(a, b);
  }
}

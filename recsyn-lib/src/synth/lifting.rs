/*!

Lifting: widening the synthesis domain when the current hole signatures admit no solution.
Each attempt appends one `Int` component to the return sort of every scalar-valued hole; the
original equations reach the old value through a `(… , extra).0` projection, which the
detupling machinery in the equation solver turns into an independent component hole. The
number of attempts is bounded by `max_lifting_attempts`.

*/

use recsyn_abs::HashMap;

use crate::core::problem::Problem;
use crate::core::sort::Sort;
use crate::core::term::{Term, TermKind, Variable};

/// Dimensions added so far; lives in the refinement state and survives re-initialization
/// after a lift.
#[derive(Clone, Debug, Default)]
pub struct LiftState {
  pub attempts: usize,
  pub dims:     Vec<Sort>,
}

/// A problem with every scalar-valued hole widened by one `Int` output component.
pub fn widen(problem: &Problem) -> Problem {
  let mut target = problem.target.clone();

  let mut lifted: HashMap<u32, Variable> = HashMap::default();
  for param in &mut target.params {
    let (args, ret) = param.sort.uncurry();
    if matches!(ret, Sort::Tuple(_)) {
      continue;
    }
    let widened = param.with_sort(Sort::arrow(&args, Sort::Tuple(vec![ret, Sort::Int])));
    lifted.insert(param.id, widened.clone());
    *param = widened;
  }
  if lifted.is_empty() {
    return problem.clone();
  }

  for rule in &mut target.rules {
    rule.rhs = project_lifted(&rule.rhs, &lifted);
  }

  Problem { target, ..problem.clone() }
}

/// Rewrites hole call sites so the surrounding rule still sees the original component:
/// `ξ(args)` becomes `ξ'(args).0`.
fn project_lifted(t: &Term, lifted: &HashMap<u32, Variable>) -> Term {
  match t.kind() {
    TermKind::App(head, args) => {
      if let TermKind::Var(v) = head.kind() {
        if let Some(widened) = lifted.get(&v.id) {
          let args: Vec<Term> = args.iter().map(|a| project_lifted(a, lifted)).collect();
          return Term::sel(Term::app(Term::var(widened.clone()), args), 0);
        }
      }
      Term::app(
        project_lifted(head, lifted),
        args.iter().map(|a| project_lifted(a, lifted)).collect(),
      )
    }
    TermKind::Var(v) => match lifted.get(&v.id) {
      // A nullary hole used bare.
      Some(widened) if !matches!(widened.sort, Sort::Fun(..)) => {
        Term::sel(Term::var(widened.clone()), 0)
      }
      _ => t.clone(),
    },
    _ => {
      let children: Vec<Term> = t.children().iter().map(|c| project_lifted(c, lifted)).collect();
      crate::core::pmrs::rebuild_with_children(t, children)
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::synth::equation::tests::sum_problem;

  use super::*;

  #[test]
  fn widening_adds_an_int_component_to_scalar_holes() {
    let (_ctx, problem) = sum_problem();
    let widened = widen(&problem);

    for hole in widened.holes() {
      let (_, ret) = hole.sort.uncurry();
      match ret {
        Sort::Tuple(components) => {
          assert_eq!(*components.last().unwrap(), Sort::Int);
        }
        other => panic!("hole {} was not widened: {}", hole.name, other),
      }
    }

    // Call sites project the original component back out.
    let odot_rule = widened
      .target
      .rules
      .iter()
      .find(|r| r.rhs.to_string().contains("odot"))
      .unwrap();
    assert!(odot_rule.rhs.to_string().contains(".0"));
  }

  #[test]
  fn widening_is_idempotent_on_tuple_holes() {
    let (_ctx, problem) = sum_problem();
    let once = widen(&problem);
    let twice = widen(&once);
    // Already-tuple holes are left alone.
    for (a, b) in once.holes().iter().zip(twice.holes()) {
      assert_eq!(a.sort, b.sort);
    }
  }
}

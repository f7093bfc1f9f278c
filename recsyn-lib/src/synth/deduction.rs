/*!

Functional-equation solving by boxing: a solver-free attempt to read a hole implementation
directly off the equations. For an equation `E = ξ(a₁,…,aₙ)` the engine tries to rewrite `E`
into a composition of the arguments: each argument that occurs in `E` is boxed at its position;
an argument that is a variable absent from `E` opens a *free box*, which captures the largest
subexpression of `E` whose variables belong to nobody else. The loop runs a bounded number of
steps with a retry queue for arguments that did not match on first pass.

Candidates from different equations are cross-validated: either they agree pointwise, or their
equality is discharged by a single UNSAT check through the SMT port. A cheap Occam bound
rejects guesses whose expression size exceeds [`MAX_GUESS_SIZE`].

*/

use std::collections::VecDeque;

use recsyn_abs::NatSet;

use crate::core::context::Context;
use crate::core::pmrs::HoleSolution;
use crate::core::term::{BoxKind, Term, TermKind, Variable};
use crate::error::SolverError;
use crate::ports::encode::{sort_to_sexp, term_to_sexp};
use crate::ports::sexpr::Sexp;
use crate::ports::smt::{SatAnswer, SmtPort};

use super::equation::Equation;

const MAX_DEDUCTION_STEPS: usize = 20;
const MAX_GUESS_SIZE: usize = 15;

/// A partial shape usable as a grammar guess: positional boxes refer to hole arguments, free
/// boxes to subexpressions the synthesizer still has to find.
#[derive(Clone, PartialEq, Debug)]
pub struct Skeleton {
  pub shape: Term,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Deduced {
  /// A complete implementation for the hole.
  Solution(HoleSolution),
  /// A partial shape worth biasing the grammar with.
  Skeleton(Skeleton),
  /// Nothing usable; fall through to the equation solver.
  Inconclusive,
}

enum Boxing {
  Done(Term),
  Partial(Term),
}

/// Attempts to extract an implementation of `hole` from the equations mentioning it.
pub fn deduce_hole(
  ctx: &Context,
  hole: &Variable,
  equations: &[Equation],
  smt: &mut dyn SmtPort,
) -> Result<Deduced, SolverError> {
  let mut dones: Vec<Term> = Vec::new();
  let mut partials: Vec<Term> = Vec::new();
  let mut oversize = false;

  for equation in equations {
    let args: Option<Vec<Term>> = match equation.rhs.kind() {
      TermKind::App(head, args) => match head.kind() {
        TermKind::Var(v) if v.id == hole.id => Some(args.clone()),
        _ => None,
      },
      // A hole of arity zero appears bare.
      TermKind::Var(v) if v.id == hole.id => Some(Vec::new()),
      _ => None,
    };
    let Some(args) = args else { continue };

    match box_equation(&equation.lhs, &args) {
      Boxing::Done(body) if body.size() <= MAX_GUESS_SIZE => dones.push(body),
      Boxing::Done(_) => oversize = true,
      Boxing::Partial(shape) => partials.push(shape),
    }
  }

  if let Some(candidate) = dones.first() {
    let pointwise = dones.iter().all(|b| b == candidate);
    let validated = pointwise || equivalent_under_smt(ctx, hole, &dones, smt)?;
    if validated {
      return Ok(Deduced::Solution(solution_from_body(ctx, hole, candidate)));
    }
    return Ok(Deduced::Inconclusive);
  }

  if oversize {
    return Ok(Deduced::Inconclusive);
  }
  if let Some(partial) = partials.first() {
    let mut next_free = 0u32;
    return Ok(Deduced::Skeleton(Skeleton { shape: generalize(partial, &mut next_free) }));
  }
  Ok(Deduced::Inconclusive)
}

/// The boxing loop for one equation `E = ξ(args)`.
fn box_equation(lhs: &Term, args: &[Term]) -> Boxing {
  let mut expr = lhs.clone();
  let mut queue: VecDeque<(usize, Term, bool)> =
    args.iter().cloned().enumerate().map(|(i, a)| (i, a, false)).collect();
  let mut steps = 0usize;

  while let Some((index, arg, requeued)) = queue.pop_front() {
    steps += 1;
    if steps > MAX_DEDUCTION_STEPS {
      break;
    }
    let boxed = Term::boxed(BoxKind::Pos(index), arg.sort().clone());

    // A bound argument matching a subexpression of E is boxed at its position.
    if expr.contains(&arg) {
      expr = expr.replace(&arg, &boxed);
      continue;
    }

    // A variable argument absent from E opens a free box: capture the largest subexpression
    // whose variables belong to no other argument.
    if matches!(arg.kind(), TermKind::Var(_)) {
      let allowed = exclusive_variables(&expr, &queue, args, index);
      if let Some(captured) = largest_boxable(&expr, &allowed) {
        expr = expr.replace(&captured, &boxed);
        continue;
      }
    }

    if !requeued {
      queue.push_back((index, arg, true));
    }
    // A second failure drops the argument; the function may simply not use it.
  }

  if expr.free_variables().is_empty() {
    Boxing::Done(expr)
  } else {
    Boxing::Partial(expr)
  }
}

/// Variables of `expr` not claimed by any other pending or future argument.
fn exclusive_variables(
  expr: &Term,
  queue: &VecDeque<(usize, Term, bool)>,
  args: &[Term],
  current: usize,
) -> NatSet {
  let mut allowed = expr.free_var_ids();
  let mut claimed = NatSet::default();
  for (index, arg) in args.iter().enumerate() {
    let pending = index != current
      && (queue.iter().any(|(i, ..)| *i == index) || expr.contains(arg));
    if pending {
      claimed.union_with(&arg.free_var_ids());
    }
  }
  allowed.difference_with(&claimed);
  allowed
}

/// The largest subterm with at least one free variable, all of them in `allowed`, and no box.
fn largest_boxable(expr: &Term, allowed: &NatSet) -> Option<Term> {
  let mut best: Option<Term> = None;
  for subterm in expr.subterms() {
    if subterm.has_boxes() {
      continue;
    }
    let vars = subterm.free_var_ids();
    if vars.is_empty() || !vars.is_subset(allowed) {
      continue;
    }
    let better = match &best {
      None => true,
      Some(current) => subterm.size() > current.size(),
    };
    if better {
      best = Some(subterm);
    }
  }
  best
}

/// Builds the named solution, rewriting positional boxes to fresh canonical parameters.
fn solution_from_body(ctx: &Context, hole: &Variable, body: &Term) -> HoleSolution {
  let (arg_sorts, _) = hole.sort.uncurry();
  let params: Vec<Variable> = arg_sorts
    .iter()
    .enumerate()
    .map(|(i, sort)| ctx.named_var(&format!("a{}", i), sort.clone()))
    .collect();

  let mut rewritten = body.clone();
  for (index, param) in params.iter().enumerate() {
    let boxed = Term::boxed(BoxKind::Pos(index), param.sort.clone());
    rewritten = rewritten.replace(&boxed, &Term::var(param.clone()));
  }

  HoleSolution { name: hole.name, args: params, body: rewritten }
}

/// Pointwise disagreement fallback: all candidate bodies must be pairwise equivalent, checked
/// as one UNSAT query per pair against the SMT port.
fn equivalent_under_smt(
  ctx: &Context,
  hole: &Variable,
  bodies: &[Term],
  smt: &mut dyn SmtPort,
) -> Result<bool, SolverError> {
  let (arg_sorts, _) = hole.sort.uncurry();
  let params: Vec<Variable> = arg_sorts
    .iter()
    .enumerate()
    .map(|(i, sort)| ctx.fresh_var(&format!("barg{}", i), sort.clone()))
    .collect();
  let unbox = |body: &Term| {
    let mut rewritten = body.clone();
    for (index, param) in params.iter().enumerate() {
      let boxed = Term::boxed(BoxKind::Pos(index), param.sort.clone());
      rewritten = rewritten.replace(&boxed, &Term::var(param.clone()));
    }
    rewritten
  };

  let first = unbox(&bodies[0]);
  for other in &bodies[1..] {
    let other = unbox(other);
    if other == first {
      continue;
    }
    smt.push()?;
    for param in &params {
      smt.exec(&Sexp::list(vec![
        Sexp::atom("declare-const"),
        Sexp::atom(param.name.as_str()),
        sort_to_sexp(&param.sort),
      ]))?;
    }
    smt.assert(&Sexp::list(vec![
      Sexp::atom("not"),
      Sexp::list(vec![
        Sexp::atom("="),
        term_to_sexp(&first),
        term_to_sexp(&other),
      ]),
    ]))?;
    let answer = smt.check_sat()?;
    smt.pop()?;
    if answer != SatAnswer::Unsat {
      return Ok(false);
    }
  }
  Ok(true)
}

/// Turns the leftover free variables of a partial shape into free boxes, keeping the operator
/// structure as the guess.
fn generalize(shape: &Term, next_free: &mut u32) -> Term {
  match shape.kind() {
    TermKind::Var(_) => {
      let id = *next_free;
      *next_free += 1;
      Term::boxed(BoxKind::Free(id), shape.sort().clone())
    }
    _ => {
      let children: Vec<Term> = shape
        .children()
        .iter()
        .map(|c| generalize(c, next_free))
        .collect();
      crate::core::pmrs::rebuild_with_children(shape, children)
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use recsyn_abs::IString;

  use crate::core::sort::Sort;
  use crate::core::term::{Binop, Constant};

  use super::*;

  /// An SMT port with scripted `check-sat` answers, shared by the synthesis-layer tests.
  /// Declared constants are tracked so `get-model` can answer with a binding for each
  /// (everything maps to 1), which is enough for the counterexample plumbing.
  pub(crate) struct MockSmt {
    pub answers:  Vec<SatAnswer>,
    pub declared: Vec<IString>,
    pub calls:    usize,
  }

  impl MockSmt {
    pub fn unsat() -> MockSmt {
      MockSmt { answers: vec![], declared: vec![], calls: 0 }
    }

    pub fn scripted(answers: Vec<SatAnswer>) -> MockSmt {
      MockSmt { answers, declared: vec![], calls: 0 }
    }
  }

  impl SmtPort for MockSmt {
    fn adapter(&self) -> &'static str {
      "mock-smt/1"
    }

    fn set_option(&mut self, _key: &str, _value: &str) -> Result<(), SolverError> {
      Ok(())
    }

    fn exec(&mut self, command: &Sexp) -> Result<(), SolverError> {
      if command.head() == Some("declare-const") {
        if let Some(name) = command.as_list().and_then(|l| l.get(1)).and_then(Sexp::as_atom) {
          self.declared.push(IString::from(name));
        }
      }
      Ok(())
    }

    fn push(&mut self) -> Result<(), SolverError> {
      Ok(())
    }

    fn pop(&mut self) -> Result<(), SolverError> {
      Ok(())
    }

    fn check_sat(&mut self) -> Result<SatAnswer, SolverError> {
      let answer = if self.calls < self.answers.len() {
        self.answers[self.calls]
      } else {
        SatAnswer::Unsat
      };
      self.calls += 1;
      Ok(answer)
    }

    fn get_model(&mut self) -> Result<Vec<(IString, Constant)>, SolverError> {
      Ok(self.declared.iter().map(|name| (*name, Constant::Int(1))).collect())
    }
  }

  fn int_var(ctx: &Context, name: &str) -> Variable {
    ctx.named_var(name, Sort::Int)
  }

  fn hole_eq(ctx: &Context, hole: &Variable, lhs: Term, args: Vec<Term>) -> Equation {
    Equation {
      term:    Term::int(0), // representative irrelevant here
      precond: None,
      lhs,
      rhs: Term::app(Term::var(hole.clone()), args),
    }
  }

  #[test]
  fn extracts_a_binary_hole_from_matching_arguments() {
    let ctx = Context::new();
    let hole = ctx.named_var("odot", Sort::arrow(&[Sort::Int, Sort::Int], Sort::Int));
    let hd = int_var(&ctx, "hd");
    let s = int_var(&ctx, "s");

    // hd + s = odot(hd, s)
    let equation = hole_eq(
      &ctx,
      &hole,
      Term::bin(Binop::Plus, Term::var(hd.clone()), Term::var(s.clone())),
      vec![Term::var(hd), Term::var(s)],
    );

    let mut smt = MockSmt::unsat();
    let deduced = deduce_hole(&ctx, &hole, &[equation], &mut smt).unwrap();
    match deduced {
      Deduced::Solution(solution) => {
        assert_eq!(solution.name.as_str(), "odot");
        assert_eq!(solution.body.to_string(), "a0 + a1");
      }
      other => panic!("expected a solution, got {:?}", other),
    }
    assert_eq!(smt.calls, 0); // pointwise agreement, no solver needed
  }

  #[test]
  fn nullary_holes_come_from_closed_equations() {
    let ctx = Context::new();
    let hole = ctx.named_var("c0", Sort::Int);
    let equation = Equation {
      term:    Term::int(0),
      precond: None,
      lhs:     Term::int(0),
      rhs:     Term::var(hole.clone()),
    };
    let mut smt = MockSmt::unsat();
    match deduce_hole(&ctx, &hole, &[equation], &mut smt).unwrap() {
      Deduced::Solution(solution) => assert_eq!(solution.body, Term::int(0)),
      other => panic!("expected a solution, got {:?}", other),
    }
  }

  #[test]
  fn free_boxes_capture_unclaimed_subexpressions() {
    let ctx = Context::new();
    let hole = ctx.named_var("join", Sort::arrow(&[Sort::Int, Sort::Int], Sort::Int));
    let hd = int_var(&ctx, "hd");
    let v1 = int_var(&ctx, "v1");
    let v2 = int_var(&ctx, "v2");

    // hd + (v1 + v2) = join(hd, w): w does not occur, so (v1 + v2) is captured.
    let w = int_var(&ctx, "w");
    let equation = hole_eq(
      &ctx,
      &hole,
      Term::bin(
        Binop::Plus,
        Term::var(hd.clone()),
        Term::bin(Binop::Plus, Term::var(v1), Term::var(v2)),
      ),
      vec![Term::var(hd), Term::var(w)],
    );

    let mut smt = MockSmt::unsat();
    match deduce_hole(&ctx, &hole, &[equation], &mut smt).unwrap() {
      Deduced::Solution(solution) => assert_eq!(solution.body.to_string(), "a0 + a1"),
      other => panic!("expected a solution, got {:?}", other),
    }
  }

  #[test]
  fn disagreeing_candidates_need_the_solver() {
    let ctx = Context::new();
    let hole = ctx.named_var("f", Sort::arrow(&[Sort::Int], Sort::Int));
    let x = int_var(&ctx, "x");
    let y = int_var(&ctx, "y");

    // x + 1 = f(x)  and  1 + y = f(y): structurally different bodies, semantically equal.
    let eq1 = hole_eq(
      &ctx,
      &hole,
      Term::bin(Binop::Plus, Term::var(x.clone()), Term::int(1)),
      vec![Term::var(x)],
    );
    let eq2 = hole_eq(
      &ctx,
      &hole,
      Term::bin(Binop::Plus, Term::int(1), Term::var(y.clone())),
      vec![Term::var(y)],
    );

    let mut smt = MockSmt::scripted(vec![SatAnswer::Unsat]);
    match deduce_hole(&ctx, &hole, &[eq1.clone(), eq2.clone()], &mut smt).unwrap() {
      Deduced::Solution(_) => {}
      other => panic!("expected a validated solution, got {:?}", other),
    }
    assert_eq!(smt.calls, 1);

    // A refuting model rejects the guess instead.
    let mut smt = MockSmt::scripted(vec![SatAnswer::Sat]);
    assert_eq!(
      deduce_hole(&ctx, &hole, &[eq1, eq2], &mut smt).unwrap(),
      Deduced::Inconclusive
    );
  }

  #[test]
  fn oversized_guesses_are_rejected() {
    let ctx = Context::new();
    let hole = ctx.named_var("f", Sort::arrow(&[Sort::Int], Sort::Int));
    let x = int_var(&ctx, "x");

    // A 17-node chain exceeds the Occam bound of 15.
    let mut lhs = Term::var(x.clone());
    for _ in 0..8 {
      lhs = Term::bin(Binop::Plus, lhs, Term::int(1));
    }
    let equation = hole_eq(&ctx, &hole, lhs, vec![Term::var(x)]);
    let mut smt = MockSmt::unsat();
    assert_eq!(
      deduce_hole(&ctx, &hole, &[equation], &mut smt).unwrap(),
      Deduced::Inconclusive
    );
  }

  #[test]
  fn unmatchable_equations_yield_a_skeleton_guess() {
    let ctx = Context::new();
    let hole = ctx.named_var("f", Sort::arrow(&[Sort::Int], Sort::Int));
    let x = int_var(&ctx, "x");
    let y = int_var(&ctx, "y");
    let z = int_var(&ctx, "z");

    // y + z = f(x): x matches nothing and y, z cannot both be captured by one box.
    let equation = hole_eq(
      &ctx,
      &hole,
      Term::bin(Binop::Plus, Term::var(y), Term::var(z)),
      vec![Term::bin(Binop::Times, Term::var(x.clone()), Term::int(2))],
    );
    let mut smt = MockSmt::unsat();
    match deduce_hole(&ctx, &hole, &[equation], &mut smt).unwrap() {
      Deduced::Skeleton(skeleton) => {
        assert!(skeleton.shape.has_boxes());
        assert!(skeleton.shape.free_variables().is_empty());
      }
      other => panic!("expected a skeleton, got {:?}", other),
    }
  }
}

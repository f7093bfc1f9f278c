/*!

Equivalence-preserving canonicalization: constant folding, neutral-element elimination, and
flattening of associative operator chains with their constant parts combined. Non-constant
operands keep their relative order, so the rewrite is a logical equivalence and runs are
reproducible.

*/

use super::{Binop, Constant, Term, TermKind, Unop};

/// Simplifies bottom-up. Idempotent.
pub fn simplify(t: &Term) -> Term {
  match t.kind() {
    TermKind::Const(_) | TermKind::Var(_) | TermKind::Boxed(_) => t.clone(),

    TermKind::Tuple(items) => Term::tuple(items.iter().map(simplify).collect()),

    TermKind::Data(ctor, args) => {
      Term::data(*ctor, args.iter().map(simplify).collect(), t.sort().clone())
    }

    TermKind::Sel(subject, index) => {
      let subject = simplify(subject);
      match subject.kind() {
        TermKind::Tuple(items) if *index < items.len() => items[*index].clone(),
        _ => Term::sel(subject, *index),
      }
    }

    TermKind::Un(op, inner) => {
      let inner = simplify(inner);
      match (op, inner.kind()) {
        (Unop::Neg, TermKind::Const(Constant::Int(i))) => Term::int(-i),
        (Unop::Abs, TermKind::Const(Constant::Int(i))) => Term::int(i.abs()),
        (Unop::Not, TermKind::Const(Constant::Bool(b))) => Term::bool_const(!b),
        // Double negation in either domain.
        (Unop::Neg, TermKind::Un(Unop::Neg, t)) | (Unop::Not, TermKind::Un(Unop::Not, t)) => t.clone(),
        _ => Term::un(*op, inner),
      }
    }

    TermKind::Ite(cond, then, els) => {
      let cond = simplify(cond);
      match cond.kind() {
        TermKind::Const(Constant::Bool(true)) => simplify(then),
        TermKind::Const(Constant::Bool(false)) => simplify(els),
        _ => {
          let then = simplify(then);
          let els = simplify(els);
          if then == els {
            then
          } else {
            Term::ite(cond, then, els)
          }
        }
      }
    }

    TermKind::Bin(op, a, b) => simplify_bin(*op, &simplify(a), &simplify(b)),

    TermKind::App(head, args) => {
      Term::app(simplify(head), args.iter().map(simplify).collect())
    }
  }
}

/// A single folding step at the root only, for the reduction engine's step accounting.
/// `None` when the root is not a foldable redex.
pub(crate) fn fold_root(t: &Term) -> Option<Term> {
  match t.kind() {
    TermKind::Sel(subject, index) => match subject.kind() {
      TermKind::Tuple(items) if *index < items.len() => Some(items[*index].clone()),
      _ => None,
    },

    TermKind::Ite(cond, then, els) => match bool_of(cond) {
      Some(true) => Some(then.clone()),
      Some(false) => Some(els.clone()),
      None => None,
    },

    TermKind::Un(op, inner) => match (op, inner.kind()) {
      (Unop::Neg, TermKind::Const(Constant::Int(i))) => Some(Term::int(-i)),
      (Unop::Abs, TermKind::Const(Constant::Int(i))) => Some(Term::int(i.abs())),
      (Unop::Not, TermKind::Const(Constant::Bool(b))) => Some(Term::bool_const(!b)),
      _ => None,
    },

    TermKind::Bin(op, a, b) => {
      let folded = simplify_bin(*op, a, b);
      if matches!(folded.kind(), TermKind::Const(_)) {
        Some(folded)
      } else {
        None
      }
    }

    _ => None,
  }
}

fn int_of(t: &Term) -> Option<i64> {
  match t.kind() {
    TermKind::Const(Constant::Int(i)) => Some(*i),
    _ => None,
  }
}

fn bool_of(t: &Term) -> Option<bool> {
  match t.kind() {
    TermKind::Const(Constant::Bool(b)) => Some(*b),
    _ => None,
  }
}

fn simplify_bin(op: Binop, a: &Term, b: &Term) -> Term {
  // Full constant folding first.
  if let (Some(x), Some(y)) = (int_of(a), int_of(b)) {
    match op {
      Binop::Plus => return Term::int(x + y),
      Binop::Minus => return Term::int(x - y),
      Binop::Times => return Term::int(x * y),
      Binop::Div if y != 0 => return Term::int(x.div_euclid(y)),
      Binop::Mod if y != 0 => return Term::int(x.rem_euclid(y)),
      Binop::Min => return Term::int(x.min(y)),
      Binop::Max => return Term::int(x.max(y)),
      Binop::Eq => return Term::bool_const(x == y),
      Binop::Lt => return Term::bool_const(x < y),
      Binop::Gt => return Term::bool_const(x > y),
      Binop::Le => return Term::bool_const(x <= y),
      Binop::Ge => return Term::bool_const(x >= y),
      _ => {}
    }
  }
  if let (Some(x), Some(y)) = (bool_of(a), bool_of(b)) {
    match op {
      Binop::And => return Term::bool_const(x && y),
      Binop::Or => return Term::bool_const(x || y),
      Binop::Eq => return Term::bool_const(x == y),
      _ => {}
    }
  }

  match op {
    // Associative chains: collect operands, fold the constant part, rebuild left-associated.
    Binop::Plus | Binop::Times | Binop::And | Binop::Or | Binop::Min | Binop::Max => {
      flatten_chain(op, a, b)
    }

    Binop::Minus if int_of(b) == Some(0) => a.clone(),

    Binop::Eq if a == b => Term::bool_const(true),
    Binop::Le | Binop::Ge if a == b => Term::bool_const(true),
    Binop::Lt | Binop::Gt if a == b => Term::bool_const(false),

    _ => Term::bin(op, a.clone(), b.clone()),
  }
}

fn chain_identity(op: Binop) -> Option<Constant> {
  match op {
    Binop::Plus => Some(Constant::Int(0)),
    Binop::Times => Some(Constant::Int(1)),
    Binop::And => Some(Constant::Bool(true)),
    Binop::Or => Some(Constant::Bool(false)),
    _ => None,
  }
}

/// Absorbing element: `x * 0 = 0`, `x && false = false`, `x || true = true`.
fn chain_absorber(op: Binop) -> Option<Constant> {
  match op {
    Binop::Times => Some(Constant::Int(0)),
    Binop::And => Some(Constant::Bool(false)),
    Binop::Or => Some(Constant::Bool(true)),
    _ => None,
  }
}

fn flatten_chain(op: Binop, a: &Term, b: &Term) -> Term {
  let mut operands = Vec::new();
  collect_chain(op, a, &mut operands);
  collect_chain(op, b, &mut operands);

  let mut folded: Option<Term> = None;
  let mut rest = Vec::new();
  for operand in operands {
    if matches!(operand.kind(), TermKind::Const(_)) {
      folded = Some(match folded {
        None => operand,
        Some(prev) => {
          let combined = simplify_bin_const(op, &prev, &operand);
          debug_assert!(matches!(combined.kind(), TermKind::Const(_)), "constant folding must fold");
          combined
        }
      });
    } else {
      rest.push(operand);
    }
  }

  if let Some(ref c) = folded {
    if let TermKind::Const(value) = c.kind() {
      if chain_absorber(op).as_ref() == Some(value) {
        return c.clone();
      }
      if chain_identity(op).as_ref() == Some(value) && !rest.is_empty() {
        folded = None;
      }
    }
  }

  let mut all = rest;
  if let Some(c) = folded {
    all.push(c);
  }
  if all.is_empty() {
    // Every operand was the identity.
    return Term::constant(chain_identity(op).expect("chain with identity"));
  }
  let mut result = all[0].clone();
  for operand in &all[1..] {
    result = Term::bin(op, result, operand.clone());
  }
  result
}

fn collect_chain(op: Binop, t: &Term, into: &mut Vec<Term>) {
  match t.kind() {
    TermKind::Bin(inner, a, b) if *inner == op => {
      collect_chain(op, a, into);
      collect_chain(op, b, into);
    }
    _ => into.push(t.clone()),
  }
}

/// Folds two constants under `op`. Callers guarantee both are constants of the right sort.
fn simplify_bin_const(op: Binop, a: &Term, b: &Term) -> Term {
  if let (Some(x), Some(y)) = (int_of(a), int_of(b)) {
    return match op {
      Binop::Plus => Term::int(x + y),
      Binop::Times => Term::int(x * y),
      Binop::Min => Term::int(x.min(y)),
      Binop::Max => Term::int(x.max(y)),
      _ => Term::bin(op, a.clone(), b.clone()),
    };
  }
  if let (Some(x), Some(y)) = (bool_of(a), bool_of(b)) {
    return match op {
      Binop::And => Term::bool_const(x && y),
      Binop::Or => Term::bool_const(x || y),
      _ => Term::bin(op, a.clone(), b.clone()),
    };
  }
  Term::bin(op, a.clone(), b.clone())
}

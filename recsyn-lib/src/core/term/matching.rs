/*!

One-way structural matching. A pattern is an ordinary term whose variables are binders; matching
a pattern against a subject either fails or produces the witnessing substitution. Non-linear
patterns are supported: repeated variables must bind structurally equal subterms.

*/

use super::{Term, TermKind, VarSubst};

/// Matches `pattern` against `subject` at the root. `Some(σ)` with `pattern.substitute(σ) ==
/// subject` on success.
pub fn match_term(pattern: &Term, subject: &Term) -> Option<VarSubst> {
  let mut subst = VarSubst::default();
  if match_into(pattern, subject, &mut subst) {
    Some(subst)
  } else {
    None
  }
}

fn match_into(pattern: &Term, subject: &Term, subst: &mut VarSubst) -> bool {
  match (pattern.kind(), subject.kind()) {
    (TermKind::Var(v), _) => match subst.get(&v.id) {
      Some(bound) => bound == subject,
      None => {
        subst.insert(v.id, subject.clone());
        true
      }
    },

    (TermKind::Const(a), TermKind::Const(b)) => a == b,

    (TermKind::Tuple(xs), TermKind::Tuple(ys)) => {
      xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| match_into(x, y, subst))
    }

    (TermKind::Data(c, xs), TermKind::Data(d, ys)) => {
      c == d && xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| match_into(x, y, subst))
    }

    (TermKind::Sel(x, i), TermKind::Sel(y, j)) => i == j && match_into(x, y, subst),

    (TermKind::Un(op1, x), TermKind::Un(op2, y)) => op1 == op2 && match_into(x, y, subst),

    (TermKind::Bin(op1, a1, b1), TermKind::Bin(op2, a2, b2)) => {
      op1 == op2 && match_into(a1, a2, subst) && match_into(b1, b2, subst)
    }

    (TermKind::Ite(c1, a1, b1), TermKind::Ite(c2, a2, b2)) => {
      match_into(c1, c2, subst) && match_into(a1, a2, subst) && match_into(b1, b2, subst)
    }

    (TermKind::App(h1, args1), TermKind::App(h2, args2)) => {
      args1.len() == args2.len()
        && match_into(h1, h2, subst)
        && args1.iter().zip(args2).all(|(x, y)| match_into(x, y, subst))
    }

    (TermKind::Boxed(a), TermKind::Boxed(b)) => a == b,

    _ => false,
  }
}

/// Detects whether `subject` is an instance of `pattern` at the root or at any subterm, and
/// returns the witnessing substitution of the first (preorder) match.
pub fn matches_subpattern(pattern: &Term, subject: &Term) -> Option<VarSubst> {
  if let Some(subst) = match_term(pattern, subject) {
    return Some(subst);
  }
  for child in subject.children() {
    if let Some(subst) = matches_subpattern(pattern, &child) {
      return Some(subst);
    }
  }
  None
}

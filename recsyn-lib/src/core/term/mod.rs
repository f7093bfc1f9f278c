/*!

Typed terms. A `Term` is a shared, immutable value tree: sharing is by `Rc` identity for
efficiency, equality and hashing are structural (variables compare by id, sorts are ignored —
two structurally identical terms denote the same value regardless of how far inference got).

Terms are built through the constructor functions on `Term` (`Term::var`, `Term::int`,
`Term::bin`, …) which compute the node sort whenever the operator determines it. Nothing here
mutates: substitution, replacement and simplification all rebuild.

*/

mod infer;
mod matching;
mod simplify;

use std::{
  fmt::{Display, Formatter},
  hash::{Hash, Hasher},
  rc::Rc,
};

use recsyn_abs::{join_string, HashMap, IString, NatSet};

pub use infer::{apply_solution, collect_constraints, infer};
pub use matching::{match_term, matches_subpattern};
pub use simplify::simplify;

pub(crate) use simplify::fold_root;

use super::sort::Sort;

/// A substitution over term variables, keyed by variable id.
pub type VarSubst = HashMap<u32, Term>;

// region Variables, constants, operators

#[derive(Clone, Debug)]
pub struct Variable {
  pub id:   u32,
  pub name: IString,
  pub sort: Sort,
}

impl Variable {
  pub fn new(id: u32, name: IString, sort: Sort) -> Variable {
    Variable { id, name, sort }
  }

  /// The same variable with its sort rewritten by a resolved unifier.
  pub fn with_sort(&self, sort: Sort) -> Variable {
    Variable { id: self.id, name: self.name, sort }
  }
}

// Variables are identified by id alone; name and sort are bookkeeping.
impl PartialEq for Variable {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for Variable {}

impl Hash for Variable {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl Display for Variable {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.name)
  }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Constant {
  Int(i64),
  Bool(bool),
  Char(char),
  Str(IString),
}

impl Constant {
  pub fn sort(&self) -> Sort {
    match self {
      Constant::Int(_) => Sort::Int,
      Constant::Bool(_) => Sort::Bool,
      Constant::Char(_) => Sort::Char,
      Constant::Str(_) => Sort::Str,
    }
  }
}

impl Display for Constant {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Constant::Int(i) => write!(f, "{}", i),
      Constant::Bool(b) => write!(f, "{}", b),
      Constant::Char(c) => write!(f, "'{}'", c),
      Constant::Str(s) => write!(f, "\"{}\"", s),
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Binop {
  Plus,
  Minus,
  Times,
  Div,
  Mod,
  Min,
  Max,
  And,
  Or,
  Eq,
  Lt,
  Gt,
  Le,
  Ge,
}

impl Binop {
  pub fn is_arith(&self) -> bool {
    matches!(self, Binop::Plus | Binop::Minus | Binop::Times | Binop::Div | Binop::Mod | Binop::Min | Binop::Max)
  }

  pub fn is_comparison(&self) -> bool {
    matches!(self, Binop::Lt | Binop::Gt | Binop::Le | Binop::Ge)
  }

  pub fn is_boolean(&self) -> bool {
    matches!(self, Binop::And | Binop::Or)
  }

  /// The result sort the operator forces. `Eq` and comparisons return `Bool`.
  pub fn result_sort(&self) -> Sort {
    if self.is_arith() {
      Sort::Int
    } else {
      Sort::Bool
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Binop::Plus => "+",
      Binop::Minus => "-",
      Binop::Times => "*",
      Binop::Div => "div",
      Binop::Mod => "mod",
      Binop::Min => "min",
      Binop::Max => "max",
      Binop::And => "&&",
      Binop::Or => "||",
      Binop::Eq => "=",
      Binop::Lt => "<",
      Binop::Gt => ">",
      Binop::Le => "<=",
      Binop::Ge => ">=",
    }
  }
}

impl Display for Binop {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Unop {
  Neg,
  Not,
  Abs,
}

impl Unop {
  pub fn result_sort(&self) -> Sort {
    match self {
      Unop::Neg | Unop::Abs => Sort::Int,
      Unop::Not => Sort::Bool,
    }
  }
}

/// Placeholders used by the deduction engine: `Pos(i)` stands for the i-th bound argument of
/// the hole under deduction, `Free(id)` for a subexpression yet to be pinned down.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BoxKind {
  Pos(usize),
  Free(u32),
}

// endregion

// region Term

#[derive(Clone, Debug)]
pub struct Term(Rc<TermData>);

#[derive(Debug)]
pub struct TermData {
  pub sort: Sort,
  pub kind: TermKind,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TermKind {
  Const(Constant),
  Var(Variable),
  Tuple(Vec<Term>),
  /// Tuple projection, zero-indexed.
  Sel(Term, usize),
  Un(Unop, Term),
  Bin(Binop, Term, Term),
  Ite(Term, Term, Term),
  /// Function application. The head is never itself an application; `Term::app` flattens.
  App(Term, Vec<Term>),
  /// Data-constructor application.
  Data(IString, Vec<Term>),
  Boxed(BoxKind),
}

// Structural equality on kinds; sorts do not participate.
impl PartialEq for Term {
  fn eq(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.0, &other.0) || self.0.kind == other.0.kind
  }
}

impl Eq for Term {}

impl Hash for Term {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.0.kind.hash(state);
  }
}

impl Term {
  pub fn new(sort: Sort, kind: TermKind) -> Term {
    Term(Rc::new(TermData { sort, kind }))
  }

  #[inline(always)]
  pub fn sort(&self) -> &Sort {
    &self.0.sort
  }

  #[inline(always)]
  pub fn kind(&self) -> &TermKind {
    &self.0.kind
  }

  // region Constructors

  pub fn constant(c: Constant) -> Term {
    let sort = c.sort();
    Term::new(sort, TermKind::Const(c))
  }

  pub fn int(i: i64) -> Term {
    Term::constant(Constant::Int(i))
  }

  pub fn bool_const(b: bool) -> Term {
    Term::constant(Constant::Bool(b))
  }

  pub fn var(v: Variable) -> Term {
    let sort = v.sort.clone();
    Term::new(sort, TermKind::Var(v))
  }

  pub fn tuple(items: Vec<Term>) -> Term {
    let sort = Sort::Tuple(items.iter().map(|t| t.sort().clone()).collect());
    Term::new(sort, TermKind::Tuple(items))
  }

  /// Tuple projection. The subject's sort must already be a tuple.
  pub fn sel(subject: Term, index: usize) -> Term {
    let sort = match subject.sort() {
      Sort::Tuple(items) if index < items.len() => items[index].clone(),
      other => {
        debug_assert!(false, "projection .{} from non-tuple sort {}", index, other);
        other.clone()
      }
    };
    Term::new(sort, TermKind::Sel(subject, index))
  }

  pub fn un(op: Unop, t: Term) -> Term {
    Term::new(op.result_sort(), TermKind::Un(op, t))
  }

  pub fn bin(op: Binop, a: Term, b: Term) -> Term {
    Term::new(op.result_sort(), TermKind::Bin(op, a, b))
  }

  pub fn ite(cond: Term, then: Term, els: Term) -> Term {
    let sort = then.sort().clone();
    Term::new(sort, TermKind::Ite(cond, then, els))
  }

  /// Function application, flattening nested applications so the head is never an `App`.
  pub fn app(head: Term, mut args: Vec<Term>) -> Term {
    if args.is_empty() {
      return head;
    }
    let (head, args) = match head.kind() {
      TermKind::App(inner_head, inner_args) => {
        let mut all = inner_args.clone();
        all.append(&mut args);
        (inner_head.clone(), all)
      }
      _ => (head, args),
    };
    let sort = head.sort().return_after(args.len());
    Term::new(sort, TermKind::App(head, args))
  }

  pub fn data(ctor: IString, args: Vec<Term>, sort: Sort) -> Term {
    Term::new(sort, TermKind::Data(ctor, args))
  }

  pub fn boxed(kind: BoxKind, sort: Sort) -> Term {
    Term::new(sort, TermKind::Boxed(kind))
  }

  // endregion

  // region Traversal and queries

  /// Immediate children, left to right.
  pub fn children(&self) -> Vec<Term> {
    match self.kind() {
      TermKind::Const(_) | TermKind::Var(_) | TermKind::Boxed(_) => vec![],
      TermKind::Tuple(items) | TermKind::Data(_, items) => items.clone(),
      TermKind::Sel(t, _) | TermKind::Un(_, t) => vec![t.clone()],
      TermKind::Bin(_, a, b) => vec![a.clone(), b.clone()],
      TermKind::Ite(c, a, b) => vec![c.clone(), a.clone(), b.clone()],
      TermKind::App(head, args) => {
        let mut result = vec![head.clone()];
        result.extend(args.iter().cloned());
        result
      }
    }
  }

  /// All subterms in preorder, including the term itself.
  pub fn subterms(&self) -> Vec<Term> {
    let mut result = Vec::new();
    let mut stack = vec![self.clone()];
    while let Some(t) = stack.pop() {
      result.push(t.clone());
      let mut kids = t.children();
      kids.reverse();
      stack.extend(kids);
    }
    result
  }

  pub fn contains(&self, needle: &Term) -> bool {
    self == needle || self.children().iter().any(|c| c.contains(needle))
  }

  /// Node count.
  pub fn size(&self) -> usize {
    1 + self.children().iter().map(Term::size).sum::<usize>()
  }

  /// Free variables in order of first occurrence. There are no binders in the term language,
  /// so every variable occurrence is free.
  pub fn free_variables(&self) -> Vec<Variable> {
    let mut seen = NatSet::default();
    let mut result = Vec::new();
    self.collect_variables(&mut seen, &mut result);
    result
  }

  fn collect_variables(&self, seen: &mut NatSet, into: &mut Vec<Variable>) {
    if let TermKind::Var(v) = self.kind() {
      if !seen.contains(v.id as usize) {
        seen.insert(v.id as usize);
        into.push(v.clone());
      }
    }
    for child in self.children() {
      child.collect_variables(seen, into);
    }
  }

  pub fn free_var_ids(&self) -> NatSet {
    let mut seen = NatSet::default();
    let mut sink = Vec::new();
    self.collect_variables(&mut seen, &mut sink);
    seen
  }

  /// Does the term contain a variable whose id is in `ids`, either bare or as an application
  /// head? Used for maximal-reducibility and purity checks over nonterminal ids.
  pub fn mentions_any(&self, ids: &NatSet) -> bool {
    match self.kind() {
      TermKind::Var(v) => ids.contains(v.id as usize),
      _ => self.children().iter().any(|c| c.mentions_any(ids)),
    }
  }

  /// Does the term contain a box?
  pub fn has_boxes(&self) -> bool {
    match self.kind() {
      TermKind::Boxed(_) => true,
      _ => self.children().iter().any(Term::has_boxes),
    }
  }

  // endregion

  // region Rewriting

  /// Capture-free substitution of variables by terms, keyed by variable id.
  pub fn substitute(&self, subst: &VarSubst) -> Term {
    match self.kind() {
      TermKind::Var(v) => match subst.get(&v.id) {
        Some(replacement) => replacement.clone(),
        None => self.clone(),
      },
      TermKind::Const(_) | TermKind::Boxed(_) => self.clone(),
      TermKind::Tuple(items) => Term::tuple(items.iter().map(|t| t.substitute(subst)).collect()),
      TermKind::Data(ctor, args) => Term::data(
        *ctor,
        args.iter().map(|t| t.substitute(subst)).collect(),
        self.sort().clone(),
      ),
      TermKind::Sel(t, i) => Term::sel(t.substitute(subst), *i),
      TermKind::Un(op, t) => Term::un(*op, t.substitute(subst)),
      TermKind::Bin(op, a, b) => Term::bin(*op, a.substitute(subst), b.substitute(subst)),
      TermKind::Ite(c, a, b) => Term::ite(c.substitute(subst), a.substitute(subst), b.substitute(subst)),
      // `Term::app` re-flattens in case the head was substituted by an application.
      TermKind::App(head, args) => Term::app(
        head.substitute(subst),
        args.iter().map(|t| t.substitute(subst)).collect(),
      ),
    }
  }

  /// Replaces every structural occurrence of `from` by `to`.
  pub fn replace(&self, from: &Term, to: &Term) -> Term {
    if self == from {
      return to.clone();
    }
    match self.kind() {
      TermKind::Const(_) | TermKind::Var(_) | TermKind::Boxed(_) => self.clone(),
      TermKind::Tuple(items) => Term::tuple(items.iter().map(|t| t.replace(from, to)).collect()),
      TermKind::Data(ctor, args) => Term::data(
        *ctor,
        args.iter().map(|t| t.replace(from, to)).collect(),
        self.sort().clone(),
      ),
      TermKind::Sel(t, i) => Term::sel(t.replace(from, to), *i),
      TermKind::Un(op, t) => Term::un(*op, t.replace(from, to)),
      TermKind::Bin(op, a, b) => Term::bin(*op, a.replace(from, to), b.replace(from, to)),
      TermKind::Ite(c, a, b) => Term::ite(c.replace(from, to), a.replace(from, to), b.replace(from, to)),
      TermKind::App(head, args) => Term::app(
        head.replace(from, to),
        args.iter().map(|t| t.replace(from, to)).collect(),
      ),
    }
  }

  // endregion
}

impl Display for Term {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.kind() {
      TermKind::Const(c) => write!(f, "{}", c),
      TermKind::Var(v) => write!(f, "{}", v),
      TermKind::Tuple(items) => write!(f, "({})", join_string(items.iter(), ", ")),
      TermKind::Sel(t, i) => write!(f, "{}.{}", paren(t), i),
      TermKind::Un(Unop::Neg, t) => write!(f, "-{}", paren(t)),
      TermKind::Un(Unop::Not, t) => write!(f, "!{}", paren(t)),
      TermKind::Un(Unop::Abs, t) => write!(f, "abs({})", t),
      TermKind::Bin(op @ (Binop::Min | Binop::Max), a, b) => write!(f, "{}({}, {})", op, a, b),
      TermKind::Bin(op, a, b) => write!(f, "{} {} {}", paren(a), op, paren(b)),
      TermKind::Ite(c, a, b) => write!(f, "if {} then {} else {}", c, a, b),
      TermKind::App(head, args) => {
        write!(f, "{}", paren(head))?;
        for arg in args {
          write!(f, " {}", paren(arg))?;
        }
        Ok(())
      }
      TermKind::Data(ctor, args) if args.is_empty() => write!(f, "{}", ctor),
      TermKind::Data(ctor, args) => write!(f, "{}({})", ctor, join_string(args.iter(), ", ")),
      TermKind::Boxed(BoxKind::Pos(i)) => write!(f, "[#{}]", i),
      TermKind::Boxed(BoxKind::Free(id)) => write!(f, "[?{}]", id),
    }
  }
}

/// Wraps non-atomic terms in parentheses for display.
fn paren(t: &Term) -> String {
  match t.kind() {
    TermKind::Const(_) | TermKind::Var(_) | TermKind::Tuple(_) | TermKind::Boxed(_) => t.to_string(),
    TermKind::Data(_, args) if args.is_empty() => t.to_string(),
    _ => format!("({})", t),
  }
}

// endregion

#[cfg(test)]
mod tests {
  use super::*;

  fn v(id: u32, name: &str, sort: Sort) -> Variable {
    Variable::new(id, IString::from(name), sort)
  }

  #[test]
  fn equality_is_structural() {
    let x = Term::var(v(0, "x", Sort::Int));
    let lhs = Term::bin(Binop::Plus, x.clone(), Term::int(1));
    let rhs = Term::bin(Binop::Plus, x, Term::int(1));
    assert_eq!(lhs, rhs);
  }

  #[test]
  fn app_flattens() {
    let f = Term::var(v(1, "f", Sort::arrow(&[Sort::Int, Sort::Int], Sort::Int)));
    let partial = Term::app(f, vec![Term::int(1)]);
    let full = Term::app(partial, vec![Term::int(2)]);
    match full.kind() {
      TermKind::App(head, args) => {
        assert!(matches!(head.kind(), TermKind::Var(_)));
        assert_eq!(args.len(), 2);
      }
      _ => panic!("expected an application"),
    }
    assert_eq!(*full.sort(), Sort::Int);
  }

  #[test]
  fn substitution_rebuilds() {
    let x = v(0, "x", Sort::Int);
    let t = Term::bin(Binop::Plus, Term::var(x.clone()), Term::var(x.clone()));
    let subst: VarSubst = [(0, Term::int(3))].into_iter().collect();
    let rewritten = t.substitute(&subst);
    assert_eq!(rewritten, Term::bin(Binop::Plus, Term::int(3), Term::int(3)));
  }

  #[test]
  fn free_variables_in_first_occurrence_order() {
    let x = v(0, "x", Sort::Int);
    let y = v(1, "y", Sort::Int);
    let t = Term::bin(
      Binop::Plus,
      Term::var(y.clone()),
      Term::bin(Binop::Times, Term::var(x.clone()), Term::var(y.clone())),
    );
    let names: Vec<_> = t.free_variables().iter().map(|w| w.name.to_string()).collect();
    assert_eq!(names, vec!["y", "x"]);
  }

  #[test]
  fn replace_boxes_subexpressions() {
    let x = Term::var(v(0, "x", Sort::Int));
    let sum = Term::bin(Binop::Plus, x.clone(), Term::int(1));
    let boxed = sum.replace(&x, &Term::boxed(BoxKind::Pos(0), Sort::Int));
    assert!(boxed.has_boxes());
  }
}

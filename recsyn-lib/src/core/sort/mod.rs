/*!

The sort (type) language: base sorts, named algebraic data types with globally unique variant
names, parametric data-type application, tuples, function arrows, and fresh sort variables.
A [`SortRegistry`] maps variant name → data-type name and data-type name → definition.

Sorts are plain value trees. There is no subsort relation; the only relation between sorts is
unifiability, implemented in [`unify`] with standard Robinson unification plus an occurs check.

*/

mod registry;
mod unify;

use std::fmt::{Display, Formatter};

use recsyn_abs::{join_string, IString, NatSet};

pub use registry::{DataDef, SortRegistry, Variant};
pub use unify::{unify, unify_one, SortSubst};

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Sort {
  Int,
  Bool,
  Str,
  Char,
  /// A named data type, e.g. `list`.
  Named(IString),
  /// A parametric data type applied to arguments, e.g. `pair(int, bool)`.
  App(IString, Vec<Sort>),
  Tuple(Vec<Sort>),
  /// A function arrow. Multi-argument functions are curried right-associatively.
  Fun(Box<Sort>, Box<Sort>),
  /// A fresh sort variable, resolved by unification.
  Var(u32),
}

impl Sort {
  /// Builds the curried arrow `a₁ → … → aₙ → ret`.
  pub fn arrow(args: &[Sort], ret: Sort) -> Sort {
    args
      .iter()
      .rev()
      .fold(ret, |acc, a| Sort::Fun(Box::new(a.clone()), Box::new(acc)))
  }

  /// Splits a curried arrow into its argument list and final return sort.
  pub fn uncurry(&self) -> (Vec<Sort>, Sort) {
    let mut args = Vec::new();
    let mut current = self;
    while let Sort::Fun(a, b) = current {
      args.push((**a).clone());
      current = b;
    }
    (args, current.clone())
  }

  /// The return sort after applying `count` arguments.
  pub fn return_after(&self, count: usize) -> Sort {
    let mut current = self;
    for _ in 0..count {
      match current {
        Sort::Fun(_, b) => current = b,
        _ => break,
      }
    }
    current.clone()
  }

  #[inline(always)]
  pub fn is_scalar(&self) -> bool {
    matches!(self, Sort::Int | Sort::Bool | Sort::Str | Sort::Char)
  }

  #[inline(always)]
  pub fn is_var(&self) -> bool {
    matches!(self, Sort::Var(_))
  }

  /// Replaces every occurrence of the sort `from` (compared structurally) by `to`.
  pub fn substitute(&self, from: &Sort, to: &Sort) -> Sort {
    if self == from {
      return to.clone();
    }
    match self {
      Sort::App(name, args) => Sort::App(
        *name,
        args.iter().map(|a| a.substitute(from, to)).collect(),
      ),
      Sort::Tuple(items) => Sort::Tuple(items.iter().map(|a| a.substitute(from, to)).collect()),
      Sort::Fun(a, b) => Sort::Fun(
        Box::new(a.substitute(from, to)),
        Box::new(b.substitute(from, to)),
      ),
      _ => self.clone(),
    }
  }

  /// Applies a substitution over sort variables.
  pub fn apply(&self, subst: &SortSubst) -> Sort {
    match self {
      Sort::Var(v) => match subst.get(v) {
        // The range of a composed substitution never mentions its own domain.
        Some(replacement) => replacement.clone(),
        None => self.clone(),
      },
      Sort::App(name, args) => Sort::App(*name, args.iter().map(|a| a.apply(subst)).collect()),
      Sort::Tuple(items) => Sort::Tuple(items.iter().map(|a| a.apply(subst)).collect()),
      Sort::Fun(a, b) => Sort::Fun(Box::new(a.apply(subst)), Box::new(b.apply(subst))),
      _ => self.clone(),
    }
  }

  /// Does the sort variable `v` occur anywhere in this sort?
  pub fn occurs(&self, v: u32) -> bool {
    match self {
      Sort::Var(w) => *w == v,
      Sort::App(_, args) | Sort::Tuple(args) => args.iter().any(|a| a.occurs(v)),
      Sort::Fun(a, b) => a.occurs(v) || b.occurs(v),
      _ => false,
    }
  }

  /// Collects the ids of all sort variables into `into`.
  pub fn sort_vars(&self, into: &mut NatSet) {
    match self {
      Sort::Var(v) => {
        into.insert(*v as usize);
      }
      Sort::App(_, args) | Sort::Tuple(args) => {
        for a in args {
          a.sort_vars(into);
        }
      }
      Sort::Fun(a, b) => {
        a.sort_vars(into);
        b.sort_vars(into);
      }
      _ => {}
    }
  }

  /// The data-type name if this is a named or applied data sort.
  pub fn data_name(&self) -> Option<IString> {
    match self {
      Sort::Named(name) => Some(*name),
      Sort::App(name, _) => Some(*name),
      _ => None,
    }
  }
}

impl Display for Sort {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Sort::Int => write!(f, "int"),
      Sort::Bool => write!(f, "bool"),
      Sort::Str => write!(f, "string"),
      Sort::Char => write!(f, "char"),
      Sort::Named(name) => write!(f, "{}", name),
      Sort::App(name, args) => write!(f, "{}({})", name, join_string(args.iter(), ", ")),
      Sort::Tuple(items) => write!(f, "({})", join_string(items.iter(), " * ")),
      Sort::Fun(a, b) => match **a {
        Sort::Fun(..) => write!(f, "({}) -> {}", a, b),
        _ => write!(f, "{} -> {}", a, b),
      },
      Sort::Var(v) => write!(f, "?{}", v),
    }
  }
}

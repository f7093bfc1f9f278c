/*!

Type inference as a separate pass: walk the term collecting sort equations between the sorts the
nodes carry and the sorts their structure forces, solve them with [`unify`], and rebuild the
term with every node and variable annotated by the resolved sorts. The input term is typically
fresh from the parser, where unknown sorts are seeded as fresh sort variables.

*/

use crate::core::context::Context;
use crate::core::sort::{unify, Sort, SortSubst};
use crate::error::SortError;

use super::{Binop, Term, TermKind};

pub fn infer(ctx: &Context, term: &Term) -> Result<Term, SortError> {
  let mut equations = Vec::new();
  collect(ctx, term, &mut equations)?;
  let subst = unify(equations)?;
  Ok(apply_sorts(term, &subst))
}

/// Lower-level entry point for callers that assemble constraints across several terms before
/// solving (the front end infers whole rule systems jointly).
pub fn collect_constraints(
  ctx: &Context,
  term: &Term,
  equations: &mut Vec<(Sort, Sort)>,
) -> Result<(), SortError> {
  collect(ctx, term, equations)
}

/// Applies a solved unifier to every node and variable of a term.
pub fn apply_solution(term: &Term, subst: &SortSubst) -> Term {
  apply_sorts(term, subst)
}

fn collect(ctx: &Context, t: &Term, equations: &mut Vec<(Sort, Sort)>) -> Result<(), SortError> {
  let node = t.sort().clone();
  match t.kind() {
    TermKind::Const(c) => equations.push((node, c.sort())),

    TermKind::Var(v) => equations.push((node, v.sort.clone())),

    TermKind::Boxed(_) => {}

    TermKind::Tuple(items) => {
      equations.push((node, Sort::Tuple(items.iter().map(|i| i.sort().clone()).collect())));
    }

    TermKind::Sel(subject, index) => {
      // Tuple arity is not expressible as a single unification constraint; only constrain when
      // the subject's sort is already structurally a tuple.
      if let Sort::Tuple(items) = subject.sort() {
        if *index < items.len() {
          equations.push((node, items[*index].clone()));
        }
      }
    }

    TermKind::Un(op, inner) => {
      let operand = match op.result_sort() {
        Sort::Bool => Sort::Bool,
        _ => Sort::Int,
      };
      equations.push((inner.sort().clone(), operand));
      equations.push((node, op.result_sort()));
    }

    TermKind::Bin(op, a, b) => {
      if *op == Binop::Eq {
        equations.push((a.sort().clone(), b.sort().clone()));
      } else if op.is_boolean() {
        equations.push((a.sort().clone(), Sort::Bool));
        equations.push((b.sort().clone(), Sort::Bool));
      } else {
        // Arithmetic and comparisons are over integers.
        equations.push((a.sort().clone(), Sort::Int));
        equations.push((b.sort().clone(), Sort::Int));
      }
      equations.push((node, op.result_sort()));
    }

    TermKind::Ite(cond, then, els) => {
      equations.push((cond.sort().clone(), Sort::Bool));
      equations.push((then.sort().clone(), els.sort().clone()));
      equations.push((node, then.sort().clone()));
    }

    TermKind::App(head, args) => {
      let arg_sorts: Vec<Sort> = args.iter().map(|a| a.sort().clone()).collect();
      equations.push((head.sort().clone(), Sort::arrow(&arg_sorts, node)));
    }

    TermKind::Data(ctor, args) => {
      let owner = ctx
        .sorts
        .owner_of_variant(*ctor)
        .ok_or(SortError::UnknownVariant(*ctor))?;
      let def = ctx.sorts.def_of(owner).ok_or(SortError::UnknownType(owner))?;
      let fresh: Vec<Sort> = def.params.iter().map(|_| ctx.fresh_sort_var()).collect();
      let at = def.sort(&fresh);
      let payload = ctx.sorts.payload_of(*ctor, &at)?;
      if payload.len() != args.len() {
        return Err(SortError::Arity(*ctor, args.len(), payload.len()));
      }
      for (arg, expected) in args.iter().zip(payload) {
        equations.push((arg.sort().clone(), expected));
      }
      equations.push((node, at));
    }
  }

  for child in t.children() {
    collect(ctx, &child, equations)?;
  }
  Ok(())
}

fn apply_sorts(t: &Term, subst: &SortSubst) -> Term {
  let sort = t.sort().apply(subst);
  let kind = match t.kind() {
    TermKind::Const(c) => TermKind::Const(c.clone()),
    TermKind::Var(v) => TermKind::Var(v.with_sort(v.sort.apply(subst))),
    TermKind::Boxed(b) => TermKind::Boxed(*b),
    TermKind::Tuple(items) => TermKind::Tuple(items.iter().map(|i| apply_sorts(i, subst)).collect()),
    TermKind::Sel(subject, index) => TermKind::Sel(apply_sorts(subject, subst), *index),
    TermKind::Un(op, inner) => TermKind::Un(*op, apply_sorts(inner, subst)),
    TermKind::Bin(op, a, b) => TermKind::Bin(*op, apply_sorts(a, subst), apply_sorts(b, subst)),
    TermKind::Ite(c, a, b) => {
      TermKind::Ite(apply_sorts(c, subst), apply_sorts(a, subst), apply_sorts(b, subst))
    }
    TermKind::App(head, args) => TermKind::App(
      apply_sorts(head, subst),
      args.iter().map(|a| apply_sorts(a, subst)).collect(),
    ),
    TermKind::Data(ctor, args) => TermKind::Data(
      *ctor,
      args.iter().map(|a| apply_sorts(a, subst)).collect(),
    ),
  };
  Term::new(sort, kind)
}

#[cfg(test)]
mod tests {
  use recsyn_abs::IString;

  use crate::core::context::Context;
  use crate::core::sort::{DataDef, Variant};
  use crate::core::term::Variable;

  use super::*;

  fn context_with_list() -> Context {
    let mut ctx = Context::new();
    ctx
      .sorts
      .register(DataDef::monomorphic(
        IString::from("list"),
        vec![
          Variant { name: IString::from("Nil"), payload: vec![] },
          Variant {
            name:    IString::from("Cons"),
            payload: vec![Sort::Int, Sort::Named(IString::from("list"))],
          },
        ],
      ))
      .unwrap();
    ctx
  }

  #[test]
  fn infers_variable_sorts_from_use() {
    let ctx = context_with_list();
    // x used as the head of Cons(x, Nil): x must be int.
    let x = Variable::new(900, IString::from("x"), ctx.fresh_sort_var());
    let nil = Term::new(ctx.fresh_sort_var(), TermKind::Data(IString::from("Nil"), vec![]));
    let t = Term::new(
      ctx.fresh_sort_var(),
      TermKind::Data(IString::from("Cons"), vec![Term::var(x), nil]),
    );

    let inferred = infer(&ctx, &t).unwrap();
    assert_eq!(*inferred.sort(), Sort::Named(IString::from("list")));
    match inferred.kind() {
      TermKind::Data(_, args) => assert_eq!(*args[0].sort(), Sort::Int),
      _ => panic!("expected data term"),
    }
  }

  #[test]
  fn rejects_ill_sorted_terms() {
    let ctx = context_with_list();
    let t = Term::new(
      ctx.fresh_sort_var(),
      TermKind::Bin(
        Binop::Plus,
        Term::bool_const(true),
        Term::int(1),
      ),
    );
    assert!(infer(&ctx, &t).is_err());
  }
}

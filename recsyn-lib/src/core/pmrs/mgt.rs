/*!

Most-general-term computation. For each hole ξ and each rule whose right-hand side mentions ξ,
we construct the most general input to the main symbol that exercises that rule, by chaining
backwards through the rule dependency graph: a shape required at a nonterminal is pushed through
every call site into a shape required at the caller, until the main symbol is reached. The
resulting term family covers every potentially-exercised control path of the skeleton.

The chase is depth-capped and fully deterministic: rules are visited in arena order and fresh
variables are minted in traversal order, so repeated runs produce the same family.

*/

use crate::core::context::Context;
use crate::core::term::{match_term, Term, TermKind};

use super::{NtIndex, Pmrs, RewriteRule};

/// Backward-chaining steps before giving up. The subsumption pruning below normally converges
/// long before this.
const MAX_CHASE_STEPS: usize = 256;

/// The family of most general input terms of `p` that reach a hole-mentioning rule. Falls back
/// to a single fresh variable of the input sort when the chase finds nothing (for example when
/// the system has no holes).
pub fn most_general_terms(ctx: &Context, p: &Pmrs) -> Vec<Term> {
  let hole_ids = p.hole_ids();

  let mut worklist: Vec<(NtIndex, Term)> = Vec::new();
  for rule in &p.rules {
    if !rule.rhs.mentions_any(&hole_ids) {
      continue;
    }
    worklist.push((rule.nt, rule_shape(ctx, p, rule)));
  }

  let mut results: Vec<Term> = Vec::new();
  let mut visited: Vec<(NtIndex, Term)> = Vec::new();
  let mut steps = 0usize;

  while let Some((nt, shape)) = worklist.pop() {
    steps += 1;
    if steps > MAX_CHASE_STEPS {
      break;
    }
    // A shape already covered by a more general one at the same nonterminal adds nothing;
    // without this pruning the chase would refine constructor spines forever.
    if visited
      .iter()
      .any(|(seen_nt, seen)| *seen_nt == nt && match_term(seen, &shape).is_some())
    {
      continue;
    }
    visited.push((nt, shape.clone()));

    if nt == p.main {
      let covered = results.iter().any(|seen| match_term(seen, &shape).is_some());
      if !covered {
        results.push(shape.clone());
      }
      continue;
    }

    // Push the shape through every call site of `nt`.
    let callee_arity = p.nonterminals[nt].var.sort.uncurry().0.len();
    for caller in &p.rules {
      for call_arg in recursion_arguments(&caller.rhs, p.nonterminals[nt].var.id, callee_arity) {
        if let Some(caller_shape) = push_through(ctx, p, caller, &call_arg, &shape) {
          worklist.push((caller.nt, caller_shape));
        }
      }
    }
  }

  if results.is_empty() {
    results.push(Term::var(ctx.fresh_var("mgt", p.input_sort.clone())));
  }
  results
}

/// The sort of the argument a rule matches on, read off its nonterminal's signature.
fn matched_sort(ctx: &Context, p: &Pmrs, rule: &RewriteRule) -> crate::core::sort::Sort {
  let (arg_sorts, _) = p.nonterminals[rule.nt].var.sort.uncurry();
  arg_sorts
    .get(rule.args.len())
    .or_else(|| arg_sorts.last())
    .cloned()
    .unwrap_or_else(|| ctx.fresh_sort_var())
}

/// The input shape a rule requires at its own nonterminal: the matched constructor with fresh
/// binders, or a plain fresh variable for pattern-free rules.
fn rule_shape(ctx: &Context, p: &Pmrs, rule: &RewriteRule) -> Term {
  let sort = matched_sort(ctx, p, rule);
  match &rule.pattern {
    Some(pattern) => {
      let payload: Vec<Term> = pattern
        .binders
        .iter()
        .map(|b| Term::var(ctx.fresh_var("mgt", b.sort.clone())))
        .collect();
      Term::data(pattern.ctor, payload, sort)
    }
    None => Term::var(ctx.fresh_var("mgt", sort)),
  }
}

/// The recursion arguments of every saturated call of the nonterminal `nt_var_id` inside `t`.
fn recursion_arguments(t: &Term, nt_var_id: u32, arity: usize) -> Vec<Term> {
  let mut result = Vec::new();
  for subterm in t.subterms() {
    if let TermKind::App(head, args) = subterm.kind() {
      if let TermKind::Var(v) = head.kind() {
        if v.id == nt_var_id && args.len() >= arity && arity > 0 {
          result.push(args[arity - 1].clone());
        }
      }
    }
  }
  result
}

/// Translates a shape required at a callee into a shape required at the caller `rule`, given
/// that the call's recursion argument is `call_arg`.
fn push_through(
  ctx: &Context,
  p: &Pmrs,
  rule: &RewriteRule,
  call_arg: &Term,
  shape: &Term,
) -> Option<Term> {
  let TermKind::Var(arg_var) = call_arg.kind() else {
    // The call recurses on a computed value; no syntactic most-general shape exists for it.
    return None;
  };

  match &rule.pattern {
    Some(pattern) => {
      // The call recurses on one of the pattern binders: rebuild the constructor with the
      // shape in that binder's slot and fresh variables elsewhere.
      if !pattern.binders.iter().any(|b| b.id == arg_var.id) {
        return None;
      }
      let payload: Vec<Term> = pattern
        .binders
        .iter()
        .map(|b| {
          if b.id == arg_var.id {
            shape.clone()
          } else {
            Term::var(ctx.fresh_var("mgt", b.sort.clone()))
          }
        })
        .collect();
      Some(Term::data(pattern.ctor, payload, matched_sort(ctx, p, rule)))
    }
    None => {
      // Pattern-free caller: the shape passes through unchanged when the call recurses on the
      // caller's own recursion argument.
      let last = rule.args.last()?;
      if last.id == arg_var.id {
        Some(shape.clone())
      } else {
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use recsyn_abs::IString;

  use crate::core::context::Context;
  use crate::core::pmrs::{CtorPattern, Pmrs, RewriteRule};
  use crate::core::sort::{DataDef, Sort, Variant};
  use crate::core::term::Term;

  use super::most_general_terms;

  /// A skeleton with two holes: `main x → h x ; h Nil → c0 ; h (Cons hd tl) → odot hd (h tl)`.
  fn skeleton_fixture() -> (Context, Pmrs) {
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

    let list = Sort::Named(IString::from("list"));
    let main_var = ctx.named_var("target", Sort::arrow(&[list.clone()], Sort::Int));
    let h_var = ctx.named_var("h", Sort::arrow(&[list.clone()], Sort::Int));

    let c0 = ctx.named_var("c0", Sort::Int);
    let odot = ctx.named_var("odot", Sort::arrow(&[Sort::Int, Sort::Int], Sort::Int));

    let x = ctx.named_var("x", list.clone());
    let hd = ctx.named_var("hd", Sort::Int);
    let tl = ctx.named_var("tl", list.clone());

    let rules = vec![
      RewriteRule {
        nt:      0,
        args:    vec![x.clone()],
        pattern: None,
        rhs:     Term::app(Term::var(h_var.clone()), vec![Term::var(x)]),
      },
      RewriteRule {
        nt:      1,
        args:    vec![],
        pattern: Some(CtorPattern { ctor: IString::from("Nil"), binders: vec![] }),
        rhs:     Term::var(c0.clone()),
      },
      RewriteRule {
        nt:      1,
        args:    vec![],
        pattern: Some(CtorPattern {
          ctor:    IString::from("Cons"),
          binders: vec![hd.clone(), tl.clone()],
        }),
        rhs:     Term::app(
          Term::var(odot.clone()),
          vec![
            Term::var(hd),
            Term::app(Term::var(h_var.clone()), vec![Term::var(tl)]),
          ],
        ),
      },
    ];

    let pmrs = Pmrs::assemble(
      IString::from("target"),
      vec![c0, odot],
      vec![main_var, h_var],
      0,
      rules,
    )
    .unwrap();
    (ctx, pmrs)
  }

  #[test]
  fn covers_every_hole_exercising_constructor() {
    let (ctx, pmrs) = skeleton_fixture();
    let family = most_general_terms(&ctx, &pmrs);

    // Both `Nil` and `Cons(_, _)` control paths mention a hole.
    assert_eq!(family.len(), 2);
    let ctors: Vec<String> = family
      .iter()
      .map(|t| match t.kind() {
        crate::core::term::TermKind::Data(c, _) => c.to_string(),
        other => panic!("expected a constructor shape, got {:?}", other),
      })
      .collect();
    assert!(ctors.contains(&"Nil".to_string()));
    assert!(ctors.contains(&"Cons".to_string()));
  }

  #[test]
  fn falls_back_to_a_variable_without_holes() {
    let (ctx, pmrs) = crate::core::pmrs::tests::list_sum_fixture();
    let family = most_general_terms(&ctx, &pmrs);
    assert_eq!(family.len(), 1);
    assert!(matches!(family[0].kind(), crate::core::term::TermKind::Var(_)));
  }

  #[test]
  fn chase_is_reproducible() {
    let (ctx, pmrs) = skeleton_fixture();
    let first = most_general_terms(&ctx, &pmrs);
    ctx.reinit();
    // Ids differ between runs unless the context is reinitialized; shapes must agree.
    let second = most_general_terms(&ctx, &pmrs);
    let as_strings = |family: &Vec<Term>| {
      family
        .iter()
        .map(|t| match t.kind() {
          crate::core::term::TermKind::Data(c, args) => format!("{}/{}", c, args.len()),
          _ => "var".to_string(),
        })
        .collect::<Vec<_>>()
    };
    assert_eq!(as_strings(&first), as_strings(&second));
  }

}

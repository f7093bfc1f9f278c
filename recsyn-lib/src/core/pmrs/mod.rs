/*!

Pattern-Matching Recursion Schemes. A PMRS is a tuple (params ξ, nonterminals N, main ∈ N,
rules R) where every rule has the shape

```text
nt a₁ … aₖ (C b₁ … bₘ)? → rhs
```

Nonterminals and rules live in arenas and reference each other by plain integer indices; rule
bodies reference nonterminals through their `Variable`, so there are no ownership cycles. The
`params` are the holes: unknown scalar functions to be synthesized. A PMRS is immutable after
construction except for whole-value rebuilds (`subst_rule_rhs`, `apply_sort_subst`,
`instantiate`).

*/

pub mod mgt;
pub mod reduce;

use std::fmt::{Display, Formatter};

use recsyn_abs::{join_string, HashMap, IString, NatSet, SmallVec};

use crate::core::context::Context;
use crate::core::sort::{Sort, SortSubst};
use crate::core::term::{Term, TermKind, VarSubst, Variable};
use crate::error::PmrsError;

pub type NtIndex = usize;
pub type RuleIndex = usize;

/// A shallow constructor pattern `C b₁ … bₘ` on the recursion argument of a rule.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CtorPattern {
  pub ctor:    IString,
  pub binders: Vec<Variable>,
}

impl Display for CtorPattern {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    if self.binders.is_empty() {
      write!(f, "{}", self.ctor)
    } else {
      write!(f, "({} {})", self.ctor, join_string(self.binders.iter(), " "))
    }
  }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RewriteRule {
  pub nt:      NtIndex,
  pub args:    Vec<Variable>,
  pub pattern: Option<CtorPattern>,
  pub rhs:     Term,
}

impl RewriteRule {
  /// Number of arguments an application must supply for this rule to fire.
  pub fn arity(&self) -> usize {
    self.args.len() + usize::from(self.pattern.is_some())
  }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NonTerminal {
  pub var:   Variable,
  pub rules: SmallVec<[RuleIndex; 4]>,
}

impl NonTerminal {
  pub fn name(&self) -> IString {
    self.var.name
  }
}

/// A hole filling: `name(args) = body`. Also the shape of a parsed SyGuS `define-fun`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct HoleSolution {
  pub name: IString,
  pub args: Vec<Variable>,
  pub body: Term,
}

impl Display for HoleSolution {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    if self.args.is_empty() {
      write!(f, "{} = {}", self.name, self.body)
    } else {
      write!(f, "{} {} = {}", self.name, join_string(self.args.iter(), " "), self.body)
    }
  }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Pmrs {
  pub name:         IString,
  /// The holes ξ. Empty for closed systems (reference, representation).
  pub params:       Vec<Variable>,
  pub nonterminals: Vec<NonTerminal>,
  pub main:         NtIndex,
  pub rules:        Vec<RewriteRule>,
  pub input_sort:   Sort,
  pub output_sort:  Sort,
}

impl Pmrs {
  /// Assembles a PMRS from nonterminal variables and rules, wiring the per-nonterminal rule
  /// lists and deriving the input/output sorts from the main symbol's arrow sort.
  pub fn assemble(
    name: IString,
    params: Vec<Variable>,
    nt_vars: Vec<Variable>,
    main: NtIndex,
    rules: Vec<RewriteRule>,
  ) -> Result<Pmrs, PmrsError> {
    let mut nonterminals: Vec<NonTerminal> = nt_vars
      .into_iter()
      .map(|var| NonTerminal { var, rules: SmallVec::new() })
      .collect();

    for (index, rule) in rules.iter().enumerate() {
      let nt = nonterminals
        .get_mut(rule.nt)
        .ok_or_else(|| PmrsError::UnknownNonterminal(IString::from(format!("#{}", rule.nt).as_str())))?;
      nt.rules.push(index);
    }

    let main_var = &nonterminals[main].var;
    let (main_args, output_sort) = main_var.sort.uncurry();
    let input_sort = match main_args.last() {
      Some(sort) => sort.clone(),
      None => return Err(PmrsError::MainArity(main_var.name)),
    };

    Ok(Pmrs {
      name,
      params,
      nonterminals,
      main,
      rules,
      input_sort,
      output_sort,
    })
  }

  #[inline(always)]
  pub fn main_var(&self) -> &Variable {
    &self.nonterminals[self.main].var
  }

  /// A term applying the main symbol to `t`.
  pub fn apply_main(&self, t: Term) -> Term {
    Term::app(Term::var(self.main_var().clone()), vec![t])
  }

  pub fn nt_index_of(&self, var_id: u32) -> Option<NtIndex> {
    self.nonterminals.iter().position(|nt| nt.var.id == var_id)
  }

  /// The ids of all nonterminal variables, for reducibility and purity checks.
  pub fn nonterminal_ids(&self) -> NatSet {
    let mut ids = NatSet::default();
    for nt in &self.nonterminals {
      ids.insert(nt.var.id as usize);
    }
    ids
  }

  pub fn hole_ids(&self) -> NatSet {
    let mut ids = NatSet::default();
    for param in &self.params {
      ids.insert(param.id as usize);
    }
    ids
  }

  /// Is this the identity function? True exactly for a single pattern-free main rule
  /// `main x → x`.
  pub fn is_identity(&self) -> bool {
    if self.rules.len() != 1 {
      return false;
    }
    let rule = &self.rules[0];
    rule.nt == self.main
      && rule.pattern.is_none()
      && rule.args.len() == 1
      && matches!(rule.rhs.kind(), TermKind::Var(v) if v.id == rule.args[0].id)
  }

  // region Invariant validation

  /// Checks the structural invariants: the main symbol takes exactly one recursion argument,
  /// every nonterminal either has a single pattern-free rule or pattern rules covering every
  /// variant of the matched sort, and hole names collide with nothing.
  pub fn validate(&self, ctx: &Context) -> Result<(), PmrsError> {
    let main_var = self.main_var();
    if main_var.sort.uncurry().0.len() != 1 {
      return Err(PmrsError::MainArity(main_var.name));
    }

    for (index, nt) in self.nonterminals.iter().enumerate() {
      let rules: Vec<&RewriteRule> = nt.rules.iter().map(|&r| &self.rules[r]).collect();
      if rules.is_empty() {
        continue;
      }
      let with_pattern = rules.iter().filter(|r| r.pattern.is_some()).count();
      if with_pattern == 0 {
        if rules.len() > 1 {
          return Err(PmrsError::OverlappingRules(nt.name()));
        }
        continue;
      }
      if with_pattern != rules.len() {
        return Err(PmrsError::MixedRules(nt.name()));
      }

      // Coverage: every variant of the matched sort must appear as some rule's pattern.
      let (arg_sorts, _) = nt.var.sort.uncurry();
      let matched_sort = match arg_sorts.get(rules[0].args.len()) {
        Some(sort) => sort.clone(),
        None => continue,
      };
      if let Some(variants) = ctx.sorts.variants_of(&matched_sort) {
        for variant in variants {
          let covered = rules
            .iter()
            .any(|r| r.pattern.as_ref().is_some_and(|p| p.ctor == variant.name));
          if !covered {
            return Err(PmrsError::MissingVariant {
              nt:      self.nonterminals[index].name(),
              variant: variant.name,
            });
          }
        }
      }
    }

    // Params are distinct from nonterminals and from every rule-local name.
    for param in &self.params {
      if self.nonterminals.iter().any(|nt| nt.var.name == param.name) {
        return Err(PmrsError::ParamCollision(param.name));
      }
      for rule in &self.rules {
        let shadowed = rule.args.iter().any(|a| a.name == param.name)
          || rule
            .pattern
            .as_ref()
            .is_some_and(|p| p.binders.iter().any(|b| b.name == param.name));
        if shadowed {
          return Err(PmrsError::ParamCollision(param.name));
        }
      }
    }

    Ok(())
  }

  // endregion

  // region Whole-value rebuilds

  /// Rebuilds every rule right-hand side under a variable substitution.
  pub fn subst_rule_rhs(&self, subst: &VarSubst) -> Pmrs {
    let rules = self
      .rules
      .iter()
      .map(|rule| RewriteRule { rhs: rule.rhs.substitute(subst), ..rule.clone() })
      .collect();
    Pmrs { rules, ..self.clone() }
  }

  /// Rebuilds the PMRS under a sort substitution, resolving sort variables everywhere:
  /// nonterminal signatures, rule locals, and rule bodies.
  pub fn apply_sort_subst(&self, subst: &SortSubst) -> Pmrs {
    let fix_var = |v: &Variable| v.with_sort(v.sort.apply(subst));
    let nonterminals = self
      .nonterminals
      .iter()
      .map(|nt| NonTerminal { var: fix_var(&nt.var), rules: nt.rules.clone() })
      .collect();
    let params = self.params.iter().map(&fix_var).collect();
    let rules = self
      .rules
      .iter()
      .map(|rule| RewriteRule {
        nt:      rule.nt,
        args:    rule.args.iter().map(&fix_var).collect(),
        pattern: rule.pattern.as_ref().map(|p| CtorPattern {
          ctor:    p.ctor,
          binders: p.binders.iter().map(&fix_var).collect(),
        }),
        rhs:     resort_term(&rule.rhs, subst),
      })
      .collect();

    let mut rebuilt = Pmrs {
      name: self.name,
      params,
      nonterminals,
      main: self.main,
      rules,
      input_sort: self.input_sort.apply(subst),
      output_sort: self.output_sort.apply(subst),
    };
    // Input/output are derived values; keep them in sync with the main signature.
    let (main_args, out) = rebuilt.main_var().sort.uncurry();
    if let Some(last) = main_args.last() {
      rebuilt.input_sort = last.clone();
    }
    rebuilt.output_sort = out;
    rebuilt
  }

  /// Commits hole solutions: every application `ξ(e₁,…,eₙ)` in a rule body is replaced by the
  /// solution body with its parameters substituted, and the solved params are dropped.
  pub fn instantiate(&self, assignment: &HashMap<u32, HoleSolution>) -> Pmrs {
    let rules = self
      .rules
      .iter()
      .map(|rule| RewriteRule { rhs: instantiate_term(&rule.rhs, assignment), ..rule.clone() })
      .collect();
    let params = self
      .params
      .iter()
      .filter(|p| !assignment.contains_key(&p.id))
      .cloned()
      .collect();
    Pmrs { rules, params, ..self.clone() }
  }

  // endregion
}

fn resort_term(t: &Term, subst: &SortSubst) -> Term {
  let sort = t.sort().apply(subst);
  let kind = match t.kind() {
    TermKind::Var(v) => TermKind::Var(v.with_sort(v.sort.apply(subst))),
    TermKind::Const(c) => TermKind::Const(c.clone()),
    TermKind::Boxed(b) => TermKind::Boxed(*b),
    TermKind::Tuple(items) => TermKind::Tuple(items.iter().map(|i| resort_term(i, subst)).collect()),
    TermKind::Sel(s, i) => TermKind::Sel(resort_term(s, subst), *i),
    TermKind::Un(op, a) => TermKind::Un(*op, resort_term(a, subst)),
    TermKind::Bin(op, a, b) => TermKind::Bin(*op, resort_term(a, subst), resort_term(b, subst)),
    TermKind::Ite(c, a, b) => {
      TermKind::Ite(resort_term(c, subst), resort_term(a, subst), resort_term(b, subst))
    }
    TermKind::App(h, args) => TermKind::App(
      resort_term(h, subst),
      args.iter().map(|a| resort_term(a, subst)).collect(),
    ),
    TermKind::Data(ctor, args) => TermKind::Data(
      *ctor,
      args.iter().map(|a| resort_term(a, subst)).collect(),
    ),
  };
  Term::new(sort, kind)
}

fn instantiate_term(t: &Term, assignment: &HashMap<u32, HoleSolution>) -> Term {
  if let TermKind::App(head, args) = t.kind() {
    if let TermKind::Var(v) = head.kind() {
      if let Some(solution) = assignment.get(&v.id) {
        let args: Vec<Term> = args.iter().map(|a| instantiate_term(a, assignment)).collect();
        debug_assert_eq!(args.len(), solution.args.len(), "hole arity mismatch");
        let subst: VarSubst = solution
          .args
          .iter()
          .zip(args)
          .map(|(param, arg)| (param.id, arg))
          .collect();
        return solution.body.substitute(&subst);
      }
    }
  }
  // A hole used without application is a nullary hole.
  if let TermKind::Var(v) = t.kind() {
    if let Some(solution) = assignment.get(&v.id) {
      if solution.args.is_empty() {
        return solution.body.clone();
      }
    }
  }

  let children_rebuilt: Vec<Term> = t.children().iter().map(|c| instantiate_term(c, assignment)).collect();
  rebuild_with_children(t, children_rebuilt)
}

/// Rebuilds a node with new children in the same order `Term::children` yields them.
pub(crate) fn rebuild_with_children(t: &Term, mut children: Vec<Term>) -> Term {
  match t.kind() {
    TermKind::Const(_) | TermKind::Var(_) | TermKind::Boxed(_) => t.clone(),
    TermKind::Tuple(_) => Term::tuple(children),
    TermKind::Data(ctor, _) => Term::data(*ctor, children, t.sort().clone()),
    TermKind::Sel(_, i) => Term::sel(children.remove(0), *i),
    TermKind::Un(op, _) => Term::un(*op, children.remove(0)),
    TermKind::Bin(op, _, _) => {
      let a = children.remove(0);
      let b = children.remove(0);
      Term::bin(*op, a, b)
    }
    TermKind::Ite(..) => {
      let c = children.remove(0);
      let a = children.remove(0);
      let b = children.remove(0);
      Term::ite(c, a, b)
    }
    TermKind::App(..) => {
      let head = children.remove(0);
      Term::app(head, children)
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  use crate::core::sort::{DataDef, Variant};
  use crate::core::term::Binop;

  /// Builds the `list` data type and a `list_sum` PMRS:
  /// `main x → f x ; f Nil → 0 ; f (Cons hd tl) → hd + f tl`.
  pub fn list_sum_fixture() -> (Context, Pmrs) {
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
    let main_var = ctx.named_var("list_sum", Sort::arrow(&[list.clone()], Sort::Int));
    let f_var = ctx.named_var("f", Sort::arrow(&[list.clone()], Sort::Int));

    let x = ctx.named_var("x", list.clone());
    let hd = ctx.named_var("hd", Sort::Int);
    let tl = ctx.named_var("tl", list.clone());

    let rules = vec![
      // main x → f x
      RewriteRule {
        nt:      0,
        args:    vec![x.clone()],
        pattern: None,
        rhs:     Term::app(Term::var(f_var.clone()), vec![Term::var(x)]),
      },
      // f Nil → 0
      RewriteRule {
        nt:      1,
        args:    vec![],
        pattern: Some(CtorPattern { ctor: IString::from("Nil"), binders: vec![] }),
        rhs:     Term::int(0),
      },
      // f (Cons hd tl) → hd + f tl
      RewriteRule {
        nt:      1,
        args:    vec![],
        pattern: Some(CtorPattern {
          ctor:    IString::from("Cons"),
          binders: vec![hd.clone(), tl.clone()],
        }),
        rhs:     Term::bin(
          Binop::Plus,
          Term::var(hd),
          Term::app(Term::var(f_var.clone()), vec![Term::var(tl)]),
        ),
      },
    ];

    let pmrs = Pmrs::assemble(
      IString::from("list_sum"),
      vec![],
      vec![main_var, f_var],
      0,
      rules,
    )
    .unwrap();
    pmrs.validate(&ctx).unwrap();
    (ctx, pmrs)
  }

  #[test]
  fn assembles_and_validates() {
    let (_ctx, pmrs) = list_sum_fixture();
    assert_eq!(pmrs.input_sort, Sort::Named(IString::from("list")));
    assert_eq!(pmrs.output_sort, Sort::Int);
    assert_eq!(pmrs.nonterminals[1].rules.len(), 2);
  }

  #[test]
  fn missing_variant_is_rejected() {
    let (ctx, pmrs) = list_sum_fixture();
    // Drop the Nil rule: coverage check must fail.
    let mut broken = pmrs.clone();
    broken.rules.remove(1);
    broken.nonterminals[1].rules = SmallVec::from_vec(vec![1]);
    broken.rules[1].nt = 1;
    assert!(matches!(
      broken.validate(&ctx),
      Err(PmrsError::MissingVariant { .. })
    ));
  }

  #[test]
  fn identity_detection() {
    let ctx = Context::new();
    let list = Sort::Named(IString::from("list"));
    let main_var = ctx.named_var("repr", Sort::arrow(&[list.clone()], list.clone()));
    let x = ctx.named_var("x", list.clone());
    let pmrs = Pmrs::assemble(
      IString::from("repr"),
      vec![],
      vec![main_var],
      0,
      vec![RewriteRule { nt: 0, args: vec![x.clone()], pattern: None, rhs: Term::var(x) }],
    )
    .unwrap();
    assert!(pmrs.is_identity());
  }
}

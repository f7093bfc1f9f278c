/*!

AST for the `.pmrs` surface dialect, and its construction into the core problem definition.
The grammar below is implemented in `grammar.lalrpop`; `construct_problem` turns a parsed
program into a validated [`Problem`], running joint sort inference over every rule system.

## EBNF Grammar

```ebnf
Program := Item* ;

Item := DataDecl | PmrsDecl ;

DataDecl := "data" LIdent LIdent* "=" Variant ("|" Variant)* ";" ;

Variant := UIdent ("(" SortSpec ("," SortSpec)* ")")? ;

SortSpec := "int" | "bool" | "char" | "string"
          | LIdent
          | LIdent "(" SortSpec ("," SortSpec)* ")"
          | "(" SortSpec ("*" SortSpec)+ ")" ;

PmrsDecl := "pmrs" LIdent ("(" LIdent ("," LIdent)* ")")? "=" Rule ("|" Rule)* ";" ;

Rule := LIdent LIdent* RulePattern? "->" Expr ;

RulePattern := UIdent | "(" UIdent LIdent* ")" ;

Expr := "if" Expr "then" Expr "else" Expr
      | "let" LetPat "=" Expr "in" Expr
      | OrExpr ;

LetPat := LIdent | "(" LIdent ("," LIdent)+ ")" ;

# OrExpr through AtomExpr is the usual tier stack:
#   || ; && ; non-chaining comparisons = < > <= >= ; + - ; * ; unary - ! ;
#   juxtaposition application ; atoms.

AtomExpr := Num | "true" | "false" | LIdent | UIdent
          | "min" "(" Expr "," Expr ")" | "max" "(" Expr "," Expr ")"
          | "abs" "(" Expr ")"
          | "(" Expr ")" | "(" Expr ("," Expr)+ ")"
          | AtomExpr "." Num ;
```

Constructor names are capitalized, everything else is lowercase; that distinction is what
keeps rule left-hand sides unambiguous. `let` (including tuple destructuring) is pure sugar:
construction inlines the bound value, so the core term language never sees a binder.

*/

use recsyn_abs::{HashMap, IString};
use recsyn_lib::core::context::Context;
use recsyn_lib::core::pmrs::{CtorPattern, Pmrs, RewriteRule};
use recsyn_lib::core::problem::Problem;
use recsyn_lib::core::sort::{unify, DataDef, Sort, Variant};
use recsyn_lib::core::term::{
  apply_solution, collect_constraints, Binop, Term, TermKind, Unop, Variable,
};
use recsyn_lib::error::Error;

// region AST

pub enum ItemAST {
  Data(DataDeclAST),
  Pmrs(PmrsDeclAST),
}

pub struct DataDeclAST {
  pub name:     String,
  pub params:   Vec<String>,
  pub variants: Vec<VariantAST>,
}

pub struct VariantAST {
  pub name:    String,
  pub payload: Vec<SortAST>,
}

pub enum SortAST {
  Int,
  Bool,
  Char,
  Str,
  Named(String),
  App(String, Vec<SortAST>),
  Tuple(Vec<SortAST>),
}

pub struct PmrsDeclAST {
  pub name:   String,
  /// The holes ξ.
  pub params: Vec<String>,
  pub rules:  Vec<RuleAST>,
}

pub struct RuleAST {
  pub nt:      String,
  pub args:    Vec<String>,
  pub pattern: Option<PatternAST>,
  pub rhs:     TermAST,
}

pub struct PatternAST {
  pub ctor:    String,
  pub binders: Vec<String>,
}

pub enum TermAST {
  Int(i64),
  Bool(bool),
  Ref(String),
  Ctor(String),
  App(Box<TermAST>, Box<TermAST>),
  Bin(Binop, Box<TermAST>, Box<TermAST>),
  Un(Unop, Box<TermAST>),
  If(Box<TermAST>, Box<TermAST>, Box<TermAST>),
  Let {
    pattern: Vec<String>,
    value:   Box<TermAST>,
    body:    Box<TermAST>,
  },
  Tuple(Vec<TermAST>),
  Sel(Box<TermAST>, usize),
  /// Sort ascription `(e : sort)`, the one place the surface can pin an inferred sort.
  Ascribe(Box<TermAST>, SortAST),
}

// endregion

/// Which declaration plays which role, selected by name (CLI-overridable).
#[derive(Clone, Debug)]
pub struct FunctionRoles {
  pub target:    String,
  pub reference: String,
  pub repr:      String,
  pub tinv:      String,
}

impl Default for FunctionRoles {
  fn default() -> Self {
    FunctionRoles {
      target:    "target".into(),
      reference: "spec".into(),
      repr:      "repr".into(),
      tinv:      "tinv".into(),
    }
  }
}

// region Construction

/// Builds the problem definition: registers the data types, constructs and infers every PMRS,
/// and assembles the ψ-definition from the role names. A missing representation function
/// defaults to the identity over the target's input sort.
pub fn construct_problem(
  ctx: &mut Context,
  items: &[ItemAST],
  roles: &FunctionRoles,
) -> Result<Problem, Error> {
  for item in items {
    if let ItemAST::Data(decl) = item {
      register_data(ctx, decl)?;
    }
  }

  let mut systems: Vec<(String, Pmrs)> = Vec::new();
  for item in items {
    if let ItemAST::Pmrs(decl) = item {
      let pmrs = construct_pmrs(ctx, decl)?;
      systems.push((decl.name.clone(), pmrs));
    }
  }

  let mut take = |name: &str| -> Option<Pmrs> {
    systems
      .iter()
      .position(|(n, _)| n == name)
      .map(|index| systems.remove(index).1)
  };

  let target = take(&roles.target)
    .ok_or_else(|| Error::Input(format!("no target function named `{}`", roles.target)))?;
  let reference = take(&roles.reference)
    .ok_or_else(|| Error::Input(format!("no reference function named `{}`", roles.reference)))?;
  let tinv = take(&roles.tinv);
  let repr = match take(&roles.repr) {
    Some(repr) => repr,
    None => identity_repr(ctx, &roles.repr, target.input_sort.clone()),
  };

  Problem::new(ctx, reference, target, repr, tinv)
}

fn register_data(ctx: &mut Context, decl: &DataDeclAST) -> Result<(), Error> {
  let variants = decl
    .variants
    .iter()
    .map(|v| Variant {
      name:    IString::from(v.name.as_str()),
      payload: v.payload.iter().map(sort_from_ast).collect(),
    })
    .collect();
  let def = DataDef {
    name:     IString::from(decl.name.as_str()),
    params:   decl.params.iter().map(|p| IString::from(p.as_str())).collect(),
    variants,
  };
  ctx.sorts.register(def).map_err(Error::Sort)
}

fn sort_from_ast(ast: &SortAST) -> Sort {
  match ast {
    SortAST::Int => Sort::Int,
    SortAST::Bool => Sort::Bool,
    SortAST::Char => Sort::Char,
    SortAST::Str => Sort::Str,
    SortAST::Named(name) => Sort::Named(IString::from(name.as_str())),
    SortAST::App(name, args) => Sort::App(
      IString::from(name.as_str()),
      args.iter().map(sort_from_ast).collect(),
    ),
    SortAST::Tuple(items) => Sort::Tuple(items.iter().map(sort_from_ast).collect()),
  }
}

/// Constructs one PMRS: every sort starts as a fresh variable, the constraints of all rules are
/// solved jointly, and the resolved system is assembled and left to `Problem::new` to validate.
fn construct_pmrs(ctx: &Context, decl: &PmrsDeclAST) -> Result<Pmrs, Error> {
  // Nonterminals in order of first appearance; the first rule's symbol is main.
  let mut nt_names: Vec<String> = Vec::new();
  for rule in &decl.rules {
    if !nt_names.contains(&rule.nt) {
      nt_names.push(rule.nt.clone());
    }
  }
  let nt_vars: Vec<Variable> = nt_names
    .iter()
    .map(|name| ctx.named_var(name, ctx.fresh_sort_var()))
    .collect();
  let holes: Vec<Variable> = decl
    .params
    .iter()
    .map(|name| ctx.named_var(name, ctx.fresh_sort_var()))
    .collect();

  let mut base_env: HashMap<String, Term> = HashMap::default();
  for (name, var) in nt_names.iter().zip(&nt_vars) {
    base_env.insert(name.clone(), Term::var(var.clone()));
  }
  for (name, var) in decl.params.iter().zip(&holes) {
    base_env.insert(name.clone(), Term::var(var.clone()));
  }

  let mut equations: Vec<(Sort, Sort)> = Vec::new();
  let mut built: Vec<(usize, Vec<Variable>, Option<CtorPattern>, Term)> = Vec::new();

  for rule in &decl.rules {
    let nt_index = nt_names.iter().position(|n| *n == rule.nt).expect("collected above");

    let args: Vec<Variable> = rule
      .args
      .iter()
      .map(|name| ctx.named_var(name, ctx.fresh_sort_var()))
      .collect();

    let mut env = base_env.clone();
    for (name, var) in rule.args.iter().zip(&args) {
      env.insert(name.clone(), Term::var(var.clone()));
    }

    // A constructor pattern fixes the scrutinee sort and the binder sorts.
    let mut scrutinee_sort = None;
    let pattern = match &rule.pattern {
      None => None,
      Some(pattern) => {
        let ctor = IString::from(pattern.ctor.as_str());
        let owner = ctx
          .sorts
          .owner_of_variant(ctor)
          .ok_or_else(|| Error::Input(format!("unknown constructor `{}` in a pattern", ctor)))?;
        let def = ctx
          .sorts
          .def_of(owner)
          .ok_or_else(|| Error::Input(format!("unknown data type `{}`", owner)))?;
        let sort_args: Vec<Sort> = def.params.iter().map(|_| ctx.fresh_sort_var()).collect();
        let at = def.sort(&sort_args);
        let payload = ctx.sorts.payload_of(ctor, &at).map_err(Error::Sort)?;
        if payload.len() != pattern.binders.len() {
          return Err(Error::Input(format!(
            "pattern `{}` binds {} variables, constructor has {} fields",
            ctor,
            pattern.binders.len(),
            payload.len()
          )));
        }
        let binders: Vec<Variable> = pattern
          .binders
          .iter()
          .zip(&payload)
          .map(|(name, sort)| ctx.named_var(name, sort.clone()))
          .collect();
        for (name, var) in pattern.binders.iter().zip(&binders) {
          env.insert(name.clone(), Term::var(var.clone()));
        }
        scrutinee_sort = Some(at);
        Some(CtorPattern { ctor, binders })
      }
    };

    let rhs = build_term(ctx, &rule.rhs, &env)?;
    collect_constraints(ctx, &rhs, &mut equations).map_err(Error::Sort)?;

    // The rule shape constrains its nonterminal's signature.
    let mut signature_args: Vec<Sort> = args.iter().map(|a| a.sort.clone()).collect();
    if let Some(sort) = &scrutinee_sort {
      signature_args.push(sort.clone());
    }
    equations.push((
      nt_vars[nt_index].sort.clone(),
      Sort::arrow(&signature_args, rhs.sort().clone()),
    ));

    built.push((nt_index, args, pattern, rhs));
  }

  let solution = unify(equations).map_err(Error::Sort)?;

  let resolve = |v: &Variable| v.with_sort(v.sort.apply(&solution));
  let nt_vars: Vec<Variable> = nt_vars.iter().map(&resolve).collect();
  let holes: Vec<Variable> = holes.iter().map(&resolve).collect();
  let rules: Vec<RewriteRule> = built
    .into_iter()
    .map(|(nt, args, pattern, rhs)| RewriteRule {
      nt,
      args: args.iter().map(&resolve).collect(),
      pattern: pattern.map(|p| CtorPattern {
        ctor:    p.ctor,
        binders: p.binders.iter().map(&resolve).collect(),
      }),
      rhs: apply_solution(&rhs, &solution),
    })
    .collect();

  Pmrs::assemble(IString::from(decl.name.as_str()), holes, nt_vars, 0, rules).map_err(Error::Pmrs)
}

/// Builds a term with fresh sort variables everywhere inference will have to decide, resolving
/// names against the rule-local environment. `let` is inlined here.
fn build_term(ctx: &Context, ast: &TermAST, env: &HashMap<String, Term>) -> Result<Term, Error> {
  match ast {
    TermAST::Int(i) => Ok(Term::int(*i)),
    TermAST::Bool(b) => Ok(Term::bool_const(*b)),

    TermAST::Ref(name) => env
      .get(name)
      .cloned()
      .ok_or_else(|| Error::Input(format!("unknown identifier `{}`", name))),

    TermAST::Ctor(name) => Ok(Term::new(
      ctx.fresh_sort_var(),
      TermKind::Data(IString::from(name.as_str()), vec![]),
    )),

    TermAST::App(f, a) => {
      let head = build_term(ctx, f, env)?;
      let arg = build_term(ctx, a, env)?;
      Ok(apply_one(ctx, head, arg))
    }

    TermAST::Bin(op, a, b) => Ok(Term::bin(
      *op,
      build_term(ctx, a, env)?,
      build_term(ctx, b, env)?,
    )),

    TermAST::Un(op, a) => Ok(Term::un(*op, build_term(ctx, a, env)?)),

    TermAST::If(c, t, e) => Ok(Term::ite(
      build_term(ctx, c, env)?,
      build_term(ctx, t, env)?,
      build_term(ctx, e, env)?,
    )),

    TermAST::Let { pattern, value, body } => {
      let value = build_term(ctx, value, env)?;
      let mut extended = env.clone();
      if pattern.len() == 1 {
        extended.insert(pattern[0].clone(), value);
      } else {
        for (index, name) in pattern.iter().enumerate() {
          extended.insert(
            name.clone(),
            Term::new(ctx.fresh_sort_var(), TermKind::Sel(value.clone(), index)),
          );
        }
      }
      build_term(ctx, body, &extended)
    }

    TermAST::Tuple(items) => {
      let items = items
        .iter()
        .map(|i| build_term(ctx, i, env))
        .collect::<Result<Vec<_>, _>>()?;
      Ok(Term::tuple(items))
    }

    TermAST::Sel(subject, index) => Ok(Term::new(
      ctx.fresh_sort_var(),
      TermKind::Sel(build_term(ctx, subject, env)?, *index),
    )),

    TermAST::Ascribe(inner, sort) => {
      let inner = build_term(ctx, inner, env)?;
      // Rebuild the node with the ascribed sort; inference propagates it inward.
      Ok(Term::new(sort_from_ast(sort), inner.kind().clone()))
    }
  }
}

/// One application step. Constructor heads absorb arguments into the constructor itself, with
/// the `Ctor(tuple)` spelling unpacked when the arity matches; everything else becomes an
/// ordinary application node with a fresh result sort.
fn apply_one(ctx: &Context, head: Term, arg: Term) -> Term {
  if let TermKind::Data(ctor, existing) = head.kind() {
    if existing.is_empty() {
      if let TermKind::Tuple(items) = arg.kind() {
        if ctor_arity(ctx, *ctor) == Some(items.len()) {
          return Term::new(ctx.fresh_sort_var(), TermKind::Data(*ctor, items.clone()));
        }
      }
    }
    let mut args = existing.clone();
    args.push(arg);
    return Term::new(ctx.fresh_sort_var(), TermKind::Data(*ctor, args));
  }

  match head.kind() {
    TermKind::App(inner_head, inner_args) => {
      let mut args = inner_args.clone();
      args.push(arg);
      Term::new(ctx.fresh_sort_var(), TermKind::App(inner_head.clone(), args))
    }
    _ => Term::new(ctx.fresh_sort_var(), TermKind::App(head, vec![arg])),
  }
}

fn ctor_arity(ctx: &Context, ctor: IString) -> Option<usize> {
  let owner = ctx.sorts.owner_of_variant(ctor)?;
  let def = ctx.sorts.def_of(owner)?;
  def
    .variants
    .iter()
    .find(|v| v.name == ctor)
    .map(|v| v.payload.len())
}

fn identity_repr(ctx: &Context, name: &str, over: Sort) -> Pmrs {
  let main_var = ctx.named_var(name, Sort::arrow(&[over.clone()], over.clone()));
  let x = ctx.named_var("x", over);
  Pmrs::assemble(
    IString::from(name),
    vec![],
    vec![main_var],
    0,
    vec![RewriteRule { nt: 0, args: vec![x.clone()], pattern: None, rhs: Term::var(x) }],
  )
  .expect("identity representation is well-formed")
}

// endregion

/*!

Lowering between the core term/sort model and solver S-expressions, shared by the SyGuS and SMT
emitters. The dialect emitted here is the common subset both solver families accept: tuples use
the cvc-style `mkTuple`/`(_ tupSel i)` spelling, `min`/`max` are emitted against the
definitions in [`min_max_prelude`] since neither is an SMT-LIB builtin, and recursion schemes
are projected to `define-funs-rec` with shallow `match` bodies.

Decoding accepts the forms solvers actually produce: integer and boolean literals, operator
applications, `let` bindings (inlined by substitution — the term language has no binder), and
data-constructor applications resolved through the sort registry.

*/

use recsyn_abs::{HashMap, IString};

use crate::core::context::Context;
use crate::core::pmrs::{HoleSolution, Pmrs};
use crate::core::sort::Sort;
use crate::core::term::{Binop, BoxKind, Constant, Term, TermKind, Unop, VarSubst, Variable};
use crate::error::SolverError;

use super::sexpr::Sexp;

// region Sorts

pub fn sort_to_sexp(sort: &Sort) -> Sexp {
  match sort {
    Sort::Int => Sexp::atom("Int"),
    Sort::Bool => Sexp::atom("Bool"),
    Sort::Str => Sexp::atom("String"),
    // Characters are ordinal-encoded; no solver-portable character sort exists.
    Sort::Char => Sexp::atom("Int"),
    Sort::Named(name) => Sexp::atom(name.as_str()),
    Sort::App(name, args) => {
      let mut items = vec![Sexp::atom(name.as_str())];
      items.extend(args.iter().map(sort_to_sexp));
      Sexp::List(items)
    }
    Sort::Tuple(items) => {
      let mut list = vec![Sexp::atom("Tuple")];
      list.extend(items.iter().map(sort_to_sexp));
      Sexp::List(list)
    }
    Sort::Fun(..) => {
      debug_assert!(false, "arrow sorts have no first-order solver encoding");
      Sexp::atom("Int")
    }
    Sort::Var(v) => {
      debug_assert!(false, "unresolved sort variable ?{} escaped to a solver", v);
      Sexp::atom("Int")
    }
  }
}

pub fn decode_sort(sexp: &Sexp) -> Result<Sort, SolverError> {
  match sexp {
    Sexp::Atom(a) => Ok(match a.as_str() {
      "Int" => Sort::Int,
      "Bool" => Sort::Bool,
      "String" => Sort::Str,
      name => Sort::Named(IString::from(name)),
    }),
    Sexp::List(items) => {
      let head = sexp
        .head()
        .ok_or_else(|| SolverError::Unparsable(format!("bad sort: {}", sexp)))?;
      if head == "Tuple" {
        let components = items[1..].iter().map(decode_sort).collect::<Result<_, _>>()?;
        Ok(Sort::Tuple(components))
      } else {
        let args = items[1..].iter().map(decode_sort).collect::<Result<_, _>>()?;
        Ok(Sort::App(IString::from(head), args))
      }
    }
  }
}

// endregion

// region Terms

/// `min`/`max` as defined functions; prepended to any script whose terms may mention them.
pub fn min_max_prelude() -> Vec<Sexp> {
  let def = |name: &str, cmp: &str| {
    Sexp::list(vec![
      Sexp::atom("define-fun"),
      Sexp::atom(name),
      Sexp::list(vec![
        Sexp::list(vec![Sexp::atom("a"), Sexp::atom("Int")]),
        Sexp::list(vec![Sexp::atom("b"), Sexp::atom("Int")]),
      ]),
      Sexp::atom("Int"),
      Sexp::list(vec![
        Sexp::atom("ite"),
        Sexp::list(vec![Sexp::atom(cmp), Sexp::atom("a"), Sexp::atom("b")]),
        Sexp::atom("a"),
        Sexp::atom("b"),
      ]),
    ])
  };
  vec![def("min", "<="), def("max", ">=")]
}

pub fn constant_to_sexp(c: &Constant) -> Sexp {
  match c {
    Constant::Int(i) => Sexp::int(*i),
    Constant::Bool(b) => Sexp::atom(if *b { "true" } else { "false" }),
    Constant::Char(c) => Sexp::int(*c as i64),
    Constant::Str(s) => Sexp::atom(&format!("\"{}\"", s)),
  }
}

pub fn term_to_sexp(t: &Term) -> Sexp {
  term_to_sexp_with(t, &HashMap::default())
}

/// Like [`term_to_sexp`], with a rename map for variables whose solver-facing symbol differs
/// from their surface name (disambiguated nonterminals).
pub fn term_to_sexp_with(t: &Term, names: &HashMap<u32, IString>) -> Sexp {
  let var_atom = |v: &Variable| match names.get(&v.id) {
    Some(renamed) => Sexp::atom(renamed.as_str()),
    None => Sexp::atom(v.name.as_str()),
  };

  match t.kind() {
    TermKind::Const(c) => constant_to_sexp(c),
    TermKind::Var(v) => var_atom(v),

    TermKind::Tuple(items) => {
      let mut list = vec![Sexp::atom("mkTuple")];
      list.extend(items.iter().map(|i| term_to_sexp_with(i, names)));
      Sexp::List(list)
    }

    TermKind::Sel(subject, index) => Sexp::list(vec![
      Sexp::list(vec![
        Sexp::atom("_"),
        Sexp::atom("tupSel"),
        Sexp::atom(&index.to_string()),
      ]),
      term_to_sexp_with(subject, names),
    ]),

    TermKind::Un(op, inner) => {
      let name = match op {
        Unop::Neg => "-",
        Unop::Not => "not",
        Unop::Abs => "abs",
      };
      Sexp::list(vec![Sexp::atom(name), term_to_sexp_with(inner, names)])
    }

    TermKind::Bin(op, a, b) => {
      let name = match op {
        Binop::Plus => "+",
        Binop::Minus => "-",
        Binop::Times => "*",
        Binop::Div => "div",
        Binop::Mod => "mod",
        Binop::Min => "min",
        Binop::Max => "max",
        Binop::And => "and",
        Binop::Or => "or",
        Binop::Eq => "=",
        Binop::Lt => "<",
        Binop::Gt => ">",
        Binop::Le => "<=",
        Binop::Ge => ">=",
      };
      Sexp::list(vec![
        Sexp::atom(name),
        term_to_sexp_with(a, names),
        term_to_sexp_with(b, names),
      ])
    }

    TermKind::Ite(c, a, b) => Sexp::list(vec![
      Sexp::atom("ite"),
      term_to_sexp_with(c, names),
      term_to_sexp_with(a, names),
      term_to_sexp_with(b, names),
    ]),

    TermKind::App(head, args) => {
      let mut list = vec![term_to_sexp_with(head, names)];
      list.extend(args.iter().map(|a| term_to_sexp_with(a, names)));
      Sexp::List(list)
    }

    TermKind::Data(ctor, args) if args.is_empty() => Sexp::atom(ctor.as_str()),
    TermKind::Data(ctor, args) => {
      let mut list = vec![Sexp::atom(ctor.as_str())];
      list.extend(args.iter().map(|a| term_to_sexp_with(a, names)));
      Sexp::List(list)
    }

    TermKind::Boxed(BoxKind::Pos(i)) => {
      debug_assert!(false, "box [#{}] escaped to a solver", i);
      Sexp::atom(&format!("_box{}", i))
    }
    TermKind::Boxed(BoxKind::Free(id)) => {
      debug_assert!(false, "box [?{}] escaped to a solver", id);
      Sexp::atom(&format!("_free{}", id))
    }
  }
}

// endregion

// region Datatype and recursion-scheme declarations

/// `(declare-datatypes ((list 0) …) (((Nil) (Cons (Cons_0 Int) (Cons_1 list))) …))` for every
/// data type reachable from the given root sorts. `None` when none is reachable.
pub fn declare_datatypes(ctx: &Context, roots: &[&Sort]) -> Option<Sexp> {
  let mut names: Vec<IString> = Vec::new();
  for root in roots {
    for name in ctx.sorts.reachable_data(root) {
      if !names.contains(&name) {
        names.push(name);
      }
    }
  }
  if names.is_empty() {
    return None;
  }

  let mut arity_decls = Vec::new();
  let mut variant_decls = Vec::new();
  for name in &names {
    let def = ctx.sorts.def_of(*name)?;
    arity_decls.push(Sexp::list(vec![
      Sexp::atom(name.as_str()),
      Sexp::atom(&def.params.len().to_string()),
    ]));

    let mut ctors = Vec::new();
    for variant in &def.variants {
      let mut ctor = vec![Sexp::atom(variant.name.as_str())];
      for (index, payload_sort) in variant.payload.iter().enumerate() {
        ctor.push(Sexp::list(vec![
          Sexp::atom(&format!("{}_{}", variant.name, index)),
          sort_to_sexp(payload_sort),
        ]));
      }
      ctors.push(Sexp::List(ctor));
    }
    variant_decls.push(Sexp::List(ctors));
  }

  Some(Sexp::list(vec![
    Sexp::atom("declare-datatypes"),
    Sexp::List(arity_decls),
    Sexp::List(variant_decls),
  ]))
}

/// Projects the rules of the given systems to ordinary recursive functions:
/// one `define-funs-rec` covering every nonterminal, pattern rules becoming shallow `match`
/// cases. Nonterminal names are disambiguated across systems when they collide; the returned
/// rename map must be threaded into any term encoded against these definitions.
pub fn define_systems(ctx: &Context, systems: &[&Pmrs]) -> (Vec<Sexp>, HashMap<u32, IString>) {
  let renames = disambiguate(systems);

  let mut signatures = Vec::new();
  let mut bodies = Vec::new();

  for p in systems {
    for nt in &p.nonterminals {
      let rules: Vec<_> = nt.rules.iter().map(|&r| &p.rules[r]).collect();
      if rules.is_empty() {
        continue;
      }
      let symbol = renames.get(&nt.var.id).copied().unwrap_or(nt.var.name);
      let (arg_sorts, ret_sort) = nt.var.sort.uncurry();

      // Canonical parameters: the first rule's argument names, plus a scrutinee for
      // pattern-matching nonterminals.
      let canonical: Vec<Variable> = rules[0].args.clone();
      let has_pattern = rules[0].pattern.is_some();
      let scrutinee = has_pattern.then(|| {
        ctx.fresh_var(
          "scrut",
          arg_sorts.get(canonical.len()).cloned().unwrap_or(Sort::Int),
        )
      });

      let mut params = Vec::new();
      for v in &canonical {
        params.push(Sexp::list(vec![
          Sexp::atom(v.name.as_str()),
          sort_to_sexp(&v.sort),
        ]));
      }
      if let Some(s) = &scrutinee {
        params.push(Sexp::list(vec![
          Sexp::atom(s.name.as_str()),
          sort_to_sexp(&s.sort),
        ]));
      }
      signatures.push(Sexp::list(vec![
        Sexp::atom(symbol.as_str()),
        Sexp::List(params),
        sort_to_sexp(&ret_sort),
      ]));

      let body = if has_pattern {
        let scrutinee = scrutinee.expect("pattern nonterminal has a scrutinee");
        let mut cases = Vec::new();
        for rule in &rules {
          let pattern = rule.pattern.as_ref().expect("validated: no mixed rules");
          let pattern_sexp = if pattern.binders.is_empty() {
            Sexp::atom(pattern.ctor.as_str())
          } else {
            let mut items = vec![Sexp::atom(pattern.ctor.as_str())];
            items.extend(pattern.binders.iter().map(|b| Sexp::atom(b.name.as_str())));
            Sexp::List(items)
          };
          let rhs = canonicalize_rule_rhs(&rule.rhs, &rule.args, &canonical);
          cases.push(Sexp::list(vec![pattern_sexp, term_to_sexp_with(&rhs, &renames)]));
        }
        Sexp::list(vec![
          Sexp::atom("match"),
          Sexp::atom(scrutinee.name.as_str()),
          Sexp::List(cases),
        ])
      } else {
        debug_assert_eq!(rules.len(), 1, "validated: single pattern-free rule");
        let rhs = canonicalize_rule_rhs(&rules[0].rhs, &rules[0].args, &canonical);
        term_to_sexp_with(&rhs, &renames)
      };
      bodies.push(body);
    }
  }

  if signatures.is_empty() {
    return (Vec::new(), renames);
  }
  let command = Sexp::list(vec![
    Sexp::atom("define-funs-rec"),
    Sexp::List(signatures),
    Sexp::List(bodies),
  ]);
  (vec![command], renames)
}

/// Rewrites a rule body so its argument variables use the canonical parameter names.
fn canonicalize_rule_rhs(rhs: &Term, args: &[Variable], canonical: &[Variable]) -> Term {
  let subst: VarSubst = args
    .iter()
    .zip(canonical)
    .filter(|(a, c)| a.id != c.id)
    .map(|(a, c)| (a.id, Term::var(c.clone())))
    .collect();
  if subst.is_empty() {
    rhs.clone()
  } else {
    rhs.substitute(&subst)
  }
}

/// Assigns solver-facing symbols to nonterminals, qualifying with the system name whenever the
/// bare name is claimed by an earlier system.
fn disambiguate(systems: &[&Pmrs]) -> HashMap<u32, IString> {
  let mut taken: Vec<IString> = Vec::new();
  let mut renames = HashMap::default();
  for p in systems {
    for nt in &p.nonterminals {
      let name = nt.var.name;
      if taken.contains(&name) {
        let qualified = IString::from(format!("{}_{}", p.name, name).as_str());
        renames.insert(nt.var.id, qualified);
        taken.push(qualified);
      } else {
        taken.push(name);
      }
    }
  }
  renames
}

// endregion

// region Decoding

pub fn decode_constant(sexp: &Sexp) -> Option<Constant> {
  match sexp {
    Sexp::Atom(a) => match a.as_str() {
      "true" => Some(Constant::Bool(true)),
      "false" => Some(Constant::Bool(false)),
      text => text.parse::<i64>().ok().map(Constant::Int),
    },
    Sexp::List(items) => match items.as_slice() {
      [minus, value] if minus.is_atom("-") => match decode_constant(value)? {
        Constant::Int(i) => Some(Constant::Int(-i)),
        _ => None,
      },
      _ => None,
    },
  }
}

/// Parses a `get-model` response into name/value bindings. Accepts both the bare binding list
/// and the legacy `(model …)` wrapper; non-constant bindings are skipped.
pub fn parse_model(sexps: &[Sexp]) -> Vec<(IString, Constant)> {
  let mut bindings = Vec::new();
  let mut items: Vec<&Sexp> = Vec::new();
  for sexp in sexps {
    match sexp.head() {
      Some("model") => items.extend(sexp.as_list().unwrap_or(&[]).iter().skip(1)),
      Some("define-fun") => items.push(sexp),
      _ => {
        if let Some(list) = sexp.as_list() {
          items.extend(list.iter().filter(|s| s.head() == Some("define-fun")));
        }
      }
    }
  }
  for item in items {
    let Some([_, name, _args, _sort, value]) = item.as_list() else {
      continue;
    };
    let Some(name) = name.as_atom() else { continue };
    if let Some(constant) = decode_constant(value) {
      bindings.push((IString::from(name), constant));
    }
  }
  bindings
}

/// Decodes a solver term against an environment of known variables. `let` bindings are inlined.
pub fn decode_term(
  ctx: &Context,
  sexp: &Sexp,
  env: &HashMap<IString, Term>,
) -> Result<Term, SolverError> {
  match sexp {
    Sexp::Atom(_) => {
      if let Some(constant) = decode_constant(sexp) {
        return Ok(Term::constant(constant));
      }
      let name = IString::from(sexp.as_atom().unwrap_or_default());
      if let Some(bound) = env.get(&name) {
        return Ok(bound.clone());
      }
      // A bare constructor.
      if ctx.sorts.owner_of_variant(name).is_some() {
        let sort = nullary_variant_sort(ctx, name)?;
        return Ok(Term::data(name, vec![], sort));
      }
      Err(SolverError::Unparsable(format!("unknown symbol `{}`", name)))
    }

    Sexp::List(items) => {
      if items.is_empty() {
        return Err(SolverError::Unparsable("empty application".into()));
      }

      // Indexed tuple selector: ((_ tupSel i) t)
      if let Some(inner) = items[0].as_list() {
        if inner.len() == 3 && inner[0].is_atom("_") && inner[1].is_atom("tupSel") {
          let index: usize = inner[2]
            .as_atom()
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| SolverError::Unparsable(format!("bad selector: {}", sexp)))?;
          let subject = decode_term(ctx, &items[1], env)?;
          return Ok(Term::sel(subject, index));
        }
      }

      let head = items[0]
        .as_atom()
        .ok_or_else(|| SolverError::Unparsable(format!("non-atomic head: {}", sexp)))?;
      let args = &items[1..];

      let decode_args = |env: &HashMap<IString, Term>| -> Result<Vec<Term>, SolverError> {
        args.iter().map(|a| decode_term(ctx, a, env)).collect()
      };

      match head {
        "let" => {
          let [bindings, body] = args else {
            return Err(SolverError::Unparsable(format!("bad let: {}", sexp)));
          };
          let mut extended = env.clone();
          for binding in bindings.as_list().unwrap_or(&[]) {
            let Some([name, value]) = binding.as_list() else {
              return Err(SolverError::Unparsable(format!("bad let binding: {}", binding)));
            };
            let name = name
              .as_atom()
              .ok_or_else(|| SolverError::Unparsable(format!("bad let name: {}", binding)))?;
            let value = decode_term(ctx, value, &extended)?;
            extended.insert(IString::from(name), value);
          }
          decode_term(ctx, body, &extended)
        }

        "ite" => {
          let decoded = decode_args(env)?;
          let [c, a, b] = <[Term; 3]>::try_from(decoded)
            .map_err(|_| SolverError::Unparsable(format!("bad ite: {}", sexp)))?;
          Ok(Term::ite(c, a, b))
        }

        "-" if args.len() == 1 => Ok(Term::un(Unop::Neg, decode_term(ctx, &args[0], env)?)),
        "not" | "abs" => {
          let [arg] = args else {
            return Err(SolverError::Unparsable(format!("bad unary application: {}", sexp)));
          };
          let op = if head == "not" { Unop::Not } else { Unop::Abs };
          Ok(Term::un(op, decode_term(ctx, arg, env)?))
        }

        "mkTuple" | "tuple" => Ok(Term::tuple(decode_args(env)?)),

        "+" => fold_op(Binop::Plus, decode_args(env)?, sexp),
        "*" => fold_op(Binop::Times, decode_args(env)?, sexp),
        "and" => fold_op(Binop::And, decode_args(env)?, sexp),
        "or" => fold_op(Binop::Or, decode_args(env)?, sexp),
        "-" => fold_op(Binop::Minus, decode_args(env)?, sexp),
        "div" => fold_op(Binop::Div, decode_args(env)?, sexp),
        "mod" => fold_op(Binop::Mod, decode_args(env)?, sexp),
        "min" => fold_op(Binop::Min, decode_args(env)?, sexp),
        "max" => fold_op(Binop::Max, decode_args(env)?, sexp),
        "=" => fold_op(Binop::Eq, decode_args(env)?, sexp),
        "<" => fold_op(Binop::Lt, decode_args(env)?, sexp),
        ">" => fold_op(Binop::Gt, decode_args(env)?, sexp),
        "<=" => fold_op(Binop::Le, decode_args(env)?, sexp),
        ">=" => fold_op(Binop::Ge, decode_args(env)?, sexp),

        ctor if ctx.sorts.owner_of_variant(IString::from(ctor)).is_some() => {
          let ctor = IString::from(ctor);
          let decoded = decode_args(env)?;
          let sort = nullary_variant_sort(ctx, ctor)?;
          Ok(Term::data(ctor, decoded, sort))
        }

        _ => {
          // Application of a known function symbol (e.g. another hole during cross-validation).
          if let Some(bound) = env.get(&IString::from(head)) {
            return Ok(Term::app(bound.clone(), decode_args(env)?));
          }
          Err(SolverError::Unparsable(format!("unknown application `{}`", sexp)))
        }
      }
    }
  }
}

fn nullary_variant_sort(ctx: &Context, ctor: IString) -> Result<Sort, SolverError> {
  let owner = ctx
    .sorts
    .owner_of_variant(ctor)
    .ok_or_else(|| SolverError::Unparsable(format!("unknown constructor `{}`", ctor)))?;
  let def = ctx
    .sorts
    .def_of(owner)
    .ok_or_else(|| SolverError::Unparsable(format!("unknown data type `{}`", owner)))?;
  let args: Vec<Sort> = def.params.iter().map(|_| ctx.fresh_sort_var()).collect();
  Ok(def.sort(&args))
}

fn fold_op(op: Binop, args: Vec<Term>, original: &Sexp) -> Result<Term, SolverError> {
  let mut iter = args.into_iter();
  let first = iter
    .next()
    .ok_or_else(|| SolverError::Unparsable(format!("nullary operator: {}", original)))?;
  let Some(second) = iter.next() else {
    return Err(SolverError::Unparsable(format!("unary operator `{}`", original)));
  };
  let mut result = Term::bin(op, first, second);
  for next in iter {
    result = Term::bin(op, result, next);
  }
  Ok(result)
}

/// Decodes a `(define-fun name ((a S) …) S body)` response into a hole solution.
pub fn decode_define_fun(ctx: &Context, sexp: &Sexp) -> Result<HoleSolution, SolverError> {
  let items = sexp
    .as_list()
    .filter(|items| items.len() == 5 && items[0].is_atom("define-fun"))
    .ok_or_else(|| SolverError::Unparsable(format!("expected define-fun, got {}", sexp)))?;

  let name = items[1]
    .as_atom()
    .ok_or_else(|| SolverError::Unparsable(format!("bad define-fun name: {}", sexp)))?;

  let mut args = Vec::new();
  let mut env: HashMap<IString, Term> = HashMap::default();
  for param in items[2].as_list().unwrap_or(&[]) {
    let Some([param_name, param_sort]) = param.as_list() else {
      return Err(SolverError::Unparsable(format!("bad parameter: {}", param)));
    };
    let param_name = param_name
      .as_atom()
      .ok_or_else(|| SolverError::Unparsable(format!("bad parameter name: {}", param)))?;
    let sort = decode_sort(param_sort)?;
    let variable = ctx.named_var(param_name, sort);
    env.insert(variable.name, Term::var(variable.clone()));
    args.push(variable);
  }

  let body = decode_term(ctx, &items[4], &env)?;
  Ok(HoleSolution { name: IString::from(name), args, body })
}

// endregion

#[cfg(test)]
mod tests {
  use crate::core::pmrs::tests::list_sum_fixture;
  use crate::ports::sexpr::parse_all;

  use super::*;

  #[test]
  fn terms_roundtrip_through_sexps() {
    let ctx = Context::new();
    let x = ctx.named_var("x", Sort::Int);
    let term = Term::bin(
      Binop::Plus,
      Term::var(x.clone()),
      Term::bin(Binop::Min, Term::int(3), Term::un(Unop::Neg, Term::var(x.clone()))),
    );

    let rendered = term_to_sexp(&term).to_string();
    assert_eq!(rendered, "(+ x (min 3 (- x)))");

    let mut env = HashMap::default();
    env.insert(x.name, Term::var(x));
    let parsed = parse_all(&rendered).unwrap();
    let decoded = decode_term(&ctx, &parsed[0], &env).unwrap();
    assert_eq!(decoded, term);
  }

  #[test]
  fn declares_reachable_datatypes() {
    let (ctx, pmrs) = list_sum_fixture();
    let decl = declare_datatypes(&ctx, &[&pmrs.input_sort]).unwrap();
    let text = decl.to_string();
    assert!(text.starts_with("(declare-datatypes ((list 0))"));
    assert!(text.contains("(Cons (Cons_0 Int) (Cons_1 list))"));
  }

  #[test]
  fn projects_rules_to_recursive_definitions() {
    let (ctx, pmrs) = list_sum_fixture();
    let (defs, renames) = define_systems(&ctx, &[&pmrs]);
    assert!(renames.is_empty());
    assert_eq!(defs.len(), 1);
    let text = defs[0].to_string();
    assert!(text.starts_with("(define-funs-rec"));
    assert!(text.contains("(match"));
    assert!(text.contains("Nil 0"));
  }

  #[test]
  fn decodes_solver_solutions_with_lets() {
    let ctx = Context::new();
    let response = "(define-fun odot ((a Int) (b Int)) Int (let ((c (+ a b))) (+ c 1)))";
    let parsed = parse_all(response).unwrap();
    let solution = decode_define_fun(&ctx, &parsed[0]).unwrap();
    assert_eq!(solution.name.as_str(), "odot");
    assert_eq!(solution.args.len(), 2);
    // let is inlined: (a + b) + 1
    assert_eq!(solution.body.to_string(), "(a + b) + 1");
  }

  #[test]
  fn parses_models_in_both_framings() {
    let with_wrapper = parse_all("(model (define-fun x () Int 3) (define-fun b () Bool true))").unwrap();
    let bindings = parse_model(&with_wrapper);
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].1, Constant::Int(3));

    let bare = parse_all("((define-fun x () Int (- 2)))").unwrap();
    let bindings = parse_model(&bare);
    assert_eq!(bindings, vec![(IString::from("x"), Constant::Int(-2))]);
  }
}

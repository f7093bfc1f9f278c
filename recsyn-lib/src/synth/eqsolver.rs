/*!

Translation of equation systems into SyGuS queries and interpretation of the responses. The
script shape is fixed: `set-logic` (recomputed from the material present), the `min`/`max`
prelude when needed, committed syntactic definitions, one `synth-fun` per unsolved hole with
the C5 grammar, `declare-var`s for the equations' free variables in first-occurrence order, one
`constraint` per equation, `check-synth`.

Detupling happens here: a hole with tuple return sort is split into one hole per component
(`ξ_0 … ξ_k`), equations are rewritten accordingly, and the component solutions are recombined
into a single `mkTuple`-bodied solution afterwards.

*/

use recsyn_abs::{HashMap, IString};

use crate::config::Config;
use crate::core::context::Context;
use crate::core::pmrs::HoleSolution;
use crate::core::problem::Problem;
use crate::core::sort::Sort;
use crate::core::term::{Term, TermKind, VarSubst, Variable};
use crate::error::SolverError;
use crate::ports::encode::{decode_define_fun, min_max_prelude, sort_to_sexp, term_to_sexp};
use crate::ports::sexpr::{render_script, Sexp};
use crate::ports::sygus::{SygusPort, SygusReply};

use super::deduction::Skeleton;
use super::equation::Equation;
use super::grammar::{integer_grammar, synth_fun, GrammarParams, OpClass};

#[derive(Clone, Debug)]
pub enum SygusResponse {
  /// Newly synthesized hole fillings, keyed by hole variable id.
  Success(HashMap<u32, HoleSolution>),
  Infeasible,
  Fail,
  Unknown,
}

/// One component of a detupled hole.
#[derive(Clone, Debug)]
struct ComponentHole {
  var:       Variable,
  component: usize,
}

/// Translates the equations into one SyGuS query, runs the port, and parses the result.
pub fn solve_equations(
  ctx: &Context,
  cfg: &Config,
  problem: &Problem,
  equations: &[Equation],
  guesses: &HashMap<u32, Skeleton>,
  syntactic_defs: &HashMap<u32, HoleSolution>,
  port: &mut dyn SygusPort,
) -> Result<SygusResponse, SolverError> {
  let unsolved: Vec<&Variable> = problem
    .holes()
    .iter()
    .filter(|hole| !syntactic_defs.contains_key(&hole.id))
    .collect();
  if unsolved.is_empty() {
    return Ok(SygusResponse::Success(HashMap::default()));
  }

  // Detupling: split tuple-valued holes into per-component holes.
  let mut components: HashMap<u32, Vec<ComponentHole>> = HashMap::default();
  if cfg.detupling {
    for hole in &unsolved {
      let (arg_sorts, ret) = hole.sort.uncurry();
      if let Sort::Tuple(ret_components) = &ret {
        let split = ret_components
          .iter()
          .enumerate()
          .map(|(index, component_sort)| ComponentHole {
            var: ctx.named_var(
              &format!("{}_{}", hole.name, index),
              Sort::arrow(&arg_sorts, component_sort.clone()),
            ),
            component: index,
          })
          .collect();
        components.insert(hole.id, split);
      }
    }
  }

  let rewritten: Vec<Equation> = equations
    .iter()
    .flat_map(|equation| rewrite_detupled(equation, &components))
    .collect();

  let mut params = GrammarParams::from_config(cfg);
  params.observe(rewritten.iter().flat_map(|e| [e.lhs.clone(), e.rhs.clone()]));

  // Hole ids (original and component) never become declared variables.
  let mut hole_ids: Vec<u32> = unsolved.iter().map(|h| h.id).collect();
  hole_ids.extend(components.values().flatten().map(|c| c.var.id));

  let mut script = Vec::new();
  script.push(Sexp::list(vec![
    Sexp::atom("set-logic"),
    Sexp::atom(logic_for(&rewritten, cfg)),
  ]));
  if params.ops.contains(OpClass::MinMax) {
    script.extend(min_max_prelude());
  }

  for solution in syntactic_defs.values() {
    script.push(define_fun(solution));
  }

  // One synth-fun per hole still to be found.
  for hole in &unsolved {
    match components.get(&hole.id) {
      Some(split) => {
        for component in split {
          script.push(synth_fun_for(ctx, &component.var, &params, guesses.get(&hole.id)));
        }
      }
      None => script.push(synth_fun_for(ctx, hole, &params, guesses.get(&hole.id))),
    }
  }

  // Free variables of the system, in first-occurrence order.
  let mut declared = Vec::new();
  for equation in &rewritten {
    for variable in equation.free_variables() {
      if hole_ids.contains(&variable.id) || declared.iter().any(|d: &Variable| d.id == variable.id) {
        continue;
      }
      script.push(Sexp::list(vec![
        Sexp::atom("declare-var"),
        Sexp::atom(variable.name.as_str()),
        sort_to_sexp(&variable.sort),
      ]));
      declared.push(variable);
    }
  }

  for equation in &rewritten {
    let equality = Sexp::list(vec![
      Sexp::atom("="),
      term_to_sexp(&equation.lhs),
      term_to_sexp(&equation.rhs),
    ]);
    let formula = match &equation.precond {
      Some(precond) => Sexp::list(vec![Sexp::atom("=>"), term_to_sexp(precond), equality]),
      None => equality,
    };
    script.push(Sexp::list(vec![Sexp::atom("constraint"), formula]));
  }
  script.push(Sexp::list(vec![Sexp::atom("check-synth")]));

  let reply = port.check_synth(&render_script(&script))?;
  match reply {
    SygusReply::Infeasible => Ok(SygusResponse::Infeasible),
    SygusReply::Fail => Ok(SygusResponse::Fail),
    SygusReply::Unknown => Ok(SygusResponse::Unknown),
    SygusReply::Solutions(defs) => {
      let mut by_name: HashMap<IString, HoleSolution> = HashMap::default();
      for def in &defs {
        let solution = decode_define_fun(ctx, def)?;
        by_name.insert(solution.name, solution);
      }

      let mut assignment: HashMap<u32, HoleSolution> = HashMap::default();
      for hole in &unsolved {
        let solution = match components.get(&hole.id) {
          Some(split) => recombine(hole, split, &by_name)?,
          None => by_name.get(&hole.name).cloned(),
        };
        match solution {
          Some(solution) => {
            assignment.insert(hole.id, HoleSolution { name: hole.name, ..solution });
          }
          None => {
            return Err(SolverError::Unparsable(format!(
              "solver response is missing a definition for `{}`",
              hole.name
            )));
          }
        }
      }
      Ok(SygusResponse::Success(assignment))
    }
  }
}

/// The logic needed by the system: datatypes present ⇒ DTLIA, nonlinear arithmetic ⇒ NIA,
/// otherwise LIA.
fn logic_for(equations: &[Equation], cfg: &Config) -> &'static str {
  let has_data = equations.iter().any(|equation| {
    [&equation.lhs, &equation.rhs]
      .into_iter()
      .chain(equation.precond.as_ref())
      .any(term_mentions_data)
  });
  if has_data {
    "DTLIA"
  } else if cfg.allow_nonlinear {
    "NIA"
  } else {
    "LIA"
  }
}

fn term_mentions_data(t: &Term) -> bool {
  if matches!(t.kind(), TermKind::Data(..)) || matches!(t.sort(), Sort::Named(_) | Sort::App(..)) {
    return true;
  }
  t.children().iter().any(term_mentions_data)
}

fn define_fun(solution: &HoleSolution) -> Sexp {
  Sexp::list(vec![
    Sexp::atom("define-fun"),
    Sexp::atom(solution.name.as_str()),
    Sexp::List(
      solution
        .args
        .iter()
        .map(|a| Sexp::list(vec![Sexp::atom(a.name.as_str()), sort_to_sexp(&a.sort)]))
        .collect(),
    ),
    sort_to_sexp(solution.body.sort()),
    term_to_sexp(&solution.body),
  ])
}

fn synth_fun_for(
  ctx: &Context,
  hole: &Variable,
  params: &GrammarParams,
  guess: Option<&Skeleton>,
) -> Sexp {
  let (arg_sorts, ret) = hole.sort.uncurry();
  let args: Vec<Variable> = arg_sorts
    .iter()
    .enumerate()
    .map(|(i, sort)| ctx.named_var(&format!("p{}", i), sort.clone()))
    .collect();
  let grammar = integer_grammar(&args, &ret, params, guess);
  synth_fun(hole.name.as_str(), &args, &ret, Some(&grammar))
}

/// A hole call site: `ξ(args)` or a bare nullary `ξ`.
fn hole_call<'t>(t: &'t Term, components: &HashMap<u32, Vec<ComponentHole>>) -> Option<(u32, &'t [Term])> {
  match t.kind() {
    TermKind::App(head, args) => match head.kind() {
      TermKind::Var(v) if components.contains_key(&v.id) => Some((v.id, args.as_slice())),
      _ => None,
    },
    TermKind::Var(v) if components.contains_key(&v.id) => Some((v.id, &[] as &[Term])),
    _ => None,
  }
}

/// Rewrites one equation under the component-hole split: selector applications collapse onto
/// the component hole, and a tuple-literal equation against a whole-hole application splits
/// into one equation per component.
fn rewrite_detupled(equation: &Equation, components: &HashMap<u32, Vec<ComponentHole>>) -> Vec<Equation> {
  if components.is_empty() {
    return vec![equation.clone()];
  }

  // Split (t₁, …, tₖ) = ξ(args) into tᵢ = ξ_i(args).
  if let TermKind::Tuple(items) = equation.lhs.kind() {
    if let Some((hole_id, args)) = hole_call(&equation.rhs, components) {
      let split = &components[&hole_id];
      if split.len() == items.len() {
        return items
          .iter()
          .zip(split)
          .map(|(item, component)| Equation {
            term:    equation.term.clone(),
            precond: equation.precond.clone(),
            lhs:     replace_component_apps(item, components),
            rhs:     Term::app(Term::var(component.var.clone()), args.to_vec()),
          })
          .collect();
      }
    }
  }

  vec![Equation {
    term:    equation.term.clone(),
    precond: equation.precond.as_ref().map(|p| replace_component_apps(p, components)),
    lhs:     replace_component_apps(&equation.lhs, components),
    rhs:     replace_component_apps(&equation.rhs, components),
  }]
}

/// `Sel(ξ(args), i)` becomes `ξ_i(args)` wherever it occurs, including over bare nullary
/// holes.
fn replace_component_apps(t: &Term, components: &HashMap<u32, Vec<ComponentHole>>) -> Term {
  if let TermKind::Sel(subject, index) = t.kind() {
    if let Some((hole_id, args)) = hole_call(subject, components) {
      if let Some(component) = components[&hole_id].iter().find(|c| c.component == *index) {
        let args: Vec<Term> = args.iter().map(|a| replace_component_apps(a, components)).collect();
        return Term::app(Term::var(component.var.clone()), args);
      }
    }
  }
  let children: Vec<Term> = t
    .children()
    .iter()
    .map(|c| replace_component_apps(c, components))
    .collect();
  crate::core::pmrs::rebuild_with_children(t, children)
}

/// Merges component solutions back into one tuple-bodied solution for the original hole.
fn recombine(
  hole: &Variable,
  split: &[ComponentHole],
  by_name: &HashMap<IString, HoleSolution>,
) -> Result<Option<HoleSolution>, SolverError> {
  let mut solutions = Vec::new();
  for component in split {
    match by_name.get(&component.var.name) {
      Some(solution) => solutions.push(solution.clone()),
      None => return Ok(None),
    }
  }

  let canonical = solutions[0].args.clone();
  let mut bodies = Vec::new();
  for solution in &solutions {
    let subst: VarSubst = solution
      .args
      .iter()
      .zip(&canonical)
      .map(|(from, to)| (from.id, Term::var(to.clone())))
      .collect();
    bodies.push(solution.body.substitute(&subst));
  }

  Ok(Some(HoleSolution {
    name: hole.name,
    args: canonical,
    body: Term::tuple(bodies),
  }))
}

/*!

SyGuS grammar generation. Every grammar uses the three-nonterminal schema: `Ix` for integer
expressions, `Ic` for constants, `Ipred` for booleans. Tuple-sorted arguments are unfolded into
their component selector expressions, a tuple return sort gets a `mkTuple` head rule, and a
guess skeleton from the deduction engine contributes an `IStart` nonterminal whose productions
materialize the guessed shapes, biasing the synthesizer toward them.

The operator set is an [`enumflags2`] flag set so callers can take the configured base set and
union in whatever operators the current equations actually mention.

*/

use enumflags2::{bitflags, BitFlags};
use recsyn_abs::IString;

use crate::config::Config;
use crate::core::sort::Sort;
use crate::core::term::{Binop, BoxKind, Term, TermKind, Unop, Variable};
use crate::ports::encode::sort_to_sexp;
use crate::ports::sexpr::Sexp;

use super::deduction::Skeleton;

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OpClass {
  Arith,
  Comparison,
  Boolean,
  MinMax,
  Ite,
  NonLinear,
}

pub type OpSet = BitFlags<OpClass>;

#[derive(Clone, Debug)]
pub struct GrammarParams {
  pub ops:             OpSet,
  pub mul_by_constant: bool,
  pub allow_nonlinear: bool,
}

impl GrammarParams {
  pub fn from_config(cfg: &Config) -> GrammarParams {
    let mut ops = OpClass::Arith | OpClass::Comparison | OpClass::Boolean | OpClass::Ite;
    if cfg.allow_nonlinear {
      ops |= OpClass::NonLinear;
    }
    GrammarParams {
      ops,
      mul_by_constant: cfg.mul_by_constant,
      allow_nonlinear: cfg.allow_nonlinear,
    }
  }

  /// Extends the operator set with every class observed in the given terms, so the grammar can
  /// always express the equations it must satisfy.
  pub fn observe(&mut self, terms: impl IntoIterator<Item = Term>) {
    for term in terms {
      self.observe_term(&term);
    }
  }

  fn observe_term(&mut self, t: &Term) {
    match t.kind() {
      TermKind::Bin(op, ..) => {
        self.ops |= match op {
          Binop::Plus | Binop::Minus => OpClass::Arith.into(),
          Binop::Times | Binop::Div | Binop::Mod => OpClass::Arith | OpClass::NonLinear,
          Binop::Min | Binop::Max => OpClass::MinMax.into(),
          Binop::And | Binop::Or => OpClass::Boolean.into(),
          Binop::Eq | Binop::Lt | Binop::Gt | Binop::Le | Binop::Ge => OpClass::Comparison.into(),
        };
      }
      TermKind::Un(Unop::Neg | Unop::Abs, _) => self.ops |= OpClass::Arith,
      TermKind::Un(Unop::Not, _) => self.ops |= OpClass::Boolean,
      TermKind::Ite(..) => self.ops |= OpClass::Ite,
      _ => {}
    }
    for child in t.children() {
      self.observe_term(&child);
    }
  }
}

/// A generated grammar: nonterminal name, its sort, and its production right-hand sides. The
/// first nonterminal is the start symbol and must agree with the synth-fun return sort.
#[derive(Clone, Debug)]
pub struct GrammarDef {
  pub nonterminals: Vec<(IString, Sexp, Vec<Sexp>)>,
}

impl GrammarDef {
  /// The `((A S) (B S') …)` declaration block of a v2 synth-fun.
  pub fn declaration_list(&self) -> Sexp {
    Sexp::List(
      self
        .nonterminals
        .iter()
        .map(|(name, sort, _)| Sexp::list(vec![Sexp::atom(name.as_str()), sort.clone()]))
        .collect(),
    )
  }

  /// The `((A S (p₁ p₂ …)) …)` grouped-rule block of a v2 synth-fun.
  pub fn grouped_rules(&self) -> Sexp {
    Sexp::List(
      self
        .nonterminals
        .iter()
        .map(|(name, sort, productions)| {
          Sexp::list(vec![
            Sexp::atom(name.as_str()),
            sort.clone(),
            Sexp::List(productions.clone()),
          ])
        })
        .collect(),
    )
  }
}

/// A complete `synth-fun` command, with the grammar attached when one is given.
pub fn synth_fun(name: &str, args: &[Variable], ret: &Sort, grammar: Option<&GrammarDef>) -> Sexp {
  let mut items = vec![
    Sexp::atom("synth-fun"),
    Sexp::atom(name),
    Sexp::List(
      args
        .iter()
        .map(|a| Sexp::list(vec![Sexp::atom(a.name.as_str()), sort_to_sexp(&a.sort)]))
        .collect(),
    ),
    sort_to_sexp(ret),
  ];
  if let Some(grammar) = grammar {
    items.push(grammar.declaration_list());
    items.push(grammar.grouped_rules());
  }
  Sexp::List(items)
}

/// Leaf expressions of the given scalar sort reachable from the arguments, unfolding
/// tuple-sorted arguments into their component selectors.
fn leaves_of_sort(args: &[Variable], want: &Sort) -> Vec<Sexp> {
  let mut leaves = Vec::new();
  for arg in args {
    match &arg.sort {
      sort if sort == want => leaves.push(Sexp::atom(arg.name.as_str())),
      Sort::Tuple(components) => {
        for (index, component) in components.iter().enumerate() {
          if component == want {
            leaves.push(Sexp::list(vec![
              Sexp::list(vec![
                Sexp::atom("_"),
                Sexp::atom("tupSel"),
                Sexp::atom(&index.to_string()),
              ]),
              Sexp::atom(arg.name.as_str()),
            ]));
          }
        }
      }
      _ => {}
    }
  }
  leaves
}

fn binary(op: &str, a: &str, b: &str) -> Sexp {
  Sexp::list(vec![Sexp::atom(op), Sexp::atom(a), Sexp::atom(b)])
}

/// The integer-parametric grammar for a hole with the given argument locals and return sort.
pub fn integer_grammar(
  args: &[Variable],
  ret: &Sort,
  params: &GrammarParams,
  guess: Option<&Skeleton>,
) -> GrammarDef {
  let mut ix = vec![Sexp::atom("Ic")];
  ix.extend(leaves_of_sort(args, &Sort::Int));
  if params.ops.contains(OpClass::Arith) {
    ix.push(binary("+", "Ix", "Ix"));
    ix.push(binary("-", "Ix", "Ix"));
  }
  if params.ops.contains(OpClass::MinMax) {
    ix.push(binary("min", "Ix", "Ix"));
    ix.push(binary("max", "Ix", "Ix"));
  }
  if params.ops.contains(OpClass::Ite) {
    ix.push(Sexp::list(vec![
      Sexp::atom("ite"),
      Sexp::atom("Ipred"),
      Sexp::atom("Ix"),
      Sexp::atom("Ix"),
    ]));
  }
  if params.mul_by_constant {
    ix.push(binary("*", "Ic", "Ix"));
  }
  if params.allow_nonlinear || params.ops.contains(OpClass::NonLinear) {
    ix.push(binary("*", "Ix", "Ix"));
  }

  let ic = vec![Sexp::list(vec![Sexp::atom("Constant"), Sexp::atom("Int")])];

  let mut ipred = Vec::new();
  ipred.extend(leaves_of_sort(args, &Sort::Bool));
  if params.ops.contains(OpClass::Comparison) {
    ipred.push(binary("=", "Ix", "Ix"));
    ipred.push(binary("<=", "Ix", "Ix"));
    ipred.push(binary(">=", "Ix", "Ix"));
    ipred.push(binary("<", "Ix", "Ix"));
  }
  if params.ops.contains(OpClass::Boolean) {
    ipred.push(binary("and", "Ipred", "Ipred"));
    ipred.push(binary("or", "Ipred", "Ipred"));
    ipred.push(Sexp::list(vec![Sexp::atom("not"), Sexp::atom("Ipred")]));
  }

  let core = [
    (IString::from("Ix"), Sexp::atom("Int"), ix),
    (IString::from("Ic"), Sexp::atom("Int"), ic),
    (IString::from("Ipred"), Sexp::atom("Bool"), ipred),
  ];

  let mut nonterminals: Vec<(IString, Sexp, Vec<Sexp>)> = Vec::new();

  // A guess skeleton from deduction biases the search through a dedicated start symbol.
  if let Some(skeleton) = guess {
    let production = shape_to_sexp(&skeleton.shape, args);
    nonterminals.push((IString::from("IStart"), sort_to_sexp(ret), vec![production]));
  } else {
    match ret {
      Sort::Tuple(components) => {
        let mut head = vec![Sexp::atom("mkTuple")];
        for component in components {
          head.push(Sexp::atom(nonterminal_for(component)));
        }
        nonterminals.push((IString::from("IStart"), sort_to_sexp(ret), vec![Sexp::List(head)]));
      }
      Sort::Bool => {
        // Start symbol must come first: reorder so Ipred leads.
        let [ix, ic, ipred] = core;
        return GrammarDef { nonterminals: vec![ipred, ix, ic] };
      }
      _ => {}
    }
  }

  nonterminals.extend(core);
  GrammarDef { nonterminals }
}

/// The boolean-parametric grammar used for per-term lemma synthesis.
pub fn boolean_grammar(args: &[Variable], params: &GrammarParams) -> GrammarDef {
  integer_grammar(args, &Sort::Bool, params, None)
}

fn nonterminal_for(sort: &Sort) -> &'static str {
  match sort {
    Sort::Bool => "Ipred",
    _ => "Ix",
  }
}

/// Renders a guess shape as a grammar production: positional boxes become the matching
/// argument symbols, free boxes the nonterminal of their sort.
fn shape_to_sexp(shape: &Term, args: &[Variable]) -> Sexp {
  match shape.kind() {
    TermKind::Boxed(BoxKind::Pos(index)) => match args.get(*index) {
      Some(arg) => Sexp::atom(arg.name.as_str()),
      None => Sexp::atom(nonterminal_for(shape.sort())),
    },
    TermKind::Boxed(BoxKind::Free(_)) => Sexp::atom(nonterminal_for(shape.sort())),
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
      Sexp::list(vec![Sexp::atom(name), shape_to_sexp(a, args), shape_to_sexp(b, args)])
    }
    TermKind::Un(op, inner) => {
      let name = match op {
        Unop::Neg => "-",
        Unop::Not => "not",
        Unop::Abs => "abs",
      };
      Sexp::list(vec![Sexp::atom(name), shape_to_sexp(inner, args)])
    }
    TermKind::Ite(c, a, b) => Sexp::list(vec![
      Sexp::atom("ite"),
      shape_to_sexp(c, args),
      shape_to_sexp(a, args),
      shape_to_sexp(b, args),
    ]),
    TermKind::Tuple(items) => {
      let mut list = vec![Sexp::atom("mkTuple")];
      list.extend(items.iter().map(|i| shape_to_sexp(i, args)));
      Sexp::List(list)
    }
    _ => crate::ports::encode::term_to_sexp(shape),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn int_args() -> Vec<Variable> {
    vec![
      Variable::new(0, IString::from("a"), Sort::Int),
      Variable::new(1, IString::from("b"), Sort::Int),
    ]
  }

  fn default_params() -> GrammarParams {
    GrammarParams::from_config(&Config::default())
  }

  #[test]
  fn integer_grammar_has_the_three_nonterminal_schema() {
    let grammar = integer_grammar(&int_args(), &Sort::Int, &default_params(), None);
    let names: Vec<&str> = grammar.nonterminals.iter().map(|(n, ..)| n.as_str()).collect();
    assert_eq!(names, vec!["Ix", "Ic", "Ipred"]);

    let rules = grammar.grouped_rules().to_string();
    assert!(rules.contains("(+ Ix Ix)"));
    assert!(rules.contains("(Constant Int)"));
    assert!(rules.contains("a"));
  }

  #[test]
  fn tuple_return_gets_a_mk_tuple_head() {
    let ret = Sort::Tuple(vec![Sort::Int, Sort::Bool]);
    let grammar = integer_grammar(&int_args(), &ret, &default_params(), None);
    assert_eq!(grammar.nonterminals[0].0.as_str(), "IStart");
    let head = grammar.nonterminals[0].2[0].to_string();
    assert_eq!(head, "(mkTuple Ix Ipred)");
  }

  #[test]
  fn tuple_arguments_unfold_into_selectors() {
    let args = vec![Variable::new(
      0,
      IString::from("p"),
      Sort::Tuple(vec![Sort::Int, Sort::Int]),
    )];
    let grammar = integer_grammar(&args, &Sort::Int, &default_params(), None);
    let rules = grammar.grouped_rules().to_string();
    assert!(rules.contains("((_ tupSel 0) p)"));
    assert!(rules.contains("((_ tupSel 1) p)"));
  }

  #[test]
  fn guess_shapes_bias_the_grammar() {
    let args = int_args();
    let shape = Term::bin(
      Binop::Plus,
      Term::boxed(BoxKind::Pos(0), Sort::Int),
      Term::boxed(BoxKind::Free(0), Sort::Int),
    );
    let grammar = integer_grammar(&args, &Sort::Int, &default_params(), Some(&Skeleton { shape }));
    assert_eq!(grammar.nonterminals[0].0.as_str(), "IStart");
    assert_eq!(grammar.nonterminals[0].2[0].to_string(), "(+ a Ix)");
  }

  #[test]
  fn observed_operators_extend_the_set() {
    let mut params = default_params();
    assert!(!params.ops.contains(OpClass::MinMax));
    params.observe([Term::bin(Binop::Min, Term::int(1), Term::int(2))]);
    assert!(params.ops.contains(OpClass::MinMax));
  }

  #[test]
  fn boolean_grammar_starts_with_the_predicate_nonterminal() {
    let grammar = boolean_grammar(&int_args(), &default_params());
    assert_eq!(grammar.nonterminals[0].0.as_str(), "Ipred");
  }
}

/*!

Cross-component tests that are difficult to do without parsing and problem construction: the
full path from surface text through construction, equation derivation and the refinement loop,
driven by mock solver ports so no external binary is needed.

*/

use recsyn_abs::{HashMap, IString};
use recsyn_lib::config::Config;
use recsyn_lib::core::context::Context;
use recsyn_lib::core::pmrs::reduce::reduce_under;
use recsyn_lib::core::pmrs::HoleSolution;
use recsyn_lib::core::sort::Sort;
use recsyn_lib::core::term::{Constant, Term, TermKind, Variable};
use recsyn_lib::error::{Error, ResourceError, SolverError};
use recsyn_lib::ports::sexpr::Sexp;
use recsyn_lib::ports::smt::{SatAnswer, SmtPort};
use recsyn_lib::ports::sygus::{SygusPort, SygusReply};
use recsyn_lib::synth::equation::build_equations;
use recsyn_lib::synth::lemmas::{LemmaCheck, LemmaProver};
use recsyn_lib::synth::refinement::{Phase, Ports, SynthOutcome};
use recsyn_lib::synth::state::RefinementState;

use crate::driver;
use crate::parser::FunctionRoles;

// region Mock ports

struct MockSygus {
  replies: Vec<SygusReply>,
  scripts: Vec<String>,
}

impl SygusPort for MockSygus {
  fn adapter(&self) -> &'static str {
    "mock-sygus/1"
  }

  fn check_synth(&mut self, script: &str) -> Result<SygusReply, SolverError> {
    self.scripts.push(script.to_string());
    if self.replies.is_empty() {
      Ok(SygusReply::Unknown)
    } else {
      Ok(self.replies.remove(0))
    }
  }
}

struct MockSmt {
  answers: Vec<SatAnswer>,
  calls:   usize,
}

impl SmtPort for MockSmt {
  fn adapter(&self) -> &'static str {
    "mock-smt/1"
  }

  fn set_option(&mut self, _key: &str, _value: &str) -> Result<(), SolverError> {
    Ok(())
  }

  fn exec(&mut self, _command: &Sexp) -> Result<(), SolverError> {
    Ok(())
  }

  fn push(&mut self) -> Result<(), SolverError> {
    Ok(())
  }

  fn pop(&mut self) -> Result<(), SolverError> {
    Ok(())
  }

  fn check_sat(&mut self) -> Result<SatAnswer, SolverError> {
    let answer = if self.calls < self.answers.len() {
      self.answers[self.calls]
    } else {
      SatAnswer::Unsat
    };
    self.calls += 1;
    Ok(answer)
  }

  fn get_model(&mut self) -> Result<Vec<(IString, Constant)>, SolverError> {
    Ok(vec![])
  }
}

struct MockProver;

impl LemmaProver for MockProver {
  fn prove(
    &mut self,
    _bounded: &[String],
    _unbounded: &str,
    _scalars: &[Variable],
  ) -> Result<LemmaCheck, SolverError> {
    Ok(LemmaCheck::Undecided)
  }
}

// endregion

const LIST_SUM: &str = r#"
data list = Nil | Cons(int, list);

pmrs spec =
    main x -> f x
  | f Nil -> 0
  | f (Cons hd tl) -> hd + f tl;

pmrs target(c0, odot) =
    main x -> h x
  | h Nil -> c0
  | h (Cons hd tl) -> odot hd (h tl);
"#;

const BALANCED_PARENS: &str = r#"
// 1 is an opening parenthesis, -1 a closing one.
data plist = Pnil | Pcons(int, plist);

pmrs spec =
    main x -> bal 0 x
  | bal c Pnil -> c = 0
  | bal c (Pcons hd tl) -> if c + hd < 0 then false else bal (c + hd) tl;

pmrs target(base, join) =
    main x -> (k x).2
  | k Pnil -> (base : (int * int * bool))
  | k (Pcons hd tl) -> join hd (k tl);
"#;

const BST_PROPERTY: &str = r#"
data tree = Leaf(int) | Node(int, tree, tree);

pmrs spec =
    main t -> chk t
  | chk (Leaf a) -> true
  | chk (Node a l r) -> chk l && chk r;

pmrs target(f0, join) =
    main t -> (aux t).0
  | aux (Leaf a) -> (f0 a : (bool * int))
  | aux (Node a l r) ->
      let (lh, la) = (aux l : (bool * int)) in
      let (rh, ra) = (aux r : (bool * int)) in
      join a lh la rh ra;
"#;

fn load(text: &str) -> (Context, recsyn_lib::core::problem::Problem) {
  let mut ctx = Context::new();
  let problem = driver::load_problem(&mut ctx, text, &FunctionRoles::default())
    .expect("problem should construct");
  (ctx, problem)
}

fn concrete_list(values: &[i64]) -> Term {
  let list = Sort::Named(IString::from("list"));
  let mut result = Term::data(IString::from("Nil"), vec![], list.clone());
  for value in values.iter().rev() {
    result = Term::data(IString::from("Cons"), vec![Term::int(*value), result], list.clone());
  }
  result
}

#[test]
fn parses_and_constructs_the_list_sum_problem() {
  let (_ctx, problem) = load(LIST_SUM);
  assert_eq!(problem.theta, Sort::Named(IString::from("list")));
  assert_eq!(problem.alpha, Sort::Int);
  assert_eq!(problem.holes().len(), 2);
  // No repr declaration: the identity representation is synthesized implicitly.
  assert!(problem.repr_is_identity);

  // Inference resolved the binary hole's signature from its use.
  let odot = problem.holes().iter().find(|h| h.name.as_str() == "odot").unwrap();
  assert_eq!(odot.sort, Sort::arrow(&[Sort::Int, Sort::Int], Sort::Int));
}

#[test]
fn list_sum_end_to_end_is_realizable_and_evaluates() {
  let (ctx, problem) = load(LIST_SUM);
  let cfg = Config::default();

  let mut sygus = MockSygus { replies: vec![], scripts: vec![] };
  let mut smt = MockSmt { answers: vec![], calls: 0 };
  let mut prover = MockProver;
  let mut ports = Ports {
    sygus:        &mut sygus,
    smt:          &mut smt,
    lemma_prover: &mut prover,
  };

  let (outcome, stats) = driver::run(&ctx, &cfg, &problem, &mut ports);
  let SynthOutcome::Realizable(solutions) = outcome else {
    panic!("expected realizable, got {:?}", outcome);
  };
  assert!(stats.saw_transition(Phase::Verify, Phase::Done));

  // Commit the solutions and evaluate the instantiated skeleton on a concrete input.
  let assignment: HashMap<u32, HoleSolution> = problem
    .holes()
    .iter()
    .filter_map(|hole| {
      solutions
        .iter()
        .find(|s| s.name == hole.name)
        .map(|s| (hole.id, s.clone()))
    })
    .collect();
  let instantiated = problem.target.instantiate(&assignment);
  assert!(instantiated.params.is_empty());

  let input = concrete_list(&[1, 2, 3]);
  let result = reduce_under(&instantiated, &instantiated.apply_main(input), 500).unwrap();
  assert_eq!(result, Term::int(6));
}

#[test]
fn balanced_parens_equations_are_pure_first_order() {
  let (ctx, problem) = load(BALANCED_PARENS);
  let cfg = Config::default();

  let mut state = RefinementState::new();
  let plist = Sort::Named(IString::from("plist"));
  let pnil = Term::data(IString::from("Pnil"), vec![], plist.clone());
  let hd = Term::var(ctx.fresh_var("hd", Sort::Int));
  let tl = Term::var(ctx.fresh_var("tl", plist.clone()));
  let pcons = Term::data(IString::from("Pcons"), vec![hd, tl], plist);
  state.absorb([pnil, pcons], []);

  let (equations, dropped) = build_equations(&ctx, &cfg, &problem, &mut state);
  assert_eq!(dropped, 0);
  assert!(!equations.is_empty());
  let nt_ids = problem.all_nonterminal_ids();
  for equation in &equations {
    assert!(!equation.lhs.mentions_any(&nt_ids));
    assert!(!equation.rhs.mentions_any(&nt_ids));
  }
}

#[test]
fn bst_skeleton_constructs_with_let_destructuring() {
  let (_ctx, problem) = load(BST_PROPERTY);
  assert_eq!(problem.theta, Sort::Named(IString::from("tree")));
  assert_eq!(problem.alpha, Sort::Bool);

  // The let-bound components appear as tuple projections in the constructed rule body.
  let node_rule = problem
    .target
    .rules
    .iter()
    .find(|r| r.pattern.as_ref().is_some_and(|p| p.ctor.as_str() == "Node"))
    .unwrap();
  fn has_sel(t: &Term) -> bool {
    matches!(t.kind(), TermKind::Sel(..)) || t.children().iter().any(has_sel)
  }
  assert!(has_sel(&node_rule.rhs));

  // The pinned hole signature came through the ascriptions.
  let f0 = problem.holes().iter().find(|h| h.name.as_str() == "f0").unwrap();
  assert_eq!(
    f0.sort,
    Sort::arrow(&[Sort::Int], Sort::Tuple(vec![Sort::Bool, Sort::Int]))
  );
}

#[test]
fn tiny_verification_bounds_answer_unknown() {
  let (ctx, problem) = load(LIST_SUM);
  let mut cfg = Config::default();
  cfg.num_expansions_check = 1;

  let mut sygus = MockSygus { replies: vec![], scripts: vec![] };
  let mut smt = MockSmt { answers: vec![], calls: 0 };
  let mut prover = MockProver;
  let mut ports = Ports {
    sygus:        &mut sygus,
    smt:          &mut smt,
    lemma_prover: &mut prover,
  };

  let (outcome, _stats) = driver::run(&ctx, &cfg, &problem, &mut ports);
  assert!(
    matches!(outcome, SynthOutcome::Unknown(ResourceError::VerifierBound)),
    "got {:?}",
    outcome
  );
}

#[test]
fn infeasible_synthesis_reports_unrealizability() {
  let (ctx, problem) = load(LIST_SUM);
  let mut cfg = Config::default();
  cfg.use_deduction = false;
  cfg.attempt_lifting = false;

  let mut sygus = MockSygus { replies: vec![SygusReply::Infeasible], scripts: vec![] };
  let mut smt = MockSmt { answers: vec![], calls: 0 };
  let mut prover = MockProver;
  let mut ports = Ports {
    sygus:        &mut sygus,
    smt:          &mut smt,
    lemma_prover: &mut prover,
  };

  let (outcome, _stats) = driver::run(&ctx, &cfg, &problem, &mut ports);
  let SynthOutcome::Unrealizable(certificate) = outcome else {
    panic!("expected unrealizable, got {:?}", outcome);
  };
  assert!(!certificate.equations.is_empty());
}

#[test]
fn parse_failures_are_input_errors() {
  let mut ctx = Context::new();
  let result = driver::load_problem(&mut ctx, "data = ;", &FunctionRoles::default());
  assert!(matches!(result, Err(Error::Input(_))));
}

#[test]
fn missing_roles_are_input_errors() {
  let mut ctx = Context::new();
  let text = "data list = Nil | Cons(int, list);";
  let result = driver::load_problem(&mut ctx, text, &FunctionRoles::default());
  assert!(matches!(result, Err(Error::Input(_))));
}

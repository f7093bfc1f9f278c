/*!

The SyGuS port. A query is a complete SyGuS-IF v2 script; the solver runs once per query and
answers `success` (a list of `define-fun`s), `infeasible`, `fail` or `unknown`. The response
grammar drifts slightly between solver generations (legacy status line, optional wrapping
parentheses), so parsing is deliberately permissive.

*/

use std::time::Duration;

use crate::config::SolverCommand;
use crate::error::SolverError;

use super::process::{run_once, CancelHandle};
use super::sexpr::{parse_all, Sexp};

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SygusReply {
  /// The raw `define-fun` forms, one per synthesized function.
  Solutions(Vec<Sexp>),
  Infeasible,
  Fail,
  Unknown,
}

pub trait SygusPort {
  /// Version tag of the dialect adapter, e.g. `"sygus2-cvc/1"`.
  fn adapter(&self) -> &'static str;

  fn check_synth(&mut self, script: &str) -> Result<SygusReply, SolverError>;
}

pub struct SubprocessSygus {
  command: SolverCommand,
  timeout: Option<Duration>,
}

impl SubprocessSygus {
  pub fn new(command: SolverCommand, timeout: Option<Duration>) -> SubprocessSygus {
    SubprocessSygus { command, timeout }
  }
}

impl SygusPort for SubprocessSygus {
  fn adapter(&self) -> &'static str {
    "sygus2-cvc/1"
  }

  fn check_synth(&mut self, script: &str) -> Result<SygusReply, SolverError> {
    let handle = CancelHandle::new();
    let output = run_once(&self.command, script, self.timeout, &handle)?;
    parse_sygus_output(&output)
  }
}

/// Parses a SyGuS response. Accepted shapes:
///
/// ```text
/// (                             unsat                    infeasible
/// (define-fun f () Int 0)       (define-fun f () Int 0)
/// )
/// ```
pub fn parse_sygus_output(text: &str) -> Result<SygusReply, SolverError> {
  if text.trim().is_empty() {
    return Err(SolverError::Unparsable("empty solver response".into()));
  }
  let sexps = parse_all(text)?;

  let mut solutions = Vec::new();
  let mut marker: Option<SygusReply> = None;
  for sexp in &sexps {
    match sexp {
      Sexp::Atom(a) => match a.as_str() {
        "infeasible" => marker = Some(SygusReply::Infeasible),
        "fail" => marker = Some(SygusReply::Fail),
        "unknown" => marker = Some(SygusReply::Unknown),
        // Legacy status lines preceding the solution block.
        "unsat" | "sat" | "success" => {}
        other => {
          return Err(SolverError::Unparsable(format!("unexpected response atom `{}`", other)));
        }
      },
      Sexp::List(items) => {
        if sexp.head() == Some("define-fun") {
          solutions.push(sexp.clone());
        } else {
          // A wrapper block: collect the define-funs inside it.
          solutions.extend(
            items
              .iter()
              .filter(|item| item.head() == Some("define-fun"))
              .cloned(),
          );
        }
      }
    }
  }

  if !solutions.is_empty() {
    return Ok(SygusReply::Solutions(solutions));
  }
  match marker {
    Some(reply) => Ok(reply),
    None => Err(SolverError::Unparsable(format!("unrecognized response: {}", text.trim()))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_wrapped_solution_blocks() {
    let output = "(\n(define-fun f ((x Int)) Int (+ x 1))\n(define-fun g () Int 0)\n)\n";
    match parse_sygus_output(output).unwrap() {
      SygusReply::Solutions(solutions) => {
        assert_eq!(solutions.len(), 2);
        assert_eq!(solutions[0].head(), Some("define-fun"));
      }
      other => panic!("expected solutions, got {:?}", other),
    }
  }

  #[test]
  fn parses_legacy_status_line() {
    let output = "unsat\n(define-fun f () Int 0)\n";
    assert!(matches!(
      parse_sygus_output(output).unwrap(),
      SygusReply::Solutions(solutions) if solutions.len() == 1
    ));
  }

  #[test]
  fn parses_failure_markers() {
    assert_eq!(parse_sygus_output("infeasible\n").unwrap(), SygusReply::Infeasible);
    assert_eq!(parse_sygus_output("fail").unwrap(), SygusReply::Fail);
    assert_eq!(parse_sygus_output("unknown").unwrap(), SygusReply::Unknown);
  }

  #[test]
  fn garbage_is_unparsable() {
    assert!(matches!(
      parse_sygus_output("segmentation fault"),
      Err(SolverError::Unparsable(_))
    ));
  }
}

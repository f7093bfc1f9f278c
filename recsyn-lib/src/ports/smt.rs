/*!

The SMT port: standard SMT-LIB2 over an incremental solver session. The refinement loop only
sees the [`SmtPort`] trait; [`SubprocessSmt`] implements it over a solver binary with the
solver-family quirks confined to its adapter (Z3 is incremental by default and rejects the
cvc-only options, CVC accepts them).

*/

use recsyn_abs::IString;

use crate::config::{SolverCommand, SolverKind};
use crate::core::term::Constant;
use crate::error::SolverError;

use super::encode::parse_model;
use super::process::{CancelHandle, SolverSession};
use super::sexpr::{parse_all, Sexp};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SatAnswer {
  Sat,
  Unsat,
  Unknown,
}

pub trait SmtPort {
  /// Version tag of the dialect adapter, e.g. `"smtlib2-z3/1"`.
  fn adapter(&self) -> &'static str;

  fn set_option(&mut self, key: &str, value: &str) -> Result<(), SolverError>;

  /// Executes a declaration, definition or assertion; commands with no interesting answer.
  fn exec(&mut self, command: &Sexp) -> Result<(), SolverError>;

  fn push(&mut self) -> Result<(), SolverError>;
  fn pop(&mut self) -> Result<(), SolverError>;

  fn check_sat(&mut self) -> Result<SatAnswer, SolverError>;

  /// The model of the last `sat` answer, as variable/constant bindings.
  fn get_model(&mut self) -> Result<Vec<(IString, Constant)>, SolverError>;

  fn assert(&mut self, formula: &Sexp) -> Result<(), SolverError> {
    self.exec(&Sexp::list(vec![Sexp::atom("assert"), formula.clone()]))
  }
}

pub struct SubprocessSmt {
  session: SolverSession,
  kind:    SolverKind,
}

impl SubprocessSmt {
  pub fn launch(command: &SolverCommand) -> Result<SubprocessSmt, SolverError> {
    let session = SolverSession::launch(command)?;
    let mut port = SubprocessSmt { session, kind: command.kind };
    // First command, so that every subsequent command acknowledges with `success` and the
    // request/response streams can never drift.
    port.raw("(set-option :print-success true)")?;
    port.set_option("produce-models", "true")?;
    port.set_option("incremental", "true")?;
    Ok(port)
  }

  pub fn cancel_handle(&self) -> CancelHandle {
    self.session.cancel_handle()
  }

  fn raw(&mut self, line: &str) -> Result<(), SolverError> {
    let response = self.session.command(line)?;
    expect_success(&response)
  }
}

impl SmtPort for SubprocessSmt {
  fn adapter(&self) -> &'static str {
    match self.kind {
      SolverKind::Cvc => "smtlib2-cvc/1",
      SolverKind::Z3 => "smtlib2-z3/1",
    }
  }

  fn set_option(&mut self, key: &str, value: &str) -> Result<(), SolverError> {
    // Z3 is incremental by default and rejects the cvc-only switches.
    if self.kind == SolverKind::Z3 && matches!(key, "incremental" | "quant-ind" | "tlimit") {
      if key == "tlimit" {
        return self.raw(&format!("(set-option :timeout {})", value));
      }
      return Ok(());
    }
    self.raw(&format!("(set-option :{} {})", key, value))
  }

  fn exec(&mut self, command: &Sexp) -> Result<(), SolverError> {
    self.raw(&command.to_string())
  }

  fn push(&mut self) -> Result<(), SolverError> {
    self.raw("(push 1)")
  }

  fn pop(&mut self) -> Result<(), SolverError> {
    self.raw("(pop 1)")
  }

  fn check_sat(&mut self) -> Result<SatAnswer, SolverError> {
    let response = self.session.command("(check-sat)")?;
    match response.trim() {
      "sat" => Ok(SatAnswer::Sat),
      "unsat" => Ok(SatAnswer::Unsat),
      "unknown" | "timeout" => Ok(SatAnswer::Unknown),
      other => Err(SolverError::Unparsable(format!("check-sat answered `{}`", other))),
    }
  }

  fn get_model(&mut self) -> Result<Vec<(IString, Constant)>, SolverError> {
    let response = self.session.command("(get-model)")?;
    let sexps = parse_all(&response)?;
    Ok(parse_model(&sexps))
  }
}

fn expect_success(response: &str) -> Result<(), SolverError> {
  let trimmed = response.trim();
  if trimmed == "success" {
    Ok(())
  } else if trimmed.starts_with("(error") {
    Err(SolverError::Crashed(trimmed.to_string()))
  } else {
    Err(SolverError::Unparsable(format!("expected `success`, got `{}`", trimmed)))
  }
}

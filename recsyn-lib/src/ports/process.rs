/*!

Solver subprocess plumbing. Each external call owns one subprocess, paired with a
[`CancelHandle`]: cancelling kills the process, and the pending call observes the kill as an
orderly [`SolverError::Cancelled`] instead of committing a partial result. Timeouts are polled
(`try_wait` + sleep) so a hung solver can never wedge the loop.

*/

use std::{
  io::{BufRead, BufReader, Read, Write},
  process::{Child, ChildStdin, ChildStdout, Command, Stdio},
  sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc, Mutex,
  },
  thread,
  time::{Duration, Instant},
};

use crate::config::SolverCommand;
use crate::error::SolverError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shared handle to a running solver call. Cloneable; any clone can cancel.
#[derive(Clone, Default)]
pub struct CancelHandle {
  child:     Arc<Mutex<Option<Child>>>,
  cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
  pub fn new() -> CancelHandle {
    CancelHandle::default()
  }

  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
    let mut slot = self.child.lock().expect("cancel handle poisoned");
    if let Some(child) = slot.as_mut() {
      let _ = child.kill();
    }
  }

  #[inline(always)]
  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }

  fn register(&self, child: Child) {
    let mut slot = self.child.lock().expect("cancel handle poisoned");
    *slot = Some(child);
    if self.is_cancelled() {
      // Cancelled before the process was registered; kill it now.
      if let Some(child) = slot.as_mut() {
        let _ = child.kill();
      }
    }
  }

  fn try_wait(&self) -> Result<Option<std::process::ExitStatus>, SolverError> {
    let mut slot = self.child.lock().expect("cancel handle poisoned");
    match slot.as_mut() {
      Some(child) => Ok(child.try_wait()?),
      None => Err(SolverError::Cancelled),
    }
  }
}

fn spawn(command: &SolverCommand) -> Result<Child, SolverError> {
  Command::new(&command.program)
    .args(&command.args)
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::null())
    .spawn()
    .map_err(|source| SolverError::Spawn { command: command.program.clone(), source })
}

/// Runs a solver to completion on a single input script: feed stdin, close it, await exit
/// within the timeout, return the full stdout.
pub fn run_once(
  command: &SolverCommand,
  input: &str,
  timeout: Option<Duration>,
  handle: &CancelHandle,
) -> Result<String, SolverError> {
  if handle.is_cancelled() {
    return Err(SolverError::Cancelled);
  }

  let mut child = spawn(command)?;
  let mut stdin = child.stdin.take().expect("stdin was piped");
  let stdout = child.stdout.take().expect("stdout was piped");
  handle.register(child);

  // Read stdout on a helper thread so a chatty solver can never fill the pipe and deadlock.
  let (sender, receiver) = mpsc::channel();
  thread::spawn(move || {
    let mut output = String::new();
    let mut stdout = stdout;
    let _ = stdout.read_to_string(&mut output);
    let _ = sender.send(output);
  });

  stdin.write_all(input.as_bytes())?;
  drop(stdin);

  let deadline = timeout.map(|t| Instant::now() + t);
  loop {
    if handle.is_cancelled() {
      return Err(SolverError::Cancelled);
    }
    if let Some(status) = handle.try_wait()? {
      let output = receiver
        .recv_timeout(Duration::from_secs(1))
        .unwrap_or_default();
      if !status.success() && output.trim().is_empty() {
        return Err(SolverError::Crashed(status.to_string()));
      }
      return Ok(output);
    }
    if deadline.is_some_and(|d| Instant::now() >= d) {
      handle.cancel();
      return Err(SolverError::Timeout);
    }
    thread::sleep(POLL_INTERVAL);
  }
}

/// An incremental solver session over stdin/stdout. Synchronization relies on
/// `:print-success`, which the owning port enables right after launch: every command gets an
/// answer, so requests and responses can never drift out of step.
pub struct SolverSession {
  handle: CancelHandle,
  stdin:  ChildStdin,
  stdout: BufReader<ChildStdout>,
}

impl SolverSession {
  pub fn launch(command: &SolverCommand) -> Result<SolverSession, SolverError> {
    let mut child = spawn(command)?;
    let stdin = child.stdin.take().expect("stdin was piped");
    let stdout = BufReader::new(child.stdout.take().expect("stdout was piped"));
    let handle = CancelHandle::new();
    handle.register(child);
    Ok(SolverSession { handle, stdin, stdout })
  }

  pub fn cancel_handle(&self) -> CancelHandle {
    self.handle.clone()
  }

  pub fn send(&mut self, line: &str) -> Result<(), SolverError> {
    if self.handle.is_cancelled() {
      return Err(SolverError::Cancelled);
    }
    writeln!(self.stdin, "{}", line)?;
    self.stdin.flush()?;
    Ok(())
  }

  /// Reads one complete response: a bare word (`sat`, `success`, …) or a balanced
  /// S-expression spanning several lines.
  pub fn read_response(&mut self) -> Result<String, SolverError> {
    let mut depth: i64 = 0;
    let mut buffer = String::new();
    loop {
      let mut line = String::new();
      let read = self.stdout.read_line(&mut line)?;
      if read == 0 {
        return Err(if self.handle.is_cancelled() {
          SolverError::Cancelled
        } else {
          SolverError::Crashed("solver closed its output stream".into())
        });
      }
      depth += balance(&line);
      buffer.push_str(&line);
      if depth <= 0 && !buffer.trim().is_empty() {
        return Ok(buffer);
      }
    }
  }

  /// Sends a command and reads its one response.
  pub fn command(&mut self, line: &str) -> Result<String, SolverError> {
    self.send(line)?;
    self.read_response()
  }
}

impl Drop for SolverSession {
  fn drop(&mut self) {
    self.handle.cancel();
  }
}

/// Parenthesis balance of a line, ignoring parentheses inside string literals.
fn balance(line: &str) -> i64 {
  let mut depth = 0i64;
  let mut in_string = false;
  for c in line.chars() {
    match c {
      '"' => in_string = !in_string,
      '(' if !in_string => depth += 1,
      ')' if !in_string => depth -= 1,
      _ => {}
    }
  }
  depth
}

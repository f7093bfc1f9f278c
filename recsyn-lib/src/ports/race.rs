/*!

A two-task first-result race with cancellation, used to run the bounded and unbounded lemma
checks side by side: whichever resolves first wins and the other's solver subprocess is killed.
Each task receives its own [`CancelHandle`]; there is no implicit global cancellation token.

The closures must be `Send`: callers pass fully rendered script text, never shared term
structure.

*/

use std::{sync::mpsc, thread, time::Duration};

use crate::error::SolverError;

use super::process::CancelHandle;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RaceWinner {
  Left,
  Right,
}

/// Runs both closures on worker threads and returns the first result, cancelling the loser.
/// An elapsed `timeout` cancels both and reports [`SolverError::Timeout`].
pub fn race_first<T, L, R>(left: L, right: R, timeout: Duration) -> Result<(RaceWinner, T), SolverError>
where
  T: Send + 'static,
  L: FnOnce(&CancelHandle) -> T + Send + 'static,
  R: FnOnce(&CancelHandle) -> T + Send + 'static,
{
  let left_handle = CancelHandle::new();
  let right_handle = CancelHandle::new();
  let (sender, receiver) = mpsc::channel();

  {
    let sender = sender.clone();
    let handle = left_handle.clone();
    thread::spawn(move || {
      let result = left(&handle);
      let _ = sender.send((RaceWinner::Left, result));
    });
  }
  {
    let handle = right_handle.clone();
    thread::spawn(move || {
      let result = right(&handle);
      let _ = sender.send((RaceWinner::Right, result));
    });
  }

  match receiver.recv_timeout(timeout) {
    Ok((winner, result)) => {
      // The loser's subprocess is torn down; its late result is discarded with the channel.
      left_handle.cancel();
      right_handle.cancel();
      Ok((winner, result))
    }
    Err(_) => {
      left_handle.cancel();
      right_handle.cancel();
      Err(SolverError::Timeout)
    }
  }
}

/*!

Everything that talks to the outside world. The refinement loop only ever sees the two traits
[`SygusPort`] and [`SmtPort`]; the subprocess-backed implementations live here, each behind a
small version-tagged adapter so the core never depends on the quirks of one solver binary.
Tests drive the loop through mock ports with canned responses.

Every solver call is cancellable: the subprocess is registered with a [`process::CancelHandle`]
that kills it, and a pending call observes the kill as an orderly `Cancelled` error. Nothing is
committed to refinement state until a call resolves.

*/

pub mod encode;
pub mod process;
pub mod race;
pub mod sexpr;
pub mod smt;
pub mod sygus;

pub use sexpr::Sexp;
pub use smt::{SatAnswer, SmtPort, SubprocessSmt};
pub use sygus::{SubprocessSygus, SygusPort, SygusReply};

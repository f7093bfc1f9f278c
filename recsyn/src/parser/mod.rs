/*!

Parser for the `.pmrs` surface dialect. The grammar lives in `grammar.lalrpop` and is built by
`lalrpop` at compile time; the AST and the AST-to-core construction live in [`ast`].

*/

pub mod ast;

use lalrpop_util::lalrpop_mod;
use recsyn_lib::error::Error;

lalrpop_mod!(
  #[allow(clippy::all)]
  pub grammar,
  "/parser/grammar.rs"
);

pub use ast::{construct_problem, FunctionRoles, ItemAST};

/// Parses a whole program, mapping parser diagnostics into the input-error class.
pub fn parse_program(text: &str) -> Result<Vec<ItemAST>, Error> {
  grammar::ProgramParser::new()
    .parse(text)
    .map_err(|e| Error::Input(format!("parse error: {}", e)))
}

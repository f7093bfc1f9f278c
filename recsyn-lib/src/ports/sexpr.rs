/*!

S-expressions, the lingua franca of both solver ports: SyGuS scripts and SMT-LIB2 commands are
emitted as `Sexp` values rendered to text, and solver responses are read back with the same
reader. The reader accepts the full textual subset solvers produce: atoms, nested lists,
`;`-comments, double-quoted string literals and `|`-quoted symbols.

*/

use std::fmt::{Display, Formatter};

use recsyn_abs::{join_string, IString};

use crate::error::SolverError;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Sexp {
  Atom(IString),
  List(Vec<Sexp>),
}

impl Sexp {
  pub fn atom(s: &str) -> Sexp {
    Sexp::Atom(IString::from(s))
  }

  pub fn list(items: Vec<Sexp>) -> Sexp {
    Sexp::List(items)
  }

  /// Integer literal. Negative integers render as the SMT-LIB application `(- n)`.
  pub fn int(i: i64) -> Sexp {
    if i < 0 {
      Sexp::list(vec![Sexp::atom("-"), Sexp::atom(&i.unsigned_abs().to_string())])
    } else {
      Sexp::atom(&i.to_string())
    }
  }

  pub fn as_atom(&self) -> Option<&str> {
    match self {
      Sexp::Atom(a) => Some(a.as_str()),
      Sexp::List(_) => None,
    }
  }

  pub fn as_list(&self) -> Option<&[Sexp]> {
    match self {
      Sexp::Atom(_) => None,
      Sexp::List(items) => Some(items),
    }
  }

  pub fn is_atom(&self, expected: &str) -> bool {
    self.as_atom() == Some(expected)
  }

  /// The head atom of a list, e.g. `define-fun` of `(define-fun f () Int 0)`.
  pub fn head(&self) -> Option<&str> {
    self.as_list().and_then(|items| items.first()).and_then(Sexp::as_atom)
  }
}

impl Display for Sexp {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Sexp::Atom(a) => write!(f, "{}", a),
      Sexp::List(items) => write!(f, "({})", join_string(items.iter(), " ")),
    }
  }
}

/// Renders a command sequence as a script, one command per line.
pub fn render_script(commands: &[Sexp]) -> String {
  let mut script = String::new();
  for command in commands {
    script.push_str(&command.to_string());
    script.push('\n');
  }
  script
}

/// Reads every S-expression in the input.
pub fn parse_all(input: &str) -> Result<Vec<Sexp>, SolverError> {
  let mut tokens = tokenize(input)?;
  tokens.reverse(); // pop from the front
  let mut result = Vec::new();
  while !tokens.is_empty() {
    result.push(parse_one(&mut tokens)?);
  }
  Ok(result)
}

#[derive(Debug, PartialEq)]
enum Token {
  Open,
  Close,
  Atom(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, SolverError> {
  let mut tokens = Vec::new();
  let mut chars = input.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '(' => tokens.push(Token::Open),
      ')' => tokens.push(Token::Close),
      ';' => {
        // Comment to end of line.
        for c in chars.by_ref() {
          if c == '\n' {
            break;
          }
        }
      }
      '"' => {
        let mut literal = String::from('"');
        loop {
          match chars.next() {
            Some('"') => {
              // SMT-LIB escapes a quote by doubling it.
              if chars.peek() == Some(&'"') {
                literal.push('"');
                chars.next();
              } else {
                literal.push('"');
                break;
              }
            }
            Some(c) => literal.push(c),
            None => return Err(SolverError::Unparsable("unterminated string literal".into())),
          }
        }
        tokens.push(Token::Atom(literal));
      }
      '|' => {
        let mut symbol = String::from('|');
        loop {
          match chars.next() {
            Some('|') => {
              symbol.push('|');
              break;
            }
            Some(c) => symbol.push(c),
            None => return Err(SolverError::Unparsable("unterminated quoted symbol".into())),
          }
        }
        tokens.push(Token::Atom(symbol));
      }
      c if c.is_whitespace() => {}
      c => {
        let mut atom = String::from(c);
        while let Some(&next) = chars.peek() {
          if next.is_whitespace() || next == '(' || next == ')' || next == ';' {
            break;
          }
          atom.push(next);
          chars.next();
        }
        tokens.push(Token::Atom(atom));
      }
    }
  }
  Ok(tokens)
}

fn parse_one(tokens: &mut Vec<Token>) -> Result<Sexp, SolverError> {
  match tokens.pop() {
    Some(Token::Atom(a)) => Ok(Sexp::atom(&a)),
    Some(Token::Open) => {
      let mut items = Vec::new();
      loop {
        match tokens.last() {
          Some(Token::Close) => {
            tokens.pop();
            return Ok(Sexp::List(items));
          }
          Some(_) => items.push(parse_one(tokens)?),
          None => return Err(SolverError::Unparsable("unbalanced parentheses".into())),
        }
      }
    }
    Some(Token::Close) => Err(SolverError::Unparsable("unexpected `)`".into())),
    None => Err(SolverError::Unparsable("empty input".into())),
  }
}

/*!

The per-process context: the sort registry and the fresh-id allocators. There is deliberately no
other global state in the crate; a driver that runs several solves (possibly racing two
configurations of the same problem) creates one `Context` per instance, or calls
[`Context::reinit`] between sequential solves so fresh names are reproducible run to run.

Allocation only needs `&self`: the counters are atomic, so the context can be shared immutably
once the registry is built.

*/

use recsyn_abs::{Counter, IString};

use super::sort::{Sort, SortRegistry};
use super::term::Variable;

#[derive(Debug, Default)]
pub struct Context {
  pub sorts: SortRegistry,

  var_ids:      Counter,
  sort_var_ids: Counter,
  name_ids:     Counter,
}

impl Context {
  pub fn new() -> Context {
    Context::default()
  }

  /// Resets the fresh-id allocators. Must be called between independent solves that want
  /// reproducible identifier streams; the registry is kept.
  pub fn reinit(&self) {
    self.var_ids.reset();
    self.sort_var_ids.reset();
    self.name_ids.reset();
  }

  /// A fresh variable named `{base}_{id}`. Names minted here are ASCII-safe and collision-free
  /// across the whole solve, which is what the solver ports rely on.
  pub fn fresh_var(&self, base: &str, sort: Sort) -> Variable {
    let id = self.var_ids.next();
    Variable::new(id, IString::from(format!("{}_{}", base, id).as_str()), sort)
  }

  /// A variable with a caller-chosen (surface) name and a fresh id.
  pub fn named_var(&self, name: &str, sort: Sort) -> Variable {
    Variable::new(self.var_ids.next(), IString::from(name), sort)
  }

  pub fn fresh_sort_var(&self) -> Sort {
    Sort::Var(self.sort_var_ids.next())
  }

  pub fn fresh_name(&self, prefix: &str) -> IString {
    IString::from(format!("{}{}", prefix, self.name_ids.next()).as_str())
  }
}

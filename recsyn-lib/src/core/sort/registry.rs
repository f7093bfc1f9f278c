/*!

The registry of data-type definitions. Variant names are globally unique: the registry maps each
variant name back to the data type that declares it, which is what lets terms use bare
constructor applications without qualification.

*/

use recsyn_abs::{HashMap, IString};

use crate::error::SortError;

use super::Sort;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Variant {
  pub name:    IString,
  pub payload: Vec<Sort>,
}

/// A named sum type. Type parameters appear in payloads as `Sort::Named(param)` and are
/// substituted away by `SortRegistry::variants_of` at an applied sort.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DataDef {
  pub name:     IString,
  pub params:   Vec<IString>,
  pub variants: Vec<Variant>,
}

impl DataDef {
  pub fn monomorphic(name: IString, variants: Vec<Variant>) -> DataDef {
    DataDef {
      name,
      params: Vec::new(),
      variants,
    }
  }

  /// The sort a value of this data type has: `Named` for monomorphic definitions, `App` over
  /// the given arguments otherwise.
  pub fn sort(&self, args: &[Sort]) -> Sort {
    if self.params.is_empty() {
      Sort::Named(self.name)
    } else {
      Sort::App(self.name, args.to_vec())
    }
  }
}

#[derive(Clone, Default, Debug)]
pub struct SortRegistry {
  defs:   HashMap<IString, DataDef>,
  /// variant name → owning data-type name
  owners: HashMap<IString, IString>,
}

impl SortRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, def: DataDef) -> Result<(), SortError> {
    for variant in &def.variants {
      if let Some(owner) = self.owners.get(&variant.name) {
        if *owner != def.name {
          return Err(SortError::DuplicateVariant(variant.name, *owner));
        }
      }
    }
    for variant in &def.variants {
      self.owners.insert(variant.name, def.name);
    }
    self.defs.insert(def.name, def);
    Ok(())
  }

  pub fn def_of(&self, name: IString) -> Option<&DataDef> {
    self.defs.get(&name)
  }

  pub fn owner_of_variant(&self, variant: IString) -> Option<IString> {
    self.owners.get(&variant).copied()
  }

  #[inline(always)]
  pub fn is_data(&self, sort: &Sort) -> bool {
    sort.data_name().is_some_and(|name| self.defs.contains_key(&name))
  }

  /// The variants of a data sort with type parameters substituted by the sort's arguments.
  /// `None` when the sort is not a registered data sort.
  pub fn variants_of(&self, sort: &Sort) -> Option<Vec<Variant>> {
    let name = sort.data_name()?;
    let def = self.defs.get(&name)?;
    match sort {
      Sort::Named(_) => Some(def.variants.clone()),
      Sort::App(_, args) => {
        if args.len() != def.params.len() {
          return None;
        }
        let instantiate = |payload_sort: &Sort| {
          let mut result = payload_sort.clone();
          for (param, arg) in def.params.iter().zip(args.iter()) {
            result = result.substitute(&Sort::Named(*param), arg);
          }
          result
        };
        Some(
          def
            .variants
            .iter()
            .map(|v| Variant {
              name:    v.name,
              payload: v.payload.iter().map(instantiate).collect(),
            })
            .collect(),
        )
      }
      _ => None,
    }
  }

  /// The instantiated payload sorts of `ctor` at the data sort `at`.
  pub fn payload_of(&self, ctor: IString, at: &Sort) -> Result<Vec<Sort>, SortError> {
    let variants = self
      .variants_of(at)
      .ok_or(SortError::UnknownType(at.data_name().unwrap_or_else(|| IString::from("?"))))?;
    variants
      .into_iter()
      .find(|v| v.name == ctor)
      .map(|v| v.payload)
      .ok_or(SortError::UnknownVariant(ctor))
  }

  /// The result sort of the variant `ctor`, with fresh-variable arguments supplied by the
  /// caller for parametric definitions.
  pub fn sort_of_variant(&self, ctor: IString, args: &[Sort]) -> Result<Sort, SortError> {
    let owner = self
      .owner_of_variant(ctor)
      .ok_or(SortError::UnknownVariant(ctor))?;
    let def = self.defs.get(&owner).ok_or(SortError::UnknownType(owner))?;
    if def.params.len() != args.len() {
      return Err(SortError::Arity(owner, args.len(), def.params.len()));
    }
    Ok(def.sort(args))
  }

  /// All data-type names reachable from `sort` through variant payloads, in deterministic
  /// first-visit order. Feeds the SMT `declare-datatypes` emission.
  pub fn reachable_data(&self, sort: &Sort) -> Vec<IString> {
    let mut order = Vec::new();
    let mut stack = vec![sort.clone()];
    while let Some(current) = stack.pop() {
      match &current {
        Sort::Named(name) | Sort::App(name, _) => {
          if order.contains(name) {
            continue;
          }
          if let Some(variants) = self.variants_of(&current) {
            order.push(*name);
            for variant in variants {
              for payload_sort in variant.payload {
                stack.push(payload_sort);
              }
            }
          }
        }
        Sort::Tuple(items) => stack.extend(items.iter().cloned()),
        Sort::Fun(a, b) => {
          stack.push((**a).clone());
          stack.push((**b).clone());
        }
        _ => {}
      }
    }
    order
  }
}

/*!

Robinson unification over sorts, with occurs check. Failure is a diagnostic value
([`SortError`]), never a panic: unification failures are expected during problem construction
and type inference and are surfaced to the caller with the offending pair.

*/

use recsyn_abs::HashMap;

use crate::error::SortError;

use super::Sort;

pub type SortSubst = HashMap<u32, Sort>;

/// Unifies a single pair of sorts.
pub fn unify_one(s: &Sort, t: &Sort) -> Result<SortSubst, SortError> {
  unify(vec![(s.clone(), t.clone())])
}

/// Unifies a list of sort equations, producing the most general unifier.
pub fn unify(mut equations: Vec<(Sort, Sort)>) -> Result<SortSubst, SortError> {
  let mut subst = SortSubst::default();

  while let Some((s, t)) = equations.pop() {
    let s = s.apply(&subst);
    let t = t.apply(&subst);
    if s == t {
      continue;
    }

    match (&s, &t) {
      (Sort::Var(v), _) => bind(&mut subst, *v, &t)?,
      (_, Sort::Var(v)) => bind(&mut subst, *v, &s)?,

      (Sort::Fun(a, b), Sort::Fun(c, d)) => {
        equations.push(((**a).clone(), (**c).clone()));
        equations.push(((**b).clone(), (**d).clone()));
      }

      (Sort::Tuple(xs), Sort::Tuple(ys)) if xs.len() == ys.len() => {
        equations.extend(xs.iter().cloned().zip(ys.iter().cloned()));
      }

      (Sort::App(n, xs), Sort::App(m, ys)) if n == m && xs.len() == ys.len() => {
        equations.extend(xs.iter().cloned().zip(ys.iter().cloned()));
      }

      _ => return Err(SortError::Mismatch(s.to_string(), t.to_string())),
    }
  }

  Ok(subst)
}

/// Adds `v ↦ sort` to the substitution, keeping it idempotent: existing range sorts are
/// rewritten so the domain never appears in the range.
fn bind(subst: &mut SortSubst, v: u32, sort: &Sort) -> Result<(), SortError> {
  if sort.occurs(v) {
    return Err(SortError::Occurs(v, sort.to_string()));
  }
  let single: SortSubst = [(v, sort.clone())].into_iter().collect();
  for value in subst.values_mut() {
    *value = value.apply(&single);
  }
  subst.insert(v, sort.clone());
  Ok(())
}

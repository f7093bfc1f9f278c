/*!

Join sequences with a separator.

*/

use std::fmt::Display;

/// Joins the `Display` representations of the items with the given separator.
pub fn join_string<I, T>(iter: I, separator: &str) -> String
where
  I: IntoIterator<Item = T>,
  T: Display,
{
  let mut result = String::new();
  for (i, item) in iter.into_iter().enumerate() {
    if i > 0 {
      result.push_str(separator);
    }
    result.push_str(&item.to_string());
  }
  result
}

/// Joins the results of `f` applied to the items with the given separator.
pub fn join_iter<I, T, F>(iter: I, f: F, separator: &str) -> String
where
  I: IntoIterator<Item = T>,
  F: Fn(T) -> String,
{
  let mut result = String::new();
  for (i, item) in iter.into_iter().enumerate() {
    if i > 0 {
      result.push_str(separator);
    }
    result.push_str(&f(item));
  }
  result
}

#[cfg(test)]
mod tests {
  use super::join_string;

  #[test]
  fn join_with_separator() {
    assert_eq!(join_string([1, 2, 3], ", "), "1, 2, 3");
    assert_eq!(join_string(Vec::<i32>::new(), ", "), "");
  }
}

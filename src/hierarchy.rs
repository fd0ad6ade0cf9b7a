//! hierarchy
//!
//! Nesting relationships between repo-entry paths.
//!
//! When an entry is freshly cloned, every other entry whose working
//! directory lives beneath it must be added to the outer repository's
//! ignore list, otherwise the outer version control system would track
//! a directory that is independently managed. [`resolve`] computes, for
//! every input path, the set of other input paths nested under it.
//!
//! Paths are compared after normalization: empty and `.` segments are
//! dropped, so `./libs//foo` and `libs/foo` are the same entry (and two
//! entries normalizing to the same path are an error).

use std::collections::BTreeMap;

use crate::error::{Result, RugError};

/// Split a path into normalized segments, dropping empty and `.` parts.
fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

/// For every path in `paths`, compute the set of other input paths
/// lexically nested beneath it.
///
/// The project root entry (`.` or empty) contains every other path.
/// Exact duplicates (after normalization) are rejected.
pub fn resolve<'a, I>(paths: I) -> Result<BTreeMap<String, Vec<String>>>
where
    I: IntoIterator<Item = &'a str>,
{
    let paths: Vec<&str> = paths.into_iter().collect();
    let split: Vec<Vec<&str>> = paths.iter().map(|p| segments(p)).collect();

    for i in 0..paths.len() {
        for j in (i + 1)..paths.len() {
            if split[i] == split[j] {
                return Err(RugError::DuplicatePath {
                    first: paths[i].to_string(),
                    second: paths[j].to_string(),
                });
            }
        }
    }

    let mut map = BTreeMap::new();
    for (i, path) in paths.iter().enumerate() {
        let mut nested = Vec::new();
        for (j, other) in paths.iter().enumerate() {
            if i != j && split[j].len() > split[i].len() && split[j].starts_with(&split[i]) {
                nested.push((*other).to_string());
            }
        }
        nested.sort();
        map.insert((*path).to_string(), nested);
    }

    Ok(map)
}

/// The path of `nested` relative to its enclosing entry `outer`,
/// suitable for an ignore rule written inside `outer`.
pub fn relative_to(outer: &str, nested: &str) -> String {
    let outer = segments(outer);
    let nested = segments(nested);
    nested[outer.len()..].join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths_are_grouped_under_parents() {
        let map = resolve(["libs", "libs/foo", "libs/foo/deep", "tools"]).unwrap();
        assert_eq!(map["libs"], vec!["libs/foo", "libs/foo/deep"]);
        assert_eq!(map["libs/foo"], vec!["libs/foo/deep"]);
        assert!(map["tools"].is_empty());
    }

    #[test]
    fn root_entry_contains_everything() {
        let map = resolve([".", "libs/foo", "tools"]).unwrap();
        assert_eq!(map["."], vec!["libs/foo", "tools"]);
    }

    #[test]
    fn sibling_prefixes_are_not_nesting() {
        // "libs-extra" starts with "libs" as a string but not as a path.
        let map = resolve(["libs", "libs-extra"]).unwrap();
        assert!(map["libs"].is_empty());
    }

    #[test]
    fn normalization_drops_dot_and_empty_segments() {
        let map = resolve(["./libs//", "libs/foo"]).unwrap();
        assert_eq!(map["./libs//"], vec!["libs/foo"]);
    }

    #[test]
    fn duplicates_after_normalization_are_an_error() {
        let err = resolve(["libs/foo", "./libs/foo"]).unwrap_err();
        assert!(matches!(err, RugError::DuplicatePath { .. }));
    }

    #[test]
    fn relative_to_strips_the_outer_prefix() {
        assert_eq!(relative_to("libs", "libs/foo/deep"), "foo/deep");
        assert_eq!(relative_to(".", "tools"), "tools");
    }
}

//! Loop/branch exhaustion tracking for the main loop and any number of secondary loops.

use std::collections::{BTreeSet, HashMap};

use crate::domain::LoopSpec;

/// What consuming a main-loop branch changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MainLoopProgress {
  /// The visited set went from empty to non-empty.
  pub first_branch: bool,
  /// Every declared branch has now been visited.
  pub all_branches: bool,
}

#[derive(Debug, Default, Clone)]
pub struct LoopTracker {
  main: BTreeSet<String>,
  secondary: HashMap<String, BTreeSet<String>>,
}

impl LoopTracker {
  /// Visited set that applies to `node_id`.
  pub fn visited(&self, node_id: &str, spec: &LoopSpec) -> Option<&BTreeSet<String>> {
    match spec.parent_loop {
      None => Some(&self.main),
      Some(_) => self.secondary.get(node_id),
    }
  }

  /// Branches of `spec` not yet consumed, in declaration order.
  pub fn remaining<'a>(&self, node_id: &str, spec: &'a LoopSpec) -> Vec<&'a str> {
    let visited = self.visited(node_id, spec);
    spec
      .branches
      .keys()
      .filter(|k| visited.map_or(true, |v| !v.contains(k.as_str())))
      .map(String::as_str)
      .collect()
  }

  pub fn is_revisit(&self, node_id: &str, spec: &LoopSpec) -> bool {
    self.visited(node_id, spec).is_some_and(|v| !v.is_empty())
  }

  /// Mark `branch` of the loop at `node_id` consumed. Unknown branch keys are ignored.
  pub fn consume(&mut self, node_id: &str, spec: &LoopSpec, branch: &str) -> MainLoopProgress {
    if !spec.branches.contains_key(branch) {
      return MainLoopProgress::default();
    }
    match spec.parent_loop {
      Some(_) => {
        self.secondary.entry(node_id.to_string()).or_default().insert(branch.to_string());
        MainLoopProgress::default()
      }
      None => {
        let was_empty = self.main.is_empty();
        let inserted = self.main.insert(branch.to_string());
        MainLoopProgress {
          first_branch: was_empty && inserted,
          all_branches: inserted && self.main.len() >= spec.branches.len(),
        }
      }
    }
  }

  #[cfg(test)]
  pub fn main_visited(&self) -> usize {
    self.main.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Button;

  fn spec(keys: &[&str], parent: Option<&str>) -> LoopSpec {
    LoopSpec {
      branches: keys
        .iter()
        .map(|k| (k.to_string(), Button { label: format!("btn_{k}"), target: format!("t_{k}"), action: Default::default() }))
        .collect(),
      exhausted: "out".into(),
      parent_loop: parent.map(str::to_string),
    }
  }

  #[test]
  fn main_loop_reports_first_and_last_branch_once() {
    let s = spec(&["a", "b", "c"], None);
    let mut t = LoopTracker::default();
    assert_eq!(t.remaining("main", &s), vec!["a", "b", "c"]);
    assert!(!t.is_revisit("main", &s));

    let p = t.consume("main", &s, "b");
    assert!(p.first_branch && !p.all_branches);
    assert!(t.is_revisit("main", &s));
    assert_eq!(t.remaining("main", &s), vec!["a", "c"]);

    // picking the same branch again changes nothing
    assert_eq!(t.consume("main", &s, "b"), MainLoopProgress::default());
    assert_eq!(t.consume("main", &s, "a"), MainLoopProgress::default());
    let p = t.consume("main", &s, "c");
    assert!(!p.first_branch && p.all_branches);
    assert!(t.remaining("main", &s).is_empty());
    assert_eq!(t.consume("main", &s, "c"), MainLoopProgress::default());
    assert_eq!(t.main_visited(), 3);
  }

  #[test]
  fn secondary_loops_are_tracked_per_node() {
    let sub = spec(&["x", "y"], Some("main"));
    let mut t = LoopTracker::default();
    t.consume("sub_one", &sub, "x");
    assert_eq!(t.remaining("sub_one", &sub), vec!["y"]);
    assert_eq!(t.remaining("sub_two", &sub), vec!["x", "y"]);
    assert!(!t.is_revisit("sub_two", &sub));
    assert_eq!(t.main_visited(), 0);
    assert_eq!(t.visited("sub_one", &sub).map(BTreeSet::len), Some(1));
  }

  #[test]
  fn unknown_branch_is_ignored() {
    let s = spec(&["a"], None);
    let mut t = LoopTracker::default();
    assert_eq!(t.consume("main", &s, "zzz"), MainLoopProgress::default());
    assert_eq!(t.main_visited(), 0);
  }
}

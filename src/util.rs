//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings (char-boundary aware).
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_every_occurrence() {
    let out = fill_template("{name} studies {major}, right {name}?", &[("name", "Ana"), ("major", "biology")]);
    assert_eq!(out, "Ana studies biology, right Ana?");
  }

  #[test]
  fn fill_template_leaves_unknown_tokens() {
    assert_eq!(fill_template("hi {who}", &[("name", "x")]), "hi {who}");
  }

  #[test]
  fn trunc_for_log_keeps_short_strings() {
    assert_eq!(trunc_for_log("abc", 5), "abc");
    assert!(trunc_for_log("你好世界你好", 2).starts_with("你好…"));
  }
}

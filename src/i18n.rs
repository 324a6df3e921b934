//! Translation lookup: language + text key + substitutions -> localized text.

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::Language;
use crate::util::fill_template;

/// Per-language string tables. Missing keys fall back to the primary language,
/// then to the key itself.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Strings {
  tables: HashMap<Language, HashMap<String, String>>,
}

impl Strings {
  pub fn insert(&mut self, lang: Language, key: &str, text: &str) {
    self.tables.entry(lang).or_default().insert(key.to_string(), text.to_string());
  }

  #[cfg(test)]
  pub fn contains(&self, lang: Language, key: &str) -> bool {
    self.tables.get(&lang).is_some_and(|t| t.contains_key(key))
  }

  pub fn translate(&self, lang: Language, key: &str, subs: &[(&str, &str)]) -> String {
    let raw = self
      .tables
      .get(&lang)
      .and_then(|t| t.get(key))
      .or_else(|| self.tables.get(&Language::PRIMARY).and_then(|t| t.get(key)));
    match raw {
      Some(text) => fill_template(text, subs),
      None => {
        tracing::debug!(target: "engine", lang = lang.code(), %key, "Missing translation key");
        key.to_string()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn strings() -> Strings {
    let mut s = Strings::default();
    s.insert(Language::En, "hello", "Hello, {name}!");
    s.insert(Language::En, "bye", "Bye");
    s.insert(Language::Zh, "hello", "你好，{name}！");
    s
  }

  #[test]
  fn translates_with_substitution() {
    let s = strings();
    assert_eq!(s.translate(Language::Zh, "hello", &[("name", "Li")]), "你好，Li！");
  }

  #[test]
  fn falls_back_to_primary_then_key() {
    let s = strings();
    assert_eq!(s.translate(Language::Zh, "bye", &[]), "Bye");
    assert_eq!(s.translate(Language::Zh, "nope", &[]), "nope");
  }

  #[test]
  fn parses_from_toml_tables() {
    let s: Strings = toml::from_str("[en]\nhi = \"Hi\"\n[zh]\nhi = \"嗨\"\n").unwrap();
    assert_eq!(s.translate(Language::Zh, "hi", &[]), "嗨");
    assert!(s.contains(Language::En, "hi"));
  }
}

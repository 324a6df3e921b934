//! Fire-and-forget export of results to an external form endpoint.
//! No response is consumed; failures are logged and swallowed.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AnalyticsCfg;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportForm {
  pub name: String,
  pub email: String,
  pub institution: String,
  pub score: u32,
}

impl ExportForm {
  /// Form-encoded pairs using the configured field names.
  pub fn fields(&self, cfg: &AnalyticsCfg) -> Vec<(String, String)> {
    vec![
      (cfg.name_field.clone(), self.name.clone()),
      (cfg.email_field.clone(), self.email.clone()),
      (cfg.institution_field.clone(), self.institution.clone()),
      (cfg.score_field.clone(), self.score.to_string()),
    ]
  }
}

/// Spawn the submission and return immediately. Returns false when no endpoint is configured.
pub fn spawn_export(client: reqwest::Client, cfg: &AnalyticsCfg, form: ExportForm) -> bool {
  let Some(url) = cfg.form_url.clone() else {
    debug!(target: "analytics", "No analytics endpoint configured; skipping export");
    return false;
  };
  let fields = form.fields(cfg);
  tokio::spawn(async move {
    match client.post(&url).form(&fields).send().await {
      Ok(res) => info!(target: "analytics", status = %res.status(), score = form.score, "Results exported"),
      Err(e) => warn!(target: "analytics", error = %e, "Result export failed"),
    }
  });
  true
}

#[cfg(test)]
mod tests {
  use super::*;

  fn form() -> ExportForm {
    ExportForm { name: "Ana".into(), email: "ana@example.org".into(), institution: "Uni".into(), score: 420 }
  }

  #[test]
  fn fields_use_configured_names() {
    let cfg = AnalyticsCfg { name_field: "entry.1".into(), ..AnalyticsCfg::default() };
    let fields = form().fields(&cfg);
    assert_eq!(fields[0], ("entry.1".to_string(), "Ana".to_string()));
    assert_eq!(fields[3], ("score".to_string(), "420".to_string()));
  }

  #[tokio::test]
  async fn export_without_endpoint_is_skipped() {
    assert!(!spawn_export(reqwest::Client::new(), &AnalyticsCfg::default(), form()));
  }

  #[tokio::test]
  async fn export_failure_is_swallowed() {
    let cfg = AnalyticsCfg { form_url: Some("http://127.0.0.1:9/form".into()), ..AnalyticsCfg::default() };
    assert!(spawn_export(reqwest::Client::new(), &cfg, form()));
  }
}

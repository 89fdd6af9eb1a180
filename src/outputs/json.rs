//! JSON report output.
//!
//! Reports are grouped by UTC date, one file per run:
//! ```text
//! output_dir/
//! └── 2025-06-01/
//!     ├── ai_ml_report_081500.json
//!     └── ai_ml_report_203012.json
//! ```

use crate::models::Report;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Where the report for `report.generated_at` goes under `output_dir`.
pub fn report_path(output_dir: &Path, report: &Report) -> PathBuf {
    let at = report.generated_at;
    output_dir
        .join(at.format("%Y-%m-%d").to_string())
        .join(format!("ai_ml_report_{}.json", at.format("%H%M%S")))
}

/// Serialize `report` and write it, creating the date directory if needed.
///
/// # Returns
///
/// The path written to.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_report(report: &Report, output_dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;
    let path = report_path(output_dir, report);

    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create report dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), items = report.items.len(), "Wrote JSON report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::NormalizedDate;
    use crate::models::{Item, ScoredItem, Source, SourceSummary};
    use crate::recency::UnknownPolicy;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn report() -> Report {
        let item = Item::new(Source::Arxiv, "Grid agents", "https://arxiv.org/abs/2405.12345");
        Report {
            generated_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 15, 0).unwrap(),
            lookback_days: 30,
            unknown_policy: UnknownPolicy::Keep,
            total_items: 1,
            sources: BTreeMap::from([(Source::Arxiv, SourceSummary { fetched: 1, kept: 1, ..Default::default() })]),
            items: vec![ScoredItem {
                item,
                date: NormalizedDate::Known(Utc.with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap()),
                relevance_score: 4.5,
                relevance_reasons: vec!["Energy AI: smart grid".into()],
            }],
            cache: None,
        }
    }

    #[test]
    fn test_report_path_layout() {
        let path = report_path(Path::new("/out"), &report());
        assert_eq!(path, PathBuf::from("/out/2025-06-01/ai_ml_report_081500.json"));
    }

    #[tokio::test]
    async fn test_write_report_round_trips_as_json() {
        let dir = tempdir().unwrap();
        let path = write_report(&report(), dir.path()).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["lookback_days"], 30);
        assert_eq!(value["unknown_policy"], "keep");
        assert_eq!(value["sources"]["arXiv"]["kept"], 1);
        assert_eq!(value["items"][0]["date"], "2024-05-13T00:00:00Z");
        assert_eq!(value["items"][0]["title"], "Grid agents");
        assert!(value["cache"].is_null());
    }
}

//! CSV row models and loading for retrieval records and their cited
//! source listings.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

/// Substitution placeholders recognized inside query templates.
const COUNTY_SEAT_PLACEHOLDER: &str = "COUNTYSEAT";
const STATE_PLACEHOLDER: &str = "STATE";

/// One retrieval: a query plus the answer text captured for it, if any.
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    pub retrieval_id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default, rename = "CountySeat", alias = "countyseat")]
    pub county_seat: String,
    #[serde(default, rename = "State", alias = "state")]
    pub state: String,
    #[serde(default)]
    pub aio_presence: Option<f64>,
    #[serde(default)]
    pub aio_text: Option<String>,
    #[serde(default)]
    pub formatted_text: Option<String>,
}

impl Record {
    /// Whether the origin page carried an AI Overview for this retrieval.
    pub fn has_answer(&self) -> bool {
        self.aio_presence == Some(1.0)
    }

    /// Query with location placeholders substituted from the row's own
    /// fields. Unknown placeholders are left as-is.
    pub fn formatted_query(&self) -> String {
        self.query
            .trim()
            .replace(COUNTY_SEAT_PLACEHOLDER, self.county_seat.trim())
            .replace(STATE_PLACEHOLDER, self.state.trim())
    }
}

/// One cited or retrieved source attached to a record.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceItem {
    pub retrieval_id: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub source_title: String,
    #[serde(default)]
    pub source_text: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub root_domain: String,
    #[serde(default)]
    pub rank: Option<f64>,
    #[serde(default)]
    pub source_rank: Option<f64>,
    #[serde(default)]
    pub aio_sources_id: Option<String>,
}

impl SourceItem {
    /// Rank used for ordering. Rows exported from different crawls carry
    /// it under one of two columns.
    pub fn effective_rank(&self) -> Option<f64> {
        self.rank.or(self.source_rank)
    }

    /// Human-readable site name: explicit name, then root domain, then
    /// the URL host with any `www.` prefix dropped.
    pub fn display_name(&self) -> String {
        let name = self.source_name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        let domain = self.root_domain.trim();
        if !domain.is_empty() {
            return domain.to_string();
        }
        url::Url::parse(self.source_url.trim())
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .map(|h| h.trim_start_matches("www.").to_string())
            .unwrap_or_default()
    }
}

pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open retrievals CSV {}", path.display()))?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: Record =
            row.with_context(|| format!("malformed row in {}", path.display()))?;
        records.push(record);
    }
    Ok(records)
}

/// Source rows are best-effort: a malformed row is logged and skipped so
/// one bad export line cannot sink the whole run.
pub fn load_sources(path: &Path) -> Result<Vec<SourceItem>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open sources CSV {}", path.display()))?;
    let mut items = Vec::new();
    for (i, row) in reader.deserialize().enumerate() {
        match row {
            Ok(item) => items.push(item),
            Err(e) => warn!("skipping source row {} in {}: {}", i + 2, path.display(), e),
        }
    }
    Ok(items)
}

/// Group sources by retrieval id, preserving file order within each group.
pub fn group_by_record(items: &[SourceItem]) -> HashMap<&str, Vec<&SourceItem>> {
    let mut groups: HashMap<&str, Vec<&SourceItem>> = HashMap::new();
    for item in items {
        groups.entry(item.retrieval_id.as_str()).or_default().push(item);
    }
    groups
}

/// Count distinct cited-source ids per retrieval. Rows without an id are
/// retrieved-only and do not count toward the citation cap.
pub fn distinct_cited_counts(items: &[SourceItem]) -> HashMap<&str, usize> {
    let mut seen: HashMap<&str, HashSet<&str>> = HashMap::new();
    for item in items {
        if let Some(id) = item.aio_sources_id.as_deref() {
            seen.entry(item.retrieval_id.as_str()).or_default().insert(id);
        }
    }
    seen.into_iter().map(|(k, v)| (k, v.len())).collect()
}

/// The `cap` best-ranked items, ranked ascending with unranked rows last.
/// The sort is stable so ties and unranked rows keep file order.
pub fn top_ranked<'a>(items: &[&'a SourceItem], cap: usize) -> Vec<&'a SourceItem> {
    let mut ordered: Vec<&SourceItem> = items.to_vec();
    ordered.sort_by(|a, b| match (a.effective_rank(), b.effective_rank()) {
        (Some(ra), Some(rb)) => ra.partial_cmp(&rb).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    ordered.truncate(cap);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, rank: Option<f64>, source_rank: Option<f64>) -> SourceItem {
        SourceItem {
            retrieval_id: id.to_string(),
            source_url: String::new(),
            source_title: String::new(),
            source_text: String::new(),
            source_name: String::new(),
            root_domain: String::new(),
            rank,
            source_rank,
            aio_sources_id: None,
        }
    }

    #[test]
    fn query_placeholders_are_substituted() {
        let record = Record {
            retrieval_id: "r1".into(),
            query: "best parks in COUNTYSEAT, STATE".into(),
            county_seat: " Elgin ".into(),
            state: "Illinois".into(),
            aio_presence: None,
            aio_text: None,
            formatted_text: None,
        };
        assert_eq!(record.formatted_query(), "best parks in Elgin, Illinois");
    }

    #[test]
    fn display_name_falls_back_to_url_host() {
        let mut s = item("r1", None, None);
        s.source_url = "https://WWW.Example.org/page".into();
        assert_eq!(s.display_name(), "example.org");
        s.root_domain = "example.org".into();
        assert_eq!(s.display_name(), "example.org");
        s.source_name = "Example".into();
        assert_eq!(s.display_name(), "Example");
    }

    #[test]
    fn ranking_is_ascending_stable_with_unranked_last() {
        let a = item("r", None, None);
        let b = item("r", Some(2.0), None);
        let c = item("r", None, Some(1.0));
        let d = item("r", None, None);
        let e = item("r", Some(1.0), None);
        let refs = vec![&a, &b, &c, &d, &e];
        let top = top_ranked(&refs, 10);
        let ranks: Vec<Option<f64>> = top.iter().map(|s| s.effective_rank()).collect();
        assert_eq!(
            ranks,
            vec![Some(1.0), Some(1.0), Some(2.0), None, None]
        );
        // ties keep file order
        assert!(std::ptr::eq(top[0], &c));
        assert!(std::ptr::eq(top[1], &e));
        assert!(std::ptr::eq(top[3], &a));
    }

    #[test]
    fn cap_keeps_the_best_ranked_prefix() {
        let a = item("r", Some(3.0), None);
        let b = item("r", Some(1.0), None);
        let c = item("r", Some(2.0), None);
        let refs = vec![&a, &b, &c];
        let top = top_ranked(&refs, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].effective_rank(), Some(1.0));
        assert_eq!(top[1].effective_rank(), Some(2.0));
    }

    #[test]
    fn cited_counts_dedupe_source_ids() {
        let mut a = item("r1", None, None);
        a.aio_sources_id = Some("s1".into());
        let mut b = item("r1", None, None);
        b.aio_sources_id = Some("s1".into());
        let mut c = item("r1", None, None);
        c.aio_sources_id = Some("s2".into());
        let d = item("r1", None, None);
        let items = vec![a, b, c, d];
        let counts = distinct_cited_counts(&items);
        assert_eq!(counts.get("r1"), Some(&2));
    }
}

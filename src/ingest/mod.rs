// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod timestamp;
pub mod types;

use crate::classify::{canonical_category, requires_graduate_degree, DegreeHints};
use crate::ingest::timestamp::{parse_timestamp_value, TimestampField};
use crate::ingest::types::{Listing, RejectReason};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

const MAX_FIELD_CHARS: usize = 1500;

/// Clean a text field: decode entities, strip tags, fold whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let decoded = html_escape::decode_html_entities(s);

    // 2) Strip HTML tags
    let stripped = RE_TAGS.replace_all(&decoded, "");

    // 3) Normalize “ ” ‘ ’ to ASCII quotes
    let quoted = stripped
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (nbsp included)
    let mut out = RE_WS.replace_all(&quoted, " ").trim().to_string();

    if out.chars().count() > MAX_FIELD_CHARS {
        out = out.chars().take(MAX_FIELD_CHARS).collect();
    }
    out
}

/// Result of normalizing one fetched record set.
#[derive(Debug, Default, Clone)]
pub struct NormalizedBatch {
    pub listings: Vec<Listing>,
    pub rejected: Vec<RejectReason>,
}

impl NormalizedBatch {
    pub fn rejected_count(&self, reason: RejectReason) -> usize {
        self.rejected.iter().filter(|r| **r == reason).count()
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let raw = match obj.get(key)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let cleaned = normalize_text(&raw);
    (!cleaned.is_empty()).then_some(cleaned)
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| text_field(obj, k))
}

fn text_list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(normalize_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => {
            let s = normalize_text(s);
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s]
            }
        }
        _ => Vec::new(),
    }
}

fn is_flagged_off(obj: &Map<String, Value>, key: &str) -> bool {
    matches!(obj.get(key), Some(Value::Bool(false)))
}

fn read_timestamp(
    obj: &Map<String, Value>,
    key: &str,
    source: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, RejectReason> {
    match parse_timestamp_value(obj.get(key)) {
        TimestampField::Parsed(dt) => Ok(Some(dt)),
        TimestampField::Absent => Ok(None),
        TimestampField::Unparsable(raw) => {
            tracing::debug!(target: "ingest", source, field = key, raw = %raw, "unparsable timestamp, treated as absent");
            Ok(None)
        }
        TimestampField::Malformed => Err(RejectReason::MalformedTimestamp),
    }
}

/// Turn one raw record into a `Listing`, or say why it was rejected.
pub fn normalize_record(raw: &Value, source: &str) -> Result<Listing, RejectReason> {
    let obj = raw.as_object().ok_or(RejectReason::NotARecord)?;

    let id = text_field(obj, "id");
    let url = first_text(obj, &["url", "application_link"]);
    let company = first_text(obj, &["company_name", "company"]).unwrap_or_default();
    let title = text_field(obj, "title").unwrap_or_default();

    let has_identity =
        url.is_some() || id.is_some() || (!company.is_empty() && !title.is_empty());
    if !has_identity {
        return Err(RejectReason::MissingIdentity);
    }

    let date_posted = read_timestamp(obj, "date_posted", source)?;
    let date_updated = read_timestamp(obj, "date_updated", source)?;

    if is_flagged_off(obj, "active") || is_flagged_off(obj, "is_visible") {
        return Err(RejectReason::Inactive);
    }

    let category_raw = text_field(obj, "category");
    let category = canonical_category(category_raw.as_deref(), &title);

    let degrees = text_list(obj, "degrees");
    let degree_text = first_text(obj, &["degree", "education"]);
    let description = text_field(obj, "description");
    let requires_graduate_degree = requires_graduate_degree(DegreeHints {
        title: &title,
        description: description.as_deref(),
        degree_text: degree_text.as_deref(),
        degrees: &degrees,
    });

    let season = text_field(obj, "season").or_else(|| text_list(obj, "terms").into_iter().next());

    Ok(Listing {
        id,
        url,
        company,
        title,
        category_raw,
        category,
        requires_graduate_degree,
        locations: text_list(obj, "locations"),
        season,
        date_posted,
        date_updated,
        source: source.to_string(),
    })
}

/// Normalize a whole record set. Rejections are counted, never fatal.
pub fn normalize_batch<'a, I>(values: I, source: &str) -> NormalizedBatch
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut batch = NormalizedBatch::default();
    for v in values {
        match normalize_record(v, source) {
            Ok(l) => batch.listings.push(l),
            Err(reason) => {
                tracing::debug!(target: "ingest", source, %reason, "record rejected");
                batch.rejected.push(reason);
            }
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Category;
    use serde_json::json;

    #[test]
    fn normalize_text_folds_and_unescapes() {
        assert_eq!(normalize_text("  Acme&nbsp;&amp;\n<b>Co</b>  "), "Acme & Co");
    }

    #[test]
    fn fallback_fields_are_used() {
        let v = json!({
            "company": "Acme",
            "title": "Backend Intern",
            "application_link": "https://acme.example/jobs/1",
            "terms": ["Summer 2026", "Fall 2026"],
        });
        let l = normalize_record(&v, "o/r").unwrap();
        assert_eq!(l.company, "Acme");
        assert_eq!(l.url.as_deref(), Some("https://acme.example/jobs/1"));
        assert_eq!(l.season.as_deref(), Some("Summer 2026"));
        assert_eq!(l.category, Category::SoftwareEngineering);
    }

    #[test]
    fn rejects_are_tagged() {
        assert_eq!(normalize_record(&json!([1]), "s"), Err(RejectReason::NotARecord));
        assert_eq!(
            normalize_record(&json!({"company_name": "Acme"}), "s"),
            Err(RejectReason::MissingIdentity)
        );
        assert_eq!(
            normalize_record(&json!({"id": "x", "date_posted": {"at": 1}}), "s"),
            Err(RejectReason::MalformedTimestamp)
        );
        assert_eq!(
            normalize_record(&json!({"id": "x", "is_visible": false}), "s"),
            Err(RejectReason::Inactive)
        );
    }

    #[test]
    fn batch_keeps_going_after_rejects() {
        let values = vec![json!(1), json!({"id": "a"}), json!({"title": "t"}), json!({"id": "b"})];
        let batch = normalize_batch(&values, "s");
        assert_eq!(batch.listings.len(), 2);
        assert_eq!(batch.rejected.len(), 2);
        assert_eq!(batch.rejected_count(RejectReason::MissingIdentity), 1);
    }
}

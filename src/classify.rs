//! # Category / Degree Classifier
//!
//! Maps free-text category labels onto a small closed set of canonical
//! categories and flags listings that are only open to graduate students.
//!
//! - Fixed alias table for raw labels (case-insensitive, punctuation-tolerant).
//! - Title keyword fallback when the label is absent or unknown.
//! - Graduate predicate over explicit degree lists and free-text hints.
//! - Filter policies (`CategoryPolicy`, `GraduateFilter`) used by the pipeline.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Canonical category set. `Other` is the catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Software Engineering")]
    SoftwareEngineering,
    #[serde(rename = "Data Science, AI & Machine Learning")]
    DataScienceAiMl,
    #[serde(rename = "Hardware Engineering")]
    HardwareEngineering,
    #[serde(rename = "Quantitative Finance")]
    QuantitativeFinance,
    #[serde(rename = "Product Management")]
    ProductManagement,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::SoftwareEngineering,
        Category::DataScienceAiMl,
        Category::HardwareEngineering,
        Category::QuantitativeFinance,
        Category::ProductManagement,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::SoftwareEngineering => "Software Engineering",
            Category::DataScienceAiMl => "Data Science, AI & Machine Learning",
            Category::HardwareEngineering => "Hardware Engineering",
            Category::QuantitativeFinance => "Quantitative Finance",
            Category::ProductManagement => "Product Management",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    /// Accepts canonical labels and every alias of the lookup table.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup_label(s).ok_or_else(|| anyhow::anyhow!("unknown category: {s:?}"))
    }
}

// raw label (normalized) -> canonical
static LABEL_TABLE: Lazy<HashMap<&'static str, Category>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for (alias, cat) in [
        ("software engineering", Category::SoftwareEngineering),
        ("software engineer", Category::SoftwareEngineering),
        ("software", Category::SoftwareEngineering),
        ("swe", Category::SoftwareEngineering),
        ("software development", Category::SoftwareEngineering),
        ("data science, ai & machine learning", Category::DataScienceAiMl),
        ("data science ai machine learning", Category::DataScienceAiMl),
        ("data science", Category::DataScienceAiMl),
        ("ai/ml", Category::DataScienceAiMl),
        ("ai", Category::DataScienceAiMl),
        ("ml", Category::DataScienceAiMl),
        ("machine learning", Category::DataScienceAiMl),
        ("data", Category::DataScienceAiMl),
        ("hardware engineering", Category::HardwareEngineering),
        ("hardware", Category::HardwareEngineering),
        ("electrical engineering", Category::HardwareEngineering),
        ("quantitative finance", Category::QuantitativeFinance),
        ("quant", Category::QuantitativeFinance),
        ("quantitative", Category::QuantitativeFinance),
        ("product management", Category::ProductManagement),
        ("product", Category::ProductManagement),
        ("pm", Category::ProductManagement),
        ("other", Category::Other),
    ] {
        m.insert(alias, cat);
    }
    m
});

fn normalize_label(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn lookup_label(raw: &str) -> Option<Category> {
    let key = normalize_label(raw);
    if key.is_empty() {
        return None;
    }
    LABEL_TABLE.get(key.as_str()).copied()
}

// Title keyword rules, evaluated in order; first match wins.
static TITLE_RULES: Lazy<Vec<(Regex, Category)>> = Lazy::new(|| {
    let rules: [(&str, Category); 5] = [
        (
            r"(?i)\b(data scien(ce|tist)|artificial intelligence|ai|ai/ml|machine learning|ml|data analy(tics|st)|research eng\w*|research sci\w*|nlp|computer vision|data eng\w*)\b",
            Category::DataScienceAiMl,
        ),
        (
            r"(?i)\b(software|swe|product engineer|full[\s-]?stack|front[\s-]?end|back[\s-]?end|founding engineer|mobile (dev\w*|engineer)|forward[\s-]deployed|devops|site reliability|platform engineer)\b",
            Category::SoftwareEngineering,
        ),
        (
            r"(?i)\b(hardware|electrical eng\w*|embedded|firmware|fpga|asic|vlsi|circuit\w*|silicon|chip design|rf engineer)\b",
            Category::HardwareEngineering,
        ),
        (
            r"(?i)\b(quant\w*|trading|trader|algorithmic)\b",
            Category::QuantitativeFinance,
        ),
        (
            r"(?i)\b(product manag\w*|product owner|apm)\b",
            Category::ProductManagement,
        ),
    ];
    rules
        .into_iter()
        .map(|(re, cat)| (Regex::new(re).expect("title rule regex"), cat))
        .collect()
});

/// Keyword classification of a title. `None` when nothing matches.
pub fn classify_title(title: &str) -> Option<Category> {
    TITLE_RULES
        .iter()
        .find(|(re, _)| re.is_match(title))
        .map(|(_, cat)| *cat)
}

/// Canonicalize a category.
///
/// 1. Raw label found in the alias table → that category.
/// 2. Otherwise (absent or unknown label) → title keywords.
/// 3. Otherwise → `Other`.
pub fn canonical_category(raw: Option<&str>, title: &str) -> Category {
    if let Some(cat) = raw.and_then(lookup_label) {
        return cat;
    }
    classify_title(title).unwrap_or(Category::Other)
}

static GRAD_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(ph\.?\s?d\.?|doctora(l|te)|master'?s|masters|m\.s\.|mba|graduate (student|degree|program|research|studies)|post-?doc\w*)",
    )
    .expect("graduate hint regex")
});

static GRAD_DEGREE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(ph\.?\s?d|doctora|master|m\.?s\b|mba|post-?doc|graduate)").expect("degree regex")
});

/// Inputs of the graduate-degree predicate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DegreeHints<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub degree_text: Option<&'a str>,
    pub degrees: &'a [String],
}

/// True when the listing is only open to graduate-degree students.
///
/// An explicit, non-empty `degrees` list decides alone: every entry must be
/// graduate-level. Without it, free-text hints in title, description and
/// degree/education text are used.
pub fn requires_graduate_degree(hints: DegreeHints<'_>) -> bool {
    let listed: Vec<&str> = hints
        .degrees
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .collect();
    if !listed.is_empty() {
        return listed.iter().all(|d| GRAD_DEGREE.is_match(d));
    }

    [Some(hints.title), hints.description, hints.degree_text]
        .into_iter()
        .flatten()
        .any(|text| GRAD_HINT.is_match(text))
}

/// Category allow-list plus the explicit "Other" exclusion switch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPolicy {
    /// Empty = every category allowed.
    pub allow: BTreeSet<Category>,
    pub exclude_other: bool,
}

impl CategoryPolicy {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn only(cats: impl IntoIterator<Item = Category>) -> Self {
        Self {
            allow: cats.into_iter().collect(),
            exclude_other: false,
        }
    }

    pub fn excluding_other(mut self) -> Self {
        self.exclude_other = true;
        self
    }

    pub fn permits(&self, cat: Category) -> bool {
        if self.exclude_other && cat == Category::Other {
            return false;
        }
        self.allow.is_empty() || self.allow.contains(&cat)
    }
}

/// Degree-level filter policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GraduateFilter {
    #[default]
    ExcludeGraduate,
    AllowAll,
    GraduateOnly,
}

impl GraduateFilter {
    pub fn permits(self, requires_graduate: bool) -> bool {
        match self {
            GraduateFilter::ExcludeGraduate => !requires_graduate,
            GraduateFilter::AllowAll => true,
            GraduateFilter::GraduateOnly => requires_graduate,
        }
    }
}

impl FromStr for GraduateFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "exclude graduate" | "exclude" | "undergrad" => Ok(GraduateFilter::ExcludeGraduate),
            "allow all" | "all" | "either" => Ok(GraduateFilter::AllowAll),
            "graduate only" | "graduate" | "grad" => Ok(GraduateFilter::GraduateOnly),
            other => Err(anyhow::anyhow!("unknown graduate filter mode: {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_lookup_is_case_and_punct_insensitive() {
        assert_eq!(
            canonical_category(Some("  SOFTWARE_engineering "), "whatever"),
            Category::SoftwareEngineering
        );
        assert_eq!(
            canonical_category(Some("Data Science, AI & Machine Learning"), ""),
            Category::DataScienceAiMl
        );
    }

    #[test]
    fn unknown_label_falls_back_to_title() {
        assert_eq!(
            canonical_category(Some("Internships"), "Firmware Intern"),
            Category::HardwareEngineering
        );
        assert_eq!(canonical_category(Some("Internships"), "Barista"), Category::Other);
    }

    #[test]
    fn ml_needs_word_boundary() {
        // "html" must not look like "ml"
        assert_eq!(classify_title("HTML Email Designer"), None);
        assert_eq!(classify_title("ML Intern"), Some(Category::DataScienceAiMl));
    }

    #[test]
    fn explicit_degrees_decide() {
        let grad = vec!["Master's".to_string(), "PhD".to_string()];
        let mixed = vec!["Bachelor's".to_string(), "Master's".to_string()];
        assert!(requires_graduate_degree(DegreeHints {
            title: "Research Intern",
            degrees: &grad,
            ..Default::default()
        }));
        assert!(!requires_graduate_degree(DegreeHints {
            title: "PhD Research Intern",
            degrees: &mixed,
            ..Default::default()
        }));
    }

    #[test]
    fn policy_other_exclusion() {
        let p = CategoryPolicy::allow_all().excluding_other();
        assert!(p.permits(Category::QuantitativeFinance));
        assert!(!p.permits(Category::Other));
    }

    #[test]
    fn graduate_filter_parse() {
        assert_eq!(
            "exclude-graduate".parse::<GraduateFilter>().unwrap(),
            GraduateFilter::ExcludeGraduate
        );
        assert_eq!("ALLOW_ALL".parse::<GraduateFilter>().unwrap(), GraduateFilter::AllowAll);
        assert!("sometimes".parse::<GraduateFilter>().is_err());
    }
}

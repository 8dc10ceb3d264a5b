// src/format.rs
//! Line rendering and size-bounded message batching.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::ingest::types::Listing;

pub const DEFAULT_BUDGET: usize = 3900;
/// Smallest budget `pack_lines` packs to; smaller requests are raised to it.
pub const MIN_BUDGET: usize = 64;
pub const CONT_PREFIX: &str = "(cont.)\n\n";
pub const TRUNCATION_MARKER: &str = "… [truncated]";
pub const MULTI_LOCATION: &str = "Multi-location";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// One plain-text line per listing (direct alerts).
    Condensed,
    /// HTML, bold company and posting date (digests).
    Verbose,
}

impl RenderMode {
    pub fn text_format(self) -> TextFormat {
        match self {
            RenderMode::Condensed => TextFormat::Plain,
            RenderMode::Verbose => TextFormat::Html,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Html,
}

/// One outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChunk {
    pub text: String,
    /// Indices into the `lines` slice given to `pack_lines`.
    pub line_indices: Vec<usize>,
    pub format: TextFormat,
}

impl MessageChunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

static US_STATES: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let pairs: [(&str, &str); 51] = [
        ("AL", "Alabama"),
        ("AK", "Alaska"),
        ("AZ", "Arizona"),
        ("AR", "Arkansas"),
        ("CA", "California"),
        ("CO", "Colorado"),
        ("CT", "Connecticut"),
        ("DE", "Delaware"),
        ("DC", "District of Columbia"),
        ("FL", "Florida"),
        ("GA", "Georgia"),
        ("HI", "Hawaii"),
        ("ID", "Idaho"),
        ("IL", "Illinois"),
        ("IN", "Indiana"),
        ("IA", "Iowa"),
        ("KS", "Kansas"),
        ("KY", "Kentucky"),
        ("LA", "Louisiana"),
        ("ME", "Maine"),
        ("MD", "Maryland"),
        ("MA", "Massachusetts"),
        ("MI", "Michigan"),
        ("MN", "Minnesota"),
        ("MS", "Mississippi"),
        ("MO", "Missouri"),
        ("MT", "Montana"),
        ("NE", "Nebraska"),
        ("NV", "Nevada"),
        ("NH", "New Hampshire"),
        ("NJ", "New Jersey"),
        ("NM", "New Mexico"),
        ("NY", "New York"),
        ("NC", "North Carolina"),
        ("ND", "North Dakota"),
        ("OH", "Ohio"),
        ("OK", "Oklahoma"),
        ("OR", "Oregon"),
        ("PA", "Pennsylvania"),
        ("RI", "Rhode Island"),
        ("SC", "South Carolina"),
        ("SD", "South Dakota"),
        ("TN", "Tennessee"),
        ("TX", "Texas"),
        ("UT", "Utah"),
        ("VT", "Vermont"),
        ("VA", "Virginia"),
        ("WA", "Washington"),
        ("WV", "West Virginia"),
        ("WI", "Wisconsin"),
        ("WY", "Wyoming"),
    ];
    let mut m = HashMap::new();
    for (code, name) in pairs {
        m.insert(code.to_ascii_lowercase(), code);
        m.insert(name.to_ascii_lowercase(), code);
    }
    m
});

/// US state code of a location string ("San Francisco, CA" → "CA").
pub fn us_state_of(location: &str) -> Option<&'static str> {
    location
        .rsplit(',')
        .map(|seg| seg.trim().to_ascii_lowercase())
        .filter(|seg| !matches!(seg.as_str(), "usa" | "us" | "united states"))
        .find_map(|seg| US_STATES.get(&seg).copied())
}

/// Location label for a line. `None` when there is nothing to show.
pub fn format_location(locations: &[String], mode: RenderMode) -> Option<String> {
    let valid: Vec<&str> = locations
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    match valid.as_slice() {
        [] => None,
        [one] => Some((*one).to_string()),
        many => {
            if mode == RenderMode::Condensed {
                let mut states = many.iter().map(|l| us_state_of(l));
                if let Some(Some(first)) = states.next() {
                    if states.all(|s| s == Some(first)) {
                        return Some(first.to_string());
                    }
                }
            }
            Some(MULTI_LOCATION.to_string())
        }
    }
}

fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn esc(s: &str) -> String {
    html_escape::encode_text(&one_line(s)).into_owned()
}

/// Render one listing as exactly one line.
///
/// `• {company} — {title} [{season} | {location}] [{owner}] {url}`
pub fn render_line(listing: &Listing, mode: RenderMode) -> String {
    let bracket: Vec<String> = [
        listing.season.clone(),
        format_location(&listing.locations, mode),
    ]
    .into_iter()
    .flatten()
    .map(|s| one_line(&s))
    .filter(|s| !s.is_empty())
    .collect();
    let bracket = (!bracket.is_empty()).then(|| bracket.join(" | "));
    let owner = listing.source_owner();
    let url = listing.url.as_deref().map(one_line).unwrap_or_default();

    let mut parts: Vec<String> = Vec::with_capacity(8);
    match mode {
        RenderMode::Condensed => {
            parts.push(format!("• {} — {}", one_line(&listing.company), one_line(&listing.title)));
            if let Some(b) = bracket {
                parts.push(format!("[{b}]"));
            }
            if !owner.is_empty() {
                parts.push(format!("[{}]", one_line(owner)));
            }
        }
        RenderMode::Verbose => {
            let company = if listing.company.trim().is_empty() {
                String::new()
            } else {
                format!("<b>{}</b>", esc(&listing.company))
            };
            parts.push(format!("• {company} — {}", esc(&listing.title)));
            if let Some(b) = bracket {
                parts.push(format!("[{}]", esc(&b)));
            }
            if !owner.is_empty() {
                parts.push(format!("[{}]", esc(owner)));
            }
            if let Some(ts) = listing.effective_timestamp() {
                parts.push(format!("({})", ts.format("%Y-%m-%d")));
            }
        }
    }
    if !url.is_empty() {
        parts.push(match mode {
            RenderMode::Condensed => url,
            RenderMode::Verbose => html_escape::encode_text(&url).into_owned(),
        });
    }
    parts.join(" ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut `s` to at most `max` characters, ending with the truncation marker
/// when there is room for it.
fn truncate_to(s: &str, max: usize) -> String {
    if char_len(s) <= max {
        return s.to_string();
    }
    let marker_len = char_len(TRUNCATION_MARKER);
    if max <= marker_len {
        return s.chars().take(max).collect();
    }
    let mut out: String = s.chars().take(max - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

struct Pending {
    prefix: String,
    body: Vec<String>,
    indices: Vec<usize>,
    len: usize,
}

impl Pending {
    fn new(prefix: String) -> Self {
        let len = char_len(&prefix);
        Self {
            prefix,
            body: Vec::new(),
            indices: Vec::new(),
            len,
        }
    }

    fn len_with(&self, line: &str) -> usize {
        let sep = usize::from(!self.body.is_empty());
        self.len + sep + char_len(line)
    }

    fn push(&mut self, idx: usize, line: String) {
        self.len = self.len_with(&line);
        self.body.push(line);
        self.indices.push(idx);
    }

    fn finish(self, format: TextFormat) -> MessageChunk {
        MessageChunk {
            text: format!("{}{}", self.prefix, self.body.join("\n")),
            line_indices: self.indices,
            format,
        }
    }
}

/// Pack rendered lines into chunks of at most `budget` characters.
///
/// The first chunk opens with `header\n\n` (when a header is given), every
/// later one with `(cont.)\n\n`. Lines are never split across chunks; a line
/// that cannot fit even in an empty chunk is truncated. No lines, no chunks.
///
/// A `budget` below [`MIN_BUDGET`] is raised to it, so every line keeps some
/// of its text next to either prefix.
pub fn pack_lines(
    header: Option<&str>,
    lines: &[String],
    budget: usize,
    format: TextFormat,
) -> Vec<MessageChunk> {
    if lines.is_empty() {
        return Vec::new();
    }
    let budget = budget.max(MIN_BUDGET);
    let first_prefix = match header.map(str::trim).filter(|h| !h.is_empty()) {
        Some(h) => format!("{}\n\n", truncate_to(h, budget / 2)),
        None => String::new(),
    };

    let mut chunks = Vec::new();
    let mut cur = Pending::new(first_prefix);
    for (idx, line) in lines.iter().enumerate() {
        if !cur.body.is_empty() && cur.len_with(line) > budget {
            let done = std::mem::replace(&mut cur, Pending::new(CONT_PREFIX.to_string()));
            chunks.push(done.finish(format));
        }
        let line = if cur.len_with(line) > budget {
            truncate_to(line, budget.saturating_sub(cur.len))
        } else {
            line.clone()
        };
        cur.push(idx, line);
    }
    chunks.push(cur.finish(format));
    chunks
}

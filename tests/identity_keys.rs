// tests/identity_keys.rs
use listing_watch::classify::Category;
use listing_watch::identity::normalize_url;
use listing_watch::{canonical_key, Listing};

fn listing(id: Option<&str>, url: Option<&str>, company: &str, title: &str) -> Listing {
    Listing {
        id: id.map(str::to_string),
        url: url.map(str::to_string),
        company: company.into(),
        title: title.into(),
        category_raw: None,
        category: Category::Other,
        requires_graduate_degree: false,
        locations: vec![],
        season: None,
        date_posted: None,
        date_updated: None,
        source: "o/r".into(),
    }
}

#[test]
fn url_beats_id_beats_company_title() {
    let with_url = listing(Some("7"), Some("https://x.example/j/1/"), "X", "Intern");
    assert_eq!(canonical_key(&with_url).as_str(), "https://x.example/j/1");

    let with_id = listing(Some(" 7 "), None, "X", "Intern");
    assert_eq!(canonical_key(&with_id).as_str(), "id:7");

    let bare = listing(None, None, "  ACME   Corp ", "Software  Intern");
    assert_eq!(canonical_key(&bare).as_str(), "acme corp:software intern");
}

#[test]
fn tracking_params_do_not_change_identity() {
    let a = listing(None, Some("https://jobs.lever.co/acme/123?lever-source=Simplify&utm_medium=x"), "", "");
    let b = listing(None, Some("https://JOBS.lever.co/acme/123/#apply"), "", "");
    assert_eq!(canonical_key(&a), canonical_key(&b));
}

#[test]
fn meaningful_params_are_kept_sorted() {
    assert_eq!(
        normalize_url("https://boards.example/apply?job=9&board=acme&gh_src=abc").as_deref(),
        Some("https://boards.example/apply?board=acme&job=9")
    );
    assert_ne!(
        normalize_url("https://boards.example/apply?job=9"),
        normalize_url("https://boards.example/apply?job=10")
    );
}

#[test]
fn blank_url_falls_through_to_id() {
    let l = listing(Some("abc"), Some("   "), "X", "Y");
    assert_eq!(canonical_key(&l).as_str(), "id:abc");
}

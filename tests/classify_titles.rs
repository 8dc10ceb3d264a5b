// tests/classify_titles.rs
use listing_watch::classify::{
    canonical_category, classify_title, requires_graduate_degree, Category, DegreeHints,
    GraduateFilter,
};

#[test]
fn handpicked_titles() {
    let cases = [
        ("Hardware Engineer Intern", Some(Category::HardwareEngineering)),
        ("Software Engineering Intern", Some(Category::SoftwareEngineering)),
        ("Machine Learning Intern", Some(Category::DataScienceAiMl)),
        ("Quantitative Trading Intern", Some(Category::QuantitativeFinance)),
        ("Associate Product Manager Intern", Some(Category::ProductManagement)),
        ("Embedded Firmware Intern", Some(Category::HardwareEngineering)),
        ("Barista Intern", None),
    ];
    for (title, want) in cases {
        assert_eq!(classify_title(title), want, "title: {title}");
    }
}

#[test]
fn known_label_wins_over_title() {
    assert_eq!(
        canonical_category(Some("Quant"), "Software Engineering Intern"),
        Category::QuantitativeFinance
    );
    assert_eq!(canonical_category(Some("AI/ML"), "x"), Category::DataScienceAiMl);
}

#[test]
fn unknown_label_falls_back_to_title_then_other() {
    assert_eq!(
        canonical_category(Some("Robots & Stuff"), "Hardware Engineer Intern"),
        Category::HardwareEngineering
    );
    assert_eq!(canonical_category(None, "Marketing Intern"), Category::Other);
    assert_eq!(canonical_category(Some("ai_ml"), "x"), Category::Other);
}

#[test]
fn graduate_hints() {
    let phd = vec!["PhD".to_string()];
    assert!(requires_graduate_degree(DegreeHints {
        title: "Research Intern",
        degrees: &phd,
        ..Default::default()
    }));

    let mixed = vec!["Bachelor's".to_string(), "Master's".to_string()];
    assert!(!requires_graduate_degree(DegreeHints {
        title: "Research Intern",
        degrees: &mixed,
        ..Default::default()
    }));

    assert!(requires_graduate_degree(DegreeHints {
        title: "PhD Research Intern",
        ..Default::default()
    }));
    assert!(!requires_graduate_degree(DegreeHints {
        title: "Software Engineering Intern",
        ..Default::default()
    }));
}

#[test]
fn graduate_filter_modes() {
    assert!(GraduateFilter::ExcludeGraduate.permits(false));
    assert!(!GraduateFilter::ExcludeGraduate.permits(true));
    assert!(GraduateFilter::AllowAll.permits(true));
    assert!(!GraduateFilter::GraduateOnly.permits(false));
    assert_eq!("grad".parse::<GraduateFilter>().unwrap(), GraduateFilter::GraduateOnly);
    assert!("sometimes".parse::<GraduateFilter>().is_err());
}

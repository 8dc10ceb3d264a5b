// tests/ingest_config.rs
use listing_watch::change_detector::BackfillDirective;
use listing_watch::classify::Category;
use listing_watch::ingest::config::load_sources_from;
use listing_watch::window::TimeFilter;
use listing_watch::WatchConfig;
use std::{env, fs};

const TOUCHED: &[&str] = &[
    "WATCH_CONFIG_PATH",
    "WATCH_SOURCES_PATH",
    "TARGET_SOURCES",
    "TARGET_REPOS",
    "WINDOW_HOURS",
    "FORCE_WINDOW_HOURS",
    "RESET_BASELINE",
    "BACK_ONE",
];

fn clear_env() {
    for k in TOUCHED {
        env::remove_var(k);
    }
}

#[test]
fn source_files_in_toml_and_json() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("sources.toml");
    fs::write(
        &p_toml,
        r#"
sources = [" SimplifyJobs/Summer2026-Internships ", "", "vanshb03/Summer2026-Internships", "simplifyjobs/summer2026-internships"]
"#,
    )
    .unwrap();
    assert_eq!(
        load_sources_from(&p_toml).unwrap(),
        vec![
            "SimplifyJobs/Summer2026-Internships".to_string(),
            "vanshb03/Summer2026-Internships".to_string()
        ]
    );

    let p_json = dir.path().join("sources.json");
    fs::write(&p_json, r#"["a/one", " b/two  ", ""]"#).unwrap();
    assert_eq!(
        load_sources_from(&p_json).unwrap(),
        vec!["a/one".to_string(), "b/two".to_string()]
    );

    let bad = dir.path().join("sources.yaml");
    fs::write(&bad, "- a/one\n").unwrap();
    assert!(load_sources_from(&bad).is_err());
}

#[serial_test::serial]
#[test]
fn load_layers_file_sources_then_env() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // nothing on disk: built-in defaults
    let cfg = WatchConfig::load().unwrap();
    assert_eq!(cfg.sources.len(), 2);
    assert_eq!(cfg.seen_ttl_days, 14);

    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("watch.toml"),
        r#"
sources = ["from/toml"]
seen_ttl_days = 7
graduate_filter = "allow-all"

[digest]
categories = ["Software Engineering", "quant"]
exclude_other = true
max_items = 20
window_hours = 6.0
"#,
    )
    .unwrap();
    let cfg = WatchConfig::load().unwrap();
    assert_eq!(cfg.sources, vec!["from/toml".to_string()]);
    assert_eq!(cfg.seen_ttl_days, 7);
    assert_eq!(
        cfg.digest.categories,
        vec![Category::SoftwareEngineering, Category::QuantitativeFinance]
    );
    assert_eq!(cfg.time_filter(cfg.digest.window_hours), TimeFilter::Hours(6.0));

    // a source list file replaces the configured sources
    fs::write(cfg_dir.join("sources.toml"), r#"sources = ["from/list"]"#).unwrap();
    let cfg = WatchConfig::load().unwrap();
    assert_eq!(cfg.sources, vec!["from/list".to_string()]);

    // environment wins over both
    env::set_var("TARGET_SOURCES", "env/one, env/two");
    env::set_var("FORCE_WINDOW_HOURS", "2");
    env::set_var("BACK_ONE", "true");
    let cfg = WatchConfig::load().unwrap();
    assert_eq!(cfg.sources, vec!["env/one".to_string(), "env/two".to_string()]);
    assert_eq!(cfg.time_filter(cfg.digest.window_hours), TimeFilter::Hours(2.0));
    assert_eq!(cfg.directive, BackfillDirective::BackOne);

    env::set_var("FORCE_WINDOW_HOURS", "-1");
    assert!(WatchConfig::load().is_err());

    clear_env();
    env::set_var("WATCH_CONFIG_PATH", tmp.path().join("missing.toml").display().to_string());
    assert!(WatchConfig::load().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

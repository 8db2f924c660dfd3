// tests/ingest_config.rs
use insight_tracker::config::{SourceType, SourcesFile};
use std::{env, fs};

#[test]
fn parse_toml_and_json_paths() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("sources.toml");
    fs::write(
        &p_toml,
        r#"
global_keywords = ["cursor"]

[[sources]]
name = " Example Blog "
type = "rss"
url = "https://blog.example/feed.xml"
relevance_keywords = ["zed"]

[[sources]]
name = ""
type = "rss"
url = "https://nameless.example/feed"

[[sources]]
name = "Example Blog"
type = "atom"
url = "https://duplicate.example/feed"

[[sources]]
name = "Papers"
type = "arxiv"
categories = ["cs.SE"]
max_results = 20
"#,
    )
    .unwrap();
    let f = SourcesFile::load_from(&p_toml).unwrap();
    assert_eq!(f.global_keywords, vec!["cursor".to_string()]);
    assert_eq!(f.sources.len(), 2);
    assert_eq!(f.sources[0].name, "Example Blog");
    assert_eq!(f.sources[0].endpoint, "https://blog.example/feed.xml");
    assert_eq!(f.sources[0].source_type, SourceType::Feed);
    assert_eq!(f.sources[0].relevance_keywords, vec!["zed".to_string()]);
    assert_eq!(f.sources[1].source_type, SourceType::QueryApi);
    assert_eq!(f.sources[1].query.categories, vec!["cs.SE".to_string()]);
    assert_eq!(f.sources[1].query.max_results, 20);
    assert_eq!(f.sources[1].query.sort_by, "submittedDate");

    let p_json = dir.path().join("sources.json");
    fs::write(
        &p_json,
        r#"[
            {"name": "HN", "type": "rss", "endpoint": "https://hn.example/rss", "enabled": false},
            {"name": "Custom", "type": "rss", "endpoint": "https://c.example/rss",
             "parser_config": {"title_field": "headline", "date_fields": ["when"]}},
            {"name": "Scraper", "type": "html_scraper", "endpoint": "https://s.example/"}
        ]"#,
    )
    .unwrap();
    let j = SourcesFile::load_from(&p_json).unwrap();
    assert!(j.global_keywords.is_empty());
    assert_eq!(j.sources.len(), 3);
    assert_eq!(j.enabled().count(), 2);
    let custom = &j.sources[1];
    assert_eq!(custom.parser_config.title_field, "headline");
    assert_eq!(custom.parser_config.date_fields, vec!["when".to_string()]);
    assert_eq!(custom.parser_config.link_field, "link");
    assert_eq!(j.sources[2].source_type, SourceType::Unsupported);
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("sources.json");
    fs::write(&p, "{ nope").unwrap();
    assert!(SourcesFile::load_from(&p).is_err());
    assert!(SourcesFile::load_from(&dir.path().join("missing.json")).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // isolate CWD so the repo's own config/ is not read
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    env::remove_var("INSIGHT_SOURCES_PATH");

    // nothing at all → empty
    let v = SourcesFile::load_default().unwrap();
    assert!(v.sources.is_empty());

    // TOML fallback in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("sources.toml"),
        "[[sources]]\nname = \"Blog\"\ntype = \"rss\"\nurl = \"https://b.example/rss\"\n",
    )
    .unwrap();
    let vt = SourcesFile::load_default().unwrap();
    assert_eq!(vt.sources[0].name, "Blog");

    // env wins
    let p_env = tmp.path().join("mine.json");
    fs::write(&p_env, r#"[{"name":"X","type":"atom","url":"https://x.example/atom"}]"#).unwrap();
    env::set_var("INSIGHT_SOURCES_PATH", p_env.display().to_string());
    let ve = SourcesFile::load_default().unwrap();
    assert_eq!(ve.sources[0].name, "X");

    // env pointing nowhere is an error, load_or_empty swallows it
    env::set_var("INSIGHT_SOURCES_PATH", tmp.path().join("gone.json").display().to_string());
    assert!(SourcesFile::load_default().is_err());
    assert!(SourcesFile::load_or_empty().sources.is_empty());
    env::remove_var("INSIGHT_SOURCES_PATH");

    env::set_current_dir(&old).unwrap();
}

#[test]
fn shipped_sources_file_parses() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/sources.json");
    let f = SourcesFile::load_from(&path).unwrap();
    assert!(!f.sources.is_empty());
    assert!(f.enabled().count() < f.sources.len());
    assert!(f
        .sources
        .iter()
        .any(|s| s.source_type == SourceType::QueryApi));
}

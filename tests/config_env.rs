// tests/config_env.rs
use dandenong_digest::config::ai::AiConfig;
use dandenong_digest::config::{
    DigestConfig, DEFAULT_RECENCY_DAYS, ENV_ACCEPTANCE_THRESHOLD, ENV_CONFIG_PATH,
    ENV_RECENCY_DAYS,
};
use dandenong_digest::enrich::ai_adapter::build_capability;
use dandenong_digest::Category;
use std::{env, fs};

fn clear_env() {
    for k in [ENV_CONFIG_PATH, ENV_RECENCY_DAYS, ENV_ACCEPTANCE_THRESHOLD, "AI_TEST_MODE"] {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // isolate CWD so the repo's own config/ is not read
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // 1) nothing on disk → built-in defaults
    let cfg = DigestConfig::load_default().unwrap();
    assert_eq!(cfg, DigestConfig::default());

    // 2) ./config/digest.toml
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("digest.toml"),
        "recency_days = 3\n[categories.industry]\nmax_count = 4\n",
    )
    .unwrap();
    let cfg = DigestConfig::load_default().unwrap();
    assert_eq!(cfg.recency_days, 3);
    assert_eq!(cfg.category(Category::Industry).max_count, 4);

    // 3) env path wins over the fallback
    let p_env = tmp.path().join("other.toml");
    fs::write(&p_env, "locality = \"Springvale\"\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    let cfg = DigestConfig::load_default().unwrap();
    assert_eq!(cfg.locality, "Springvale");
    assert_eq!(cfg.recency_days, DEFAULT_RECENCY_DAYS);

    // 4) a dangling env path is an error, not a silent fallback
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(DigestConfig::load_default().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_overrides_apply_on_top_of_file() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("digest.toml");
    fs::write(&p, "recency_days = 3\nacceptance_threshold = 10\n").unwrap();
    clear_env();
    env::set_var(ENV_CONFIG_PATH, p.display().to_string());
    env::set_var(ENV_RECENCY_DAYS, "14");
    env::set_var(ENV_ACCEPTANCE_THRESHOLD, "not-a-number");

    let cfg = DigestConfig::load_default().unwrap();
    assert_eq!(cfg.recency_days, 14);
    // unparsable override is ignored
    assert_eq!(cfg.acceptance_threshold, 10);

    clear_env();
}

#[serial_test::serial]
#[test]
fn ai_key_resolves_from_env_and_mock_mode_short_circuits() {
    clear_env();
    env::set_var("OPENROUTER_API_KEY", "sk-or-test");
    let cfg = AiConfig::from_json_str(r#"{"enabled": true, "api_key": "ENV"}"#).unwrap();
    assert_eq!(cfg.provider, "openrouter");
    assert_eq!(cfg.api_key, "sk-or-test");
    env::remove_var("OPENROUTER_API_KEY");

    let off = AiConfig::default();
    assert!(!build_capability(&off).unwrap().is_enabled());

    env::set_var("AI_TEST_MODE", "mock");
    let cap = build_capability(&off).unwrap();
    assert_eq!(cap.provider_name(), "mock");
    assert!(cap.is_enabled());
    clear_env();
}

#[serial_test::serial]
#[test]
fn missing_ai_file_means_disabled() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = AiConfig::load_or_disabled(tmp.path().join("ai.json")).unwrap();
    assert!(!cfg.enabled);

    let broken = tmp.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();
    assert!(AiConfig::load_or_disabled(&broken).is_err());
}

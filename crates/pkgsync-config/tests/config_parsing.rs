use std::{env, fs};

use pkgsync_config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("pkgsync.toml");

    let toml_content = r#"
[packages]
packages_dir = "/srv/packages"

[debug]
enable_debug = true

[site]
site_start = 12

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses, unset keys keep their defaults
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(
        cfg.packages.packages_dir.as_deref(),
        Some(std::path::Path::new("/srv/packages"))
    );
    assert_eq!(cfg.packages.config_path, "_build/config.json");
    assert_eq!(cfg.packages.resource_map_file, "resourcemap.json");
    assert!(cfg.debug.enable_debug);
    assert_eq!(cfg.site.site_start, 12);
    assert_eq!(cfg.logging.level, "debug");

    // 2) Env override should win over file
    unsafe {
        env::set_var("PKGSYNC__SITE__SITE_START", "40");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.site.site_start, 40);
    unsafe {
        env::remove_var("PKGSYNC__SITE__SITE_START");
    }

    // 3) Invalid config should error
    let invalid_path = dir.path().join("invalid.toml");
    fs::write(&invalid_path, "[logging]\nlevel = \"chatty\"\n").expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.to_string().contains("logging.level"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");
    let cfg = load_config(path.to_str()).expect("defaults apply");
    assert!(cfg.packages.packages_dir.is_none());
    assert_eq!(cfg.packages.config_path, "_build/config.json");
}

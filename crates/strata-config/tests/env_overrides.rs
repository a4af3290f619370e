use figment::Jail;
use pretty_assertions::assert_eq;
use rstest::rstest;
use strata_config::{StorageBackend, StrataConfig};

#[test]
fn env_beats_project_file() {
    Jail::expect_with(|jail| {
        jail.create_dir(".strata")?;
        jail.create_file(
            ".strata/config.toml",
            r#"
[database]
path = "from-file.db"
"#,
        )?;
        jail.set_env("STRATA_DATABASE__PATH", "from-env.db");

        let config = StrataConfig::load().expect("config loads");
        assert_eq!(config.database.path, "from-env.db");
        Ok(())
    });
}

#[rstest]
#[case("STRATA_IMPORT__CHUNK_SIZE", "17")]
#[case("STRATA_RETRY__MAX_DELAY_MS", "9000")]
#[case("STRATA_STORAGE__BACKEND", "memory")]
fn nested_keys_map_from_double_underscore(#[case] key: &str, #[case] value: &str) {
    Jail::expect_with(|jail| {
        jail.set_env(key, value);
        let config = StrataConfig::load().expect("config loads");
        match key {
            "STRATA_IMPORT__CHUNK_SIZE" => assert_eq!(config.import.chunk_size, 17),
            "STRATA_RETRY__MAX_DELAY_MS" => assert_eq!(config.retry.max_delay_ms, 9000),
            _ => assert_eq!(config.storage.backend, StorageBackend::Memory),
        }
        Ok(())
    });
}

#[test]
fn unrelated_strata_variables_are_ignored() {
    Jail::expect_with(|jail| {
        jail.set_env("STRATA_LOG", "debug");
        assert!(StrataConfig::load().is_ok());
        Ok(())
    });
}

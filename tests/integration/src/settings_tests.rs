//! Services built from settings files on disk.

use config_core::{ConfigService, Error, ServerSettings};
use config_env::ConfigRequest;
use config_fs::NormalizedPath;
use config_git::RepositoryRegistry;
use config_test_utils::{ConfigRemote, MAIN, write_tree};
use pretty_assertions::assert_eq;

#[test]
fn yaml_settings_file_drives_a_working_service() {
    let remote = ConfigRemote::new();
    remote.commit_files(MAIN, &[("orders/orders.yml", "queue: orders-v2\n")], "Orders");
    let mirrors = remote.scratch_dir("mirrors");

    let dir = tempfile::tempdir().unwrap();
    let settings_yaml = format!(
        concat!(
            "overrides:\n",
            "  region: eu-west-1\n",
            "backends:\n",
            "  - type: git\n",
            "    identifier: main\n",
            "    uri: \"{}\"\n",
            "    base_dir: \"{}\"\n",
            "    search_paths: [\"{{application}}\"]\n",
        ),
        remote.uri(),
        mirrors.display()
    );
    write_tree(dir.path(), &[("server.yml", settings_yaml.as_str())]);

    let path = NormalizedPath::new(dir.path().join("server.yml"));
    let settings = ServerSettings::load(&path).unwrap();
    assert_eq!(settings.backends[0].identifier(), "main");

    let service = ConfigService::start(&settings, &RepositoryRegistry::new()).unwrap();
    let env = service.environment(&ConfigRequest::new("orders", &["default"], None)).unwrap();
    assert_eq!(env.get("queue"), Some("orders-v2"));
    assert_eq!(env.get("region"), Some("eu-west-1"));
}

#[test]
fn toml_settings_with_a_native_backend() {
    let config = tempfile::tempdir().unwrap();
    write_tree(
        config.path(),
        &[
            ("v1/billing.properties", "rate=1\n"),
            ("v2/billing.properties", "rate=2\n"),
        ],
    );
    let location = format!("{}/{{label}}", config.path().display());

    let dir = tempfile::tempdir().unwrap();
    let settings_toml = format!(
        concat!(
            "[[backends]]\n",
            "type = \"native\"\n",
            "search_locations = [\"{location}\"]\n",
            "default_label = \"v1\"\n",
        ),
        location = location
    );
    write_tree(dir.path(), &[("server.toml", settings_toml.as_str())]);

    let path = NormalizedPath::new(dir.path().join("server.toml"));
    let settings = ServerSettings::load(&path).unwrap();
    let service = ConfigService::start(&settings, &RepositoryRegistry::new()).unwrap();

    let rate = |label: Option<&str>| {
        service
            .environment(&ConfigRequest::new("billing", &["default"], label))
            .unwrap()
            .get("rate")
            .map(str::to_string)
    };
    assert_eq!(rate(None).as_deref(), Some("1"));
    assert_eq!(rate(Some("v2")).as_deref(), Some("2"));
}

#[test]
fn invalid_settings_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[("server.toml", "[[backends]]\ntype = \"git\"\nuri = \"\"\n")],
    );
    let path = NormalizedPath::new(dir.path().join("server.toml"));
    let err = ServerSettings::load(&path).unwrap_err();
    assert!(matches!(err, Error::Settings { .. }), "{err:?}");
}

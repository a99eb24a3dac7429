//! Assembling property sources from file trees on disk

use config_env::{ConfigRequest, Environment, PropertyMap, PropertySourceAssembler, render};
use config_fs::NormalizedPath;
use config_test_utils::write_tree;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn tree(files: &[(&str, &str)]) -> (TempDir, NormalizedPath) {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), files);
    let root = NormalizedPath::new(temp.path());
    (temp, root)
}

fn names(sources: &[config_env::PropertySource]) -> Vec<&str> {
    sources.iter().map(|s| s.name.as_str()).collect()
}

fn environment(sources: Vec<config_env::PropertySource>) -> Environment {
    let mut env = Environment::new("foo", &[], None);
    for source in sources {
        env.add(source);
    }
    env
}

#[test]
fn override_beats_profile_beats_base() {
    let (_temp, root) = tree(&[
        ("foo-dev.yml", "x: 2\n"),
        ("foo.yml", "x: 3\ny: base\n"),
    ]);
    let overrides: PropertyMap = [("x".to_string(), "1".to_string())].into_iter().collect();
    let assembler = PropertySourceAssembler::default().with_overrides(overrides);

    let sources = assembler
        .assemble(&root, "test:", &ConfigRequest::parse("foo", "dev", None))
        .unwrap();

    assert_eq!(names(&sources), vec!["overrides", "test:foo-dev.yml", "test:foo.yml"]);
    let env = environment(sources);
    assert_eq!(env.get("x"), Some("1"));
    assert_eq!(env.get("y"), Some("base"));
}

#[test]
fn full_precedence_order_with_two_profiles() {
    let (_temp, root) = tree(&[
        ("application.yml", "a: shared\n"),
        ("application-dev.yml", "a: shared-dev\n"),
        ("foo.properties", "a=foo\n"),
        ("foo-dev.yml", "a: foo-dev\n"),
        ("foo-mysql.yml", "a: foo-mysql\n"),
        ("bar.yml", "a: unrelated\n"),
    ]);
    let assembler = PropertySourceAssembler::default();

    let sources = assembler
        .assemble(&root, "", &ConfigRequest::parse("foo", "dev,mysql", None))
        .unwrap();

    assert_eq!(
        names(&sources),
        vec![
            "foo-dev.yml",
            "application-dev.yml",
            "foo-mysql.yml",
            "foo.properties",
            "application.yml",
        ]
    );
    assert_eq!(environment(sources).get("a"), Some("foo-dev"));
}

#[test]
fn later_profiles_have_lower_precedence() {
    let (_temp, root) = tree(&[("foo-a.yml", "x: a\n"), ("foo-b.yml", "x: b\n")]);
    let assembler = PropertySourceAssembler::default();

    let ab = assembler
        .assemble(&root, "", &ConfigRequest::parse("foo", "a,b", None))
        .unwrap();
    let ba = assembler
        .assemble(&root, "", &ConfigRequest::parse("foo", "b,a", None))
        .unwrap();

    assert_eq!(environment(ab).get("x"), Some("a"));
    assert_eq!(environment(ba).get("x"), Some("b"));
}

#[test]
fn hyphenated_file_serves_every_reading() {
    let (_temp, root) = tree(&[("foo-local-dev.yml", "x: 1\n")]);
    let assembler = PropertySourceAssembler::default();

    for request in [
        ConfigRequest::parse("foo", "local-dev", None),
        ConfigRequest::parse("foo-local", "dev", None),
        ConfigRequest::parse("foo-local-dev", "", None),
    ] {
        let sources = assembler.assemble(&root, "", &request).unwrap();
        assert_eq!(names(&sources), vec!["foo-local-dev.yml"], "request {request}");
    }
}

#[test]
fn search_paths_are_tried_in_declared_order() {
    let (_temp, root) = tree(&[
        ("first/foo.yml", "x: first\n"),
        ("foo/foo.yml", "x: by-app\n"),
    ]);
    let assembler = PropertySourceAssembler::new(vec![
        "missing".to_string(),
        "first".to_string(),
        "{application}".to_string(),
    ]);

    let sources = assembler
        .assemble(&root, "", &ConfigRequest::parse("foo", "", None))
        .unwrap();

    assert_eq!(names(&sources), vec!["first/foo.yml", "foo/foo.yml"]);
}

#[test]
fn default_profile_is_used_when_none_requested() {
    let (_temp, root) = tree(&[("foo-default.yml", "x: default\n"), ("foo.yml", "x: base\n")]);
    let sources = PropertySourceAssembler::default()
        .assemble(&root, "", &ConfigRequest::parse("foo", "", None))
        .unwrap();
    assert_eq!(environment(sources).get("x"), Some("default"));
}

#[test]
fn unparseable_file_is_an_error() {
    let (_temp, root) = tree(&[("foo.yml", "a: [unclosed\n")]);
    let err = PropertySourceAssembler::default()
        .assemble(&root, "", &ConfigRequest::parse("foo", "", None))
        .unwrap_err();
    assert!(matches!(err, config_env::Error::Parse { .. }), "got {err:?}");
}

#[test]
fn yaml_round_trips_sequences_through_flat_form() {
    let (_temp, root) = tree(&[(
        "foo.yml",
        "servers:\n  - host: a\n    port: 80\n  - host: b\n",
    )]);
    let sources = PropertySourceAssembler::default()
        .assemble(&root, "", &ConfigRequest::parse("foo", "", None))
        .unwrap();
    let merged = environment(sources).merged();
    assert_eq!(merged.get("servers[1].host").map(String::as_str), Some("b"));

    let yaml = render::to_yaml(&merged).unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed["servers"].is_sequence());
    assert_eq!(parsed["servers"][0]["port"].as_i64(), Some(80));
    assert_eq!(parsed["servers"][1]["host"].as_str(), Some("b"));
}

#[test]
fn find_resource_prefers_profile_variant() {
    let (_temp, root) = tree(&[
        ("nginx.conf", "plain"),
        ("nginx-prod.conf", "prod"),
    ]);
    let assembler = PropertySourceAssembler::default();

    let prod = assembler
        .find_resource(&root, &ConfigRequest::parse("foo", "prod", None), "nginx.conf")
        .unwrap();
    assert_eq!(prod.file_name(), Some("nginx-prod.conf"));

    let dev = assembler
        .find_resource(&root, &ConfigRequest::parse("foo", "dev", None), "nginx.conf")
        .unwrap();
    assert_eq!(dev.file_name(), Some("nginx.conf"));
}

#[test]
fn find_resource_missing_or_escaping_is_not_found() {
    let (_temp, root) = tree(&[("nginx.conf", "plain")]);
    let assembler = PropertySourceAssembler::default();
    let request = ConfigRequest::parse("foo", "", None);

    let missing = assembler.find_resource(&root, &request, "absent.conf").unwrap_err();
    assert!(missing.is_not_found());

    let escaping = assembler.find_resource(&root, &request, "../nginx.conf").unwrap_err();
    assert!(escaping.is_not_found());
}

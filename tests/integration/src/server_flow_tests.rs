//! End-to-end flows through a configured service backed by real git remotes.

use std::sync::Arc;

use config_core::settings::GitSettings;
use config_core::{
    BackendKind, BackendSettings, ConfigService, Headers, RenderFormat, ServerSettings,
};
use config_crypto::{EncryptionGateway, KeyChain, KeyHints};
use config_env::{ConfigRequest, Environment};
use config_git::RepositoryRegistry;
use config_test_utils::{ConfigRemote, MAIN, write_tree};
use pretty_assertions::assert_eq;
use serde_json::json;

fn git_backend(remote: &ConfigRemote, configure: impl FnOnce(&mut GitSettings)) -> BackendSettings {
    let mut backend = BackendSettings::git(remote.uri());
    if let BackendKind::Git(git) = &mut backend.kind {
        git.repository.base_dir = Some(remote.scratch_dir("mirrors"));
        configure(git);
    }
    backend
}

fn start(backends: Vec<BackendSettings>) -> ConfigService {
    let settings = ServerSettings {
        backends,
        ..ServerSettings::default()
    };
    ConfigService::start(&settings, &RepositoryRegistry::new()).unwrap()
}

fn names(env: &Environment) -> Vec<String> {
    env.property_sources.iter().map(|s| s.name.clone()).collect()
}

fn push_headers() -> Headers {
    Headers::new().with("X-Github-Event", "push")
}

#[test]
fn overrides_beat_profile_files_which_beat_base_files() {
    let remote = ConfigRemote::new();
    let head = remote.commit_files(
        MAIN,
        &[
            ("foo.yml", "x: 3\ny: base\nz: base\n"),
            ("foo-dev.yml", "x: 2\ny: dev\n"),
            ("application.yml", "shared: everywhere\nz: shared\n"),
        ],
        "Add foo",
    );

    let settings = ServerSettings {
        backends: vec![git_backend(&remote, |_| {})],
        overrides: [("x".to_string(), "1".to_string())].into_iter().collect(),
        ..ServerSettings::default()
    };
    let service = ConfigService::start(&settings, &RepositoryRegistry::new()).unwrap();

    let env = service.environment(&ConfigRequest::new("foo", &["dev"], None)).unwrap();
    assert_eq!(env.get("x"), Some("1"));
    assert_eq!(env.get("y"), Some("dev"));
    assert_eq!(env.get("z"), Some("base"));
    assert_eq!(env.get("shared"), Some("everywhere"));
    assert_eq!(env.version.as_deref(), Some(head.as_str()));
    assert_eq!(env.label.as_deref(), Some(MAIN));

    let names = names(&env);
    assert_eq!(names[0], "overrides");
    assert!(names[1].ends_with("/foo-dev.yml"), "{names:?}");
    assert!(names[2].ends_with("/foo.yml"), "{names:?}");
    assert!(names[3].ends_with("/application.yml"), "{names:?}");
}

#[test]
fn notification_refreshes_only_the_affected_environment() {
    let remote = ConfigRemote::new();
    remote.commit_files(
        MAIN,
        &[("foo-dev.yml", "greeting: hello\n"), ("bar.yml", "greeting: bar\n")],
        "Initial config",
    );
    let service = start(vec![git_backend(&remote, |_| {})]);
    let foo = ConfigRequest::new("foo", &["dev"], None);
    let bar = ConfigRequest::new("bar", &["default"], None);

    let before = service.environment(&foo).unwrap();
    let bar_before = service.environment(&bar).unwrap();
    assert_eq!(before.get("greeting"), Some("hello"));

    let head = remote.commit_files(MAIN, &[("foo-dev.yml", "greeting: bonjour\n")], "Translate");

    // still served from cache until notified
    assert_eq!(service.environment(&foo).unwrap().get("greeting"), Some("hello"));

    let routed = service.notify(
        &push_headers(),
        &json!({"commits": [{"added": [], "modified": ["foo-dev.yml"], "removed": []}]}),
    );
    assert!(routed.contains("foo:dev"));

    let after = service.environment(&foo).unwrap();
    assert_eq!(after.get("greeting"), Some("bonjour"));
    assert_eq!(after.version.as_deref(), Some(head.as_str()));
    assert!(Arc::ptr_eq(&bar_before, &service.environment(&bar).unwrap()));
}

#[test]
fn labels_select_branches_and_tags() {
    let remote = ConfigRemote::new();
    remote.commit_files(MAIN, &[("foo.yml", "stage: main\n")], "Main config");
    remote.tag("v1", MAIN);
    remote.commit_files("feature", &[("foo.yml", "stage: feature\n")], "Feature config");
    remote.commit_files(MAIN, &[("foo.yml", "stage: next\n")], "Move main on");
    let service = start(vec![git_backend(&remote, |_| {})]);

    let on = |label: Option<&str>| {
        service
            .environment(&ConfigRequest::new("foo", &["default"], label))
            .unwrap()
            .get("stage")
            .map(str::to_string)
    };
    assert_eq!(on(None).as_deref(), Some("next"));
    assert_eq!(on(Some("feature")).as_deref(), Some("feature"));
    assert_eq!(on(Some("v1")).as_deref(), Some("main"));

    let err = service
        .environment(&ConfigRequest::new("foo", &["default"], Some("missing")))
        .unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[test]
fn encrypted_values_are_served_decrypted() {
    let chain = KeyChain::new("deadbeef").with_default_secret("server-key");
    let cipher = EncryptionGateway::new(Arc::new(chain))
        .encrypt("p@ssw0rd", &KeyHints::new())
        .unwrap();
    let properties = format!("db.user=app\ndb.password={{cipher}}{cipher}\nbroken={{cipher}}zz\n");

    let remote = ConfigRemote::new();
    remote.commit_files(MAIN, &[("foo.properties", properties.as_str())], "Secrets");

    let mut settings = ServerSettings {
        backends: vec![git_backend(&remote, |_| {})],
        ..ServerSettings::default()
    };
    settings.encrypt.key = Some("server-key".to_string());
    let service = ConfigService::start(&settings, &RepositoryRegistry::new()).unwrap();

    let env = service.environment(&ConfigRequest::new("foo", &["default"], None)).unwrap();
    assert_eq!(env.get("db.user"), Some("app"));
    assert_eq!(env.get("db.password"), Some("p@ssw0rd"));
    assert_eq!(env.get("invalid.broken"), Some("<n/a>"));
}

#[test]
fn pattern_routed_repository_serves_matching_applications() {
    let shared = ConfigRemote::new();
    shared.commit_files(MAIN, &[("application.yml", "owner: platform\n")], "Shared");
    let team = ConfigRemote::new();
    team.commit_files(
        MAIN,
        &[("team-api.yml", "owner: team\n"), ("application.yml", "team: true\n")],
        "Team",
    );

    let team_uri = team.uri();
    let team_mirrors = team.scratch_dir("mirrors");
    let service = start(vec![git_backend(&shared, move |git| {
        let mut repository = config_git::RepositorySettings::new(team_uri);
        repository.base_dir = Some(team_mirrors);
        git.repos.push(config_core::settings::PatternRepoSettings {
            name: "team".to_string(),
            patterns: vec!["team-*".to_string()],
            repository,
            search_paths: Vec::new(),
        });
    })]);

    let env = service.environment(&ConfigRequest::new("team-api", &["dev"], None)).unwrap();
    assert_eq!(env.get("owner"), Some("team"));
    assert_eq!(env.get("team"), Some("true"));

    let env = service.environment(&ConfigRequest::new("billing", &["dev"], None)).unwrap();
    assert_eq!(env.get("owner"), Some("platform"));
    assert_eq!(env.get("team"), None);
}

#[test]
fn search_paths_expand_the_application_name() {
    let remote = ConfigRemote::new();
    remote.commit_files(
        MAIN,
        &[("foo/application.yml", "dir: foo\n"), ("bar/application.yml", "dir: bar\n")],
        "Per-app directories",
    );
    let service = start(vec![git_backend(&remote, |git| {
        git.search_paths = vec!["{application}".to_string()];
    })]);

    let env = service.environment(&ConfigRequest::new("foo", &["default"], None)).unwrap();
    assert_eq!(env.get("dir"), Some("foo"));
}

#[test]
fn unreachable_isolated_backend_does_not_block_others() {
    let healthy = ConfigRemote::new();
    healthy.commit_files(MAIN, &[("foo.yml", "x: healthy\n")], "Healthy");

    let missing = healthy.scratch_dir("nowhere").join("missing.git");
    let mut broken = BackendSettings::git(missing.to_string_lossy());
    broken.identifier = "broken".to_string();
    broken.priority = 10;
    broken.fail_isolated = true;
    if let BackendKind::Git(git) = &mut broken.kind {
        git.repository.base_dir = Some(healthy.scratch_dir("broken-mirrors"));
    }

    let service = start(vec![broken, git_backend(&healthy, |_| {})]);
    let env = service.environment(&ConfigRequest::new("foo", &["default"], None)).unwrap();
    assert_eq!(env.get("x"), Some("healthy"));
    assert_eq!(env.property_sources.len(), 1);
}

#[test]
fn fail_fast_refuses_to_start_without_the_repository() {
    let scratch = ConfigRemote::new();
    let missing = scratch.scratch_dir("nowhere").join("missing.git");
    let mut backend = BackendSettings::git(missing.to_string_lossy());
    if let BackendKind::Git(git) = &mut backend.kind {
        git.repository.base_dir = Some(scratch.scratch_dir("mirrors"));
        git.repository.clone_on_start = true;
    }
    let mut settings = ServerSettings {
        backends: vec![backend],
        fail_fast: true,
        ..ServerSettings::default()
    };

    assert!(ConfigService::start(&settings, &RepositoryRegistry::new()).is_err());

    settings.fail_fast = false;
    assert!(ConfigService::start(&settings, &RepositoryRegistry::new()).is_ok());
}

#[test]
fn dirty_mirror_is_reset_when_force_pull_is_set() {
    let remote = ConfigRemote::new();
    remote.commit_files(MAIN, &[("foo.yml", "x: 1\n")], "One");
    let backend = git_backend(&remote, |git| git.repository.force_pull = true);
    let BackendKind::Git(git) = &backend.kind else {
        unreachable!("git_backend builds git settings");
    };
    let repository = git.repository.clone();

    let registry = RepositoryRegistry::new();
    let settings = ServerSettings {
        backends: vec![backend],
        ..ServerSettings::default()
    };
    let service = ConfigService::start(&settings, &registry).unwrap();
    let request = ConfigRequest::new("foo", &["default"], None);
    assert_eq!(service.environment(&request).unwrap().get("x"), Some("1"));

    let local = registry.get_or_create(repository).unwrap().local_path().to_path_buf();
    write_tree(&local, &[("foo.yml", "x: tampered\n")]);
    remote.commit_files(MAIN, &[("foo.yml", "x: 2\n")], "Two");

    service.refresh_all();
    assert_eq!(service.environment(&request).unwrap().get("x"), Some("2"));
}

#[test]
fn native_and_git_backends_combine_by_priority() {
    let remote = ConfigRemote::new();
    remote.commit_files(MAIN, &[("foo.yml", "x: git\ngit.only: present\n")], "Git");
    let local = tempfile::tempdir().unwrap();
    write_tree(local.path(), &[("foo.properties", "x=native\nnative.only=yes\n")]);

    let mut native = BackendSettings::native(vec![local.path().to_string_lossy().into_owned()]);
    native.priority = 5;
    let service = start(vec![git_backend(&remote, |_| {}), native]);

    let env = service.environment(&ConfigRequest::new("foo", &["default"], None)).unwrap();
    assert_eq!(env.get("x"), Some("native"));
    assert_eq!(env.get("git.only"), Some("present"));
    assert_eq!(env.get("native.only"), Some("yes"));
    assert!(env.property_sources[0].name.starts_with("file:"));
}

#[test]
fn plain_text_resources_and_rendering() {
    let remote = ConfigRemote::new();
    remote.commit_files(
        MAIN,
        &[
            ("nginx.conf", "listen 80;\n"),
            ("foo.yml", "server:\n  port: 8080\nurl: http://localhost:${server.port}\n"),
        ],
        "Resources",
    );
    let service = start(vec![git_backend(&remote, |_| {})]);
    let request = ConfigRequest::new("foo", &["default"], None);

    assert_eq!(service.resource(&request, "nginx.conf").unwrap(), "listen 80;\n");
    assert!(service.resource(&request, "missing.conf").unwrap_err().is_not_found());

    let rendered: serde_json::Value =
        serde_json::from_str(&service.render(&request, RenderFormat::Json, true).unwrap()).unwrap();
    assert_eq!(rendered["url"], json!("http://localhost:8080"));
    assert_eq!(rendered["server"]["port"], json!(8080));
}

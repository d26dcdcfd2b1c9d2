use std::collections::BTreeMap;
use std::sync::Arc;

use skiff_core::{Config, MemoryStore, NewProject, ProjectName, ProjectStore};
use skiff_deploy::{DeployError, EnvVar, Orchestrator, PortAllocator};
use skiff_ingress::{store as ingress_store, IngressEntry};
use skiff_runner::{CommandOutput, ScriptedRunner};
use tempfile::TempDir;

struct Harness {
    _home: TempDir,
    config: Arc<Config>,
    store: Arc<MemoryStore>,
    runner: Arc<ScriptedRunner>,
    orchestrator: Orchestrator,
}

fn harness(runner: ScriptedRunner) -> Harness {
    let home = TempDir::new().expect("home");
    let config = Arc::new(
        Config::from_vars(
            [
                ("SKIFF_DOMAIN_SUFFIX", "example.dev"),
                ("SKIFF_TUNNEL_NAME", "edge"),
                ("CLOUDFLARE_TUNNEL_ID", "tunnel-123"),
            ],
            home.path(),
        )
        .expect("config"),
    );
    let store = Arc::new(MemoryStore::new());
    let runner = Arc::new(runner);
    let orchestrator = Orchestrator::new(config.clone(), store.clone(), runner.clone())
        .expect("orchestrator")
        .with_port_allocator(PortAllocator::seeded(config.port_range.clone(), 42));
    Harness {
        _home: home,
        config,
        store,
        runner,
        orchestrator,
    }
}

fn demo() -> NewProject {
    new_project("demo", "https://x/y.git", "demo-sub")
}

fn new_project(name: &str, url: &str, subdomain: &str) -> NewProject {
    NewProject {
        project_name: ProjectName::from(name),
        github_url: url.to_string(),
        subdomain: subdomain.to_string(),
        description: None,
    }
}

fn name(s: &str) -> ProjectName {
    ProjectName::from(s)
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

#[tokio::test]
async fn init_registers_and_clones() {
    let h = harness(ScriptedRunner::new());
    let record = h.orchestrator.init(demo()).await.expect("init");

    assert_eq!(record.port, None);
    assert_eq!(h.store.list().unwrap().len(), 1);
    let dir = h.config.project_dir(&name("demo"));
    assert!(dir.is_dir());
    assert_eq!(
        h.runner.calls(),
        vec![format!("git clone -- https://x/y.git {}", dir.display())]
    );
}

#[tokio::test]
async fn second_init_with_same_subdomain_is_a_duplicate() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator.init(demo()).await.expect("first init");

    let err = h
        .orchestrator
        .init(new_project("other", "https://x/other.git", "demo-sub"))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, DeployError::DuplicateProject { existing } if existing.as_str() == "demo"),
        "{err:?}"
    );
    assert_eq!(h.store.list().unwrap().len(), 1);
    assert_eq!(h.runner.count("git clone"), 1, "no clone for a rejected init");
}

#[tokio::test]
async fn second_init_with_same_url_or_name_is_a_duplicate() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator.init(demo()).await.expect("first init");

    for project in [
        new_project("other", "https://x/y.git", "other-sub"),
        new_project("demo", "https://x/z.git", "fresh-sub"),
    ] {
        let err = h.orchestrator.init(project).await.unwrap_err();
        assert!(matches!(err, DeployError::DuplicateProject { .. }), "{err:?}");
    }
    assert_eq!(h.store.list().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_clone_rolls_back_record_and_directory() {
    let h = harness(ScriptedRunner::new().fail_on("git clone", 128, "repository not found"));

    let err = h.orchestrator.init(demo()).await.unwrap_err();

    assert!(matches!(err, DeployError::ExternalToolFailure(_)), "{err:?}");
    assert!(err.to_string().contains("repository not found"));
    assert!(h.store.find_by_name(&name("demo")).unwrap().is_none());
    assert!(!h.config.project_dir(&name("demo")).exists());

    // The name is free again.
    let h2 = harness(ScriptedRunner::new());
    h2.orchestrator.init(demo()).await.expect("retry succeeds");
}

#[tokio::test]
async fn invalid_init_payloads_are_rejected_before_any_side_effect() {
    let h = harness(ScriptedRunner::new());
    for project in [
        new_project("../escape", "https://x/y.git", "sub"),
        new_project("demo", "  ", "sub"),
        new_project("demo", "--upload-pack=touch /tmp/pwned", "sub"),
        new_project("demo", "https://x/y.git", "Not A Label"),
    ] {
        let err = h.orchestrator.init(project).await.unwrap_err();
        assert!(matches!(err, DeployError::InvalidRequest(_)), "{err:?}");
    }
    assert!(h.runner.calls().is_empty());
    assert!(h.store.list().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// git / npm
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_branches_parses_remote_refs() {
    let h = harness(ScriptedRunner::new().on(
        "git -C",
        CommandOutput::ok("  origin/HEAD -> origin/main\n  origin/main\n  origin/dev\n"),
    ));
    h.orchestrator.init(demo()).await.unwrap();

    let branches = h.orchestrator.list_branches(&name("demo")).await.unwrap();
    assert_eq!(branches, vec!["main", "dev"]);
}

#[tokio::test]
async fn list_branches_of_unknown_project_is_empty() {
    let h = harness(ScriptedRunner::new());
    let branches = h.orchestrator.list_branches(&name("ghost")).await.unwrap();
    assert!(branches.is_empty());
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn pull_checks_out_then_pulls() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator.init(demo()).await.unwrap();

    let message = h
        .orchestrator
        .pull_latest(&name("demo"), "dev")
        .await
        .unwrap();
    assert_eq!(message, "Pulled latest changes for demo on branch dev");

    let dir = h.config.project_dir(&name("demo"));
    let calls = h.runner.calls();
    assert_eq!(
        &calls[1..],
        &[
            format!("git -C {} checkout dev", dir.display()),
            format!("git -C {} pull origin dev", dir.display()),
        ]
    );
}

#[tokio::test]
async fn pull_rejects_option_like_branch() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator.init(demo()).await.unwrap();

    let err = h
        .orchestrator
        .pull_latest(&name("demo"), "-f")
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::InvalidRequest(_)), "{err:?}");
    assert_eq!(h.runner.count("git -C"), 0, "no git call for a rejected branch");
}

#[tokio::test]
async fn pull_of_unknown_project_is_not_found() {
    let h = harness(ScriptedRunner::new());
    let err = h
        .orchestrator
        .pull_latest(&name("ghost"), "main")
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::ProjectNotFound(_)));
}

#[tokio::test]
async fn pull_timeout_surfaces_as_tool_timeout() {
    let h = harness(ScriptedRunner::new().timeout_on("git -C"));
    h.orchestrator.init(demo()).await.unwrap();

    let err = h
        .orchestrator
        .pull_latest(&name("demo"), "main")
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::ExternalToolTimeout { .. }), "{err:?}");
}

#[tokio::test]
async fn build_installs_then_builds_in_project_dir() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator.init(demo()).await.unwrap();

    let message = h.orchestrator.build_app(&name("demo"), "main").await.unwrap();
    assert_eq!(message, "Built app for project demo on branch main");

    let dir = h.config.project_dir(&name("demo"));
    let npm: Vec<_> = h
        .runner
        .specs()
        .into_iter()
        .filter(|s| s.program == "npm")
        .collect();
    assert_eq!(npm.len(), 2);
    assert!(npm.iter().all(|s| s.cwd.as_deref() == Some(dir.as_path())));
    assert_eq!(npm[1].to_string(), "npm run build");
}

#[tokio::test]
async fn build_failure_propagates() {
    let h = harness(ScriptedRunner::new().fail_on("npm install", 1, "ERESOLVE"));
    h.orchestrator.init(demo()).await.unwrap();

    let err = h
        .orchestrator
        .build_app(&name("demo"), "main")
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::ExternalToolFailure(_)));
    assert_eq!(h.runner.count("npm run build"), 0);
}

// ---------------------------------------------------------------------------
// env
// ---------------------------------------------------------------------------

#[tokio::test]
async fn env_vars_roundtrip_through_the_project_dir() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator.init(demo()).await.unwrap();

    assert!(h.orchestrator.get_env_vars(&name("demo")).await.unwrap().is_empty());

    h.orchestrator
        .set_env_vars(&name("demo"), &[EnvVar::new("A", "1")])
        .await
        .unwrap();
    let vars = h.orchestrator.get_env_vars(&name("demo")).await.unwrap();
    assert_eq!(vars, BTreeMap::from([("A".to_string(), "1".to_string())]));
    assert!(h.config.project_dir(&name("demo")).join(".env").is_file());
}

#[tokio::test]
async fn set_env_for_unknown_project_is_not_found() {
    let h = harness(ScriptedRunner::new());
    let err = h
        .orchestrator
        .set_env_vars(&name("ghost"), &[EnvVar::new("A", "1")])
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::ProjectNotFound(_)));
}

// ---------------------------------------------------------------------------
// deploy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deploy_assigns_port_writes_launcher_and_restarts_pm2() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator.init(demo()).await.unwrap();

    let deployment = h.orchestrator.deploy(&name("demo")).await.unwrap();
    let port = deployment.port;

    assert!(h.config.port_range.contains(&port));
    assert_eq!(
        deployment.message,
        format!("Deployed demo with PM2 on port {port}")
    );
    assert_eq!(
        h.store.find_by_name(&name("demo")).unwrap().unwrap().port,
        Some(port)
    );

    let launcher =
        std::fs::read_to_string(h.config.project_dir(&name("demo")).join("start.js")).unwrap();
    assert!(launcher.contains(&format!("'--port', '{port}'")), "{launcher}");

    let pm2: Vec<_> = h
        .runner
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("pm2"))
        .collect();
    assert_eq!(
        pm2,
        vec!["pm2 delete demo", "pm2 start start.js --name demo", "pm2 save"]
    );
}

#[tokio::test]
async fn redeploy_keeps_the_port() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator.init(demo()).await.unwrap();

    let first = h.orchestrator.deploy(&name("demo")).await.unwrap();
    let second = h.orchestrator.deploy(&name("demo")).await.unwrap();
    assert_eq!(first.port, second.port);
    assert_eq!(h.runner.count("pm2 start"), 2);
}

#[tokio::test]
async fn deploy_ignores_missing_pm2_entry() {
    let h = harness(ScriptedRunner::new().fail_on("pm2 delete", 1, "process not found"));
    h.orchestrator.init(demo()).await.unwrap();
    h.orchestrator.deploy(&name("demo")).await.expect("delete failure is ignored");
}

#[tokio::test]
async fn deploy_fails_when_pm2_start_fails() {
    let h = harness(ScriptedRunner::new().fail_on("pm2 start", 1, "script not found"));
    h.orchestrator.init(demo()).await.unwrap();
    let err = h.orchestrator.deploy(&name("demo")).await.unwrap_err();
    assert!(matches!(err, DeployError::ExternalToolFailure(_)));
    assert_eq!(h.runner.count("pm2 save"), 0);
}

#[tokio::test]
async fn deploy_of_unknown_project_is_not_found() {
    let h = harness(ScriptedRunner::new());
    let err = h.orchestrator.deploy(&name("ghost")).await.unwrap_err();
    assert!(matches!(err, DeployError::ProjectNotFound(_)));
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn concurrent_deploys_of_different_projects_get_distinct_ports() {
    let h = Arc::new(harness(ScriptedRunner::new()));
    for i in 0..6 {
        h.orchestrator
            .init(new_project(
                &format!("app{i}"),
                &format!("https://x/app{i}.git"),
                &format!("app{i}"),
            ))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..6 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.orchestrator.deploy(&name(&format!("app{i}"))).await
        }));
    }
    let mut ports = Vec::new();
    for handle in handles {
        ports.push(handle.await.unwrap().unwrap().port);
    }
    ports.sort_unstable();
    ports.dedup();
    assert_eq!(ports.len(), 6);
}

// ---------------------------------------------------------------------------
// publish
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_without_port_has_no_side_effects() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator.init(demo()).await.unwrap();
    let before = h.runner.calls().len();

    let err = h.orchestrator.publish(&name("demo")).await.unwrap_err();

    assert!(
        matches!(err, DeployError::MissingConfiguration { missing: "port", .. }),
        "{err:?}"
    );
    assert_eq!(h.runner.calls().len(), before, "no DNS route or reload");
    assert!(!h.config.tunnel.config_path.exists(), "no config written");
}

#[tokio::test]
async fn publish_routes_dns_and_writes_ingress() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator.init(demo()).await.unwrap();
    let port = h.orchestrator.deploy(&name("demo")).await.unwrap().port;

    let publication = h.orchestrator.publish(&name("demo")).await.unwrap();

    assert_eq!(publication.domain, "https://demo-sub.example.dev");
    assert_eq!(publication.port, port);
    assert!(publication.reloaded);
    assert_eq!(
        h.runner.count("cloudflared tunnel route dns edge demo-sub.example.dev"),
        1
    );

    let config = ingress_store::load(&h.config.tunnel.config_path)
        .unwrap()
        .expect("ingress config written");
    assert_eq!(config.tunnel.as_deref(), Some("tunnel-123"));
    assert_eq!(
        config.ingress,
        vec![
            IngressEntry::route("demo-sub.example.dev", port),
            IngressEntry::catch_all()
        ]
    );
}

#[tokio::test]
async fn republish_is_idempotent() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator.init(demo()).await.unwrap();
    h.orchestrator.deploy(&name("demo")).await.unwrap();

    let first = h.orchestrator.publish(&name("demo")).await.unwrap();
    let second = h.orchestrator.publish(&name("demo")).await.unwrap();
    assert_eq!(first, second);

    let config = ingress_store::load(&h.config.tunnel.config_path)
        .unwrap()
        .unwrap();
    assert_eq!(config.ingress.len(), 2);
}

#[tokio::test]
async fn publish_survives_reload_failure() {
    let h = harness(ScriptedRunner::new().fail_on("systemctl", 5, "unit cloudflared not found"));
    h.orchestrator.init(demo()).await.unwrap();
    h.orchestrator.deploy(&name("demo")).await.unwrap();

    let publication = h.orchestrator.publish(&name("demo")).await.unwrap();
    assert!(!publication.reloaded);
}

#[tokio::test]
async fn publish_fails_when_dns_route_fails() {
    let h = harness(ScriptedRunner::new().fail_on("cloudflared", 1, "tunnel not found"));
    h.orchestrator.init(demo()).await.unwrap();
    h.orchestrator.deploy(&name("demo")).await.unwrap();

    let err = h.orchestrator.publish(&name("demo")).await.unwrap_err();
    assert!(matches!(err, DeployError::ExternalToolFailure(_)));
    assert!(!h.config.tunnel.config_path.exists());
}

// ---------------------------------------------------------------------------
// queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn projects_are_listed_by_name() {
    let h = harness(ScriptedRunner::new());
    h.orchestrator
        .init(new_project("zeta", "https://x/z.git", "zeta"))
        .await
        .unwrap();
    h.orchestrator
        .init(new_project("alpha", "https://x/a.git", "alpha"))
        .await
        .unwrap();

    let names: Vec<_> = h
        .orchestrator
        .projects()
        .unwrap()
        .into_iter()
        .map(|r| r.project_name.0)
        .collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

use std::path::Path;

use skiff_core::{NewProject, ProjectName, ProjectRecord};
use skiff_renderer::{LaunchContext, RenderError, Renderer};

fn record(port: Option<u16>) -> ProjectRecord {
    let mut record = ProjectRecord::new(NewProject {
        project_name: ProjectName::from("shop"),
        github_url: "https://github.com/acme/shop.git".to_string(),
        subdomain: "shop".to_string(),
        description: None,
    });
    record.port = port;
    record
}

#[test]
fn launcher_renders_from_record() {
    let ctx = LaunchContext::from_record(&record(Some(45123)), Path::new("/srv/apps/shop"))
        .expect("context");
    let script = Renderer::new().expect("renderer").render_launcher(&ctx).expect("render");

    assert!(script.starts_with("// Generated by skiff for shop"));
    assert!(script.contains("spawn('npm', ['run', 'start', '--', '--port', '45123']"));
    assert!(script.contains(r#"process.chdir("/srv/apps/shop");"#));
}

#[test]
fn launcher_requires_a_port() {
    let err = LaunchContext::from_record(&record(None), Path::new("/srv/apps/shop")).unwrap_err();
    assert!(matches!(err, RenderError::MissingPort(ref name) if name == "shop"));
}

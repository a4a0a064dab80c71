//! Docker platform lifecycle; skipped when no docker daemon is reachable

use command_executor::ExecOptions;
use serde_json::{Value, json};
use simply_config::PlatformSpec;
use simply_core::capability::Args;
use simply_core::platform::PlatformState;
use simply_core::registry::ProviderRegistry;
use simply_core::text::random_id;

fn docker_available() -> bool {
    std::process::Command::new("docker")
        .arg("version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn args(value: Value) -> Args {
    match value {
        Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

#[smol_potat::test]
async fn test_docker_platform_lifecycle() {
    if !docker_available() {
        eprintln!("Skipping test: Docker not available");
        return;
    }

    let prefix = format!("simply-test-{}", random_id(6));
    let spec = PlatformSpec::new("docker", "alpine")
        .with_host("h1", format!("{prefix}-1"))
        .with_host("h2", format!("{prefix}-2"))
        .with_option("image", "alpine:3.20")
        .with_option("parameters", "-t");
    let mut platform = ProviderRegistry::new().compose("dock", &spec).unwrap();

    platform.setup(None).await.unwrap();
    assert_eq!(platform.state(), PlatformState::Running);

    let running = platform
        .call("container_running", None, &Args::new())
        .await
        .unwrap();
    assert_eq!(running.truthy(), Some(true));

    let hostnames = platform
        .run_command("hostname", None, ExecOptions::new())
        .await
        .unwrap()
        .into_map()
        .unwrap();
    assert_eq!(hostnames["h1"].stdout.trim(), format!("{prefix}-1"));
    assert_eq!(hostnames["h2"].stdout.trim(), format!("{prefix}-2"));

    let written = platform
        .call(
            "put_data",
            None,
            &args(json!({"path": "/tmp/greeting", "data": "hello\n"})),
        )
        .await
        .unwrap();
    assert!(written.is_owner());
    let read = platform
        .call("get_data", Some("h2"), &args(json!({"path": "/tmp/greeting"})))
        .await
        .unwrap();
    assert_eq!(read.into_single().unwrap(), json!("hello\n"));

    let cat = platform
        .run_command("cat", Some("h1"), ExecOptions::new().with_input("piped"))
        .await
        .unwrap()
        .into_single()
        .unwrap();
    assert_eq!(cat.stdout, "piped");

    assert!(platform.test_command("apk --version", None).await.unwrap());

    platform.teardown().await.unwrap();
    assert_eq!(platform.state(), PlatformState::TornDown);

    let listing = std::process::Command::new("docker")
        .args(["ps", "-a"])
        .output()
        .unwrap();
    assert!(!String::from_utf8_lossy(&listing.stdout).contains(&prefix));
}

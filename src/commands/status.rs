use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use winsandbox_mcp::control_plane::WsbCli;
use winsandbox_mcp::sandbox::SandboxClient;
use winsandbox_mcp::session::{self, ProcessTableProbe, SessionProbe};

/// List running sandboxes and whether a viewer window is attached to each.
pub async fn run(json: bool) -> anyhow::Result<()> {
    let client = SandboxClient::new(Arc::new(WsbCli::new()));
    let running = client.running(&CancellationToken::new()).await?;

    let probe: Arc<dyn SessionProbe> = Arc::new(ProcessTableProbe);
    let mut sandboxes = Vec::with_capacity(running.len());
    for id in running {
        let attached = session::is_attached(probe.clone(), &id).await;
        sandboxes.push((id, attached));
    }

    if json {
        let entries: Vec<serde_json::Value> = sandboxes
            .iter()
            .map(|(id, attached)| serde_json::json!({ "id": id, "viewer_attached": attached }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("📊 Windows Sandbox Status\n");

    if sandboxes.is_empty() {
        println!("✗ No sandbox is running");
        return Ok(());
    }

    println!("🧱 Sandboxes:");
    for (id, attached) in &sandboxes {
        let viewer = if *attached { "viewer attached" } else { "no viewer" };
        println!("  • {} ({})", id, viewer);
    }

    if sandboxes.len() > 1 {
        println!(
            "\n⚠️  {} sandboxes are running; tools need exactly one",
            sandboxes.len()
        );
    }

    println!();
    Ok(())
}

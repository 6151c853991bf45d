#[tokio::main]
async fn main() -> anyhow::Result<()> {
    redact_bridge_lib::run().await
}

use megaport::MegaportProvider;
use tfplug::{serve, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // stdout carries the plugin handshake, so logs go to stderr
    let level = std::env::var("TF_LOG")
        .ok()
        .and_then(|v| v.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config =
        ServerConfig::new("registry.terraform.io/megaport/megaport").with_args(std::env::args());

    serve(MegaportProvider::new(), config).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mini_recon_cli::run(std::env::args()).await
}

use clap::Parser;
use mini_recon::CsvCodec;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mini-recon-web")]
#[command(about = "Web server for interactive reconciliation")]
struct Args {
    /// Internal ledger CSV to preload
    #[arg(short, long)]
    internal: Option<PathBuf>,

    /// Provider statement CSV to preload
    #[arg(short, long)]
    provider: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, default_value_t = mini_recon_web::DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    mini_recon_web::run(args.internal, args.provider, CsvCodec::default(), args.port).await
}

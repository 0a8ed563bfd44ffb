mod config;
mod export;
mod show;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args as ClapArgs, CommandFactory as _, Parser, Subcommand};
use mini_recon::CsvCodec;
use mini_recon::reconcile::{MISSING_INPUT_MESSAGE, ReconcileConfig};

use config::{Config, ConfigSource};

#[derive(Parser)]
#[command(
    name = "mini-recon",
    about = "Reconcile an internal transaction ledger against a provider statement"
)]
#[command(disable_help_subcommand = true)]
struct Args {
    #[command(flatten)]
    files: FileArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(ClapArgs)]
struct FileArgs {
    /// Internal ledger CSV. Falls back to `[internal] file` from mini-recon.toml.
    #[arg(short, long, global = true)]
    internal: Option<PathBuf>,

    /// Provider statement CSV. Falls back to `[provider] file` from mini-recon.toml.
    #[arg(short, long, global = true)]
    provider: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start web server for interactive reconciliation (default)
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show differences between the internal and provider files and exit
    Diff,
    /// Write matched.csv, only_internal.csv and only_provider.csv
    Export {
        /// Directory to write the files into
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
}

/// Command line inputs merged with the config file; flags take precedence.
struct Resolved {
    internal: Option<PathBuf>,
    provider: Option<PathBuf>,
    export_dir: Option<PathBuf>,
    port: Option<u16>,
    codec: CsvCodec,
}

impl Resolved {
    fn new(files: FileArgs) -> Result<Self> {
        let (base_dir, config) = Config::find_and_load()?.unwrap_or_default();
        let source = |source: Option<ConfigSource>| source.map(|source| base_dir.join(source.file));

        Ok(Resolved {
            internal: files.internal.or_else(|| source(config.internal)),
            provider: files.provider.or_else(|| source(config.provider)),
            export_dir: config.export.map(|export| base_dir.join(export.dir)),
            port: config.server.map(|server| server.port),
            codec: config.csv.0,
        })
    }

    fn reconcile_config(&self) -> Result<ReconcileConfig> {
        match (&self.internal, &self.provider) {
            (Some(internal), Some(provider)) => Ok(ReconcileConfig::new(internal, provider)),
            _ => anyhow::bail!(MISSING_INPUT_MESSAGE),
        }
    }
}

pub async fn run(args: impl IntoIterator<Item = String>) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mini_recon=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    clap_complete::CompleteEnv::with_factory(Args::command).complete();

    let args = Args::parse_from(args);
    let resolved = Resolved::new(args.files)?;

    let command = args.command.unwrap_or(Commands::Serve { port: None });
    match command {
        Commands::Diff => show::show_diff(&resolved.reconcile_config()?, &resolved.codec),
        Commands::Export { out_dir } => {
            let out_dir = out_dir
                .or(resolved.export_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            export::export_all(&resolved.reconcile_config()?, &resolved.codec, &out_dir)
        }
        Commands::Serve { port } => {
            let port = port
                .or(resolved.port)
                .unwrap_or(mini_recon_web::DEFAULT_PORT);
            mini_recon_web::run(resolved.internal, resolved.provider, resolved.codec, port).await
        }
    }
}

use clap::Parser;
use tracing_subscriber::EnvFilter;
use voxmeter::cli::Cli;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Reports go to stdout; keep diagnostics on stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    cli.run()
}

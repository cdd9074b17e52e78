use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "admin-gate")]
#[command(about = "Hardened admin portal and gate for a web application", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Built-in defaults when omitted.
    #[arg(short, long, env = "ADMIN_GATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = admin_gate::lifecycle::run(args.config.as_deref()).await {
        eprintln!("admin-gate: {e}");
        std::process::exit(1);
    }
}

use std::io::{self, BufRead};
use std::path::PathBuf;

use admin_gate::audit::read_jsonl;
use admin_gate::auth::password::hash_password;
use admin_gate::config::load_config;
use clap::{Parser, Subcommand};
use reqwest::redirect::Policy;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Operator tooling for the admin gate", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a password for a [[users]] entry (reads stdin when omitted)
    HashPassword { password: Option<String> },
    /// Parse and validate a configuration file
    CheckConfig { path: PathBuf },
    /// Print the newest entries of a persisted security log
    AuditTail {
        path: PathBuf,
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
    /// Check what a running gate reveals to this host
    Probe {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
        #[arg(short, long, default_value = "/secure-admin-portal")]
        portal: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::HashPassword { password } => {
            let password = match password {
                Some(password) => password,
                None => read_line()?,
            };
            println!("{}", hash_password(&password)?);
        }
        Commands::CheckConfig { path } => {
            let config = load_config(&path)?;
            println!("{}: ok", path.display());
            println!("  portal:    {}", config.admin.portal_path);
            println!("  login:     {}", config.admin.login_path());
            println!("  whitelist: {}", config.admin.ip_whitelist.len());
            println!("  users:     {}", config.users.len());
        }
        Commands::AuditTail { path, count } => {
            let entries = read_jsonl(&path)?;
            let start = entries.len().saturating_sub(count);
            for entry in &entries[start..] {
                println!("{}", serde_json::to_string(entry)?);
            }
        }
        Commands::Probe { url, portal } => {
            let client = reqwest::Client::builder().redirect(Policy::none()).build()?;
            let paths = [
                format!("{portal}/auth/secure-gateway/"),
                format!("{portal}/control-panel/dashboard/"),
                "/admin/".to_string(),
                "/admin/login/".to_string(),
            ];
            for path in paths {
                let res = client.get(format!("{url}{path}")).send().await?;
                let location = res
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                println!("{:>3} {path} {location}", res.status().as_u16());
            }
        }
    }

    Ok(())
}

fn read_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Operator CLI for the permit relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relayer balance, fee price and chain height
    Health,
    /// Contract addresses and reward rates
    Config,
    /// Confirmation state of a transaction
    Status { tx_hash: String },
    /// Reward for a payment amount (smallest units)
    Calculate { amount: String },
    /// Payment-token balance of an address
    Balance { address: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!("{}/api/payment", cli.url.trim_end_matches('/'));

    let path = match &cli.command {
        Commands::Health => "health".to_string(),
        Commands::Config => "config".to_string(),
        Commands::Status { tx_hash } => format!("status/{}", tx_hash),
        Commands::Calculate { amount } => format!("calculate/{}", amount),
        Commands::Balance { address } => format!("balance/{}", address),
    };

    let res = client.get(format!("{}/{}", base, path)).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use ledger_core::{
    constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD},
    LedgerConfig,
};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

mod demo;

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the minimal ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction
    Submit {
        /// Sender
        #[arg(long)]
        from: String,
        /// Recipient
        #[arg(long)]
        to: String,
        /// Amount
        #[arg(long)]
        amount: u64,
    },
    /// Mine pending transactions into a new block
    Mine {
        /// Address credited with the block reward
        #[arg(long)]
        miner: String,
    },
    /// Show the confirmed balance of an address
    Balance { address: String },
    /// Dump every block
    Chain,
    /// Show chain statistics
    Info,
    /// Check hashes and links of the whole chain
    Validate,
    /// Run a local walkthrough without a node
    Demo {
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: u32,
        #[arg(long, default_value_t = DEFAULT_MINING_REWARD)]
        reward: u64,
        /// Search nonces on all cores
        #[arg(long)]
        parallel: bool,
    },
}

#[derive(Serialize)]
struct Tx {
    from: String,
    to: String,
    amount: u64,
}

#[derive(Serialize)]
struct Mine {
    miner: String,
}

async fn print_response(res: reqwest::Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Submit { from, to, amount } => {
            let tx = Tx { from, to, amount };
            let res = client.post(format!("{node}/tx")).json(&tx).send().await?;
            print_response(res).await?;
        }
        Command::Mine { miner } => {
            let res = client
                .post(format!("{node}/mine"))
                .json(&Mine { miner })
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Balance { address } => {
            let res = client
                .get(format!("{node}/balance/{address}"))
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Chain => {
            print_response(client.get(format!("{node}/chain")).send().await?).await?;
        }
        Command::Info => {
            print_response(client.get(format!("{node}/chain/info")).send().await?).await?;
        }
        Command::Validate => {
            print_response(client.get(format!("{node}/chain/valid")).send().await?).await?;
        }
        Command::Demo {
            difficulty,
            reward,
            parallel,
        } => {
            let config = LedgerConfig {
                difficulty,
                reward_amount: reward,
                parallel_mining: parallel,
            };
            demo::run(config)?;
        }
    }
    Ok(())
}

// This is my main entry point for the ledger CLI application
use clap::Parser;
use ledger_chain::{Command, LedgerConfig, MineOutcome, Node, Opt, SubmitOutcome};
use log::{error, info, warn, LevelFilter};
use std::process;

fn main() {
    // Info by default, RUST_LOG still wins when it is set
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    // If something goes wrong, I log the error and exit with code 1
    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

// Each command opens the node, does one thing and prints the result
fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = LedgerConfig::load(opt.config.as_deref())?;
    if let Some(db) = opt.db {
        config.db_path = db;
    }
    let node = Node::open(&config)?;

    match opt.command {
        // When I want to seal the pending pool into new blocks
        Command::Mine { miner, blocks } => {
            for _ in 0..blocks {
                let outcome = node.mine(miner.as_ref())?;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                if let MineOutcome::SupplyExhausted { .. } = outcome {
                    warn!("Stopping: the supply cap has been reached");
                    break;
                }
            }
        }
        Command::Send { from, to, amount } => {
            let outcome = node.submit_transaction(&from, &to, amount)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if let SubmitOutcome::InsufficientBalance { .. } = outcome {
                return Err(format!("Insufficient balance for {from}").into());
            }
        }
        Command::GetBalance { address } => {
            let balance = node.get_balance(&address)?;
            println!("Balance of {address}: {balance}");
        }
        Command::Printchain => {
            println!("{}", serde_json::to_string_pretty(&node.get_chain()?)?);
        }
        Command::Pending => {
            println!(
                "{}",
                serde_json::to_string_pretty(&node.get_pending_transactions()?)?
            );
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&node.status()?)?);
        }
        Command::Verifychain => {
            node.verify_chain()?;
            info!("Chain verified");
            println!("Chain is valid");
        }
    }
    Ok(())
}

use crate::core::{Address, Amount};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ledger-chain", about = "Single-node proof-of-work ledger")]
pub struct Opt {
    #[arg(
        long = "config",
        global = true,
        help = "TOML configuration file (LEDGER_* variables still override it)"
    )]
    pub config: Option<PathBuf>,
    #[arg(long = "db", global = true, help = "Ledger database directory")]
    pub db: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "mine", about = "Mine blocks from the pending transactions")]
    Mine {
        #[arg(long = "miner", help = "Address receiving the subsidy (defaults to the node id)")]
        miner: Option<Address>,
        #[arg(long = "blocks", default_value_t = 1, help = "Number of blocks to mine")]
        blocks: usize,
    },
    #[command(name = "send", about = "Submit a transfer between two addresses")]
    Send {
        #[arg(help = "Sender address")]
        from: Address,
        #[arg(help = "Recipient address")]
        to: Address,
        #[arg(help = "Amount to send", allow_negative_numbers = true)]
        amount: Amount,
    },
    #[command(name = "getbalance", about = "Get the balance of an address")]
    GetBalance {
        #[arg(help = "The address")]
        address: Address,
    },
    #[command(name = "printchain", about = "Print the full chain as JSON")]
    Printchain,
    #[command(name = "pending", about = "Print the transactions waiting for a block")]
    Pending,
    #[command(name = "status", about = "Show length, difficulty and supply")]
    Status,
    #[command(name = "verifychain", about = "Check linkage and proofs of the stored chain")]
    Verifychain,
}

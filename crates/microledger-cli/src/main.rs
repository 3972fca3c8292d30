use anyhow::Result;
use clap::Parser;
use microledger_core::{Block, Chain, Transaction, DEFAULT_BLOCK_CAPACITY, DEFAULT_DIFFICULTY};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "microledger")]
#[command(about = "Single-process ledger demo: transfers batched into mined blocks")]
struct Args {
    /// Proof-of-work difficulty (leading zero hex characters per hash)
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,
    /// Transactions per block
    #[arg(long, default_value_t = DEFAULT_BLOCK_CAPACITY)]
    capacity: usize,
    /// Emit the sealed chain as JSON instead of the text report
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut chain = Chain::with_capacity(args.difficulty, args.capacity);

    // Simulated transfers between a few accounts.
    for (payer, payee, amount) in [
        ("alice", "bob", 10.0),
        ("alice", "bob", 30.0),
        ("bob", "alice", 35.0),
        ("clark", "bob", 10.0),
        ("clark", "alice", 5.0),
        ("clark", "bob", 10.0),
        ("clark", "alice", 5.0),
    ] {
        chain.submit(Transaction {
            payer: payer.into(),
            payee: payee.into(),
            amount,
        });
    }

    // Seal whatever is left in the open block.
    chain.commit();

    chain.verify()?;
    info!("chain verified: {} sealed blocks", chain.blocks().len());

    if args.json {
        println!("{}", serde_json::to_string_pretty(chain.blocks())?);
    } else {
        print_chain(&chain);
    }
    Ok(())
}

fn print_chain(chain: &Chain) {
    println!("--------- chain start ---------");
    println!(
        "proof-of-work difficulty: {} (leading zero hex characters per hash)",
        chain.difficulty()
    );
    for (index, block) in chain.blocks().iter().enumerate() {
        println!();
        print_block(index, block);
    }
    println!();
    println!("--------- chain end ---------");
}

fn print_block(index: usize, block: &Block) {
    println!("block {index}");
    if block.transactions().is_empty() {
        println!("  (no transactions)");
    }
    for tx in block.transactions() {
        println!("  {} -> {}: {}", tx.payer, tx.payee, tx.amount);
    }
    println!("  nonce     : {}", block.nonce());
    println!("  prev hash : {}", block.previous_hash());
    println!("  timestamp : {}", block.timestamp_micros());
    println!("  hash      : {}", block.hash());
}

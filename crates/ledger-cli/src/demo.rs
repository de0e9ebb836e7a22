//! In-process walkthrough of the ledger, no node required.
use anyhow::Result;
use ledger_core::{
    validate_blocks, Block, ChainValidationError, Ledger, LedgerConfig, Transaction,
};
use tracing::info;

const ADDRESSES: [&str; 4] = ["Miner1", "Miner2", "Alice", "Bob"];

pub fn run(config: LedgerConfig) -> Result<Ledger> {
    let mut ledger = Ledger::new(config);
    println!(
        "Initial chain info: {}",
        serde_json::to_string(&ledger.chain_info())?
    );

    println!("\nMining block 1 for Miner1...");
    ledger.mine_pending_transactions("Miner1");
    print_balances(&ledger);

    println!("\nSubmitting transactions...");
    for tx in [
        Transaction::new("Miner1", "Alice", 30),
        Transaction::new("Alice", "Bob", 1000),
        Transaction::new("Bob", "Bob", 5),
    ] {
        let label = format!("{} -> {}: {}", tx.from().unwrap_or("None"), tx.to(), tx.amount());
        match ledger.submit_transaction(tx) {
            Ok(()) => println!("  accepted {label}"),
            Err(e) => println!("  rejected {label} ({e})"),
        }
    }

    println!("\nMining block 2 for Miner2...");
    ledger.mine_pending_transactions("Miner2");
    print_balances(&ledger);

    println!("\n{ledger}\n");
    match ledger.validate_chain() {
        Ok(()) => println!("Blockchain valid: true"),
        Err(e) => println!("Blockchain valid: false ({e})"),
    }

    println!("\nTampering with the amount in block 1 of a copy of the chain...");
    match tampered_copy_check(&ledger)? {
        Ok(()) => println!("Tampered copy valid: true"),
        Err(e) => println!("Tampered copy valid: false ({e})"),
    }

    println!(
        "\nFinal chain info: {}",
        serde_json::to_string(&ledger.chain_info())?
    );
    info!(blocks = ledger.chain().len(), "demo finished");
    Ok(ledger)
}

/// Rewrites the first transaction amount of block 1 in a serialized copy and
/// validates the copy. The ledger itself is not touched.
fn tampered_copy_check(ledger: &Ledger) -> Result<Result<(), ChainValidationError>> {
    let mut json = serde_json::to_value(ledger.chain())?;
    json[1]["transactions"][0]["amount"] = 999_999.into();
    let tampered: Vec<Block> = serde_json::from_value(json)?;
    Ok(validate_blocks(&tampered, ledger.difficulty()))
}

fn print_balances(ledger: &Ledger) {
    println!("Balances:");
    for address in ADDRESSES {
        println!("  {address:<8} {}", ledger.get_balance(address));
    }
}

//! Example: send native currency from an impersonated account
//!
//! Start a fork first, e.g. `anvil --fork-url $ARCHIVE_URL`, then run with
//! `FORK_RPC_URL` pointing at it if it is not on the default port.

use compound_fork_client::{
    types::ether, Address, ForkClient, ForkConfig, ReceiptStatus, TransactionRequest,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("compound_fork_client=info")
        .init();

    let config = Arc::new(ForkConfig::from_env()?);
    println!("Simulator: {:?} at {}", config.simulator, config.rpc_url);

    let client = ForkClient::new(config)?;
    client.health_check().await?;
    println!("Fork at block {}", client.rpc().block_number().await?);

    let recipient = client
        .rpc()
        .accounts()
        .await?
        .into_iter()
        .next()
        .ok_or("simulator exposes no accounts")?;

    // Uniswap governance timelock; any address works once impersonated
    let sender: Address = "0x1a9C8182C09F50C8318d769245beA52c32BE35BC".parse()?;

    client.rpc().impersonate_account(sender).await?;
    client.rpc().set_balance(sender, ether(5)).await?;

    let tx = TransactionRequest::new()
        .from(sender)
        .to(recipient)
        .value(ether(1));
    let submitted = client.submit(tx).await?;
    client.rpc().stop_impersonating_account(sender).await?;

    if let Some(receipt) = submitted.receipt {
        println!(
            "Transfer {:?}: {} (gas used {:?})",
            submitted.hash,
            ReceiptStatus::of(&receipt),
            receipt.gas_used
        );
    }

    println!(
        "Recipient balance: {} wei",
        client.rpc().get_balance(recipient).await?
    );
    Ok(())
}

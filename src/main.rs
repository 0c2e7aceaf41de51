//! # Serverless Operator
//!
//! Entry point: initialize the runtime, then run both controllers until a
//! shutdown signal arrives.

use anyhow::Result;
use serverless_operator::runtime::initialization::initialize;
use serverless_operator::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;
    run_watch_loop(init_result).await
}

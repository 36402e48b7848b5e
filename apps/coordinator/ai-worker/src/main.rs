//! AI Worker - Entry Point
//!
//! Serves AI commands written to the coordinator root.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    coordinator_ai_worker::run().await
}

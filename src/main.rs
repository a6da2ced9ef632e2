//! Staffing Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    staffing_backend::run().await
}

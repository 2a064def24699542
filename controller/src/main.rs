mod actuator;
mod controller;
mod daemon;
mod error;
mod host;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    statwatch_lib::run().await
}

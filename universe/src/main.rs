#[tokio::main]
async fn main() -> std::io::Result<()> {
    universe::run_with_config().await
}

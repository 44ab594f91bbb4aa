#[tokio::main]
async fn main() -> std::io::Result<()> {
    server_manager::run_with_config().await
}

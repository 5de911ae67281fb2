#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = campus_grades::run().await {
        eprintln!("campus-grades fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

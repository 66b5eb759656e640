use clap::Parser;
use melon_proxy::cli::Cli;
use melon_proxy::config::Settings;
use melon_proxy::server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = Settings::new(Cli::parse())?;

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(settings.get_trace_level())
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    server::run(&settings).await?;

    Ok(())
}

use tracing_subscriber::EnvFilter;

use todo_list::{api, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("todo_list=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    api::serve(config).await
}

use dotenvy::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use eventor_server::config::Config;
use eventor_server::db::PgStore;
use eventor_server::mail::{ConsoleMailer, Mailer, SmtpMailer};
use eventor_server::routes::create_routes;
use eventor_server::session::RedisSessionStore;
use eventor_server::state::{AppState, Backends};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,eventor_server=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let store = Arc::new(PgStore::connect(&config.database).await?);
    store.migrate().await?;

    let sessions = Arc::new(RedisSessionStore::connect(&config.redis_url, config.session_ttl).await?);

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("SMTP_HOST not set, mail will only be logged");
            Arc::new(ConsoleMailer)
        }
    };

    let state = AppState::new(
        Backends {
            events: store.clone(),
            reservations: store.clone(),
            users: store,
            sessions: sessions.clone(),
            reset_tokens: sessions,
            mailer,
        },
        &config.frontend_url,
    );

    let app = create_routes(state, &config.cors_allowed_origins, config.production);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

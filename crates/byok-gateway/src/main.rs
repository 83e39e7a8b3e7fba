//! BYOK Gateway - consent authority and encrypted attribute store

use byok_gateway::{run_server_with_shutdown, GatewayConfig};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "byok-gateway")]
#[command(about = "Consent authority and encrypted attribute store for the BYOK vault")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "BYOK_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "BYOK_PORT")]
    port: u16,

    /// Enable debug logging
    #[arg(short, long, env = "BYOK_DEBUG")]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, env = "BYOK_LOG_JSON")]
    log_json: bool,

    /// HS256 secret for identity JWTs
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Consent token signing key (64 hex chars)
    #[arg(long, env = "BYOK_CONSENT_KEY", hide_env_values = true)]
    consent_key: Option<String>,

    /// Trust link signing key (64 hex chars)
    #[arg(long, env = "BYOK_TRUST_LINK_KEY", hide_env_values = true)]
    trust_link_key: Option<String>,

    /// Default consent token TTL in seconds
    #[arg(long, default_value = "3600", env = "BYOK_TOKEN_TTL")]
    token_ttl: u64,

    /// Maximum consent token TTL in seconds
    #[arg(long, default_value = "2592000", env = "BYOK_MAX_TOKEN_TTL")]
    max_token_ttl: u64,

    /// Maximum trust link TTL in seconds (at most 86400)
    #[arg(long, default_value = "86400", env = "BYOK_MAX_LINK_TTL")]
    max_link_ttl: u64,

    /// Requests per second per client
    #[arg(long, default_value = "100", env = "BYOK_RATE_LIMIT")]
    rate_limit: u32,

    /// Allowed CORS origins (comma separated, `*` for any)
    #[arg(long, default_value = "*", env = "BYOK_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Domains counted by the completeness score (comma separated)
    #[arg(long, env = "BYOK_EXPECTED_DOMAINS", value_delimiter = ',')]
    expected_domains: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("byok_gateway={},byok_core={},tower_http=debug", log_level, log_level).into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting BYOK Gateway on {}:{}", args.host, args.port);

    let defaults = GatewayConfig::default();
    let config = GatewayConfig {
        host: args.host,
        port: args.port,
        jwt_secret: Some(args.jwt_secret),
        consent_key_hex: args.consent_key,
        trust_link_key_hex: args.trust_link_key,
        default_token_ttl_secs: args.token_ttl,
        max_token_ttl_secs: args.max_token_ttl,
        max_trust_link_ttl_secs: args.max_link_ttl,
        rate_limit_rps: args.rate_limit,
        cors_origins: args.cors_origins,
        expected_domains: if args.expected_domains.is_empty() {
            defaults.expected_domains.clone()
        } else {
            args.expected_domains
        },
        ..defaults
    };

    run_server_with_shutdown(config, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
    })
    .await
}

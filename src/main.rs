use std::net::SocketAddr;

use clap::Parser;
use storefront_auth::cli::{
    Args, Command, build_config, handle_generate_secret, init_logging, load_jwt_secret,
    open_database, validate_app_url,
};
use storefront_auth::create_app;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    if let Some(Command::GenerateSecret(generate)) = &args.command {
        if !handle_generate_secret(generate) {
            std::process::exit(1);
        }
        return;
    }

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(app_url) = validate_app_url(&args.app_url) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to get local address");
        std::process::exit(1);
    });

    let config = build_config(db, &app_url, jwt_secret, args.jwt_ttl);
    let app = create_app(&config);

    info!(address = %local_addr, issuer = %config.app_url, ttl_minutes = config.ttl_minutes.get(), "Listening");

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

mod routes;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use providers::Generator;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relay-server", about = "Streaming chat-completion relay")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Port to bind.
    #[arg(long, default_value_t = 25696)]
    port: u16,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let generator = web::Data::new(Generator::new());
    tracing::info!(target:"server","listening on {}:{}", args.host, args.port);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(generator.clone())
            .service(routes::ct)
            .service(routes::generate)
    })
    .bind((args.host.as_str(), args.port))?
    .run()
    .await?;
    Ok(())
}

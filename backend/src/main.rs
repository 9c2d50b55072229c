use actix_web::middleware::{Logger, NormalizePath};
use actix_web::{web, App, HttpServer};
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::time::Duration;
use tccon_portal::config::PortalConfig;
use tccon_portal::db::Database;
use tccon_portal::services;
use tccon_portal::services::opstat::store::seed_known_sites;
use tccon_portal::state::AppState;

/// TCCON CAR backend web portal.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn other_error(e: impl ToString) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let args = Args::parse();
    let config = PortalConfig::resolve(args.config.as_deref()).map_err(|e| {
        error!("{}", e);
        other_error(e)
    })?;

    let db = Database::open(
        &config.database.path,
        Duration::from_millis(config.locks.busy_timeout_ms),
    )
    .map_err(other_error)?;

    if config.features.site_status {
        let mut conn = db.connect().map_err(other_error)?;
        let added = seed_known_sites(&mut conn).map_err(other_error)?;
        if added > 0 {
            info!("Seeded status table with {} sites", added);
        }
    }

    let host = config.server.host.clone();
    let port = config.server.port;
    let features = config.features.clone();
    let state = web::Data::new(AppState::new(config, db));

    info!("Server running at http://{}:{}", host, port);

    HttpServer::new(move || {
        let features = features.clone();
        App::new()
            .wrap(NormalizePath::trim())
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(web::FormConfig::default().limit(1024 * 1024))
            .configure(move |cfg| services::configure(cfg, &features))
    })
    .bind((host, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_flag_is_optional() {
        let args = Args::try_parse_from(["carbackend"]).unwrap();
        assert!(args.config.is_none());
        let args = Args::try_parse_from(["carbackend", "-c", "portal.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("portal.toml")));
        assert!(Args::try_parse_from(["carbackend", "--bogus"]).is_err());
    }
}

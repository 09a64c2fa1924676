use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use clap::Parser;

use photograde::analysis::AssessmentPipeline;
use photograde::config::{ModelConfig, ServiceSettings, DEFAULT_CONFIG_PATH, DEFAULT_PORT};
use photograde::model::{ModelRegistry, TorchLoader};
use photograde::notify::{Attachment, TelegramNotifier};
use photograde::routes::{configure_routes, AppState};

#[derive(Parser, Debug)]
#[command(name = "photograde", about = "Image assessment API - server/CLI")]
struct Cli {
    /// Assess a single image, print the JSON report and exit.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Server host.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Server port (falls back to PORT, then 8000).
    #[arg(long)]
    port: Option<u16>,
    /// Send the CLI result to Telegram (TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID).
    #[arg(long, default_value_t = false)]
    send_tg: bool,
    /// Model configuration file (falls back to MODEL_CONFIG, then config/models.yaml).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn fatal(context: &str, err: impl std::fmt::Display) -> io::Error {
    log::error!("{}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

fn build_notifier(settings: &ServiceSettings) -> Option<Arc<TelegramNotifier>> {
    let telegram = settings.telegram.as_ref()?;
    match TelegramNotifier::new(telegram) {
        Ok(notifier) => Some(Arc::new(notifier)),
        Err(e) => {
            log::warn!("Telegram notifier disabled: {}", e);
            None
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let settings = ServiceSettings::from_env();

    let config_path = cli
        .config
        .clone()
        .or_else(|| settings.model_config.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let model_config =
        ModelConfig::load_or_default(&config_path).map_err(|e| fatal("Invalid model config", e))?;

    let registry = Arc::new(ModelRegistry::new(TorchLoader::new(model_config)));
    registry
        .ensure_loaded()
        .await
        .map_err(|e| fatal("Model loading failed", e))?;
    let pipeline =
        AssessmentPipeline::from_registry(&registry).map_err(|e| fatal("Model loading failed", e))?;
    let notifier = build_notifier(&settings);

    if let Some(image_path) = cli.image.as_deref() {
        return run_once(&pipeline, image_path, cli.send_tg, notifier).await;
    }

    let port = cli.port.or(settings.port).unwrap_or(DEFAULT_PORT);
    let bind_address = format!("{}:{}", cli.host, port);
    if settings.send_to_tg_default && notifier.is_none() {
        log::warn!("SEND_TO_TG_DEFAULT is set but Telegram is not configured");
    }

    let state = AppState {
        registry,
        pipeline,
        notifier,
        send_by_default: settings.send_to_tg_default,
    };

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}

async fn run_once(
    pipeline: &AssessmentPipeline,
    image_path: &Path,
    send_tg: bool,
    notifier: Option<Arc<TelegramNotifier>>,
) -> io::Result<()> {
    let bytes = std::fs::read(image_path)?;
    let filename = image_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let report = pipeline
        .assess_bytes(&bytes, &filename)
        .map_err(|e| fatal("Assessment failed", e))?;
    let json = serde_json::to_string_pretty(&report.to_response())
        .map_err(|e| fatal("Failed to serialize report", e))?;
    println!("{}", json);

    if send_tg {
        match notifier {
            Some(notifier) => {
                let attachment = Attachment { bytes, filename };
                if let Err(e) = notifier.send_report(&report, Some(attachment)).await {
                    log::warn!("Telegram notification failed: {}", e);
                }
            }
            None => log::warn!("--send-tg given but TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID are not set"),
        }
    }
    Ok(())
}

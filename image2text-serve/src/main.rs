use std::{path::PathBuf, time::Duration};

use argh::FromArgs;
use image2text::{
    vlm::paligemma::{PaligemmaConfig, PaligemmaLoader},
    AppConfig, InferenceService, ResultPersister,
};
use image2text_serve::{app, AppState, DEFAULT_MAX_UPLOAD_BYTES};

/// Serve image descriptions over HTTP.
#[derive(FromArgs)]
struct Args {
    /// address to listen on
    #[argh(option, default = "String::from(\"0.0.0.0\")")]
    host: String,

    /// HTTP port to listen on
    #[argh(option, default = "8000")]
    port: u16,

    /// default model identifier (overrides I2T_MODEL)
    #[argh(option)]
    model: Option<String>,

    /// directory to write results to (overrides OUTPUT_DIR)
    #[argh(option)]
    output_dir: Option<PathBuf>,

    /// abort a generation after this many seconds
    #[argh(option)]
    timeout_secs: Option<u64>,

    /// maximum request body size in bytes
    #[argh(option, default = "DEFAULT_MAX_UPLOAD_BYTES")]
    max_upload_bytes: usize,

    /// sampler seed
    #[argh(option, default = "299792458")]
    seed: u64,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for ctrl-c: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut config = AppConfig::from_env();
    if let Some(model) = args.model {
        config = config.with_default_model(model);
    }
    if let Some(output_dir) = args.output_dir {
        config = config.with_output_dir(output_dir);
    }

    let persister = ResultPersister::from_config(&config);
    let loader = PaligemmaLoader::new(PaligemmaConfig {
        seed: args.seed,
        ..Default::default()
    });

    log::info!("🚀 Starting the server");
    log::info!("🧠 Default model: {}", config.default_model);
    log::info!("📁 Output directory: {}", persister.output_dir().display());

    let state = AppState::new(InferenceService::new(config, loader), persister)
        .with_generation_timeout(args.timeout_secs.map(Duration::from_secs))
        .with_max_upload_bytes(args.max_upload_bytes);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("🔥 Listening on: http://{addr}");
    log::info!("🔧 Press Ctrl+C to stop the server");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

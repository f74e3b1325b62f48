use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use catalog::DescriptorCatalog;
use clap::Parser;
use foundation::math::{project, LonLat, RenderPoint};
use foundation::DescriptorId;
use layers::{EngineCommand, HeadlessSurface, SyncConfig, SyncEngine, UiEvent};
use serde_json::json;
use streaming::HttpTransport;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless layer sync: fetch, settle and pick")]
struct Args {
    /// Descriptor catalog (JSON array)
    #[arg(long)]
    catalog: PathBuf,

    /// Engine tuning file; environment overrides still apply
    #[arg(long)]
    config: Option<PathBuf>,

    /// Descriptor ids to activate, comma separated
    #[arg(long, value_delimiter = ',')]
    activate: Vec<String>,

    /// Pointer click as x,y (repeatable)
    #[arg(long = "click", allow_hyphen_values = true)]
    clicks: Vec<String>,

    /// Read clicks as lon,lat in degrees instead of render coordinates
    #[arg(long)]
    lonlat: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<(), String> {
    let args = Args::parse();

    let catalog = DescriptorCatalog::load(&args.catalog).map_err(|e| e.to_string())?;
    let config = load_config(args.config.as_ref())?;
    let clicks = args
        .clicks
        .iter()
        .map(|c| parse_click(c, args.lonlat))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        descriptors = catalog.len(),
        debounce_ms = config.debounce_ms,
        max_retries = config.max_retries,
        "starting engine"
    );
    let surface = HeadlessSurface::new().with_pick_options(config.pick_options());
    let mut engine = SyncEngine::new(catalog, surface, Arc::new(HttpTransport::new()), config);

    for id in &args.activate {
        engine
            .dispatch(EngineCommand::SetActive {
                id: DescriptorId::from(id.trim()),
                active: true,
            })
            .map_err(|e| e.to_string())?;
    }
    engine.settle().await.map_err(|e| e.to_string())?;
    engine.drain_events();

    let descriptors: Vec<_> = engine
        .catalog()
        .iter()
        .map(|d| {
            json!({
                "id": d.id.as_str(),
                "name": d.name,
                "active": d.active,
                "features": engine.reconciler().layer(&d.id).map(|l| l.len()),
                "status": d.status,
            })
        })
        .collect();
    let report = json!({"summary": engine.summary(), "descriptors": descriptors});
    println!(
        "{}",
        serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?
    );

    for point in clicks {
        engine
            .dispatch(EngineCommand::Pointer { point })
            .map_err(|e| e.to_string())?;
        for event in engine.drain_events() {
            if let UiEvent::FeatureSelected(_) = event.payload {
                println!("{}", event.payload.to_json());
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<SyncConfig, String> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("{}: {e}", path.display()))?;
            SyncConfig::from_json_str(&text).map_err(|e| format!("{}: {e}", path.display()))?
        }
        None => SyncConfig::default(),
    };
    config.debounce_ms = env_var_u64("SYNC_DEBOUNCE_MS", config.debounce_ms);
    config.retry_base_ms = env_var_u64("SYNC_RETRY_BASE_MS", config.retry_base_ms);
    config.max_retries = env_var_u32("SYNC_MAX_RETRIES", config.max_retries);
    if let Some(ms) = env::var("SYNC_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()) {
        config.timeout_ms = Some(ms);
    }
    Ok(config)
}

fn parse_click(text: &str, lonlat: bool) -> Result<RenderPoint, String> {
    let (a, b) = text
        .split_once(',')
        .ok_or_else(|| format!("click must be x,y: {text:?}"))?;
    let a: f64 = a
        .trim()
        .parse()
        .map_err(|_| format!("bad click coordinate: {text:?}"))?;
    let b: f64 = b
        .trim()
        .parse()
        .map_err(|_| format!("bad click coordinate: {text:?}"))?;
    Ok(if lonlat {
        project(LonLat::new(a, b))
    } else {
        RenderPoint::new(a, b)
    })
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

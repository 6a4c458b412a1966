//! entrylinkd - event check-in kiosk daemon

#[cfg(not(feature = "camera"))]
compile_error!("entrylinkd requires the `camera` feature");

use clap::Parser;
use entrylink::{
    CheckInClient, CheckInResult, CheckInStatus, DashboardData, DashboardPoller, EntryConfig,
    EntryScanner, Error, Result, ScanConfig, camera, logging, metrics,
};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "entrylinkd",
    version,
    about = "Camera-based event check-in kiosk"
)]
struct Cli {
    /// Optional configuration file (toml/yaml). Defaults to entrylink.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override camera by name (takes precedence over config file)
    #[arg(long, value_name = "NAME")]
    device: Option<String>,

    /// Override camera by index (/dev/videoN)
    #[arg(long, value_name = "INDEX")]
    device_index: Option<usize>,

    /// Override the check-in backend base URL
    #[arg(long, value_name = "URL")]
    backend_url: Option<String>,

    /// Decode a single QR token and print it without checking in
    #[arg(long)]
    scan_once: bool,

    /// Check in a member by typed id instead of scanning
    #[arg(long, value_name = "MEMBER_ID")]
    manual: Option<String>,

    /// Print dashboard counts instead of scanning
    #[arg(long)]
    dashboard: bool,

    /// Keep going: scan attendees continuously, or keep refreshing --dashboard
    #[arg(long)]
    watch: bool,

    /// Output results as formatted JSON instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Enable metrics output regardless of configuration file settings
    #[arg(long)]
    metrics: bool,

    /// Override metrics endpoint bind address (e.g. 127.0.0.1:9900)
    #[arg(long, value_name = "ADDR")]
    metrics_bind: Option<String>,

    /// List detected cameras and exit
    #[arg(long)]
    list_cameras: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_cameras {
        list_cameras()?;
        return Ok(());
    }

    let mut config = EntryConfig::load(cli.config.as_deref())?;

    if let Some(ref name) = cli.device {
        config.camera.device_name = Some(name.clone());
        config.camera.device_index = None;
    }

    if let Some(index) = cli.device_index {
        config.camera.device_index = Some(index);
        config.camera.device_name = None;
    }

    if let Some(ref url) = cli.backend_url {
        config.backend.base_url = url.clone();
    }

    if cli.metrics {
        config.logging.metrics = true;
    }

    if let Some(ref bind) = cli.metrics_bind {
        config.logging.metrics_endpoint = Some(bind.clone());
        config.logging.metrics = true;
    }

    logging::init(&config.logging)?;

    let metrics_enabled = config.logging.metrics || config.logging.metrics_endpoint.is_some();
    if metrics_enabled {
        metrics::enable(config.logging.metrics_interval_secs);
        if let Some(ref endpoint) = config.logging.metrics_endpoint {
            let addr = SocketAddr::from_str(endpoint).map_err(|e| {
                Error::Config(format!("Invalid metrics endpoint '{endpoint}': {e}"))
            })?;
            metrics::spawn_http_endpoint(addr)?;
        }
    }

    if config.backend.base_url.is_empty() && !cli.scan_once {
        tracing::warn!(
            "No backend base URL configured (ENTRYLINK_BACKEND_URL); check-in calls will fail"
        );
    }

    let client = Arc::new(CheckInClient::new(config.backend.base_url.clone()));

    if let Some(ref member_id) = cli.manual {
        return handle_manual(&client, member_id, cli.json).await;
    }

    if cli.dashboard {
        return handle_dashboard(client, cli.watch, cli.json).await;
    }

    let camera_config = config.camera_config()?;
    info!(?camera_config, "Starting entrylink scanner");

    let scan_config = ScanConfig { camera_config };
    let scanner = EntryScanner::new(scan_config).await?;

    if cli.scan_once {
        return handle_scan_once(&scanner, cli.json).await;
    }

    handle_kiosk(&scanner, &client, cli.watch, cli.json).await
}

fn list_cameras() -> Result<()> {
    match camera::list_devices() {
        Ok(devices) => {
            if devices.is_empty() {
                println!("No V4L2 cameras detected");
            } else {
                println!("Discovered cameras:");
                for dev in devices {
                    println!("  [{}] {} ({})", dev.index, dev.name, dev.path);
                }
            }
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn handle_manual(client: &CheckInClient, member_id: &str, json: bool) -> Result<()> {
    let result = client.manual_check_in(member_id).await?;
    print_check_in_result(&result, json)?;
    Ok(())
}

async fn handle_dashboard(client: Arc<CheckInClient>, watch: bool, json: bool) -> Result<()> {
    if !watch {
        let data = client.dashboard().await;
        print_dashboard(&data, json)?;
        return Ok(());
    }

    let poller = DashboardPoller::start(client).await;
    let mut updates = poller.subscribe();

    loop {
        let data = *updates.borrow_and_update();
        print_dashboard(&data, json)?;
        if updates.changed().await.is_err() {
            break;
        }
    }

    poller.shutdown().await;
    Ok(())
}

async fn handle_scan_once(scanner: &EntryScanner, json: bool) -> Result<()> {
    let qr = scanner.scan_once().await?;

    if json {
        let payload = json!({
            "token": qr.as_str(),
            "byte_length": qr.as_bytes().len(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if let Some(text) = qr.as_str() {
        println!("QR token: {text}");
    } else {
        println!("QR binary payload ({} bytes)", qr.as_bytes().len());
    }

    Ok(())
}

async fn handle_kiosk(
    scanner: &EntryScanner,
    client: &CheckInClient,
    watch: bool,
    json: bool,
) -> Result<()> {
    println!("Hold an entry QR code up to the camera...");

    loop {
        let qr = scanner.scan_token().await?;

        match qr.as_str() {
            Some(token) => {
                let result = client.check_in(token).await;
                print_check_in_result(&result, json)?;
            }
            None => {
                // Entry tokens are plain strings; anything else is not ours.
                tracing::warn!(
                    byte_length = qr.as_bytes().len(),
                    "Ignoring non-UTF-8 QR payload"
                );
            }
        }

        if !watch {
            break;
        }

        // Leave the attendee a moment to step aside before rescanning.
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    Ok(())
}

fn print_check_in_result(result: &CheckInResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let icon = match result.status {
        CheckInStatus::Success => "✓",
        CheckInStatus::Warning => "⚠",
        CheckInStatus::Error => "✕",
    };

    println!("{icon} {}", result.message);
    if let Some(ref name) = result.name {
        println!("  Name: {name}");
    }
    if let Some(ref id) = result.id {
        println!("  Member ID: {id}");
    }
    if let Some(ref time) = result.check_in_time {
        println!("  Checked in at: {time}");
    }

    Ok(())
}

fn print_dashboard(data: &DashboardData, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(data)?);
        return Ok(());
    }

    println!(
        "Total: {}  Checked in: {}  Pending: {}  ({}% complete)",
        data.total,
        data.checked_in,
        data.not_checked_in,
        data.completion_percentage()
    );

    Ok(())
}

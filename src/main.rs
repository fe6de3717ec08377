use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use citygraph::config::FileConfig;
use citygraph::domain::{FetchParams, NetworkType};
use citygraph::geocode::GeocodingChain;
use citygraph::server::{self, AppState};
use citygraph::service::{DataService, ProgressReporter};

/// Cached OpenStreetMap road graphs, buildings and geocoding
///
/// Examples:
///   # Run the HTTP API on port 8000
///   citygraph serve
///
///   # Warm the cache for a city
///   citygraph fetch "Volgograd, Russia"
///
///   # Look up an address inside a city
///   citygraph geocode "проспект Ленина 1" --city "Volgograd, Russia"
///
///   # Use a config file
///   citygraph --config my-settings.toml serve
#[derive(Parser, Debug)]
#[command(name = "citygraph")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (optional, auto-searches citygraph.toml if not provided)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to bind (defaults to config, then 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (defaults to $PORT, then config, then 8000)
        #[arg(short = 'p', long)]
        port: Option<u16>,
    },
    /// Download (or load from cache) a city's data
    Fetch {
        /// City name, e.g. "Volgograd, Russia"
        city: String,

        /// Network type: drive, drive_service, walk, bike, all, all_private
        #[arg(short = 'n', long, default_value = "drive")]
        network_type: NetworkType,

        /// Keep every OSM node instead of merging street interiors
        #[arg(long)]
        no_simplify: bool,
    },
    /// Resolve an address to coordinates
    Geocode {
        address: String,

        /// City the address is in; results outside known city bounds are rejected
        #[arg(short = 'c', long)]
        city: Option<String>,
    },
    /// Resolve coordinates to an address
    Reverse {
        #[arg(allow_negative_numbers = true)]
        lat: f64,

        #[arg(allow_negative_numbers = true)]
        lon: f64,

        #[arg(short = 'l', long, default_value = "ru")]
        language: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match args.config {
        Some(ref path) => {
            if !path.exists() {
                bail!("Config file not found: {:?}", path);
            }
            FileConfig::from_path(path)?
        }
        None => FileConfig::load().unwrap_or_default(),
    }
    .apply_env();

    match args.command {
        Command::Serve { bind, port } => run_server(config, bind, port),
        Command::Fetch {
            city,
            network_type,
            no_simplify,
        } => {
            let params = FetchParams {
                network_type,
                simplify: !no_simplify,
            };
            run_fetch(&config, &city, params)
        }
        Command::Geocode { address, city } => {
            let geocoder = GeocodingChain::from_config(&config.geocoding)?;
            let spinner = create_spinner("Geocoding address...")?;
            let start = Instant::now();
            match geocoder.address_to_coords(&address, city.as_deref()) {
                Some((lat, lon)) => {
                    spinner.finish_with_message(format!(
                        "{} -> ({:.6}, {:.6}) [{:.1}s]",
                        address,
                        lat,
                        lon,
                        start.elapsed().as_secs_f32()
                    ));
                    Ok(())
                }
                None => {
                    spinner.finish_and_clear();
                    bail!("No coordinates found for address: {}", address)
                }
            }
        }
        Command::Reverse { lat, lon, language } => {
            let geocoder = GeocodingChain::from_config(&config.geocoding)?;
            match geocoder.coords_to_address(lat, lon, &language) {
                Some(address) => {
                    println!("{}", address);
                    Ok(())
                }
                None => bail!("No address found for ({}, {})", lat, lon),
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::builder().from_env_lossy()
    } else {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::builder().parse_lossy(format!("citygraph={}", level))
    };

    let _ = tracing_subscriber::fmt::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(
            "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        ))
        .try_init();
}

fn run_server(config: FileConfig, bind: Option<String>, port: Option<u16>) -> Result<()> {
    let host = bind.unwrap_or_else(|| config.bind.clone());
    let port = port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address: {}:{}", host, port))?;

    // Blocking HTTP clients must be built outside the async runtime
    let data = Arc::new(DataService::from_config(&config)?);
    let geocoder = Arc::new(GeocodingChain::from_config(&config.geocoding)?);
    data.add_progress_callback(|event| {
        tracing::debug!(stage = ?event.stage, percentage = event.percentage, "{}", event.message);
        Ok(())
    });

    tracing::info!(
        cache_dir = %data.local_store().dir().display(),
        shared_store = data.shared_tier().is_up(),
        "data service ready"
    );

    let state = AppState {
        data: data.clone(),
        geocoder: geocoder.clone(),
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(server::serve(addr, state))
}

fn run_fetch(config: &FileConfig, city: &str, params: FetchParams) -> Result<()> {
    let service = DataService::from_config(config)?;
    let start = Instant::now();

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(80));

    let progress = ProgressReporter::new();
    let reporter_bar = bar.clone();
    progress.add_callback(move |event| {
        reporter_bar.set_position(event.percentage as u64);
        reporter_bar.set_message(event.message.clone());
        Ok(())
    });

    let bundle = match service.get_city_data(city, &params, &progress) {
        Ok(bundle) => bundle,
        Err(e) => {
            bar.abandon_with_message("failed");
            return Err(e).context(format!("Failed to load data for {}", city));
        }
    };

    bar.finish_with_message(format!(
        "{}: {} nodes, {} edges, {} buildings [{:.1}s]",
        bundle.city_name,
        bundle.stats.nodes,
        bundle.stats.edges,
        bundle.stats.buildings,
        start.elapsed().as_secs_f32()
    ));
    Ok(())
}

fn create_spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(pb)
}

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use inquire::{CustomType, Text};
use std::sync::Arc;
use tracing::{debug, warn};

use weatherline_core::{
    Config, Connectivity, Coordinates, FileStore, FixedLocation, Query, StaticConnectivity,
    TcpProbe, UnavailableStore, UnconfiguredFetcher, WeatherCache, WeatherGateway, WeatherRecord,
    provider::fetcher_from_config,
};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherline", version, about = "Current weather with offline cache")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API key, language and home location.
    Configure,

    /// Show current weather for a city, coordinates, or the home location.
    Show(ShowArgs),

    /// Inspect or clear the local cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// City name; omit to use coordinates or the configured home location.
    pub city: Option<String>,

    #[arg(long, requires = "lon", conflicts_with = "city", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    #[arg(long, requires = "lat", conflicts_with = "city", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Skip the connectivity check and answer from the cache only.
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// List cached keys.
    List,

    /// Print a cached record.
    Show {
        key: String,

        /// Include entries older than the expiration window.
        #[arg(long)]
        stale: bool,
    },

    /// Remove one cached record.
    Evict { key: String },

    /// Remove all cached records.
    Clear,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show(args) => show(args).await,
            Command::Cache { action } => cache(action).await,
        }
    }
}

fn configure() -> Result<()> {
    let mut cfg = Config::load()?;

    let api_key = Text::new("OpenWeather API key:")
        .with_default(cfg.api_key.as_deref().unwrap_or_default())
        .prompt()
        .context("Failed to read API key")?;
    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }
    cfg.set_api_key(api_key.trim().to_string());

    cfg.lang = Text::new("Language code:")
        .with_default(&cfg.lang)
        .prompt()
        .context("Failed to read language")?;

    let set_home = inquire::Confirm::new("Set a home location?")
        .with_default(cfg.home.is_some())
        .prompt()
        .context("Failed to read answer")?;

    if set_home {
        let latitude: f64 = CustomType::new("Latitude:").prompt().context("Failed to read latitude")?;
        let longitude: f64 =
            CustomType::new("Longitude:").prompt().context("Failed to read longitude")?;
        cfg.home = Some(Coordinates::new(latitude, longitude)?);
    }

    cfg.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn open_cache(cfg: &Config) -> Result<WeatherCache> {
    let path = cfg.store_file_path()?;
    let store = FileStore::open(&path)
        .await
        .with_context(|| format!("Failed to open cache store: {}", path.display()))?;
    Ok(WeatherCache::new(Arc::new(store)))
}

/// Wire a gateway for `show`. Neither a missing API key nor a broken store
/// is fatal here: offline lookups never touch the fetcher, and online
/// lookups only write to the cache on a best-effort basis.
async fn build_gateway(cfg: &Config, connectivity: Arc<dyn Connectivity>) -> WeatherGateway {
    let fetcher = fetcher_from_config(cfg).unwrap_or_else(|e| {
        debug!(error = %e, "fetcher not configured");
        Arc::new(UnconfiguredFetcher::new(e.to_string()))
    });

    let cache = match open_cache(cfg).await {
        Ok(cache) => cache,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "cache store unavailable, continuing without it");
            WeatherCache::new(Arc::new(UnavailableStore::new(format!("{e:#}"))))
        }
    };

    WeatherGateway::new(fetcher, cache, connectivity)
}

async fn lookup(gateway: &WeatherGateway, args: &ShowArgs, cfg: &Config) -> Result<WeatherRecord> {
    let record = match (&args.city, args.lat, args.lon) {
        (Some(city), _, _) => gateway.resolve(&Query::city(city.clone())).await?,
        (None, Some(lat), Some(lon)) => {
            let coords = Coordinates::new(lat, lon)?;
            gateway.resolve(&Query::from(coords)).await?
        }
        _ => {
            let home = cfg.home.ok_or_else(|| {
                anyhow!(
                    "No city, coordinates, or home location given.\n\
                     Hint: pass a city name, use --lat/--lon, or run `weatherline configure`."
                )
            })?;
            gateway.resolve_current_location(&FixedLocation(home)).await?
        }
    };
    Ok(record)
}

async fn show(args: ShowArgs) -> Result<()> {
    let cfg = Config::load()?;

    let connectivity: Arc<dyn Connectivity> = if args.offline {
        Arc::new(StaticConnectivity(false))
    } else {
        Arc::new(TcpProbe::default())
    };

    let gateway = build_gateway(&cfg, connectivity).await;
    let record = lookup(&gateway, &args, &cfg).await?;
    print!("{}", output::render_record(&record));
    Ok(())
}

async fn cache(action: CacheAction) -> Result<()> {
    let cfg = Config::load()?;
    let cache = open_cache(&cfg).await?;

    match action {
        CacheAction::List => {
            for key in cache.keys().await? {
                let state = if cache.is_valid(&key).await? { "valid" } else { "expired" };
                println!("{key}\t{state}");
            }
        }
        CacheAction::Show { key, stale } => {
            let record = if stale {
                cache.read_stale(&key).await?
            } else {
                cache.read_valid(&key).await?
            };
            match record {
                Some(record) => print!("{}", output::render_record(&record)),
                None if stale => bail!("Nothing cached under '{key}'"),
                None => bail!("No valid entry under '{key}' (try --stale)"),
            }
        }
        CacheAction::Evict { key } => {
            cache.evict(&key).await?;
            println!("Evicted '{key}'");
        }
        CacheAction::Clear => {
            cache.clear_all().await?;
            println!("Cache cleared");
        }
    }

    Ok(())
}

//! `atmosphere` - a minimal host for the weather macros.
//!
//! ```sh
//! atmosphere set --token <KEY> --location "Paris"
//! atmosphere refresh --force
//! atmosphere show --template "{{atmo_conditionsc}}"
//! atmosphere watch    # each stdin line counts as a sent message
//! ```

mod host;

use std::path::{Path, PathBuf};

use anyhow::Result;
use atmosphere_core::{Config, EventSource, HostEvent, MacroRegistry, MacroTable};
use atmosphere_weather::{derive_macros, FileSettingsStore, UpdateOutcome};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::host::Host;

#[derive(Parser, Debug)]
#[command(name = "atmosphere")]
#[command(about = "Current weather as text macros")]
struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Update settings
    Set {
        /// WeatherAPI key
        #[arg(long)]
        token: Option<String>,
        /// Location query, e.g. "Paris" or "48.85,2.35"
        #[arg(long)]
        location: Option<String>,
        /// Cache lifetime in minutes
        #[arg(long)]
        cache_lifetime: Option<String>,
        /// Prefer imperial units
        #[arg(long)]
        imperial: Option<bool>,
    },
    /// Show settings and cache state
    Status,
    /// Print macros derived from the cached payload, without fetching
    Show {
        /// Text to expand with the macros instead of listing them
        #[arg(long)]
        template: Option<String>,
    },
    /// Register macros, fetching when the cache is stale
    Refresh {
        /// Fetch even when the cache is still valid
        #[arg(long)]
        force: bool,
    },
    /// Treat each stdin line as a sent message and print it with macros expanded
    Watch,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    atmosphere_core::init()?;
    let cli = Cli::parse();

    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Set {
            token,
            location,
            cache_lifetime,
            imperial,
        } => set(
            load_config(config_path)?,
            token,
            location,
            cache_lifetime,
            imperial,
        ),
        Command::Status => status(&load_config(config_path)?),
        Command::Show { template } => show(&load_config(config_path)?, template.as_deref()),
        Command::Refresh { force } => {
            let (config, _) = Config::load_validated(config_path)?;
            refresh(&config, force).await
        }
        Command::Watch => {
            let (config, _) = Config::load_validated(config_path)?;
            watch(&config).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn set(
    mut config: Config,
    token: Option<String>,
    location: Option<String>,
    cache_lifetime: Option<String>,
    imperial: Option<bool>,
) -> Result<()> {
    if let Some(token) = token {
        config.weather.set_token(&token);
    }
    if let Some(location) = location {
        config.weather.set_location(&location);
    }
    if let Some(lifetime) = cache_lifetime {
        config.weather.set_cache_lifetime(&lifetime);
    }
    if let Some(imperial) = imperial {
        config.weather.units_imperial = imperial;
    }

    config.save()?;
    println!("Saved {}", config.config_file().display());
    print_validation(&config);
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let settings = FileSettingsStore::new(config.clone()).load();
    let weather = &settings.weather;
    let entry = &settings.weather_cache;

    println!("Config:         {}", config.config_file().display());
    println!("Token:          {}", if weather.has_token() { "set" } else { "not set" });
    println!("Location:       {}", weather.location);
    println!("Units:          {}", if weather.units_imperial { "imperial" } else { "metric" });
    println!("Cache lifetime: {} min", weather.cache_lifetime);

    match entry.fetched_at() {
        Some(fetched_at) if entry.data.is_some() => {
            let now = Utc::now();
            let valid = entry.is_valid_at(&weather.location, weather.cache_lifetime, now);
            println!("Cached for:     {}", entry.location);
            println!(
                "Fetched:        {} ({:.0} min ago)",
                fetched_at.to_rfc3339(),
                entry.age_minutes(now)
            );
            println!("Cache valid:    {}", if valid { "yes" } else { "no" });
        }
        _ => println!("Cache:          empty"),
    }

    print_validation(config);
    Ok(())
}

fn show(config: &Config, template: Option<&str>) -> Result<()> {
    let settings = FileSettingsStore::new(config.clone()).load();
    let Some(data) = settings.weather_cache.data else {
        anyhow::bail!("No cached weather yet. Run `atmosphere refresh` first.");
    };
    data.validate()?;

    let macros = derive_macros(&data);
    match template {
        Some(template) => {
            let table = MacroTable::new();
            for (name, derived) in macros.iter() {
                table.register(name, &derived.value)?;
            }
            println!("{}", table.substitute(template));
        }
        None => {
            for (name, derived) in macros.iter() {
                println!("{} = {}", name, derived.value);
            }
        }
    }
    Ok(())
}

async fn refresh(config: &Config, force: bool) -> Result<()> {
    let host = Host::start(config)?;
    let outcome = if force {
        host.atmosphere.refresh().await
    } else {
        host.atmosphere
            .load()
            .await
            .unwrap_or(UpdateOutcome::Failed)
    };

    let result = match outcome {
        UpdateOutcome::Registered { count } => {
            for (name, value) in host.macros.snapshot() {
                println!("{} = {}", name, value);
            }
            tracing::info!("[Atmosphere] {} macros available", count);
            Ok(())
        }
        UpdateOutcome::Skipped => Ok(()),
        UpdateOutcome::Failed => Err(anyhow::anyhow!("No weather data available")),
    };

    host.shutdown().await;
    result
}

async fn watch(config: &Config) -> Result<()> {
    let host = Host::start(config)?;
    host.atmosphere.load().await;

    let events = EventSource::default();
    let rx = events.subscribe();
    let macros = host.macros.clone();

    let input = async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            println!("{}", macros.substitute(&line));
            events.emit(HostEvent::MessageSent);
        }
        Ok::<(), anyhow::Error>(())
    };

    let ((), input_result) = tokio::join!(host.atmosphere.listen(rx), input);

    host.shutdown().await;
    input_result
}

fn print_validation(config: &Config) {
    let validation = config.validate();
    for warning in &validation.warnings {
        println!("warning: {}", warning);
    }
    for error in &validation.errors {
        println!("error: {}", error);
    }
}

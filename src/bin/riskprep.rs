use std::{collections::BTreeSet, num::NonZeroUsize, path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use ar_postcodes::{
    categories::CategoryConfig,
    client::LookupConfigBuilder,
    constants::{DEFAULT_BATCH_SIZE, DEFAULT_CACHE_FILE, DEFAULT_ENDPOINT, ISLAND_AREAS},
    default_http_client, resolve, CacheStore, Client, Field, LocationCache, LocationRecord,
    Payload, Postcode,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tokio::time;

#[derive(Parser, Debug)]
struct CliArgs {
    #[command(subcommand)]
    pub subcommand: Command,

    #[command(flatten)]
    pub global_opts: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    #[arg(short = 'e', long, global = true, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(
        short = 'b',
        long,
        global = true,
        default_value_t = DEFAULT_BATCH_SIZE,
        help = "Postcodes per lookup request (at most 100)"
    )]
    pub batch_size: NonZeroUsize,

    #[arg(
        short = 'f',
        long = "field",
        global = true,
        help = "Field to request: long, lat or itl. Defaults to all three."
    )]
    pub fields: Vec<Field>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(name = "lookup", about = "Look up postcodes without touching the cache")]
    Lookup {
        #[arg(required = true)]
        postcodes: Vec<String>,
    },

    #[clap(
        name = "resolve",
        about = "Resolve the postcodes of a CSV file against the location cache"
    )]
    Resolve(ResolveOpts),

    #[clap(name = "elements", about = "Split postcodes into area, district and sector")]
    Elements {
        #[arg(required = true)]
        postcodes: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct ResolveOpts {
    #[arg(short = 'i', long, help = "CSV file with a postcode column")]
    pub input: PathBuf,

    #[arg(long, default_value = "postcode", help = "Name of the postcode column")]
    pub column: String,

    #[arg(short = 'c', long, default_value = DEFAULT_CACHE_FILE, help = "Location cache file")]
    pub cache: PathBuf,

    #[arg(long, help = "Ignore the existing cache and look everything up again")]
    pub refresh: bool,

    #[arg(long, help = "Keep postcodes from island areas (IM, GY)")]
    pub keep_islands: bool,

    #[arg(long, help = "JSON file with drop_categories / group_categories")]
    pub categories: Option<PathBuf>,

    #[arg(long, help = "Give up after this many seconds")]
    pub timeout: Option<u64>,

    #[arg(short = 'o', long, help = "Output file")]
    pub output_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CliArgs::parse();
    let config = LookupConfigBuilder::default()
        .endpoint(args.global_opts.endpoint.as_str())
        .batch_size(args.global_opts.batch_size)
        .build()?;
    let client = Client::new(default_http_client()?, config);
    let payload = if args.global_opts.fields.is_empty() {
        Payload::new([Field::Longitude, Field::Latitude, Field::ItlCode])
    } else {
        Payload::new(args.global_opts.fields)
    };

    match args.subcommand {
        Command::Lookup { postcodes } => {
            let codes: BTreeSet<Postcode> = postcodes.iter().map(|c| Postcode::new(c)).collect();
            let records = client.fetch_all(codes, &payload).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Resolve(opts) => {
            let required = read_postcodes(&opts)?;
            log::info!("{} distinct postcodes to resolve", required.len());

            let store = CacheStore::new(&opts.cache);
            let cache = if opts.refresh {
                LocationCache::new()
            } else {
                store.load().await?
            };

            let progress = ProgressBar::new_spinner();
            progress.set_style(ProgressStyle::with_template(
                "[{elapsed_precise}] {spinner} {msg}",
            )?);
            progress.set_message("resolving locations");
            progress.enable_steady_tick(Duration::from_millis(120));
            let resolving = resolve(&client, &store, &cache, required.iter().cloned(), &payload);
            let resolved = match opts.timeout {
                Some(secs) => time::timeout(Duration::from_secs(secs), resolving)
                    .await
                    .map_err(|_| anyhow!("location lookup timed out after {secs}s"))??,
                None => resolving.await?,
            };
            progress.finish_and_clear();

            let unresolved = required
                .iter()
                .filter(|code| resolved.get(code).is_none())
                .count();
            if unresolved > 0 {
                log::warn!("{unresolved} postcodes could not be located");
            }
            let records: Vec<LocationRecord> = required
                .iter()
                .filter_map(|code| resolved.get(code).cloned())
                .collect();
            let records = match &opts.categories {
                Some(path) => CategoryConfig::load(path).await?.apply(records),
                None => records,
            };

            let json_output = serde_json::to_string_pretty(&records)?;
            if let Some(output_path) = opts.output_path {
                std::fs::write(output_path, json_output)?;
            } else {
                println!("{}", json_output);
            }
        }
        Command::Elements { postcodes } => {
            let elements: Vec<_> = postcodes
                .iter()
                .map(|raw| {
                    let code = Postcode::new(raw);
                    json!({
                        "postcode": code,
                        "is_ok": code.is_valid(),
                        "elements": code.elements(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&elements)?);
        }
    }

    Ok(())
}

/// Distinct valid postcodes of the input column, islands removed unless asked to keep them.
fn read_postcodes(opts: &ResolveOpts) -> Result<BTreeSet<Postcode>> {
    let mut reader = csv::Reader::from_path(&opts.input)
        .with_context(|| format!("unable to open {}", opts.input.display()))?;
    let column = reader
        .headers()?
        .iter()
        .position(|header| header == opts.column)
        .ok_or_else(|| anyhow!("column `{}` not found in {}", opts.column, opts.input.display()))?;

    let mut codes = BTreeSet::new();
    let mut invalid = 0;
    for row in reader.records() {
        let row = row?;
        let Some(raw) = row.get(column) else {
            continue;
        };
        let code = Postcode::new(raw);
        match code.elements() {
            Some(elements) if opts.keep_islands || !ISLAND_AREAS.contains(&elements.area.as_str()) => {
                codes.insert(code);
            }
            Some(_) => {}
            None => invalid += 1,
        }
    }
    if invalid > 0 {
        log::warn!("skipped {invalid} malformed postcodes");
    }
    Ok(codes)
}

//! Tablegraph CLI
//!
//! Diagnostic surface over the resolution pipeline: resolve a column of
//! cell labels against the live graph, inspect claims, rank candidate
//! property columns, and manage the local cache file. This is the same
//! code path the browser side drives; here the cache backend is a JSON
//! file next to the working directory instead of extension storage.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tablegraph_cache::{CacheConfig, CacheService};
use tablegraph_client::{ClientConfig, WikidataClient};
use tablegraph_model::EntityId;
use tablegraph_resolve::Resolver;

mod file_store;

#[derive(Parser)]
#[command(name = "tablegraph")]
#[command(
    author,
    version,
    about = "Resolve table labels against the Wikidata graph"
)]
struct Cli {
    /// Language code for labels, descriptions, and queries
    #[arg(long, global = true, default_value = "en")]
    language: String,

    /// Cache file shared across invocations
    #[arg(long, global = true, default_value = ".tablegraph-cache.json")]
    cache: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve cell labels to entities
    Resolve {
        /// Raw cell text, one argument per row
        labels: Vec<String>,
        /// Only accept candidates with one of these instance-of types
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
    },
    /// Show claims for entity ids
    Claims {
        /// Entity ids (Q…)
        ids: Vec<String>,
    },
    /// Rank candidate property columns for entity ids
    Rank {
        /// Entity ids (Q…)
        ids: Vec<String>,
    },
    /// Show cache row counts
    Stats,
    /// Drop every cached record
    ClearCache,
}

fn parse_ids(raw: &[String]) -> Result<Vec<EntityId>> {
    raw.iter()
        .map(|id| id.parse().with_context(|| format!("bad entity id {id:?}")))
        .collect()
}

async fn cmd_resolve(resolver: &Resolver, labels: &[String], types: Vec<String>) -> Result<()> {
    let filter: Option<HashSet<String>> = if types.is_empty() {
        None
    } else {
        Some(types.into_iter().collect())
    };

    let outcome = resolver.disambiguation(labels).await;
    if !outcome.primary_types.is_empty() {
        println!(
            "{} {}",
            "dominant types:".bold(),
            outcome.primary_types.join(", ")
        );
    }

    let matches = resolver.resolve_rows(labels, filter.as_ref()).await;
    for (label, row) in labels.iter().zip(&matches) {
        match (&row.entity, &row.display_label) {
            (Some(id), Some(display)) => {
                println!("  {} {label} -> {} ({id})", "ok".green(), display.bold());
            }
            _ => println!("  {} {label} -> {}", "--".red(), "no match".dimmed()),
        }
    }
    Ok(())
}

async fn cmd_claims(resolver: &Resolver, ids: &[String]) -> Result<()> {
    let ids = parse_ids(ids)?;
    let claims = resolver.get_claims(&ids).await;

    for id in &ids {
        match claims.get(id) {
            Some(entity_claims) if !entity_claims.is_empty() => {
                println!("{}", id.to_string().bold());
                for claim in entity_claims {
                    let values: Vec<&str> =
                        claim.values.iter().map(|v| v.display()).collect();
                    println!("  {}: {}", claim.property, values.join("; "));
                }
            }
            _ => println!("{} {}", id.to_string().bold(), "no claims".dimmed()),
        }
    }
    Ok(())
}

async fn cmd_rank(resolver: &Resolver, ids: &[String]) -> Result<()> {
    let ids = parse_ids(ids)?;
    let stats = resolver.rank_properties(&ids).await;
    if stats.is_empty() {
        println!("{}", "no properties to rank".dimmed());
        return Ok(());
    }

    for stat in stats {
        let marker = if stat.visible { " " } else { "H" };
        println!(
            "{marker} {:>4}x {:>3}% {} {}",
            stat.global_usage,
            stat.coverage_percent,
            stat.id.to_string().bold(),
            stat.label
        );
    }
    Ok(())
}

fn cmd_stats(cache: &CacheService) {
    let stats = cache.stats();
    println!("entities:   {}", stats.entities);
    println!("properties: {}", stats.properties);
    println!("claims:     {}", stats.claims);
    println!("labels:     {}", stats.labels);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let backend = Arc::new(file_store::FileBackend::open(&cli.cache)?);
    let cache = CacheService::new(backend, CacheConfig::default());
    let client = WikidataClient::new(ClientConfig::default().with_language(&cli.language))?;
    let resolver =
        Resolver::new(Arc::new(client), cache.clone()).with_language(&cli.language);

    match cli.command {
        Commands::Resolve { labels, types } => cmd_resolve(&resolver, &labels, types).await?,
        Commands::Claims { ids } => cmd_claims(&resolver, &ids).await?,
        Commands::Rank { ids } => cmd_rank(&resolver, &ids).await?,
        Commands::Stats => cmd_stats(&cache),
        Commands::ClearCache => {
            cache.clear_all();
            println!("{}", "cache cleared".green());
        }
    }
    Ok(())
}

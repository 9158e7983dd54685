//! # Cache Admin CLI
//!
//! Command-line tool for inspecting and maintaining the artifact store.
//!
//! Usage:
//!   cache_admin stats [--json]
//!   cache_admin clear
//!   cache_admin get rings=10 segments=24 [--out FILE]
//!   cache_admin similar rings=11 segments=24 mapping=linear [--out FILE]
//!   cache_admin compute rings=10 segments=24 [--statistics] [--store]
//!     (--statistics is shorthand for artifact=statistics)
//!   cache_admin index [--write]
//!   cache_admin enumerate [--limit N]
//!   cache_admin analyze <number>
//!   cache_admin status

use clap::{Parser, Subcommand};
use mapcache::params::opt;
use mapcache::pipeline::StatsSnapshot;
use mapcache::{
    AppConfig, Artifact, ArtifactStore, CacheError, ComputationEngine, ConfigOverrides,
    ParameterSet, PutOutcome, SimilarityResolver,
};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "cache_admin")]
#[command(about = "Inspect and maintain the prime map artifact cache", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "MAPCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Artifact store directory
    #[arg(short, long)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show store statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove every entry and reset counters
    Clear,

    /// Exact lookup for key=value parameters
    Get {
        /// Parameters as key=value pairs
        #[arg(required = true)]
        params: Vec<String>,

        /// Write the artifact payload to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Nearest stored entry for key=value parameters
    Similar {
        #[arg(required = true)]
        params: Vec<String>,

        /// Write the matched artifact payload to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Compute an artifact, optionally caching it
    Compute {
        #[arg(required = true)]
        params: Vec<String>,

        /// Produce the statistics report instead of the point set
        #[arg(long)]
        statistics: bool,

        /// Look up the store first and store the result on a miss
        #[arg(long)]
        store: bool,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List live entries
    Index {
        /// Also write index.json into the store directory
        #[arg(long)]
        write: bool,
    },

    /// List the pre-computation configuration space
    Enumerate {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Analyze a single number (1 - 1,000,000)
    Analyze { number: u64 },

    /// Show the last persisted pipeline stats
    Status,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_overrides(&ConfigOverrides {
        store_dir: cli.dir,
        stats_path: None,
    });
    let open_store = || ArtifactStore::open(config.store.clone());

    match cli.command {
        Commands::Stats { json } => {
            let stats = open_store()?.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("📊 Artifact Store Statistics\n");
                println!("Directory:    {}", config.store.dir.display());
                println!("Entries:      {} / {}", stats.entry_count, stats.max_entries);
                println!("Total size:   {:.2} MB", stats.total_megabytes());
                println!(
                    "Hit ratio:    {:.1}% ({} / {})",
                    stats.hit_ratio * 100.0,
                    stats.hits,
                    stats.requests
                );
                if stats.ttl_secs == 0 {
                    println!("TTL:          disabled");
                } else {
                    println!("TTL:          {}s", stats.ttl_secs);
                }
            }
        }

        Commands::Clear => {
            let removed = open_store()?.clear()?;
            println!("🧹 Removed {} entries", removed);
        }

        Commands::Get { params, out } => {
            let store = open_store()?;
            let params = ParameterSet::parse_assignments(&params)?;
            let key = store.canonicalizer().key(&params)?;
            match store.get(&params)? {
                Some(artifact) => {
                    println!("✅ Hit {}", key);
                    print_artifact(&artifact, out.as_deref())?;
                }
                None => println!("❌ Miss {}", key),
            }
        }

        Commands::Similar { params, out } => {
            let store = open_store()?;
            let params = ParameterSet::parse_assignments(&params)?;
            let resolver = SimilarityResolver::new(config.similarity.clone());
            match resolver.resolve_artifact(&store, &params) {
                Ok((found, artifact)) => {
                    println!("✅ Match {} (score {:.1})", found.key, found.score);
                    println!(
                        "   mapping={:.0} rings={:.0} segments={:.0}",
                        found.breakdown.mapping, found.breakdown.rings, found.breakdown.segments
                    );
                    println!("   {}", found.params.to_canonical_json());
                    print_artifact(&artifact, out.as_deref())?;
                }
                Err(CacheError::NoSimilarMatch { best_score }) => match best_score {
                    Some(score) => println!(
                        "❌ No suitable match (best score {:.1}, threshold {:.1})",
                        score,
                        resolver.policy().threshold
                    ),
                    None => println!("❌ No suitable match (store is empty)"),
                },
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Compute {
            params,
            statistics,
            store,
            out,
        } => {
            let mut params = ParameterSet::parse_assignments(&params)?;
            if statistics {
                // Statistics reports are keyed apart from point sets
                params = params.with(opt::ARTIFACT, "statistics");
            }
            let engine = ComputationEngine::new(config.engine.clone());
            let cache = if store { Some(open_store()?) } else { None };
            let canonicalizer = cache
                .as_ref()
                .map(|c| c.canonicalizer().clone())
                .unwrap_or_default();

            if let Some(cache) = &cache {
                if let Some(artifact) = cache.get(&params)? {
                    println!("✅ Served from cache");
                    print_artifact(&artifact, out.as_deref())?;
                    return Ok(());
                }
            }

            let canonical = canonicalizer.canonicalize(&params)?;
            let computation = engine.compute(&canonical)?;
            let s = &computation.statistics;
            println!(
                "🔨 {}x{} {} -> {} primes, {} points (step {})",
                computation.request.rings,
                computation.request.segments,
                computation.request.mapping,
                s.prime_count,
                computation.points.len(),
                computation.sampling_step
            );
            println!(
                "   twin={} cousin={} sexy={} sophie={} mersenne={} fermat={}",
                s.twin_pairs, s.cousin_pairs, s.sexy_pairs, s.sophie_germain, s.mersenne, s.fermat
            );
            println!(
                "   gap mean={:.3} median={:.1} mode={} entropy={:.3}",
                s.gap_mean, s.gap_median, s.gap_mode, s.gap_entropy
            );

            let artifact = if canonical.artifact() == Some("statistics") {
                computation.to_statistics_artifact()?
            } else {
                computation.to_point_set_artifact()?
            };
            if let Some(cache) = &cache {
                match cache.put(&params, &artifact)? {
                    PutOutcome::Stored(entry) => println!("💾 Stored {}", entry.key),
                    PutOutcome::TooLarge { size, limit } => {
                        println!("⚠️  Not stored: {} bytes exceeds {} byte limit", size, limit)
                    }
                    PutOutcome::Failed(reason) => println!("⚠️  Not stored: {}", reason),
                }
            }
            print_artifact(&artifact, out.as_deref())?;
        }

        Commands::Index { write } => {
            let store = open_store()?;
            let entries = if write {
                let index = store.write_index()?;
                println!("📝 Wrote {}", store.index_path().display());
                index.entries
            } else {
                store.scan_index()
            };
            println!("📋 {} live entries\n", entries.len());
            for entry in entries {
                println!(
                    "{} | {:<10} | {:>10} bytes | {}",
                    &entry.key.to_hex()[..12],
                    entry.kind.as_str(),
                    entry.size_bytes,
                    entry.params.descriptive_name("json")
                );
            }
        }

        Commands::Enumerate { limit } => {
            let configurations = config.enumerator.enumerate();
            println!("📋 {} configurations\n", configurations.len());
            for c in configurations.iter().take(limit) {
                println!("{:>9} | {}", c.total_elements, c.label());
            }
            if configurations.len() > limit {
                println!("... {} more", configurations.len() - limit);
            }
        }

        Commands::Analyze { number } => {
            let analysis = mapcache::engine::analyze_number(number)?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }

        Commands::Status => match StatsSnapshot::load(&config.pipeline.stats_path)? {
            Some(s) => {
                println!("🔄 Pipeline run {}\n", s.run_id);
                println!("State:         {}", s.state);
                println!("Started:       {}", s.started_at.to_rfc3339());
                println!("Last activity: {}", s.last_activity.to_rfc3339());
                if let Some(finished) = s.finished_at {
                    println!("Finished:      {}", finished.to_rfc3339());
                }
                if let Some(task) = &s.current_task {
                    println!("Current task:  {}", task);
                }
                println!(
                    "Progress:      {}/{} ({} generated, {} skipped, {} failed, {} oversized)",
                    s.processed, s.total_configurations, s.generated, s.skipped, s.failed, s.oversized
                );
                println!("Written:       {:.2} MB", s.total_bytes as f64 / (1024.0 * 1024.0));
            }
            None => println!(
                "No pipeline stats at {}",
                config.pipeline.stats_path.display()
            ),
        },
    }

    Ok(())
}

fn print_artifact(artifact: &Artifact, out: Option<&Path>) -> Result<(), Box<dyn Error>> {
    println!(
        "   {} | {} | {} bytes",
        artifact.kind.as_str(),
        artifact.content_type,
        artifact.len()
    );
    if let Some(path) = out {
        fs::write(path, &artifact.data)?;
        println!("   written to {}", path.display());
    }
    Ok(())
}

//! Binary entry point for docprint.
//!
//! Fingerprints documents and records them in a duplicate-checked store.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use docprint::config::{DocprintConfig, normalize_extensions};
use docprint::extraction::PlainTextExtractor;
use docprint::observability::{self, LoggingConfig};
use docprint::services::Fingerprinter;
use docprint::{
    FingerprintEngine, FingerprintService, HashAlgorithm, NormalizationMode, ProcessResult,
    open_store,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CmdResult = Result<ExitCode, Box<dyn std::error::Error>>;

/// Docprint - content fingerprints with duplicate-checked storage.
#[derive(Parser)]
#[command(name = "docprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the fingerprint table if it does not exist.
    Init,

    /// Fingerprint files and store the new ones.
    Ingest {
        /// Files or directories (walked recursively).
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Digest algorithm.
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Fingerprint mode: content or raw.
        #[arg(short, long)]
        mode: Option<String>,

        /// Only pick up files with these extensions when walking directories.
        #[arg(short, long = "ext")]
        extensions: Vec<String>,
    },

    /// Report whether a file is already stored, without storing it.
    Check {
        /// File to check.
        path: PathBuf,

        /// Digest algorithm.
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Fingerprint mode: content or raw.
        #[arg(short, long)]
        mode: Option<String>,
    },

    /// Print the fingerprint of a file without touching the store.
    Digest {
        /// File to fingerprint.
        path: PathBuf,

        /// Digest algorithm.
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Fingerprint mode: content or raw.
        #[arg(short, long)]
        mode: Option<String>,
    },

    /// Compare digest algorithms over a file.
    Benchmark {
        /// File to hash.
        path: PathBuf,

        /// Runs per algorithm; the mean is reported.
        #[arg(short, long, default_value = "10")]
        iterations: u32,

        /// Algorithms to compare (default: all).
        #[arg(short, long = "algorithm")]
        algorithms: Vec<String>,
    },

    /// Show store statistics.
    Stats,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match DocprintConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) =
        observability::init_logging(LoggingConfig::from_env(config.log_format, cli.verbose))
    {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, mut config: DocprintConfig) -> CmdResult {
    let json = cli.json;
    match cli.command {
        Commands::Init => cmd_init(&config, json),
        Commands::Ingest {
            paths,
            algorithm,
            mode,
            extensions,
        } => {
            apply_overrides(&mut config, algorithm.as_deref(), mode.as_deref())?;
            if !extensions.is_empty() {
                config.extensions = normalize_extensions(&extensions);
            }
            cmd_ingest(&config, &paths, json)
        },
        Commands::Check {
            path,
            algorithm,
            mode,
        } => {
            apply_overrides(&mut config, algorithm.as_deref(), mode.as_deref())?;
            cmd_check(&config, &path, json)
        },
        Commands::Digest {
            path,
            algorithm,
            mode,
        } => {
            apply_overrides(&mut config, algorithm.as_deref(), mode.as_deref())?;
            cmd_digest(&config, &path, json)
        },
        Commands::Benchmark {
            path,
            iterations,
            algorithms,
        } => cmd_benchmark(&path, iterations, &algorithms, json),
        Commands::Stats => cmd_stats(&config, json),
    }
}

fn apply_overrides(
    config: &mut DocprintConfig,
    algorithm: Option<&str>,
    mode: Option<&str>,
) -> docprint::Result<()> {
    if let Some(algorithm) = algorithm {
        config.algorithm = HashAlgorithm::parse(algorithm)?;
    }
    if let Some(mode) = mode {
        config.mode = NormalizationMode::parse(mode)?;
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    std::fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()).into())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn short(fingerprint: &str) -> &str {
    &fingerprint[..fingerprint.len().min(16)]
}

fn cmd_init(config: &DocprintConfig, json: bool) -> CmdResult {
    let store = open_store(&config.store)?;
    let count = store.count()?;
    if json {
        println!(
            "{}",
            serde_json::json!({
                "backend": store.backend_name(),
                "table": config.store.table,
                "records": count,
            })
        );
    } else {
        println!(
            "Initialized {} store, table '{}' ({count} records)",
            store.backend_name(),
            config.store.table
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_ingest(config: &DocprintConfig, paths: &[PathBuf], json: bool) -> CmdResult {
    let store = open_store(&config.store)?;
    let service =
        FingerprintService::new(store, PlainTextExtractor::new(), config.pipeline_options());
    let report = service.process_paths(paths)?;

    if json {
        let failures: Vec<_> = report
            .failures
            .iter()
            .map(|(path, e)| serde_json::json!({ "path": path, "error": e.to_string() }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "results": report.results,
                "failures": failures,
                "summary": report.summary,
            }))?
        );
    } else {
        for result in &report.results {
            print_result(result);
        }
        for (path, e) in &report.failures {
            println!("FAILED     {}: {e}", path.display());
        }
        let s = report.summary;
        println!(
            "\n{} documents: {} stored, {} duplicates, {} failed, {} raw fallbacks ({} bytes)",
            s.total, s.stored, s.duplicates, s.failed, s.fallbacks, s.total_bytes
        );
    }

    Ok(if report.summary.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_result(result: &ProcessResult) {
    let fallback = if result.used_fallback() { " [raw fallback]" } else { "" };
    if result.stored {
        let id = result
            .record_id
            .map_or_else(|| "?".to_string(), |id| id.to_string());
        println!(
            "STORED     {} {} id={id} ({:.2} ms){fallback}",
            short(&result.fingerprint),
            result.source_name,
            result.elapsed_ms
        );
    } else if let Some(existing) = &result.conflicting_record {
        println!(
            "DUPLICATE  {} {} of id={} '{}'{fallback}",
            short(&result.fingerprint),
            result.source_name,
            existing.id,
            existing.source_name
        );
    } else {
        println!(
            "NEW        {} {}{fallback}",
            short(&result.fingerprint),
            result.source_name
        );
    }
}

fn cmd_check(config: &DocprintConfig, path: &Path, json: bool) -> CmdResult {
    let raw = read_file(path)?;
    let store = open_store(&config.store)?;
    let service =
        FingerprintService::new(store, PlainTextExtractor::new(), config.pipeline_options());
    let result = service.check(&display_name(path), &raw)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_digest(config: &DocprintConfig, path: &Path, json: bool) -> CmdResult {
    let (fingerprint, content_only, size_bytes, fallback_reason) = match config.mode {
        NormalizationMode::Raw => {
            let file = std::fs::File::open(path)
                .map_err(|e| format!("cannot open {}: {e}", path.display()))?;
            let (digest, size) = FingerprintEngine::digest_reader(file, config.algorithm)?;
            (digest, false, size, None)
        },
        NormalizationMode::ContentOnly => {
            let raw = read_file(path)?;
            let doc = Fingerprinter::new(PlainTextExtractor::new(), &config.pipeline_options())
                .fingerprint(&display_name(path), &raw)?;
            (doc.fingerprint, doc.content_only, doc.size_bytes, doc.fallback_reason)
        },
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "path": path,
                "algorithm": config.algorithm,
                "fingerprint": fingerprint,
                "content_only": content_only,
                "size_bytes": size_bytes,
                "fallback_reason": fallback_reason,
            })
        );
    } else {
        println!("{fingerprint}  {}", path.display());
        if let Some(reason) = fallback_reason {
            eprintln!("note: raw bytes hashed ({reason})");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_benchmark(path: &Path, iterations: u32, names: &[String], json: bool) -> CmdResult {
    let algorithms = if names.is_empty() {
        HashAlgorithm::all().to_vec()
    } else {
        names
            .iter()
            .map(|n| HashAlgorithm::parse(n))
            .collect::<docprint::Result<Vec<_>>>()?
    };
    let raw = read_file(path)?;
    let results = FingerprintEngine::benchmark_iterations(&raw, &algorithms, iterations)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{} ({} bytes, mean of {iterations} runs)\n",
        path.display(),
        raw.len()
    );
    println!("{:<12} {:>14} {:>14}  DIGEST", "ALGORITHM", "MEAN", "MiB/s");
    for result in &results {
        println!(
            "{:<12} {:>14} {:>14.1}  {}",
            result.algorithm.as_str(),
            format!("{:.3?}", result.duration),
            result.throughput_mib_per_sec(),
            short(&result.digest)
        );
    }
    if let Some(fastest) = results.first() {
        println!("\nFastest: {}", fastest.algorithm);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_stats(config: &DocprintConfig, json: bool) -> CmdResult {
    let store = open_store(&config.store)?;
    let count = store.count()?;
    if json {
        println!(
            "{}",
            serde_json::json!({
                "backend": store.backend_name(),
                "table": config.store.table,
                "records": count,
            })
        );
    } else {
        println!("Backend: {}", store.backend_name());
        println!("Table:   {}", config.store.table);
        println!("Records: {count}");
        if config.store.backend == docprint::StoreBackendKind::Sqlite {
            println!("Path:    {}", config.store.sqlite_path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

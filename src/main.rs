//! Chicago CLI - Command-line tool for Source engine save files.
//!
//! This is the main entry point for the chicago command-line application.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use chicago::prelude::*;
use chicago::save::blocks::BlockSet;
use chicago::save::custom::binding_field;
use chicago::save::state_file::StateFileData;

/// Chicago - Source engine save file inspector
#[derive(Parser)]
#[command(name = "chicago")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show statistics of a datamap collection
    Schema {
        /// Path to the collection blob
        #[arg(env = "CHICAGO_SCHEMA")]
        blob: PathBuf,

        /// Print the fields of this class and its bases
        #[arg(short, long)]
        class: Option<String>,
    },

    /// Parse one or more save files
    Parse {
        /// Path to the collection blob
        #[arg(short, long, env = "CHICAGO_SCHEMA")]
        schema: PathBuf,

        /// Save files to parse
        #[arg(required = true)]
        saves: Vec<PathBuf>,

        /// Fail on record length mismatches instead of reporting them
        #[arg(long)]
        strict: bool,

        /// Maximum nesting of field groups
        #[arg(long, env = "CHICAGO_MAX_DEPTH", default_value_t = 32)]
        max_depth: usize,

        /// Allocation cap per save, in bytes
        #[arg(long, env = "CHICAGO_ARENA_LIMIT")]
        arena_limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Schema { blob, class } => {
            cmd_schema(&blob, class.as_deref())?;
        }
        Commands::Parse {
            schema,
            saves,
            strict,
            max_depth,
            arena_limit,
        } => {
            let record_end = if strict {
                RecordEndPolicy::Strict
            } else {
                RecordEndPolicy::Report
            };
            let options = ParseOptions::new()
                .with_record_end(record_end)
                .with_max_depth(max_depth)
                .with_arena_limit(arena_limit);
            cmd_parse(&schema, &saves, options)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_collection(path: &Path) -> Result<Collection> {
    let start = Instant::now();
    let collection = Collection::open(path)
        .with_context(|| format!("Failed to load collection {}", path.display()))?;
    debug!(classes = collection.len(), elapsed = ?start.elapsed(), "loaded collection");
    Ok(collection)
}

fn cmd_schema(blob: &Path, class: Option<&str>) -> Result<()> {
    let collection = load_collection(blob)?;
    let parser = SaveParser::new(&collection);

    println!(
        "{}: {} classes, {} fields, {} linked names",
        blob.display(),
        collection.len(),
        collection.field_count(),
        collection.linked_names().len()
    );

    let registry = parser.registry();
    println!(
        "Custom decoders: {} routines, {} fields",
        registry.len(),
        registry.bindings().len()
    );
    for binding in registry.bindings() {
        let owner = &collection.class(binding.class).name;
        let field = binding_field(&collection, binding).map_or("?", |f| f.name.as_str());
        println!("  {owner}::{field} -> {:?}", binding.decoder);
    }

    if let Some(name) = class {
        let ids = collection.classes_named(name);
        if ids.is_empty() {
            anyhow::bail!("Class {name} not found");
        }
        for &id in ids {
            print_class(&collection, id);
        }
    }

    Ok(())
}

fn print_class(collection: &Collection, id: ClassId) {
    let desc = collection.class(id);
    println!(
        "\n{} [{}] size {}",
        desc.name,
        desc.module.as_deref().unwrap_or("-"),
        desc.instance_size
    );
    let chain: Vec<ClassId> = collection.base_chain(id).collect();
    for class in chain.into_iter().rev() {
        let desc = collection.class(class);
        println!("  {}:", desc.name);
        for field in &desc.fields {
            let kind = field
                .kind()
                .map_or_else(|| format!("kind {}", field.raw_kind), |k| k.to_string());
            println!(
                "    {:>6} {:<16} x{:<4} {}",
                field.offset, kind, field.n_elems, field.name
            );
        }
    }
}

/// Outcome of parsing one save.
struct Report {
    path: PathBuf,
    summary: Result<String>,
    diagnostics: Vec<String>,
}

fn cmd_parse(schema: &Path, saves: &[PathBuf], options: ParseOptions) -> Result<()> {
    let collection = load_collection(schema)?;
    let parser = SaveParser::new(&collection).with_options(options);

    let start = Instant::now();
    let reports: Vec<Report> = if saves.len() > 1 {
        let pb = ProgressBar::new(saves.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("#>-"),
        );
        let reports: Vec<Report> = saves
            .par_iter()
            .map(|path| {
                let report = parse_one(&parser, path);
                pb.inc(1);
                report
            })
            .collect();
        pb.finish_with_message("Done");
        reports
    } else {
        saves.iter().map(|path| parse_one(&parser, path)).collect()
    };

    let mut failed = 0;
    for report in &reports {
        println!("== {}", report.path.display());
        match &report.summary {
            Ok(summary) => print!("{summary}"),
            Err(e) => {
                failed += 1;
                println!("error: {e:#}");
            }
        }
        for diagnostic in &report.diagnostics {
            println!("  warning: {diagnostic}");
        }
    }

    println!(
        "\nParsed {} saves in {:?} ({} failed)",
        reports.len(),
        start.elapsed(),
        failed
    );
    if failed > 0 {
        anyhow::bail!("{failed} of {} saves failed to parse", reports.len());
    }

    Ok(())
}

fn parse_one(parser: &SaveParser<'_>, path: &Path) -> Report {
    let bytes = match fs::read(path).context("Failed to read save file") {
        Ok(bytes) => bytes,
        Err(e) => {
            return Report {
                path: path.to_path_buf(),
                summary: Err(e),
                diagnostics: Vec::new(),
            }
        }
    };

    let arena = parser.options().new_arena();
    let outcome = parser.parse(&bytes, &arena);
    let summary = outcome
        .result
        .context("Failed to parse save")
        .and_then(|save| summarize(&save));
    Report {
        path: path.to_path_buf(),
        summary,
        diagnostics: outcome.diagnostics,
    }
}

fn summarize(save: &SaveFile<'_>) -> Result<String> {
    let mut out = String::new();
    let header = &save.game_header;
    writeln!(out, "  map: {} \"{}\"", header.map_name, header.comment)?;
    if let Some(global) = &save.global_state {
        writeln!(out, "  global entities: {}", global.entities.len())?;
    }
    writeln!(out, "  state files: {}", save.state_files.len())?;

    for file in &save.state_files {
        write!(out, "    {} ({:?})", file.name, file.kind())?;
        match &file.data {
            StateFileData::SaveData(data) => {
                writeln!(out, ": {} adjacent maps", data.adjacency.len())?;
                describe_blocks(&mut out, &data.blocks)?;
            }
            StateFileData::ClientState(state) => {
                let decals = state.decals.map_or(0, |d| d.len());
                let music = state.music.map_or(0, |m| m.len());
                writeln!(out, ": {decals} decals, {music} music entries")?;
                describe_blocks(&mut out, &state.blocks)?;
            }
            StateFileData::EntityPatch(patch) => {
                writeln!(out, ": {} patched entities", patch.entities.len())?;
            }
        }
    }

    Ok(out)
}

fn describe_blocks(out: &mut String, blocks: &BlockSet<'_>) -> Result<()> {
    for block in &blocks.blocks {
        match block {
            Block::Entities(entities) => writeln!(
                out,
                "      Entities: {} of {} restored",
                entities.restored().count(),
                entities.entities.len()
            )?,
            Block::Templates(templates) => {
                writeln!(out, "      Templates: {}", templates.templates.len())?
            }
            Block::EventQueue(queue) => writeln!(out, "      EventQueue: {} events", queue.events.len())?,
            Block::Unhandled { name } => writeln!(out, "      {name}: no handler")?,
            Block::Skipped { name, reason } => writeln!(out, "      {name}: skipped ({reason})")?,
        }
    }
    Ok(())
}

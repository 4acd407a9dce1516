// src/main.rs
// =============================================================================
// Entry point of the hvp-autoembed CLI.
//
// What happens here:
// 1. Set up logging (to stderr, so stdout only carries results)
// 2. Parse command-line arguments using clap
// 3. Dispatch to the subcommand handler
// 4. Exit with a proper code (0 = success, 2 = error)
// =============================================================================

mod activity; // src/activity/ - index building, cache, embed preparation
mod cli; // src/cli.rs - command-line parsing
mod filter; // src/filter/ - phrase substitution over HTML
mod host; // src/host/ - what we need from the LMS, plus the JSON manifest host
mod source; // src/source/ - loading input documents

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use activity::{build_index, embed_content, ActivityIndex, EmbedStyle, HvpFilter};
use cli::{Cli, Commands, CourseArgs};
use host::{CourseHost, FilterContext, ManifestHost};
use source::InputFormat;

#[tokio::main]
async fn main() {
    init_tracing();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// RUST_LOG overrides the default level, e.g. RUST_LOG=hvp_autoembed=debug
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,hvp_autoembed=info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Filter {
            course,
            module,
            format,
            json,
            inputs,
        } => handle_filter(&course, module, format, json, &inputs).await,
        Commands::Index { course, json } => handle_index(&course, json),
        Commands::Embed { manifest, cmid } => handle_embed(&manifest, cmid),
    }
}

// One filtered document, as printed with --json
#[derive(Debug, Serialize)]
struct FilterOutput {
    source: String,
    output: String,
    /// False when no activity name was found
    changed: bool,
}

async fn handle_filter(
    course: &CourseArgs,
    module: Option<u64>,
    format: InputFormat,
    json: bool,
    inputs: &[String],
) -> Result<i32> {
    let host = ManifestHost::load(&course.manifest)?;
    let documents = source::load_documents(inputs, format).await?;
    info!(count = documents.len(), "loaded document(s)");

    let context = FilterContext::new(course.context_level(module), course.user);

    // One filter for every document, so the index is built once
    let mut filter = HvpFilter::new();
    let results: Vec<FilterOutput> = documents
        .iter()
        .map(|doc| {
            let output = filter.filter(&host, &doc.text, &context);
            FilterOutput {
                source: doc.source.clone(),
                changed: matches!(output, Cow::Owned(_)),
                output: output.into_owned(),
            }
        })
        .collect();

    debug!(builds = filter.cache().builds(), "filter done");
    report_side_effects(&host);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if let [only] = results.as_slice() {
        print!("{}", only.output);
    } else {
        for result in &results {
            println!("==> {} <==", result.source);
            println!("{}", result.output);
        }
    }

    let changed = results.iter().filter(|r| r.changed).count();
    info!(changed, total = results.len(), "document(s) with embedded activities");
    Ok(0)
}

fn handle_index(course: &CourseArgs, json: bool) -> Result<i32> {
    let host = ManifestHost::load(&course.manifest)?;
    let style = EmbedStyle::resolve(&host.active_string_filters());
    let index = build_index(&host, course.course, course.user);
    report_side_effects(&host);

    if json {
        println!("{}", serde_json::to_string_pretty(&index)?);
    } else {
        print_table(&index, style);
    }
    Ok(0)
}

fn handle_embed(manifest: &Path, cmid: u64) -> Result<i32> {
    let host = ManifestHost::load(manifest)?;

    match embed_content(&host, cmid) {
        Ok(content_id) => {
            report_side_effects(&host);
            println!("{}", content_id);
            Ok(0)
        }
        Err(e) => {
            // Shown to the user as-is, like the endpoint's error page
            eprintln!("Error: {}", e);
            Ok(2)
        }
    }
}

fn report_side_effects(host: &ManifestHost) {
    debug!(assets = ?host.assets(), views = ?host.views(), "page side effects");
}

// Prints the index as a table, longest name first (the order it is applied in)
fn print_table(index: &ActivityIndex, style: EmbedStyle) {
    println!("Embed style: {:?}", style);
    println!("{:<10} {:<50} {:<10}", "KEY", "NAME", "CLOSE");
    println!("{}", "=".repeat(72));

    for entry in index.entries() {
        let name = &entry.phrase.phrase;
        let name_display = if name.chars().count() > 47 {
            format!("{}...", name.chars().take(47).collect::<String>())
        } else {
            name.clone()
        };
        println!(
            "{:<10} {:<50} {:<10}",
            entry.key.to_string(),
            name_display,
            entry.phrase.close
        );
    }

    println!();
    println!("Entries: {}", index.len());
}

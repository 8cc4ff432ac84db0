//! jarnest - inspect a nested-archive bundle the way the loader sees it.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use jarnest::core::platform::parse_version_tier;
use jarnest::{ClassSource, JarLoader, LoaderResult, LoaderSettings, Platform, Verbosity};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "jarnest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bundle to ingest
    bundle: PathBuf,

    /// Entry point to use instead of the one declared under main/
    #[arg(long = "main")]
    main_class: Option<String>,

    /// JSON settings file; JARNEST_* variables are used otherwise
    #[arg(short, long, env = "JARNEST_SETTINGS")]
    settings: Option<PathBuf>,

    /// Host runtime version (e.g. 17 or 1.8.0_292) for versioned entries
    #[arg(long)]
    runtime_version: Option<String>,

    /// Class to load (dotted name); repeatable
    #[arg(short, long = "class")]
    classes: Vec<String>,

    /// Resource to look up; repeatable
    #[arg(short, long = "resource")]
    resources: Vec<String>,

    /// Native library to materialize; repeatable
    #[arg(short, long = "library")]
    libraries: Vec<String>,

    /// Increase verbosity (-v debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every requested lookup succeeded.
fn run(cli: Cli) -> LoaderResult<bool> {
    let mut settings = match &cli.settings {
        Some(path) => LoaderSettings::load(path)?,
        None => LoaderSettings::from_env(),
    };
    if cli.verbose > 0 {
        settings.verbosity = Verbosity::Verbose;
    }
    jarnest::init_tracing(settings.verbosity);
    debug!("settings: {:?}", settings);

    let mut platform = Platform::current();
    if let Some(tier) = cli.runtime_version.as_deref().and_then(parse_version_tier) {
        platform = platform.with_version_tier(tier);
    }

    let loader = JarLoader::builder()
        .settings(settings)
        .platform(platform)
        .bundle_path(&cli.bundle)
        .build()?;
    let report = loader.ingest_bundle(cli.main_class.as_deref())?;

    println!("bundle:       {}", loader);
    let platform = loader.platform();
    match platform.effective_tier() {
        Some(tier) => println!("platform:     {:?} {} (tier {tier})", platform.os, platform.arch),
        None => println!("platform:     {:?} {}", platform.os, platform.arch),
    }
    println!(
        "main class:   {}",
        report.main_class.as_deref().unwrap_or("<none>")
    );
    if let Some(archive) = &report.main_archive {
        println!("declared by:  {archive}");
    }
    println!("sub-archives: {}", report.sub_archives);
    println!("entries:      {}", loader.store().len());
    for failure in &report.failures {
        println!("unreadable:   {failure}");
    }
    for conflict in &report.sealing_conflicts {
        println!("sealing:      {conflict}");
    }

    let mut all_found = true;
    for class in &cli.classes {
        match loader.load_class(class) {
            Ok(defined) => println!(
                "class {class}: {} bytes from {}",
                defined.bytes.len(),
                defined.domain.codebase
            ),
            Err(e) => {
                all_found = false;
                println!("class {class}: {e}");
            }
        }
    }

    for resource in &cli.resources {
        match loader.resource_stream(resource) {
            Some(mut stream) => {
                let mut bytes = Vec::new();
                stream.read_to_end(&mut bytes)?;
                let locations: Vec<String> = loader
                    .find_resources(resource)
                    .map(|locator| locator.url)
                    .collect();
                println!("resource {resource}: {} bytes", bytes.len());
                for location in locations {
                    println!("  {location}");
                }
            }
            None => {
                all_found = false;
                println!("resource {resource}: not found");
            }
        }
    }

    for library in &cli.libraries {
        match loader.find_library(library) {
            Some(path) => println!("library {library}: {}", path.display()),
            None => {
                all_found = false;
                println!("library {library}: not bundled");
            }
        }
    }

    Ok(all_found)
}

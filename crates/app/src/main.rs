//! Relay CLI: discover `test_<name>.<suffix>.json` scenario files and run
//! them against live endpoints.

mod host;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relay_application::{Host, HttpClient, ScenarioRunner, UserFunctionRegistry};
use relay_domain::EngineConfig;
use relay_infrastructure::{discover, load_scenario, scenario_name, ReqwestHttpClient, ScenarioFile};

use host::ConsoleHost;

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "Declarative HTTP scenario runner")]
struct Args {
    /// Scenario file or directory to search.
    path: PathBuf,

    /// Configuration file (JSON). Defaults to `relay.json` next to the
    /// target when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scenario file suffix, overriding the configuration file.
    #[arg(long)]
    suffix: Option<String>,

    /// Fixture table (JSON object of name to value).
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Root directory bounding `$ref` and upload paths. Defaults to the
    /// scenario's directory.
    #[arg(long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    config.validate()?;

    let fixtures: HashMap<String, serde_json::Value> = match &args.fixtures {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => HashMap::new(),
    };

    let files = collect_files(&args, &config)?;
    if files.is_empty() {
        eprintln!("no scenario files found under {}", args.path.display());
        std::process::exit(2);
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let registry = Arc::new(UserFunctionRegistry::new());
    let host = Arc::new(ConsoleHost::new(fixtures, cancel));

    let mut failed_scenarios = 0usize;
    for file in &files {
        println!("scenario {}", file.name);
        let scenario_dir = file
            .path
            .parent()
            .map_or_else(|| PathBuf::from("."), std::path::Path::to_path_buf);
        let root = args.root.clone().unwrap_or_else(|| scenario_dir.clone());

        let scenario = match load_scenario(&file.path, &config, Some(&root)) {
            Ok(scenario) => scenario,
            Err(e) => {
                println!("  ERROR {e}");
                failed_scenarios += 1;
                continue;
            }
        };

        let runner = ScenarioRunner::new(
            Arc::clone(&http),
            Arc::clone(&registry),
            Arc::clone(&host) as Arc<dyn Host>,
            config.clone(),
            scenario_dir,
            root,
        );
        match runner.run(&scenario).await {
            Ok(outcome) if outcome.passed => {}
            Ok(_) => failed_scenarios += 1,
            Err(e) => {
                println!("  ERROR {e}");
                failed_scenarios += 1;
            }
        }
    }

    println!(
        "{} scenario(s), {} failed, {} stage failure(s)",
        files.len(),
        failed_scenarios,
        host.failure_count()
    );
    if failed_scenarios > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let explicit = args.config.clone();
    let implicit = if args.path.is_dir() {
        args.path.join("relay.json")
    } else {
        args.path
            .parent()
            .map_or_else(|| PathBuf::from("relay.json"), |p| p.join("relay.json"))
    };

    let mut config = match explicit {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(&path)?)?,
        None if implicit.is_file() => {
            serde_json::from_str(&std::fs::read_to_string(&implicit)?)?
        }
        None => EngineConfig::default(),
    };
    if let Some(suffix) = &args.suffix {
        config.suffix.clone_from(suffix);
    }
    Ok(config)
}

fn collect_files(
    args: &Args,
    config: &EngineConfig,
) -> Result<Vec<ScenarioFile>, Box<dyn std::error::Error>> {
    if args.path.is_dir() {
        return Ok(discover(&args.path, &config.suffix)?);
    }
    let file_name = args
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let name = scenario_name(file_name, &config.suffix)
        .unwrap_or_else(|| file_name.to_string());
    Ok(vec![ScenarioFile {
        path: args.path.clone(),
        name,
    }])
}

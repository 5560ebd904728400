//! Stepwise CLI Entry Point
//!
//! Inspects and repairs persisted progress trees.
//!
//! # Usage
//!
//! ```bash
//! # Show the recorded tree with outcomes and timings
//! stepwise show deploy.state.json
//!
//! # Look up one node by dot path
//! stepwise get deploy.state.json migrate.schema
//!
//! # Rewind the most recent failed attempt so the next run retries it
//! stepwise recover deploy.state.json
//!
//! # Gantt chart of recorded step timings
//! stepwise timeline deploy.state.json
//!
//! # Path of the most recent attempt
//! stepwise last deploy.state.json
//! ```

use std::env;
use std::process::ExitCode;

use colored::Colorize;
use log::{debug, info, warn};

use stepwise::monitoring::{render_tree, StepTimeline, TreeSummary};
use stepwise::persistence::StateFormat;
use stepwise::{Adapter, FileAdapter, State, StateNode, APP_NAME, VERSION};

/// Subcommands of the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Show,
    Get,
    Recover,
    Timeline,
    Last,
}

impl Command {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "show" => Some(Command::Show),
            "get" => Some(Command::Get),
            "recover" => Some(Command::Recover),
            "timeline" => Some(Command::Timeline),
            "last" => Some(Command::Last),
            _ => None,
        }
    }
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    command: Command,
    state_path: String,
    node_path: Option<String>,
    format: Option<StateFormat>,
    color: bool,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints usage information.
fn print_usage() {
    println!("{} v{}", APP_NAME, VERSION);
    println!("Resumable step execution engine: state inspection tool");
    println!();
    println!("Usage: stepwise [OPTIONS] <COMMAND> <STATE_FILE> [PATH]");
    println!();
    println!("Commands:");
    println!("  show <STATE_FILE>           Print the recorded tree");
    println!("  get <STATE_FILE> <PATH>     Print one node addressed by dot path");
    println!("  recover <STATE_FILE>        Rewind the most recent failed attempt");
    println!("  timeline <STATE_FILE>       Print a Gantt chart of step timings");
    println!("  last <STATE_FILE>           Print the path of the most recent attempt");
    println!();
    println!("Options:");
    println!("  --format json|yaml  Override the format inferred from the extension");
    println!("  --no-color          Disable colored output");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Exits with status 2 when the recorded run failed.");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut positional: Vec<String> = Vec::new();
    let mut format = None;
    let mut color = true;
    let mut verbose = false;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                verbose = true;
            }
            "--no-color" => {
                color = false;
            }
            "--format" => {
                i += 1;
                if i >= args.len() {
                    return Err("--format requires json or yaml".to_string());
                }
                format = Some(StateFormat::parse(&args[i]).map_err(|e| e.to_string())?);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => positional.push(arg.clone()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = match positional.next() {
        Some(name) => Command::parse(&name).ok_or_else(|| format!("Unknown command: {}", name))?,
        None => return Err("Missing command".to_string()),
    };
    let state_path = positional
        .next()
        .ok_or_else(|| "Missing state file".to_string())?;
    let node_path = positional.next();

    match (command, &node_path) {
        (Command::Get, None) => return Err("get requires a PATH argument".to_string()),
        (Command::Get, Some(_)) | (_, None) => {}
        (_, Some(extra)) => return Err(format!("Unexpected argument: {}", extra)),
    }
    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {}", extra));
    }

    Ok(Config {
        command,
        state_path,
        node_path,
        format,
        color,
        verbose,
    })
}

/// Opens the adapter for an existing state file.
fn open_adapter(config: &Config) -> Result<FileAdapter, Box<dyn std::error::Error>> {
    let adapter: FileAdapter = match config.format {
        Some(format) => FileAdapter::with_format(config.state_path.as_str(), format),
        None => FileAdapter::new(config.state_path.as_str())?,
    };

    if !adapter.exists() {
        return Err(format!("State file not found: {}", config.state_path).into());
    }
    debug!("Using {:?} state at {}", adapter.format(), adapter.path().display());
    Ok(adapter)
}

fn print_node(node: &State, color: bool) -> Result<(), Box<dyn std::error::Error>> {
    let status = if node.failed() {
        "failed"
    } else if node.succeeded() {
        "succeeded"
    } else if node.proceeding() {
        "proceeding"
    } else {
        "not started"
    };
    let status = if !color {
        status.normal()
    } else if node.failed() {
        status.red().bold()
    } else if node.succeeded() {
        status.green()
    } else {
        status.yellow()
    };

    println!("name:     {}", node.name());
    println!("status:   {}", status);
    if let Some(started) = node.started_at() {
        println!("started:  {}", started.to_rfc3339());
    }
    if let Some(done) = node.done_at() {
        println!("done:     {}", done.to_rfc3339());
    }
    for err in node.errors() {
        println!("error:    {}", err);
    }
    println!("children: {}", node.children_len());

    let info = node.info();
    if !info.is_null() {
        println!("info:     {}", serde_json::to_string_pretty(&info)?);
    }
    Ok(())
}

/// Main application entry point.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    let adapter = open_adapter(&config)?;
    let state = adapter.load_state()?;

    match config.command {
        Command::Show => {
            print!("{}", render_tree(&state, config.color));
            println!();
            println!("{}", TreeSummary::of(&state));
        }
        Command::Get => {
            let path = config.node_path.as_deref().unwrap_or_default();
            let node = state.get(path)?;
            print_node(&node, config.color)?;
        }
        Command::Recover => {
            if !state.failed() {
                warn!("Nothing to recover: '{}' has not failed", config.state_path);
                return Ok(ExitCode::SUCCESS);
            }
            let last = state.last_path();
            state.recover();
            adapter.save_state(&state)?;
            info!("Recovered {}", adapter.path().display());
            println!("Rewound '{}'", last);
        }
        Command::Timeline => {
            let timeline = StepTimeline::from_state(&state);
            print!("{}", timeline.gantt_chart());
        }
        Command::Last => {
            println!("{}", state.last_path());
        }
    }

    if state.failed() && config.command != Command::Recover {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

//! factql REPL - load JSON, query it with EQL-S
//!
//! Usage: factql [-c config.toml] [-t <type> <file.json>]...
//!
//! Commands:
//!   :help       - Show help
//!   :quit       - Exit REPL
//!   :load       - Load a JSON file
//!   :catalog    - Show discovered attributes
//!   :reset      - Reset all state

use std::fs;
use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tracing_subscriber::EnvFilter;

use factql::config::EngineConfig;
use factql::repl::{
    format_catalog, format_response, InputResult, MetaCommand, ReplState, DEFAULT_ID_FIELD,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const PROMPT: &str = "factql> ";
const CONTINUATION: &str = "......  ";

/// Command line options.
struct Args {
    config: Option<PathBuf>,
    /// (type label, file) pairs to load on startup
    files: Vec<(String, PathBuf)>,
}

/// Parse command line arguments.
///
/// Usage: factql [-c <config>] [-t <type> <file>]...
///
/// Options:
///   -c, --config <path>        Load engine settings from a TOML file
///   -t, --type <type> <file>   Load a JSON file as entities of <type>
///   -h, --help                 Show help and exit
///   -v, --version              Show version and exit
fn parse_args(args: &[String]) -> Args {
    let mut parsed = Args {
        config: None,
        files: Vec::new(),
    };
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "-c" | "--config" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("Error: -c requires a path argument");
                    std::process::exit(1);
                }
            }
            "-t" | "--type" => {
                if i + 2 < args.len() {
                    parsed
                        .files
                        .push((args[i + 1].clone(), PathBuf::from(&args[i + 2])));
                    i += 3;
                } else {
                    eprintln!("Error: -t requires a type and a file");
                    std::process::exit(1);
                }
            }
            "-h" | "--help" => {
                println!("factql v{} - JSON fact store and query REPL", VERSION);
                println!();
                println!("Usage: factql [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <path>        Load engine settings from a TOML file");
                println!("  -t, --type <type> <file>   Load a JSON file as entities of <type>");
                println!("  -h, --help                 Show this help message");
                println!("  -v, --version              Show version");
                println!();
                println!("Examples:");
                println!("  factql -t post posts.json");
                println!("  factql -c factql.toml -t font fonts.json -t post posts.json");
                println!();
                println!("Set RUST_LOG=debug to trace compilation and evaluation.");
                std::process::exit(0);
            }
            "-v" | "--version" => {
                println!("factql v{}", VERSION);
                std::process::exit(0);
            }
            _ => {
                eprintln!("Error: Unknown argument '{}'", arg);
                eprintln!("Try 'factql --help' for usage information");
                std::process::exit(1);
            }
        }
    }

    parsed
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&args);

    let config = match &args.config {
        Some(path) => match EngineConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    println!("factql v{} - JSON fact store and query REPL", VERSION);
    println!("Type :help for help, :quit to exit\n");

    let mut state = ReplState::new(config);

    for (type_label, path) in &args.files {
        match state.load_file(type_label, path, DEFAULT_ID_FIELD) {
            Ok(n) => println!("Loaded {} facts from {}", n, path.display()),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    let rl_config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<(), DefaultHistory> = match Editor::with_config(rl_config) {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error: failed to create editor: {}", e);
            std::process::exit(1);
        }
    };

    let history_path = dirs_history_path();
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    loop {
        let prompt = if state.input_buffer.is_empty() {
            PROMPT
        } else {
            CONTINUATION
        };

        match rl.readline(prompt) {
            Ok(line) => match state.process_line(&line) {
                InputResult::MetaCommand(cmd) => {
                    if !handle_command(&mut state, cmd) {
                        break;
                    }
                }
                InputResult::Query(source) => {
                    let response = state.execute_query(&source);
                    println!("{}", format_response(&source, &response));
                }
                InputResult::Incomplete | InputResult::Empty => {}
            },
            Err(ReadlineError::Interrupted) => {
                if !state.input_buffer.is_empty() {
                    state.input_buffer.clear();
                    state.paren_depth = 0;
                    println!("^C");
                } else {
                    println!("Use :quit or Ctrl-D to exit");
                }
            }
            Err(ReadlineError::Eof) => {
                if let Some(source) = state.force_submit() {
                    let response = state.execute_query(&source);
                    println!("{}", format_response(&source, &response));
                } else {
                    println!("\nGoodbye!");
                    break;
                }
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = rl.save_history(path);
    }
}

/// Handle a meta-command. Returns false if we should exit.
fn handle_command(state: &mut ReplState, cmd: MetaCommand) -> bool {
    match cmd {
        MetaCommand::Help => print_help(),
        MetaCommand::Quit => {
            println!("Goodbye!");
            return false;
        }
        MetaCommand::Load {
            type_label,
            path,
            id_field,
        } => match state.load_file(&type_label, &path, &id_field) {
            Ok(n) => println!("Loaded {} facts from {}", n, path.display()),
            Err(e) => eprintln!("Error: {}", e),
        },
        MetaCommand::Link {
            source,
            relation,
            target,
        } => {
            state.add_link(&source, &relation, &target);
            println!("Linked {} -[{}]-> {}", source, relation, target);
        }
        MetaCommand::Rule(definition) => match state.define_rule(&definition) {
            Ok(()) => println!("Rule defined"),
            Err(e) => eprintln!("Error: {}", e),
        },
        MetaCommand::Catalog => print!("{}", format_catalog(state.engine.catalog())),
        MetaCommand::Stats => {
            let stats = state.engine.stats();
            println!("  facts:      {}", stats.fact_count);
            println!("  links:      {}", stats.link_count);
            println!("  entities:   {}", stats.entity_count);
            println!("  attributes: {}", stats.attribute_count);
            println!("  rules:      {}", state.engine.evaluator().rules().count());
        }
        MetaCommand::Explain(source) => {
            let response = state.explain_query(&source);
            println!("{}", format_response(&source, &response));
        }
        MetaCommand::Reset => {
            state.reset();
            println!("State reset");
        }
        MetaCommand::Unknown(msg) => {
            eprintln!("{}", msg);
            eprintln!("Type :help for available commands");
        }
    }
    true
}

fn print_help() {
    println!("factql REPL Commands:");
    println!();
    println!("  :help                          Show this help");
    println!("  :quit                          Exit the REPL");
    println!("  :load <type> <file> [id]       Load JSON records as <type> entities");
    println!("  :link <src> <rel> <dst>        Add a link between two entities");
    println!("  :rule <head> :- <goals>        Define a derived predicate");
    println!("  :catalog                       Show discovered attributes");
    println!("  :stats                         Show store counters");
    println!("  :explain <query>               Run a query and show its plan");
    println!("  :reset                         Drop all data and rules");
    println!();
    println!("Queries:");
    println!("  FIND post AS ?p WHERE ?p.views > 1000 RETURN ?p, ?p.title");
    println!("  from post | where ?post.tags = \"rust\" | return ?post.title");
    println!("  attr(?p, \"views\", ?v), gt(?v, 1000)");
    println!();
    println!("Multi-line input continues while parentheses are open or a line ends in | or ,");
}

fn dirs_history_path() -> Option<PathBuf> {
    let mut path = dirs_config_dir()?;
    path.push("factql");
    path.push("history");
    Some(path)
}

/// Get the config directory (cross-platform)
fn dirs_config_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        std::env::var_os("HOME").map(|home| {
            let mut path = PathBuf::from(home);
            path.push(".config");
            path
        })
    }
    #[cfg(windows)]
    {
        std::env::var_os("APPDATA").map(PathBuf::from)
    }
    #[cfg(not(any(unix, windows)))]
    {
        None
    }
}

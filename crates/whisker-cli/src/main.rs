//! Whisker CLI - command-line interface for the Whisker template engine.

mod loader;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;
use whisker::parser::parse;
use whisker::{
    CompilerError, EscapeMode, ParseErrorKind, Template, Value, VMConfig, DEFAULT_PARTIAL_EXT,
};

use crate::loader::FsPartials;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Parsed command-line options.
struct Options {
    eval: Option<String>,
    file: Option<String>,
    data: Option<String>,
    globals: Option<String>,
    partials: Option<PathBuf>,
    ext: String,
    tokens: bool,
    disasm: bool,
    interactive: bool,
    vm: VMConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            eval: None,
            file: None,
            data: None,
            globals: None,
            partials: None,
            ext: DEFAULT_PARTIAL_EXT.to_string(),
            tokens: false,
            disasm: false,
            interactive: false,
            vm: VMConfig::default(),
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let mut options = Options::default();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            "-v" | "--version" => {
                print_version();
                return Ok(());
            }
            "-e" | "--eval" => options.eval = Some(value_for(&args, &mut i)?),
            "-d" | "--data" => options.data = Some(value_for(&args, &mut i)?),
            "-g" | "--globals" => options.globals = Some(value_for(&args, &mut i)?),
            "-p" | "--partials" => options.partials = Some(PathBuf::from(value_for(&args, &mut i)?)),
            "--ext" => options.ext = value_for(&args, &mut i)?,
            "--tokens" => options.tokens = true,
            "--disasm" => options.disasm = true,
            "--no-escape" => options.vm.escape = EscapeMode::None,
            "--max-depth" => {
                let value = value_for(&args, &mut i)?;
                options.vm.max_depth = value
                    .parse()
                    .map_err(|_| format!("--max-depth expects a number, got {:?}", value))?;
            }
            "-i" | "--interactive" => options.interactive = true,
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                options.file = Some(arg.clone());
                break;
            }
        }
        i += 1;
    }

    init_tracing();

    let data = load_data(options.data.as_deref())?;
    let root = options
        .partials
        .clone()
        .or_else(|| {
            options
                .file
                .as_deref()
                .and_then(|f| Path::new(f).parent())
                .map(Path::to_path_buf)
        })
        .unwrap_or_else(|| PathBuf::from("."));
    let mut host = FsPartials::new(root, options.ext.clone());
    if let Some(globals) = options.globals.as_deref() {
        host.set_ambient(load_data(Some(globals))?);
    }

    if let Some(source) = options.eval.clone() {
        process(&source, "<eval>", &options, &data, &mut host)?;
        if options.interactive {
            start_repl(&options, &data, &mut host)?;
        }
    } else if let Some(filepath) = options.file.clone() {
        let source = read_file(&filepath)?;
        process(&source, &filepath, &options, &data, &mut host)
            .map_err(|e| format!("Error in {}: {}", filepath, e))?;
        if options.interactive {
            start_repl(&options, &data, &mut host)?;
        }
    } else {
        start_repl(&options, &data, &mut host)?;
    }

    Ok(())
}

fn value_for(args: &[String], i: &mut usize) -> Result<String, String> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{} requires an argument", flag))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(filter),
        )
        .init();
}

fn print_usage() {
    println!(
        r#"
Whisker v{} - Mustache templates, compiled

Usage:
  whisker [options] [template-file]

Options:
  -h, --help            Show this help message
  -v, --version         Show version
  -e, --eval TEMPLATE   Render a template given on the command line
  -d, --data FILE       JSON data to render against (default: {{}})
  -g, --globals FILE    JSON data visible beneath every render's data
  -p, --partials DIR    Directory for {{{{>name}}}} lookups (default: template dir)
      --ext EXT         Partial file extension (default: {})
      --tokens          Print the token tree instead of rendering
      --disasm          Print the compiled instruction listing
      --no-escape       Disable HTML escaping
      --max-depth N     Limit nested partial and lambda renders
  -i, --interactive     Start a REPL that renders each entry

Examples:
  whisker page.mustache -d page.json
  whisker -e "Hello {{{{name}}}}" -d user.json
  whisker --disasm page.mustache
"#,
        VERSION, DEFAULT_PARTIAL_EXT
    );
}

fn print_version() {
    println!("Whisker {}", VERSION);
}

fn read_file(filepath: &str) -> Result<String, String> {
    let path = Path::new(filepath);

    if !path.exists() {
        return Err(format!("File not found: {}", filepath));
    }

    fs::read_to_string(path).map_err(|e| format!("Failed to read file: {}", e))
}

fn load_data(filepath: Option<&str>) -> Result<Value, String> {
    let Some(filepath) = filepath else {
        return Ok(Value::map(Vec::<(String, Value)>::new()));
    };
    let text = read_file(filepath)?;
    let json: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| format!("Invalid JSON in {}: {}", filepath, e))?;
    Ok(Value::from(json))
}

/// Dump or render one template according to the options.
fn process(
    source: &str,
    name: &str,
    options: &Options,
    data: &Value,
    host: &mut FsPartials,
) -> Result<(), String> {
    if options.tokens {
        let tree = parse(source).map_err(|e| e.to_string())?;
        println!("{}", tree);
        return Ok(());
    }

    let template = Template::compile_named(name, source).map_err(|e| e.to_string())?;
    if options.disasm {
        print!("{}", template.code().disassemble());
        return Ok(());
    }

    let output = template
        .render_with(data.clone(), host, options.vm.clone())
        .map_err(|e| match (e.line, e.column) {
            (Some(line), Some(column)) => format!("{} (line {}, column {})", e, line, column),
            _ => e.to_string(),
        })?;
    print!("{}", output);
    Ok(())
}

fn start_repl(options: &Options, data: &Value, host: &mut FsPartials) -> Result<(), String> {
    println!("Whisker v{} - Type 'exit' or Ctrl+D to quit", VERSION);
    println!();

    let mut rl = DefaultEditor::new().map_err(|e| format!("Failed to create editor: {}", e))?;

    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { ">>> " } else { "... " };

        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if buffer.is_empty() && (trimmed == "exit" || trimmed == "quit") {
                    println!("Goodbye!");
                    break;
                }

                if buffer.is_empty() && trimmed.starts_with('/') {
                    handle_command(trimmed);
                    continue;
                }

                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);

                // Keep reading while a section is still open
                if !is_complete(&buffer) {
                    continue;
                }

                if !buffer.trim().is_empty() {
                    rl.add_history_entry(buffer.as_str()).ok();
                    match process(&buffer, "<repl>", options, data, host) {
                        Ok(()) => println!(),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                println!("^C");
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(e) => {
                return Err(format!("Readline error: {}", e));
            }
        }
    }

    Ok(())
}

/// Check if the input leaves no section open.
fn is_complete(input: &str) -> bool {
    match Template::compile(input) {
        Err(CompilerError::Parse(e)) => !matches!(e.kind, ParseErrorKind::UnclosedSection { .. }),
        _ => true,
    }
}

fn handle_command(cmd: &str) {
    let parts: Vec<&str> = cmd[1..].split_whitespace().collect();
    let command = parts.first().map(|s| s.to_lowercase()).unwrap_or_default();

    match command.as_str() {
        "help" => {
            println!(
                r#"
REPL Commands:
  /help     Show this help
  /clear    Clear the screen
  /exit     Exit the REPL

Each entry is rendered against the loaded data. Entries that open a
section keep reading lines until it is closed.
"#
            );
        }
        "clear" => {
            // ANSI escape code to clear screen
            print!("\x1B[2J\x1B[1;1H");
        }
        "exit" | "quit" => {
            std::process::exit(0);
        }
        _ => {
            println!("Unknown command: /{}. Type /help for available commands.", command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_complete() {
        assert!(is_complete("plain"));
        assert!(is_complete("{{#a}}x{{/a}}"));
        assert!(!is_complete("{{#a}}x"));
        assert!(is_complete("{{/a}}"));
    }

    #[test]
    fn test_value_for() {
        let args = vec!["-d".to_string(), "data.json".to_string()];
        let mut i = 0;
        assert_eq!(value_for(&args, &mut i).unwrap(), "data.json");
        assert_eq!(i, 1);

        let args = vec!["-d".to_string()];
        let mut i = 0;
        assert!(value_for(&args, &mut i).is_err());
    }

    #[test]
    fn test_default_data_is_empty_map() {
        assert!(load_data(None).unwrap().is_empty());
    }
}

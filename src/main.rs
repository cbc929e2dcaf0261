use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use sprig::ast_printer::AstPrinter;
use sprig::diagnostics::{Diagnostic, Reporter};
use sprig::parser::Parser;
use sprig::scanner::{self, Scanner};
use sprig::session::{Outcome, Session};
use sprig::token::Token;

/// Exit status for scan, parse and resolve failures.
const EXIT_STATIC: i32 = 65;

/// Exit status for runtime failures.
const EXIT_RUNTIME: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Sprig language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,

    /// Write debug logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses a file and prints its syntax tree
    Parse { filename: PathBuf },

    /// Runs a file as a Sprig program
    Run { filename: PathBuf },

    /// Starts an interactive prompt (the default)
    Repl,
}

/// Prints diagnostics on stderr.
struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&mut self, diagnostic: Diagnostic) {
        eprintln!("{}", diagnostic);
    }
}

/// A read‑only view of a source file.
struct SourceFile {
    map: Option<Mmap>, // `None` for an empty file, which cannot be mapped
}

impl SourceFile {
    fn open(filename: &Path) -> Result<Self> {
        info!("Reading file: {:?}", filename);

        let file = File::open(filename).with_context(|| format!("Failed to open file {:?}", filename))?;
        let len = file
            .metadata()
            .with_context(|| format!("Failed to stat file {:?}", filename))?
            .len();

        if len == 0 {
            return Ok(Self { map: None });
        }

        // SAFETY: the map is read‑only and lives only for this process run;
        // concurrent truncation of the file by another process is not guarded.
        let map = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to map file {:?}", filename))?;

        info!("Mapped {} bytes from {:?}", len, filename);

        Ok(Self { map: Some(map) })
    }

    fn text(&self) -> Result<&str> {
        match &self.map {
            Some(map) => std::str::from_utf8(map).context("Source file is not valid UTF-8"),
            None => Ok(""),
        }
    }
}

fn init_logger(path: &Path) -> Result<()> {
    let log_file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("sprig::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{} {}:{}] {} - {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to {:?}", path);
    Ok(())
}

fn tokenize(filename: &Path, json: bool) -> Result<i32> {
    let source = SourceFile::open(filename)?;
    let text = source.text()?;

    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut tokenized = true;

    for item in Scanner::new(text) {
        match item {
            Ok(token) => {
                if !json {
                    println!("{}", token);
                }
                tokens.push(token);
            }
            Err(e) => {
                tokenized = false;
                debug!("Tokenization error: {}", e);
                eprintln!("{}", e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    }

    Ok(if tokenized { 0 } else { EXIT_STATIC })
}

fn parse(filename: &Path) -> Result<i32> {
    let source = SourceFile::open(filename)?;
    let mut reporter = ConsoleReporter;

    let tokens = match scanner::scan(source.text()?, &mut reporter) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(EXIT_STATIC);
        }
    };

    let mut parser = Parser::new(&tokens);
    let result = parser.parse();

    for warning in parser.take_warnings() {
        reporter.report(warning);
    }

    match result {
        Ok(statements) => {
            println!("{}", AstPrinter::print_program(&statements));
            Ok(0)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(EXIT_STATIC)
        }
    }
}

fn run(filename: &Path) -> Result<i32> {
    let source = SourceFile::open(filename)?;
    let text = source.text()?;

    let mut session = Session::new().recovering();

    Ok(match session.run(text, &mut ConsoleReporter) {
        Outcome::Ok => 0,
        Outcome::StaticError => EXIT_STATIC,
        Outcome::RuntimeError => EXIT_RUNTIME,
    })
}

fn repl() -> Result<i32> {
    let mut session = Session::new();
    let mut reporter = ConsoleReporter;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read from stdin")?;

        let outcome = session.run(&line, &mut reporter);
        debug!("REPL line finished with {:?}", outcome);
    }

    Ok(0)
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    match &args.log {
        Some(path) => init_logger(path)?,
        None => {
            env_logger::Builder::new()
                .filter_level(log::LevelFilter::Off)
                .init();
        }
    }

    info!("CLI arguments: {:?}", args);

    let code = match args.commands.unwrap_or(Commands::Repl) {
        Commands::Tokenize { filename, json } => tokenize(&filename, json)?,
        Commands::Parse { filename } => parse(&filename)?,
        Commands::Run { filename } => run(&filename)?,
        Commands::Repl => repl()?,
    };

    if code != 0 {
        debug!("Exiting with code {}", code);
        std::process::exit(code);
    }

    Ok(())
}

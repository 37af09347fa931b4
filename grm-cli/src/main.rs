use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use grm_core::fst::{Log64Weight, LogWeight, SymbolTable, TokenType, TropicalWeight};
use grm_core::functions::{StringFstMode, compile_fst_string};
use grm_core::{
    ArcKind, Archive, CompilerOptions, FailurePolicy, FstWeight, LabelManager, compile_to_archive, emit_ast,
    peek_arc_type,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Compiles weighted grammars into transducer archives and applies them.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG
    /// takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a grammar and write its exported rules to an archive.
    Compile(CompileArgs),
    /// Rewrite lines read from stdin with rules from an archive.
    Rewrite(RewriteArgs),
}

#[derive(Args, Debug)]
struct CompileArgs {
    #[arg(long, value_name = "FILE")]
    input_grammar: PathBuf,

    #[arg(long, value_name = "FILE", required_unless_present = "emit_ast_only")]
    output_far: Option<PathBuf>,

    #[arg(long, value_name = "KIND", default_value = "standard", help = "Arc type: standard, log, log64")]
    arc_type: ArcKind,

    #[arg(long, help = "Print the syntax tree instead of compiling")]
    emit_ast_only: bool,

    #[arg(long, requires = "emit_ast_only")]
    line_numbers_in_ast: bool,

    #[arg(long, value_name = "DIR", help = "Directory for data files and imports (defaults to the grammar's)")]
    indir: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Grammar library root (defaults to the bundled stdlib)")]
    stdlib: Option<PathBuf>,

    #[arg(long, help = "Skip rules that fail instead of aborting")]
    keep_going: bool,

    #[arg(long, help = "Optimize every rule")]
    optimize_all: bool,

    #[arg(long, help = "Export every top-level rule")]
    always_export: bool,
}

#[derive(Args, Debug)]
struct RewriteArgs {
    #[arg(long, value_name = "FILE")]
    far: PathBuf,

    /// Rules applied in order, separated by commas.
    #[arg(long, value_delimiter = ',', required = true)]
    rules: Vec<String>,

    #[arg(long, value_name = "MODE", default_value = "byte", help = "byte, utf8 or a symbol table file")]
    input_mode: String,

    #[arg(long, value_name = "MODE", default_value = "byte", help = "byte, utf8 or a symbol table file")]
    output_mode: String,

    #[arg(long, value_name = "N", default_value_t = 1)]
    noutput: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Compile(args) => compile(args),
        Command::Rewrite(args) => rewrite(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn compile(args: CompileArgs) -> Result<()> {
    let input = &args.input_grammar;
    if args.emit_ast_only {
        let tree = emit_ast(input, args.line_numbers_in_ast)
            .with_context(|| format!("failed to parse {}", input.display()))?;
        print!("{tree}");
        return Ok(());
    }
    let output = args
        .output_far
        .as_ref()
        .context("--output-far is required unless --emit-ast-only is given")?;

    let options = CompilerOptions {
        arc_kind: args.arc_type,
        input_dir: args.indir.clone(),
        library_root: args.stdlib.clone(),
        failure_policy: if args.keep_going {
            FailurePolicy::SkipFailedRules
        } else {
            FailurePolicy::FailFast
        },
        optimize_all: args.optimize_all,
        always_export: args.always_export,
    };
    let diagnostics = compile_to_archive(input, output, &options)
        .with_context(|| format!("failed to compile {}", input.display()))?;
    for diagnostic in &diagnostics {
        eprintln!("{diagnostic}");
    }
    info!(output = %output.display(), warnings = diagnostics.len(), "wrote archive");
    Ok(())
}

/// How rewrite input is parsed or output printed.
enum TextMode {
    Byte,
    Utf8,
    Symbols(SymbolTable),
}

impl TextMode {
    fn load(mode: &str) -> Result<Self> {
        match mode {
            "byte" => Ok(TextMode::Byte),
            "utf8" => Ok(TextMode::Utf8),
            path => {
                let text =
                    fs::read_to_string(path).with_context(|| format!("failed to read symbol table {path}"))?;
                let table =
                    SymbolTable::read_text(path, &text).with_context(|| format!("malformed symbol table {path}"))?;
                Ok(TextMode::Symbols(table))
            }
        }
    }

    fn string_fst_mode(&self) -> StringFstMode<'_> {
        match self {
            TextMode::Byte => StringFstMode::Byte,
            TextMode::Utf8 => StringFstMode::Utf8,
            TextMode::Symbols(table) => StringFstMode::Symbols(table),
        }
    }

    fn token_type(&self) -> TokenType<'_> {
        match self {
            TextMode::Byte => TokenType::Byte,
            TextMode::Utf8 => TokenType::Utf8,
            TextMode::Symbols(table) => TokenType::Symbol(table),
        }
    }
}

fn rewrite(args: RewriteArgs) -> Result<()> {
    let kind = peek_arc_type(&args.far).with_context(|| format!("failed to open {}", args.far.display()))?;
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    match kind {
        ArcKind::Standard => rewrite_lines::<TropicalWeight>(&args, stdin.lock(), &mut stdout),
        ArcKind::Log => rewrite_lines::<LogWeight>(&args, stdin.lock(), &mut stdout),
        ArcKind::Log64 => rewrite_lines::<Log64Weight>(&args, stdin.lock(), &mut stdout),
    }
}

fn rewrite_lines<W: FstWeight>(args: &RewriteArgs, input: impl BufRead, out: &mut impl Write) -> Result<()> {
    let archive = Archive::<W>::read(&args.far).with_context(|| format!("failed to load {}", args.far.display()))?;
    for rule in &args.rules {
        if archive.get(rule).is_none() {
            bail!("{} has no rule named '{rule}'", args.far.display());
        }
    }
    let rules: Vec<&str> = args.rules.iter().map(String::as_str).collect();
    let input_mode = TextMode::load(&args.input_mode)?;
    let output_mode = TextMode::load(&args.output_mode)?;

    // Bracketed labels in the input must agree with the archive's.
    let labels = LabelManager::new();
    if let Some(table) = archive.generated() {
        labels.merge(table).context("archive has inconsistent generated labels")?;
    }

    for line in input.lines() {
        let line = line.context("failed to read input")?;
        let fst = match compile_fst_string::<W>(&line, input_mode.string_fst_mode(), &labels) {
            Ok(fst) => fst,
            Err(err) => {
                debug!(%err, "unparsable input");
                writeln!(out, "Unable to parse input string.")?;
                continue;
            }
        };
        let lattice = archive.rewrite(&rules, &fst)?;
        match archive.best_strings(&lattice, args.noutput, output_mode.token_type()) {
            Ok(strings) if !strings.is_empty() => {
                for (text, weight) in strings {
                    if args.noutput != 1 && !weight.is_one() {
                        writeln!(out, "Output string: {text} <cost={weight}>")?;
                    } else {
                        writeln!(out, "Output string: {text}")?;
                    }
                }
            }
            Ok(_) => writeln!(out, "Rewrite failed.")?,
            Err(err) => {
                debug!(%err, "unprintable output");
                writeln!(out, "Rewrite failed.")?;
            }
        }
    }
    Ok(())
}

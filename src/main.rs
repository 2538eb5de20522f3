//! Command-line interface for xsd2codemirror

use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use xsd2codemirror::{convert_file, Limits, Settings};

#[derive(Parser, Debug)]
#[command(name = "xsd2codemirror")]
#[command(
    author,
    version,
    about = "Convert an XML Schema into CodeMirror autocomplete hints",
    long_about = None
)]
struct Cli {
    /// Path to the XSD schema file
    #[arg(value_name = "SCHEMA")]
    schema: PathBuf,

    /// Log every visited element and group to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Use PREFIX for elements of NAMESPACE (repeatable; an empty prefix
    /// renders names unprefixed)
    #[arg(
        long,
        num_args = 2,
        value_names = ["NAMESPACE", "PREFIX"],
        action = clap::ArgAction::Append
    )]
    prefix: Vec<String>,

    /// Namespace the schema is compiled for
    #[arg(long, value_name = "NS")]
    target_namespace: Option<String>,

    /// Write JSON without indentation
    #[arg(long)]
    compact: bool,

    /// Resource limits preset
    #[arg(long, value_enum, default_value_t = LimitsPreset::Default)]
    limits: LimitsPreset,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LimitsPreset {
    /// Defaults suited to large real-world schemas
    Default,
    /// Smaller documents and fewer includes
    Strict,
    /// Very large schema sets and deep group nesting
    Permissive,
}

impl From<LimitsPreset> for Limits {
    fn from(preset: LimitsPreset) -> Self {
        match preset {
            LimitsPreset::Default => Limits::default(),
            LimitsPreset::Strict => Limits::strict(),
            LimitsPreset::Permissive => Limits::permissive(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", e.kind_name(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "xsd2codemirror=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> xsd2codemirror::Result<()> {
    let mut settings = Settings::new()
        .with_target_namespace(cli.target_namespace)
        .with_pretty(!cli.compact)
        .with_limits(cli.limits.into());
    for pair in cli.prefix.chunks(2) {
        if let [namespace, prefix] = pair {
            settings = settings.with_prefix(namespace.as_str(), prefix.as_str());
        }
    }

    let json = convert_file(&cli.schema, &settings)?;

    match cli.output {
        Some(path) => fs::write(path, format!("{}\n", json))?,
        None => println!("{}", json),
    }
    Ok(())
}

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "adetect")]
#[command(version, about = "Find Java classes carrying given annotations without loading them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Classpath used for package scans and when no paths are given (defaults to $CLASSPATH)
    #[arg(long, value_name = "PATHS")]
    pub classpath: Option<OsString>,

    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// More logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Report classes, fields and methods carrying the given annotations
    Scan {
        /// Directories, archives or class files; the classpath when omitted
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Only scan classpath locations providing this package (repeatable)
        #[arg(short = 'p', long = "package", value_name = "PACKAGE", conflicts_with = "paths")]
        packages: Vec<String>,

        /// Type-level annotation to report (repeatable)
        #[arg(short = 't', long = "type", value_name = "ANNOTATION")]
        types: Vec<String>,

        /// Field-level annotation to report (repeatable)
        #[arg(long = "field", value_name = "ANNOTATION")]
        fields: Vec<String>,

        /// Method-level annotation to report (repeatable)
        #[arg(long = "method", value_name = "ANNOTATION")]
        methods: Vec<String>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(short = 'j', long, value_name = "N", default_value_t = 0)]
        jobs: usize,

        #[arg(long)]
        no_cache: bool,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    Stats,
    Clear,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

//! apiweld command line.
//!
//! Bundles multi-file OpenAPI documents and compiles `x-proxy` documents.
//! The result goes to stdout, or to the output file when one is given.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;

use apiweld_compiler::{bundle_file, compile_proxy_file, BundleOptions, CompileOptions};
use apiweld_telemetry::{init_logging, LogFormat, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "apiweld", about = "OpenAPI bundler and proxy compiler", version)]
struct Cli {
    /// Log level (RUST_LOG takes precedence).
    #[arg(long, global = true, env = "APIWELD_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log format (pretty or json).
    #[arg(long, global = true, env = "APIWELD_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bundle a document and the files it references into one document.
    ///
    /// Components referenced in other files are copied into `components`;
    /// references inside the document itself are left alone.
    Bundle {
        /// Root spec file (YAML or JSON).
        spec: PathBuf,

        /// Output file (default: stdout).
        output: Option<PathBuf>,
    },

    /// Compile a proxy document against the upstream documents it binds.
    Proxy {
        /// Proxy spec file (YAML or JSON).
        spec: PathBuf,

        /// Output file (default: stdout).
        output: Option<PathBuf>,

        /// Warn instead of failing when the output has unresolved local references.
        #[arg(long)]
        allow_dangling_refs: bool,
    },

    /// Replace every reference by a copy of its target.
    ///
    /// Circular references cannot be expanded and are left in place.
    Inline {
        /// Root spec file (YAML or JSON).
        spec: PathBuf,

        /// Output file (default: stdout).
        output: Option<PathBuf>,
    },
}

/// Run the bundle and inline commands.
fn run_bundle(spec: &Path, output: Option<&Path>, options: &BundleOptions) -> ExitCode {
    if !spec.exists() {
        eprintln!("error: spec file not found: {}", spec.display());
        return ExitCode::from(1);
    }

    match bundle_file(spec, options) {
        Ok(bytes) => write_output(&bytes, output),
        Err(e) => {
            eprintln!("error: bundling failed: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Run the proxy command.
fn run_proxy(spec: &Path, output: Option<&Path>, options: &CompileOptions) -> ExitCode {
    if !spec.exists() {
        eprintln!("error: spec file not found: {}", spec.display());
        return ExitCode::from(1);
    }

    match compile_proxy_file(spec, options) {
        Ok(compiled) => {
            for upstream in &compiled.upstreams {
                info!(
                    upstream = %upstream.spec.display(),
                    prefix = %upstream.prefix,
                    operations = upstream.operations,
                    components = upstream.components,
                    "upstream included"
                );
            }
            write_output(&compiled.bytes, output)
        }
        Err(e) => {
            eprintln!("error: proxy compilation failed: {}", e);
            ExitCode::from(1)
        }
    }
}

fn write_output(bytes: &[u8], output: Option<&Path>) -> ExitCode {
    let result = match output {
        Some(path) => write_file(path, bytes),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).and_then(|_| stdout.flush())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let target = output.map_or("stdout".to_string(), |p| p.display().to_string());
            eprintln!("error: failed to write {}: {}", target, e);
            ExitCode::from(1)
        }
    }
}

/// Write `bytes` to `path`, created with mode 0644 on Unix.
fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = TelemetryConfig::new()
        .with_log_level(cli.log_level)
        .with_log_format(cli.log_format);
    if let Err(e) = init_logging(&telemetry) {
        eprintln!("error: {}", e);
        return ExitCode::from(1);
    }

    match cli.command {
        Commands::Bundle { spec, output } => {
            run_bundle(&spec, output.as_deref(), &BundleOptions::default())
        }
        Commands::Proxy {
            spec,
            output,
            allow_dangling_refs,
        } => {
            let options = CompileOptions {
                strict_refs: !allow_dangling_refs,
            };
            run_proxy(&spec, output.as_deref(), &options)
        }
        Commands::Inline { spec, output } => {
            let options = BundleOptions::new().with_inline_all(true);
            run_bundle(&spec, output.as_deref(), &options)
        }
    }
}

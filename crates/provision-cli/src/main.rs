mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_MANIFEST_ERROR};
use provision_core::install_signal_handler;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "provision",
    version,
    about = "Generate Docker Compose stacks for a server and bring them up"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write docker-compose.yml and .env for a server, then bring its services up.
    Verify {
        /// Path to the server manifest.
        #[arg(default_value = "provision.toml")]
        manifest: PathBuf,
        /// Only write the files; do not run the orchestrator.
        #[arg(long, default_value_t = false)]
        no_up: bool,
        /// Pass every docker-compose*.yml fragment with -f.
        #[arg(long, default_value_t = false)]
        load_files: bool,
        /// Orchestrator binary (overrides the manifest).
        #[arg(long)]
        binary: Option<String>,
        /// Options for the up subcommand (overrides the manifest).
        #[arg(long, allow_hyphen_values = true)]
        options: Option<String>,
    },
    /// Print the generated docker-compose.yml without writing it.
    Render {
        /// Path to the server manifest.
        #[arg(default_value = "provision.toml")]
        manifest: PathBuf,
        /// Print the generated .env instead.
        #[arg(long, default_value_t = false)]
        env: bool,
    },
    /// List compose fragments and Dockerfile overrides in the config directory.
    Discover {
        /// Path to the server manifest.
        #[arg(default_value = "provision.toml")]
        manifest: PathBuf,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PROVISION_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let json_output = cli.json;
    let result = match cli.command {
        Commands::Verify {
            manifest,
            no_up,
            load_files,
            binary,
            options,
        } => commands::verify::run(
            &manifest,
            &commands::verify::VerifyOptions {
                no_up,
                load_files,
                binary,
                options,
            },
            json_output,
        ),
        Commands::Render { manifest, env } => commands::render::run(&manifest, env, json_output),
        Commands::Discover { manifest } => commands::discover::run(&manifest, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:") {
                EXIT_MANIFEST_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

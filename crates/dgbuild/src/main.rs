use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, info};
use std::path::PathBuf;

use dgbuild::config::Config;
use dgbuild::orchestrator::{BuildOptions, BuildSession};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble, write and compress the JS and CSS bundles
    Build {
        /// Package to build
        #[arg(short = 'p', long = "pkg")]
        package: Option<String>,

        /// Module name or comma-separated list of modules to build
        #[arg(short = 'm', long = "mod")]
        modules: Option<String>,

        /// Skin (defaults to the configured default skin)
        #[arg(long)]
        skin: Option<String>,
    },
    /// Check every source JS file and the declared dependencies
    Lint,
    /// Print the JS bundle of a package or module list
    Js {
        spec: Option<String>,

        /// Skip compression
        #[arg(long)]
        debug: bool,
    },
    /// Print the CSS bundle of a package or module list
    Css { spec: Option<String> },
    /// Print the resolved module list, one per line
    Deps {
        spec: Option<String>,

        /// Also check declared dependency lists
        #[arg(long)]
        audit: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    debug!(
        "Verbosity level: {} (log level: {})",
        cli.verbose, log_level
    );

    let config = Config::load(cli.config.as_deref())?;
    debug!("Configuration: {:?}", config);
    info!(
        "{} modules declared in {} source groups",
        config.declared_module_count(),
        config.source.len()
    );

    let mut session = BuildSession::new(config);

    match cli.command {
        Command::Build {
            package,
            modules,
            skin,
        } => {
            let options = BuildOptions {
                spec: package.or(modules),
                skin,
            };
            let summary = session.build(&options)?;
            debug!("Build summary: {:?}", summary);
        }
        Command::Lint => {
            session.lint();
        }
        Command::Js { spec, debug } => {
            session.init();
            session.get_js(spec.as_deref(), debug, |js| print!("{js}"))?;
        }
        Command::Css { spec } => {
            session.init();
            session.get_css(spec.as_deref(), true, |css| print!("{css}"))?;
        }
        Command::Deps { spec, audit } => {
            session.load();
            for module in session.resolve(spec.as_deref())?.modules {
                println!("{module}");
            }
            if audit {
                for finding in session.audit()? {
                    println!("audit: {finding}");
                }
            }
        }
    }

    Ok(())
}

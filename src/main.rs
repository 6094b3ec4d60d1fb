// src/main.rs

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use modtool::config::{self, Settings};
use modtool::install::ArchiveInstaller;
use modtool::inventory::ModulePathInventory;
use modtool::repository::{CachedRegistry, ForgeClient, ForgeFetcher};
use modtool::resolver::GreedyResolver;
use modtool::version;
use modtool::{Collaborators, Outcome, UpgradeOptions, UpgradeResult};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "modtool")]
#[command(author, version, about = "Upgrade installed modules while respecting their dependents", long_about = None)]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where modules live and where releases come from
#[derive(Args)]
struct EnvironmentArgs {
    /// Module search path, earliest entry wins
    #[arg(long, env = "MODTOOL_MODULEPATH", default_value = config::DEFAULT_MODULEPATH)]
    modulepath: String,

    /// Directory for newly installed dependencies (default: first modulepath entry)
    #[arg(long, env = "MODTOOL_TARGET_DIR")]
    target_dir: Option<PathBuf>,

    /// Module repository URL
    #[arg(long, env = "MODTOOL_REPOSITORY", default_value = config::DEFAULT_REPOSITORY)]
    module_repository: String,

    /// Cache directory for archives and release metadata
    #[arg(long, env = "MODTOOL_CACHE_DIR", default_value = config::DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,

    /// Seconds before cached release metadata is refreshed
    #[arg(long, default_value_t = config::DEFAULT_METADATA_EXPIRE_SECS)]
    metadata_expire: i64,
}

impl EnvironmentArgs {
    fn settings(&self) -> modtool::Result<Settings> {
        Settings::new(
            Settings::parse_modulepath(&self.modulepath),
            self.target_dir.clone(),
            self.module_repository.as_str(),
            self.cache_dir.clone(),
            self.metadata_expire,
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RenderAs {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade an installed module
    Upgrade {
        /// Module name (author-name)
        module_name: String,

        /// Version or requirement to upgrade to
        #[arg(long)]
        version: Option<String>,

        /// Ignore local changes and reinstall even when already current
        #[arg(short, long)]
        force: bool,

        /// Do not consider other installed modules' requirements
        #[arg(long)]
        ignore_dependencies: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = RenderAs::Human)]
        render_as: RenderAs,

        #[command(flatten)]
        env: EnvironmentArgs,
    },
    /// List installed modules by modulepath entry
    List {
        #[command(flatten)]
        env: EnvironmentArgs,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn run_upgrade(settings: &Settings, module_name: &str, options: UpgradeOptions) -> Result<UpgradeResult> {
    if !settings.is_on_modulepath(&settings.target_dir) {
        warn!(
            "Target directory {} is not on the modulepath; modules installed there will not be found",
            settings.target_dir.display()
        );
    }

    let inventory = ModulePathInventory::new(settings.modulepath.clone());
    let registry = CachedRegistry::new(
        ForgeClient::new(settings.repository.as_str())?,
        &settings.release_db(),
        settings.metadata_expire,
    )?;
    let resolver = GreedyResolver::new(&registry, &inventory, settings.target_dir.clone());
    let fetcher = ForgeFetcher::new(settings.repository.as_str(), settings.archive_dir())?;
    let installer = ArchiveInstaller::new();

    Ok(modtool::upgrade(
        module_name,
        options,
        Collaborators {
            inventory: &inventory,
            registry: &registry,
            resolver: &resolver,
            fetcher: &fetcher,
            installer: &installer,
        },
    ))
}

fn render_human(result: &UpgradeResult) {
    match result.result {
        Outcome::Success => {
            let Some(root) = result.affected_modules.first() else {
                println!("'{}' needs no changes", result.module_name);
                return;
            };
            println!(
                "Upgraded '{}' ({} -> {}) in {}",
                result.module_name,
                result.installed_version.as_deref().unwrap_or("???"),
                version::normalize(Some(&root.version)),
                root.module_dir().display()
            );
            for node in &result.affected_modules {
                match &node.previous_version {
                    Some(previous) => println!(
                        "  {} {} ({} -> {})",
                        node.action,
                        node.module_name,
                        version::normalize(Some(previous)),
                        version::normalize(Some(&node.version))
                    ),
                    None => println!(
                        "  {} {} ({})",
                        node.action,
                        node.module_name,
                        version::normalize(Some(&node.version))
                    ),
                }
            }
        }
        Outcome::Noop | Outcome::Failure => {
            if let Some(error) = &result.error {
                eprintln!("{}", error.multiline);
            }
        }
    }
}

fn list_modules(settings: &Settings) -> Result<()> {
    let inventory = ModulePathInventory::new(settings.modulepath.clone());
    let mut by_path: BTreeMap<usize, Vec<_>> = BTreeMap::new();
    for module in inventory.list()? {
        by_path.entry(module.precedence).or_default().push(module);
    }

    for (precedence, dir) in settings.modulepath.iter().enumerate() {
        println!("{}", dir.display());
        match by_path.get(&precedence) {
            Some(modules) => {
                for module in modules {
                    println!(
                        "  {} ({})",
                        module.name,
                        module.display_version().as_deref().unwrap_or("???")
                    );
                }
            }
            None => println!("  (no modules installed)"),
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so rendered results on stdout stay machine-readable
    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Upgrade {
            module_name,
            version,
            force,
            ignore_dependencies,
            render_as,
            env,
        } => {
            let settings = env.settings()?;
            info!("Preparing to upgrade '{}' ...", module_name);

            let options = UpgradeOptions {
                force,
                ignore_dependencies,
                version,
            };
            let result = run_upgrade(&settings, &module_name, options)?;

            match render_as {
                RenderAs::Human => render_human(&result),
                RenderAs::Json => println!("{}", serde_json::to_string_pretty(&result)?),
            }

            if result.is_failure() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::List { env } => list_modules(&env.settings()?),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "modtool", &mut std::io::stdout());
            Ok(())
        }
    }
}

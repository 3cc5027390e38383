//! # Lens CLI (`lens`)
//!
//! Command-line front end for workspace bundles.
//!
//! ## Usage
//!
//! ```bash
//! lens --config ./config/lens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lens init` | Create the SQLite database, run migrations, register the workspace |
//! | `lens add <paths>` | Admit local files as documents |
//! | `lens estimate` | Estimate the size of an export |
//! | `lens export <output>` | Write the workspace to a `.lens` bundle |
//! | `lens preview <archive>` | Show what an import would do, without writing |
//! | `lens import <archive>` | Import a bundle into the workspace |
//! | `lens history` | List past imports |
//!
//! Log verbosity is controlled by `RUST_LOG` (default `warn`).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lens_bundle::bundle::{ExportOptions, ImportOptions};
use lens_bundle::progress::ProgressMode;
use lens_bundle::{admit, config, export, import_cmd, migrate};

/// Lens: export and import portable workspace bundles.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lens.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lens",
    about = "Export and import portable document-workspace bundles",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by `estimate` and `export`. Each one narrows or widens the
/// `[bundle]` defaults from the config file.
#[derive(Args, Clone)]
struct ContentFlags {
    /// Leave extracted text and pages out of the bundle.
    #[arg(long)]
    no_text: bool,

    /// Leave analysis results out of the bundle.
    #[arg(long)]
    no_analysis: bool,

    /// Leave groupings out of the bundle.
    #[arg(long)]
    no_groupings: bool,

    /// Leave profiles out of the bundle.
    #[arg(long)]
    no_profiles: bool,

    /// Embed the original source file bytes.
    #[arg(long)]
    source_files: bool,
}

impl ContentFlags {
    fn apply(&self, mut options: ExportOptions) -> ExportOptions {
        if self.no_text {
            options.include_text = false;
        }
        if self.no_analysis {
            options.include_analysis = false;
        }
        if self.no_groupings {
            options.include_groupings = false;
        }
        if self.no_profiles {
            options.include_profiles = false;
        }
        if self.source_files {
            options.include_source_files = true;
        }
        options
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and register the configured workspace.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Admit local files as documents.
    ///
    /// Files whose bytes are already present in the workspace are reported
    /// as duplicates and not added again.
    Add {
        /// Files to admit.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Estimate the size of an export without writing anything.
    Estimate {
        #[command(flatten)]
        flags: ContentFlags,
    },

    /// Export the workspace to a bundle.
    Export {
        /// Output path, conventionally ending in `.lens`.
        output: PathBuf,

        #[command(flatten)]
        flags: ContentFlags,

        /// Progress output: `off`, `human`, or `json`. Defaults to `human`
        /// when stderr is a terminal.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Show what importing a bundle would do, without writing.
    Preview {
        /// Bundle to inspect.
        archive: PathBuf,

        /// Print the preview as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Import a bundle into the workspace.
    Import {
        /// Bundle to import.
        archive: PathBuf,

        /// Do not create documents; only map onto documents already present.
        #[arg(long)]
        no_documents: bool,

        /// Skip groupings.
        #[arg(long)]
        no_groupings: bool,

        /// Skip profiles.
        #[arg(long)]
        no_profiles: bool,

        /// Create a second copy of documents whose content is already present.
        #[arg(long)]
        keep_duplicates: bool,

        /// Progress output: `off`, `human`, or `json`.
        #[arg(long)]
        progress: Option<String>,
    },

    /// List past imports into the workspace.
    History,
}

fn progress_mode(arg: Option<&str>) -> anyhow::Result<ProgressMode> {
    match arg {
        None => Ok(ProgressMode::default_for_tty()),
        Some(s) => ProgressMode::parse(s)
            .ok_or_else(|| anyhow::anyhow!("invalid --progress '{}': expected off, human, or json", s)),
    }
}

/// Cancel `token` on Ctrl-C so a long export or import stops between items.
fn cancel_on_ctrl_c(token: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancelling...");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add { paths } => {
            admit::run_add(&cfg, &paths).await?;
        }
        Commands::Estimate { flags } => {
            let options = flags.apply(ExportOptions::from(&cfg.bundle));
            export::run_estimate(&cfg, &options).await?;
        }
        Commands::Export {
            output,
            flags,
            progress,
        } => {
            let mode = progress_mode(progress.as_deref())?;
            let options = flags.apply(ExportOptions::from(&cfg.bundle));
            cancel_on_ctrl_c(options.cancel.clone());
            export::run_export(&cfg, &output, &options, mode).await?;
        }
        Commands::Preview { archive, json } => {
            import_cmd::run_preview(&cfg, &archive, json).await?;
        }
        Commands::Import {
            archive,
            no_documents,
            no_groupings,
            no_profiles,
            keep_duplicates,
            progress,
        } => {
            let mode = progress_mode(progress.as_deref())?;
            let options = ImportOptions {
                import_documents: !no_documents,
                import_groupings: !no_groupings,
                import_profiles: !no_profiles,
                skip_duplicates: !keep_duplicates,
                source_dir: cfg.storage.source_dir.clone(),
                ..ImportOptions::default()
            };
            cancel_on_ctrl_c(options.cancel.clone());
            import_cmd::run_import(&cfg, &archive, &options, mode).await?;
        }
        Commands::History => {
            import_cmd::run_history(&cfg).await?;
        }
    }

    Ok(())
}

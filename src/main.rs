use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use omoprof::{
    commands,
    paths::Paths,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "omoprof")]
#[command(about = "oh-my-opencode profile switcher - save, switch and manage model config profiles")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors
    #[arg(long, global = true, value_name = "WHEN", value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory holding oh-my-opencode.json and its profiles
    #[arg(long, global = true, env = "OMOPROF_CONFIG_DIR", value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all saved profiles
    List {
        /// Print profiles as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the active profile and config file status
    Current,

    /// Save a profile (from the current config unless --from is given)
    Save {
        /// Name of the profile to save
        name: String,

        /// Read the document from this file instead of the current config
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,

        /// Template merged under the document
        #[arg(long, env = "OMOPROF_TEMPLATE", value_name = "FILE")]
        template: Option<PathBuf>,
    },

    /// Switch to a profile (activate it)
    Use {
        /// Name of the profile to activate
        name: String,
    },

    /// Remove a profile
    #[command(alias = "rm")]
    Remove {
        /// Name of the profile to remove
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Rename a profile
    #[command(alias = "mv")]
    Rename {
        old_name: String,
        new_name: String,
    },

    /// Print a profile's JSON
    Show {
        /// Name of the profile to print
        name: String,
    },

    /// Set the model for an agent in the live config
    Set {
        /// Agent (or category, with --category) to change
        key: String,

        /// Model identifier, e.g. anthropic/claude-sonnet-4
        model: String,

        /// Model variant
        #[arg(long)]
        variant: Option<String>,

        /// Change a category instead of an agent
        #[arg(long)]
        category: bool,
    },

    /// Run diagnostics on the omoprof setup
    Doctor,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("omoprof={level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let paths = Paths::new(cli.config_dir)?;
    let ui = Ui::new(cli.color, cli.no_color);

    match cli.command {
        Commands::List { json } => commands::list(&paths, &ui, json),
        Commands::Current => commands::current(&paths, &ui),
        Commands::Save {
            name,
            from,
            template,
        } => commands::save(&paths, &name, from.as_deref(), template.as_deref(), &ui),
        Commands::Use { name } => commands::use_profile(&paths, &name, &ui),
        Commands::Remove { name, force } => commands::remove(&paths, &name, &ui, force),
        Commands::Rename { old_name, new_name } => {
            commands::rename(&paths, &old_name, &new_name, &ui)
        }
        Commands::Show { name } => commands::show(&paths, &name, &ui),
        Commands::Set {
            key,
            model,
            variant,
            category,
        } => commands::set_model(&paths, &key, &model, variant.as_deref(), category, &ui),
        Commands::Doctor => commands::doctor(&paths, &ui),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "omoprof", &mut std::io::stdout());
            Ok(())
        }
    }
}

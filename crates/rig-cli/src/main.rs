//! `hab`: the thin driver that wires `rig-config`'s site loading,
//! `rig-forest`'s resolver, and `rig-emit`'s script writer together. No
//! interactive prompting, colorized output, or subprocess launching —
//! those stay out of scope (spec §1's non-goals).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rig_config::Site;
use rig_forest::Resolver;

#[derive(Parser)]
#[command(name = "hab", about = "Resolve and activate per-site pipeline environments")]
struct Cli {
    /// Site descriptor file(s), left-most wins on conflicts. Falls back to
    /// `HAB_PATHS` when omitted.
    #[arg(long, global = true)]
    site: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a URI and print its composed environment and aliases.
    Dump {
        uri: String,
    },
    /// Resolve a URI and write activation scripts for one shell target.
    Env {
        uri: String,
        /// Script extension: .sh, .bat, .cmd, or .ps1.
        #[arg(long, default_value = ".sh")]
        ext: String,
        #[arg(long, default_value = "hab_scripts")]
        out_dir: PathBuf,
    },
    /// Resolve a URI and write a launch script that runs one alias,
    /// optionally staying open afterward (spec §6's "Launch" CLI verb).
    Launch {
        uri: String,
        /// Alias to run; omit to drop into an interactive shell instead.
        alias: Option<String>,
        #[arg(long, default_value = ".sh")]
        ext: String,
        #[arg(long, default_value = "hab_scripts")]
        out_dir: PathBuf,
        #[arg(long)]
        stay_open: bool,
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Print the config forest as a natural-sorted tree.
    Tree,
}

fn load_site(explicit: &[PathBuf]) -> Result<Site> {
    if explicit.is_empty() {
        Site::from_env().context("no --site given and HAB_PATHS is unset")
    } else {
        Site::load(explicit).context("failed to load site descriptor")
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let resolver = Resolver::new(load_site(&cli.site)?)?;

    match cli.command {
        Command::Dump { uri } => {
            let flat = resolver.resolve(&uri)?;
            println!("{}", flat.dump());
        }
        Command::Env { uri, ext, out_dir } => {
            let flat = resolver.resolve(&uri)?;
            let platform = resolver.current_platform;
            let written = rig_emit::write_scripts(&flat, platform, &ext, platform, &out_dir)?;
            for path in written {
                println!("{}", path.display());
            }
        }
        Command::Launch {
            uri,
            alias,
            ext,
            out_dir,
            stay_open,
            args,
        } => {
            let flat = resolver.resolve(&uri)?;
            let platform = resolver.current_platform;
            let config_name = format!("hab_config{ext}");
            std::fs::create_dir_all(&out_dir)?;
            std::fs::write(out_dir.join(&config_name), rig_emit::config_script(&flat, platform, &ext, platform)?)?;
            let launch = rig_emit::launch_script(&flat, &ext, platform, &config_name, alias.as_deref(), &args, stay_open);
            let launch_path = out_dir.join(format!("hab_launch{ext}"));
            std::fs::write(&launch_path, launch)?;
            println!("{}", launch_path.display());
        }
        Command::Tree => {
            println!("{}", resolver.dump_forest());
        }
    }
    Ok(())
}

//! amp CLI - Amplifier profile, settings and module source management.

use amplifier::cli::{
    AgentCommands, Cli, CollectionCommands, Commands, ModuleCommands, PathCommands,
    ProfileCommands, SettingsCommands,
};
use amplifier::commands::{self, Output, RunOptions, Workspace};
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    init_tracing(cli.verbose);

    // Determine project root: --project flag > AMP_PROJECT env > cwd
    let project_root = resolve_project_root(cli.project_path, human);
    let workspace = Workspace::open(&project_root, cli.session_id.as_deref());

    let result = run_command(cli.command, &workspace, human);

    if let Err(e) = result {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` wins over
/// `--verbose`.
fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .init();
}

/// Resolve the project root from an explicit path or the current directory.
///
/// An explicit path must exist and is used literally.
fn resolve_project_root(explicit_path: Option<PathBuf>, human: bool) -> PathBuf {
    match explicit_path {
        Some(path) => {
            if !path.exists() {
                let message = format!("Specified project path does not exist: {}", path.display());
                if human {
                    eprintln!("Error: {}", message);
                } else {
                    eprintln!("{}", serde_json::json!({ "error": message }));
                }
                process::exit(1);
            }
            path
        }
        None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn run_command(command: Commands, ws: &Workspace, human: bool) -> Result<(), amplifier::Error> {
    match command {
        Commands::Profile { command } => match command {
            ProfileCommands::List => {
                let result = commands::profile_list(ws)?;
                output(&result, human);
            }
            ProfileCommands::Show { name, chain } => {
                let result = commands::profile_show(ws, &name, chain)?;
                output(&result, human);
            }
            ProfileCommands::Compile { name, overlays } => {
                let result = commands::profile_compile(ws, name, &overlays)?;
                output(&result, human);
            }
            ProfileCommands::Use { name, scope } => {
                let result = commands::profile_use(ws, &name, &scope)?;
                output(&result, human);
            }
            ProfileCommands::Reset { scope } => {
                let result = commands::profile_reset(ws, &scope)?;
                output(&result, human);
            }
            ProfileCommands::Default { name } => {
                let result = commands::profile_default(ws, name)?;
                output(&result, human);
            }
            ProfileCommands::Current => {
                let result = commands::profile_current(ws)?;
                output(&result, human);
            }
        },
        Commands::Settings { command } => match command {
            SettingsCommands::Show { scope } => {
                let result = commands::settings_show(ws, scope.as_deref())?;
                output(&result, human);
            }
            SettingsCommands::Get { key } => {
                let result = commands::settings_get(ws, &key)?;
                output(&result, human);
            }
            SettingsCommands::Set { key, value, scope } => {
                let result = commands::settings_set(ws, &key, &value, &scope)?;
                output(&result, human);
            }
            SettingsCommands::Unset { key, scope } => {
                let result = commands::settings_unset(ws, &key, &scope)?;
                output(&result, human);
            }
            SettingsCommands::Paths { command } => match command {
                PathCommands::List { denied } => {
                    let result = commands::settings_paths_list(ws, denied)?;
                    output(&result, human);
                }
                PathCommands::Add {
                    path,
                    denied,
                    scope,
                } => {
                    let result = commands::settings_paths_add(ws, &path, denied, &scope)?;
                    output(&result, human);
                }
                PathCommands::Remove {
                    path,
                    denied,
                    scope,
                } => {
                    let result = commands::settings_paths_remove(ws, &path, denied, &scope)?;
                    output(&result, human);
                }
            },
        },
        Commands::Collection { command } => match command {
            CollectionCommands::List => {
                let result = commands::collection_list(ws)?;
                output(&result, human);
            }
            CollectionCommands::Resolve { reference } => {
                let result = commands::collection_resolve(ws, &reference)?;
                output(&result, human);
            }
            CollectionCommands::Locks { local } => {
                let result = commands::collection_locks(ws, local)?;
                output(&result, human);
            }
            CollectionCommands::Register {
                name,
                source,
                commit,
                local,
            } => {
                let result =
                    commands::collection_register(ws, &name, &source, commit.as_deref(), local)?;
                output(&result, human);
            }
            CollectionCommands::Unregister { name, local } => {
                let result = commands::collection_unregister(ws, &name, local)?;
                output(&result, human);
            }
        },
        Commands::Module { command } => match command {
            ModuleCommands::Resolve { module, profile } => {
                let result = commands::module_resolve(ws, &module, profile)?;
                output(&result, human);
            }
        },
        Commands::Agent { command } => match command {
            AgentCommands::List { profile } => {
                let result = commands::agent_list(ws, profile)?;
                output(&result, human);
            }
            AgentCommands::Show { name, profile } => {
                let result = commands::agent_show(ws, &name, profile)?;
                output(&result, human);
            }
        },
        Commands::Run {
            profile,
            overlays,
            provider,
            model,
            set,
            dry_run,
        } => {
            if !dry_run {
                return Err(amplifier::Error::InvalidInput(
                    "amp does not start sessions; use `amp run --dry-run` to print the resolved configuration".to_string(),
                ));
            }
            let options = RunOptions {
                profile,
                overlays,
                provider,
                model,
                set,
            };
            let result = commands::run_dry(ws, options)?;
            output(&result, human);
        }
        Commands::Version => {
            output(&commands::version(), human);
        }
    }
    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

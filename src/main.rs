use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use relay::commands::{self, CommandEnv, script};
use relay::config::{Overrides, RelayConfig};
use relay::context::WriteMode;
use relay::dispatch::Dispatcher;
use relay::exec::{Runner, ShellRunner};
use relay::registry::Registry;
use relay::{logging, ui};

#[derive(Parser)]
#[command(name = "relay")]
#[command(
    version,
    about = "Run workflow steps as separate invocations that share a context file"
)]
pub struct Cli {
    /// Print the captured output of the command's external work
    #[arg(short, long)]
    pub verbose: bool,

    /// Context file to use. Overrides RELAY_CONTEXT and relay.toml.
    #[arg(short, long)]
    pub context: Option<PathBuf>,

    /// Config file to use instead of ./relay.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Hold an exclusive lock on the context for the whole invocation
    #[arg(long, overrides_with = "no_lock")]
    pub lock: bool,

    /// Don't lock the context
    #[arg(long, overrides_with = "lock")]
    pub no_lock: bool,

    /// How the context file is written: atomic or direct
    #[arg(long)]
    pub write: Option<WriteMode>,

    /// Command to run, followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let lock = if self.no_lock {
            Some(false)
        } else if self.lock {
            Some(true)
        } else {
            None
        };
        Overrides {
            context: self.context.clone(),
            lock,
            write: self.write,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    let config = RelayConfig::resolve(&cwd, cli.config.as_deref(), &cli.overrides())?;
    let log_guard = logging::init(&config.toml.logging, &config.base_dir)?;
    ui::report_warnings(&config.toml.validate());

    let runner: Arc<dyn Runner> = Arc::new(ShellRunner::default());
    let env = CommandEnv::new(runner.clone(), config.devnet());
    let mut registry = Registry::with_commands(commands::builtin(&env))?;
    script::register_all(&mut registry, &config.toml.commands, &config.base_dir, &runner)
        .context("Invalid [[commands]] in relay.toml")?;

    let dispatcher = Dispatcher::new(registry, config.context_path.clone(), config.context_options);
    let (name, args) = match cli.command.split_first() {
        Some((name, rest)) => (Some(name.as_str()), rest),
        None => (None, &[][..]),
    };

    match dispatcher.run(name, args).await {
        Ok(outcome) => {
            if cli.verbose {
                print!("{}", ui::render_capture(&outcome.command, &outcome.capture));
            }
            Ok(())
        }
        Err(err) => {
            ui::report_error(&err, cli.verbose);
            // process::exit skips destructors; flush the log file first.
            drop(log_guard);
            std::process::exit(err.exit_code());
        }
    }
}

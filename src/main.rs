use clap::Parser;
use hubspoke::{Commands, config::Config, handle_command, output};

#[derive(Parser)]
#[command(name = "hubspoke")]
#[command(about = "Hub/spoke lifecycle orchestration for Argo CD", long_about = None)]
struct Cli {
    /// Kube context to operate on (the hub for `register`)
    #[arg(short = 'c', long, global = true)]
    context: Option<String>,
    /// Control-plane namespace
    #[arg(short = 'n', long, global = true)]
    namespace: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            output::error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }

    if let Err(e) = output::init_logging(&config.log_file) {
        output::warning(&format!("Logging to console only: {:#}", e));
    }
    tracing::info!(context = ?cli.context, namespace = %config.namespace, "invocation");

    if let Err(e) = handle_command(&config, cli.context.as_deref(), cli.command) {
        tracing::error!(error = %format!("{:#}", e), "command failed");
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

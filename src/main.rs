use clap::Parser;
use penpi::app::{handle_fatal_error, initialize_app, AppConfig};
use penpi::cli::{execute_command, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let app_config = AppConfig::new(verbose).with_config_path(cli.config);

    let result = match initialize_app(&app_config).await {
        Ok(config) => execute_command(cli.command, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        handle_fatal_error(e, verbose);
    }
}

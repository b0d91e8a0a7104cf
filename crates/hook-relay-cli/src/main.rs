use hook_relay_cli::run_cli;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run_cli() {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("CLI error: {}", e);
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}

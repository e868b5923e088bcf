use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `log_level`.
/// Events go to stderr so command output on stdout stays machine readable.
pub fn init_logging(log_level: Option<Level>) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = log_level.unwrap_or(Level::INFO);
        EnvFilter::new(format!(
            "borker_core={},wallet={},borker_cli={}",
            level, level, level
        ))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to set global default subscriber: {}", e))
}

use std::str::FromStr;

use kura_core::config::Config;
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::{Filtered, LevelFilter};
use tracing_subscriber::Layer;

pub fn create_stdout_layer<S>(
    config: &Config,
) -> anyhow::Result<Option<Filtered<tracing_subscriber::fmt::Layer<S>, LevelFilter, S>>>
where
    S: Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    let stdout = match config.telemetry.stdout.as_ref() {
        Some(x) => x,
        None => return Ok(None),
    };

    let level = parse_level(&stdout.level)?;
    let stdout_log = tracing_subscriber::fmt::layer().with_filter(LevelFilter::from_level(level));

    Ok(Some(stdout_log))
}

fn parse_level(level: &str) -> anyhow::Result<Level> {
    Level::from_str(level)
        .map_err(|e| anyhow::anyhow!("invalid stdout log level '{}': {}", level, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_case_insensitive() {
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_level("WARN").unwrap(), Level::WARN);
        assert!(parse_level("loud").is_err());
    }
}

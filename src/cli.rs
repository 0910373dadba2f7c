//! Command-line interface definitions for the topic news collector.
//!
//! Every option can also be set through the environment, which is how the
//! scheduler that invokes the collector usually configures it.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for one collection run.
///
/// # Examples
///
/// ```sh
/// # Collect with defaults
/// topic_news -s config/sources.yaml -o public/items.json
///
/// # Last three days only, slower sources tolerated
/// topic_news -s config/sources.yaml -o public/items.json \
///     --max-age-hours 72 --timeout-secs 20
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the source registry YAML file
    #[arg(short, long, env = "TOPIC_NEWS_SOURCES")]
    pub sources: PathBuf,

    /// Path of the snapshot JSON file to publish
    #[arg(short, long, env = "TOPIC_NEWS_OUTPUT")]
    pub output: PathBuf,

    /// Maximum number of articles in the snapshot
    #[arg(long, env = "TOPIC_NEWS_MAX_ITEMS", default_value_t = 20)]
    pub max_items: usize,

    /// Per-source time budget in seconds, retries included
    #[arg(long, env = "TOPIC_NEWS_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Retries for transport errors, 429 and 5xx responses
    #[arg(long, env = "TOPIC_NEWS_RETRIES", default_value_t = 1)]
    pub retries: usize,

    /// Concurrent source fetches (defaults to the number of distinct hosts)
    #[arg(long, env = "TOPIC_NEWS_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Drop articles published more than this many hours ago (1 to 87600)
    #[arg(
        long,
        env = "TOPIC_NEWS_MAX_AGE_HOURS",
        value_parser = clap::value_parser!(i64).range(1..=MAX_AGE_HOURS_LIMIT)
    )]
    pub max_age_hours: Option<i64>,

    /// Drop articles whose relevance score is below this
    #[arg(long, env = "TOPIC_NEWS_MIN_SCORE", value_parser = parse_min_score)]
    pub min_score: Option<f64>,
}

/// Ten years.
pub const MAX_AGE_HOURS_LIMIT: i64 = 87_600;

fn parse_min_score(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Ok(_) => Err(format!("`{s}` must be a finite, non-negative number")),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "topic_news",
            "--sources",
            "./sources.yaml",
            "--output",
            "./public/items.json",
        ]);

        assert_eq!(cli.sources, PathBuf::from("./sources.yaml"));
        assert_eq!(cli.output, PathBuf::from("./public/items.json"));
        assert_eq!(cli.max_items, 20);
        assert_eq!(cli.timeout_secs, 10);
        assert_eq!(cli.retries, 1);
        assert_eq!(cli.concurrency, None);
        assert_eq!(cli.max_age_hours, None);
        assert_eq!(cli.min_score, None);
    }

    #[test]
    fn test_cli_short_flags_and_overrides() {
        let cli = Cli::parse_from([
            "topic_news",
            "-s",
            "/etc/topic_news/sources.yaml",
            "-o",
            "/srv/items.json",
            "--max-items",
            "10",
            "--concurrency",
            "3",
            "--max-age-hours",
            "72",
        ]);

        assert_eq!(cli.sources, PathBuf::from("/etc/topic_news/sources.yaml"));
        assert_eq!(cli.output, PathBuf::from("/srv/items.json"));
        assert_eq!(cli.max_items, 10);
        assert_eq!(cli.concurrency, Some(3));
        assert_eq!(cli.max_age_hours, Some(72));
    }

    #[test]
    fn test_cli_max_age_hours_bounds() {
        let parse = |hours: &str| {
            Cli::try_parse_from(["topic_news", "-s", "a.yaml", "-o", "b.json", "--max-age-hours", hours])
        };
        assert_eq!(parse("1").unwrap().max_age_hours, Some(1));
        assert_eq!(parse("87600").unwrap().max_age_hours, Some(MAX_AGE_HOURS_LIMIT));
        assert!(parse("0").is_err());
        assert!(parse("-24").is_err());
        assert!(parse("87601").is_err());
        assert!(parse("100000000000").is_err());
    }

    #[test]
    fn test_cli_min_score() {
        let parse = |score: &str| {
            Cli::try_parse_from(["topic_news", "-s", "a.yaml", "-o", "b.json", "--min-score", score])
        };
        assert_eq!(parse("1").unwrap().min_score, Some(1.0));
        assert_eq!(parse("2.5").unwrap().min_score, Some(2.5));
        assert!(parse("-1").is_err());
        assert!(parse("NaN").is_err());
        assert!(parse("high").is_err());
    }

    #[test]
    fn test_cli_requires_paths() {
        assert!(Cli::try_parse_from(["topic_news", "-s", "sources.yaml"]).is_err());
    }
}

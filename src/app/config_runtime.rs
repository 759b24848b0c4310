use anyhow::{Result, bail};
use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};

use super::config::{FileConfig, VerbositySetting};
use crate::cli::Args;

/// Which flags were given explicitly on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) cache_dir: bool,
    pub(crate) concurrency: bool,
    pub(crate) max_retries: bool,
    pub(crate) retry_failed: bool,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = sources_from_matches(&matches);
    (args, sources)
}

fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        cache_dir: is_commandline_value(matches, "cache_dir"),
        concurrency: is_commandline_value(matches, "concurrency"),
        max_retries: is_commandline_value(matches, "max_retries"),
        retry_failed: is_commandline_value(matches, "retry_failed"),
        verbose: is_commandline_value(matches, "verbose"),
        quiet: is_commandline_value(matches, "quiet"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Fills every flag the command line left at its default from the config file.
pub(crate) fn apply_config_defaults(
    mut args: Args,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Result<Args> {
    if let Some(file_config) = file_config {
        if !cli_sources.cache_dir
            && let Some(cache_dir) = &file_config.cache_dir
        {
            args.cache_dir = cache_dir.clone();
        }

        if !cli_sources.concurrency
            && let Some(concurrency) = file_config.concurrency
        {
            args.concurrency = concurrency;
        }

        if !cli_sources.max_retries
            && let Some(max_retries) = file_config.max_retries
        {
            args.max_retries = max_retries;
        }

        if !cli_sources.retry_failed
            && let Some(retry_failed) = file_config.retry_failed
        {
            args.retry_failed = retry_failed;
        }

        if !cli_sources.verbose
            && !cli_sources.quiet
            && let Some(verbosity) = file_config.verbosity
        {
            apply_config_verbosity(&mut args, verbosity);
        }
    }

    if !(1..=100).contains(&args.concurrency) {
        bail!(
            "Invalid effective concurrency value: {}. Expected range: 1..=100",
            args.concurrency
        );
    }
    if args.max_retries > 10 {
        bail!(
            "Invalid effective max_retries value: {}. Expected range: 0..=10",
            args.max_retries
        );
    }

    Ok(args)
}

fn apply_config_verbosity(args: &mut Args, verbosity: VerbositySetting) {
    let (quiet, verbose) = match verbosity {
        VerbositySetting::Default => (false, 0),
        VerbositySetting::Verbose => (false, 1),
        VerbositySetting::Quiet => (true, 0),
        VerbositySetting::Debug => (false, 2),
    };
    args.quiet = quiet;
    args.verbose = verbose;
}

/// Priority: quiet flag > verbose count > default (info).
pub(crate) fn resolve_default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn parse(argv: &[&str]) -> (Args, CliValueSources) {
        let matches = Args::command().try_get_matches_from(argv).unwrap();
        let args = Args::from_arg_matches(&matches).unwrap();
        (args, sources_from_matches(&matches))
    }

    fn full_config() -> FileConfig {
        FileConfig {
            cache_dir: Some(PathBuf::from("/srv/captures")),
            concurrency: Some(3),
            max_retries: Some(1),
            retry_failed: Some(true),
            verbosity: Some(VerbositySetting::Quiet),
        }
    }

    #[test]
    fn test_defaults_are_not_commandline_values() {
        let (_, sources) = parse(&["capcache", "--links", "l.tsv"]);
        assert!(!sources.cache_dir);
        assert!(!sources.concurrency);
        assert!(!sources.max_retries);
        assert!(!sources.retry_failed);
        assert!(!sources.verbose);
        assert!(!sources.quiet);
    }

    #[test]
    fn test_config_fills_unset_flags() {
        let (args, sources) = parse(&["capcache", "--links", "l.tsv"]);
        let args = apply_config_defaults(args, &sources, Some(&full_config())).unwrap();
        assert_eq!(args.cache_dir, PathBuf::from("/srv/captures"));
        assert_eq!(args.concurrency, 3);
        assert_eq!(args.max_retries, 1);
        assert!(args.retry_failed);
        assert!(args.quiet);
    }

    #[test]
    fn test_commandline_wins_over_config() {
        let (args, sources) = parse(&[
            "capcache",
            "--links",
            "l.tsv",
            "--cache-dir",
            "here",
            "-c",
            "7",
            "-r",
            "4",
            "-v",
        ]);
        let args = apply_config_defaults(args, &sources, Some(&full_config())).unwrap();
        assert_eq!(args.cache_dir, PathBuf::from("here"));
        assert_eq!(args.concurrency, 7);
        assert_eq!(args.max_retries, 4);
        assert_eq!(args.verbose, 1);
        assert!(!args.quiet);
    }

    #[test]
    fn test_commandline_value_equal_to_default_still_wins() {
        let (args, sources) = parse(&["capcache", "--links", "l.tsv", "-c", "10"]);
        assert!(sources.concurrency);
        let args = apply_config_defaults(args, &sources, Some(&full_config())).unwrap();
        assert_eq!(args.concurrency, 10);
    }

    #[test]
    fn test_no_config_keeps_args() {
        let (args, sources) = parse(&["capcache", "--links", "l.tsv"]);
        let args = apply_config_defaults(args, &sources, None).unwrap();
        assert_eq!(args.concurrency, 10);
        assert!(!args.retry_failed);
    }

    #[test]
    fn test_log_level_resolution() {
        let (mut args, _) = parse(&["capcache", "--links", "l.tsv"]);
        assert_eq!(resolve_default_log_level(&args), "info");
        args.verbose = 1;
        assert_eq!(resolve_default_log_level(&args), "debug");
        args.verbose = 2;
        assert_eq!(resolve_default_log_level(&args), "trace");
        args.quiet = true;
        assert_eq!(resolve_default_log_level(&args), "error");
    }

    #[test]
    fn test_config_debug_verbosity_maps_to_trace() {
        let (args, sources) = parse(&["capcache", "--links", "l.tsv"]);
        let config = FileConfig {
            verbosity: Some(VerbositySetting::Debug),
            ..FileConfig::default()
        };
        let args = apply_config_defaults(args, &sources, Some(&config)).unwrap();
        assert_eq!(resolve_default_log_level(&args), "trace");
    }
}

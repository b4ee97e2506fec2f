/// Parsed command-line arguments.
///
/// The binary takes a single optional flag, so arguments are parsed by
/// hand rather than pulling in a full argument parser.
pub struct CliArgs {
    /// Path to configuration file, from `--config-path` / `-c`.
    pub config_path: Option<String>,
    /// Whether `--help` / `-h` was given.
    pub help_requested: bool,
}

impl CliArgs {
    pub fn parse() -> Self {
        Self::from_args(std::env::args().skip(1))
    }

    fn from_args(mut args: impl Iterator<Item = String>) -> Self {
        let mut config_path = None;
        let mut help_requested = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => help_requested = true,
                "--config-path" | "-c" => {
                    if config_path.is_none() {
                        config_path = args.next();
                    }
                }
                other => {
                    let value = other
                        .strip_prefix("--config-path=")
                        .or_else(|| other.strip_prefix("-c="));
                    if let (Some(value), None) = (value, config_path.as_ref()) {
                        config_path = Some(value.to_string());
                    }
                }
            }
        }

        Self {
            config_path,
            help_requested,
        }
    }

    /// Print usage information to stderr.
    pub fn print_help() {
        eprintln!(
            "Usage: credgate-backend [--config-path PATH] [--help]\n\n\
             --config-path, -c    Path to configuration file (overrides CREDGATE_CONFIG_PATH env var)"
        );
    }
}

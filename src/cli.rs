use clap::Parser;
use pronound_core::config::{DEFAULT_PATH, PATH_ENV};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Run in the background even if the configuration file does not ask for it
    #[arg(short, long)]
    pub daemon: bool,

    /// Configuration file
    #[arg(short = 'C', long, value_name = "FILE", env = PATH_ENV, default_value = DEFAULT_PATH)]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;
    use std::path::Path;

    #[test]
    fn flags() {
        let cli = Cli::try_parse_from(["pronound", "-d", "-C", "/tmp/p.conf"]).unwrap();
        assert!(cli.daemon);
        assert_eq!(cli.config, Path::new("/tmp/p.conf"));
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(Cli::try_parse_from(["pronound", "-x"]).is_err());
    }
}

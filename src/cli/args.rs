use std::path::PathBuf;

use clap::Parser;

use crate::backup::lock::DEFAULT_LOCK_TIMEOUT;
use crate::backup::rsync::DEFAULT_RSYNC;

#[derive(Parser, Debug)]
#[command(
    name = "rbt",
    version,
    about = "Scheduled rsync backups with hard-linked snapshot rotation"
)]
pub struct Cli {
    /// Backup configuration file or job name (repeatable)
    #[arg(short = 'f', long = "file", value_name = "CONFIG")]
    pub files: Vec<String>,

    /// Further configuration files or job names
    #[arg(value_name = "CONFIG")]
    pub configs: Vec<String>,

    #[arg(long, short = 'v')]
    pub verbose: bool,
    /// Print the rsync command instead of running it
    #[arg(long)]
    pub dry_run: bool,
    /// Show generations and completion times instead of running backups
    #[arg(long)]
    pub status: bool,

    /// Seconds to wait for another run of the same job to finish
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_LOCK_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub lock_timeout: u64,
    #[arg(long, value_name = "PATH", default_value = DEFAULT_RSYNC)]
    pub rsync: PathBuf,
    /// Run rsync under nice/ionice
    #[arg(long)]
    pub nice: bool,

    /// Directory searched for configuration files
    #[arg(long, value_name = "DIR", default_value = crate::config::locate::CONFIG_DIR)]
    pub config_dir: PathBuf,
}

impl Cli {
    pub fn identifiers(&self) -> Vec<String> {
        self.files.iter().chain(self.configs.iter()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_flag_and_positional_configs() {
        let cli = Cli::try_parse_from(["rbt", "-f", "home", "--file", "mail.json", "etc", "-v"])
            .expect("parse");
        assert_eq!(cli.identifiers(), vec!["home", "mail.json", "etc"]);
        assert!(cli.verbose);
        assert_eq!(cli.lock_timeout, 60);
        assert_eq!(cli.rsync, PathBuf::from(DEFAULT_RSYNC));
    }

    #[test]
    fn rejects_bad_timeout() {
        assert!(Cli::try_parse_from(["rbt", "--lock-timeout", "soon"]).is_err());
        assert!(Cli::try_parse_from(["rbt", "--lock-timeout", "0"]).is_err());
        let cli = Cli::try_parse_from(["rbt", "--lock-timeout", "5"]).expect("parse");
        assert_eq!(cli.lock_timeout, 5);
    }
}

//! ttar CLI
//!
//! Create, list and extract ttar archives (tar-style flags).

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, CommandFactory, Parser};
use ttar::{ArchiveError, Operation, Options};

const USAGE_EXIT: u8 = 1;

#[derive(Parser, Debug)]
#[command(name = "ttar")]
#[command(version)]
#[command(about = "Plain-text archives of small directory trees")]
#[command(group(
    ArgGroup::new("operation")
        .required(true)
        .args(["create", "list", "extract"])
))]
struct Cli {
    /// Create an archive from the given paths
    #[arg(short = 'c')]
    create: bool,

    /// List the contents of an archive
    #[arg(short = 't')]
    list: bool,

    /// Extract an archive
    #[arg(short = 'x')]
    extract: bool,

    /// Archive file ("-" for stdin/stdout)
    #[arg(short = 'f', value_name = "ARCHIVE")]
    file: PathBuf,

    /// Read and write entries relative to DIR
    #[arg(short = 'C', value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Echo each entry to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Files and directories to archive
    paths: Vec<PathBuf>,
}

impl Cli {
    fn operation(&self) -> Operation {
        if self.create {
            Operation::Create
        } else if self.list {
            Operation::List
        } else {
            Operation::Extract
        }
    }
}

/// `--help` and `--version` are not failures
fn parse_error_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        USAGE_EXIT
    } else {
        0
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(parse_error_code(&err));
        }
    };

    let operation = cli.operation();
    let options = Options {
        directory: cli.directory,
        paths: cli.paths,
        verbose: cli.verbose,
    };

    match operation.process(&cli.file, &options, io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ttar: {:#}", err);
            match err.downcast_ref::<ArchiveError>() {
                Some(ArchiveError::Usage(_)) => {
                    eprintln!("{}", Cli::command().render_usage());
                    ExitCode::from(USAGE_EXIT)
                }
                Some(archive_err) => ExitCode::from(archive_err.exit_code()),
                None => ExitCode::FAILURE,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_operation_parses() {
        let cli = Cli::try_parse_from(["ttar", "-x", "-f", "a.ttar", "-C", "out"]).unwrap();
        assert_eq!(cli.operation(), Operation::Extract);
        assert_eq!(cli.directory, Some(PathBuf::from("out")));

        let cli = Cli::try_parse_from(["ttar", "-cvf", "a.ttar", "src"]).unwrap();
        assert_eq!(cli.operation(), Operation::Create);
        assert!(cli.verbose);
        assert_eq!(cli.paths, vec![PathBuf::from("src")]);
    }

    #[test]
    fn test_conflicting_operations_exit_one() {
        let err = Cli::try_parse_from(["ttar", "-c", "-t", "-f", "a.ttar"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        assert_eq!(parse_error_code(&err), 1);
    }

    #[test]
    fn test_missing_operation_exit_one() {
        let err = Cli::try_parse_from(["ttar", "-f", "a.ttar"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert_eq!(parse_error_code(&err), 1);
    }

    #[test]
    fn test_help_exits_zero() {
        let err = Cli::try_parse_from(["ttar", "--help"]).unwrap_err();
        assert_eq!(parse_error_code(&err), 0);
    }
}

use std::process::ExitCode;

use tighten_cli::{build_cli, execute, parse_command};
use tighten_core::{init_tracing, TightenConfig};

fn main() -> ExitCode {
    let matches = build_cli().get_matches();
    init_tracing(matches.get_flag("debug"));

    let result = parse_command(&matches)
        .and_then(|command| execute(command, &TightenConfig::default()));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}

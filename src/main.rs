//! CLI entry point: parse args, dispatch to the matching command, and on
//! failure print the error envelope to stderr and exit non-zero.

use std::process;

use polydb::cli::{run_command, Cli};

fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = run_command(cli.command) {
        let error_json = serde_json::json!({
            "status": "error",
            "code": e.code_str(),
            "message": e.message()
        });

        eprintln!("{}", error_json);
        process::exit(1);
    }
}

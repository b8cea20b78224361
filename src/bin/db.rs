//! # db - REPL Entry Point
//!
//! ```bash
//! db <filename>
//! ```
//!
//! Opens (or creates) the database file and hands stdin/stdout to the
//! REPL. The exit code is 0 only for a session ended by `.exit`; running
//! out of input or any fatal storage error prints a diagnostic to stdout
//! and exits 1.

use std::io;

use eyre::Result;
use rowdb::cli::{Repl, ReplOutcome};
use rowdb::Table;

fn main() {
    match run() {
        Ok(ReplOutcome::Exit) => {}
        Ok(ReplOutcome::InputClosed) => {
            // The REPL already printed its diagnostic.
            std::process::exit(1);
        }
        Err(error) => {
            println!("{error:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<ReplOutcome> {
    let mut args = std::env::args().skip(1);
    let filename = match args.next() {
        Some(filename) => filename,
        None => {
            println!("Must supply a database filename.");
            std::process::exit(1);
        }
    };

    let table = Table::open(&filename)?;
    Repl::new(table, io::stdin().lock(), io::stdout()).run()
}

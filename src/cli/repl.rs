//! # REPL - Read-Eval-Print Loop
//!
//! The interactive loop: print the `db > ` prompt, read one line,
//! dispatch it as a meta-command or statement, print the result, repeat.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ prompt "db > ", read line                    │
//! └─────────────────────────────────────────────┘
//!        │ EOF ──> "Error reading input", InputClosed
//!        ▼
//! ┌─────────────────────────────────────────────┐
//! │ starts with '.' ?                            │
//! └─────────────────────────────────────────────┘
//!   │ yes                        │ no
//!   ▼                            ▼
//! .exit ──> close, Exit     parse statement
//! .btree / .constants       │ error ──> print, loop
//! unknown ──> report        ▼
//!                           execute insert/select
//!                           print "Executed." / rows / duplicate
//! ```
//!
//! The loop is generic over `BufRead`/`Write` so tests can drive it with
//! in-memory streams and assert whole transcripts, prompt included.
//!
//! Recoverable errors (parse failures, duplicate keys) are printed and the
//! loop continues. Fatal errors from the core propagate out as `Err`; the
//! binary prints the diagnostic and exits nonzero.

use std::io::{BufRead, Write};

use eyre::Result;

use crate::btree::InsertOutcome;
use crate::cli::commands::{self, MetaResult};
use crate::cli::statement::{self, Statement};
use crate::table::Table;

const PROMPT: &str = "db > ";

/// How a session ended: cleanly via `.exit`, or because the input stream
/// ran dry before one arrived (an error; only `.exit` exits cleanly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplOutcome {
    Exit,
    InputClosed,
}

pub struct Repl<R, W> {
    table: Table,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Repl<R, W> {
    pub fn new(table: Table, input: R, output: W) -> Self {
        Self {
            table,
            input,
            output,
        }
    }

    pub fn run(mut self) -> Result<ReplOutcome> {
        let mut line = String::new();

        loop {
            write!(self.output, "{PROMPT}")?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output, "Error reading input")?;
                return Ok(ReplOutcome::InputClosed);
            }
            let line = line.trim_end_matches(['\n', '\r']);

            if commands::is_meta(line) {
                match commands::execute(line, &mut self.table)? {
                    MetaResult::Exit => {
                        self.table.close()?;
                        return Ok(ReplOutcome::Exit);
                    }
                    MetaResult::Output(text) => write!(self.output, "{text}")?,
                    MetaResult::Unrecognized => {
                        writeln!(self.output, "Unrecognized command '{line}'")?;
                    }
                }
                continue;
            }

            match statement::prepare(line) {
                Ok(statement) => self.execute_statement(statement)?,
                Err(error) => writeln!(self.output, "{error}")?,
            }
        }
    }

    fn execute_statement(&mut self, statement: Statement) -> Result<()> {
        match statement {
            Statement::Insert(row) => match self.table.insert(&row)? {
                InsertOutcome::Inserted => writeln!(self.output, "Executed.")?,
                InsertOutcome::DuplicateKey => writeln!(self.output, "Error: Duplicate key.")?,
            },
            Statement::Select => {
                let mut cursor = self.table.start()?;
                while !cursor.end_of_table() {
                    let row = cursor.row()?;
                    writeln!(self.output, "({}, {}, {})", row.id, row.username, row.email)?;
                    cursor.advance()?;
                }
                writeln!(self.output, "Executed.")?;
            }
        }
        Ok(())
    }
}

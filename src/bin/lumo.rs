//! Lumo interpreter command-line.
//!
//! When called without argument it drops into an interactive
//! read-evaluate-print loop.  When called with a single script path it runs
//! the file and exits 65 on compile errors and 70 on runtime errors.

use std::env;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::process;

use anyhow::Context;

use lumo::interpreter::{Interpreter, LumoError};

fn main() -> Result<(), anyhow::Error> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    match args.as_slice() {
        [] => run_prompt()?,
        [path] => run_file(path)?,
        _ => {
            eprintln!("Usage: lumo [script]");
            process::exit(64);
        }
    }
    Ok(())
}

fn run_file(path: &str) -> Result<(), anyhow::Error> {
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;

    let mut interp_stdout = io::stdout();
    let mut interp = Interpreter::new(&mut interp_stdout);

    if let Err(e) = interp.run(&source) {
        match e {
            LumoError::Compile(errors) => {
                for error in &errors {
                    eprintln!("{}", error);
                }
                process::exit(65);
            }
            LumoError::Runtime(error) => {
                eprintln!("{}", error);
                process::exit(70);
            }
        }
    }

    Ok(())
}

fn run_prompt() -> Result<(), io::Error> {
    let stdin = io::stdin();
    let mut repl_stdout = io::stdout();
    let mut interp_stdout = io::stdout();

    let mut interp = Interpreter::new(&mut interp_stdout);
    interp.set_print_exprs(true);

    let mut input = String::new();
    loop {
        repl_stdout.write_all(b"> ")?;
        repl_stdout.flush()?;

        input.clear();
        let nbytes = stdin.read_line(&mut input)?;
        if nbytes == 0 {
            break;
        }

        // Errors do not end the session; each line starts clean.
        if let Err(e) = interp.run(&input) {
            eprintln!("{}", e);
        }
    }

    Ok(())
}

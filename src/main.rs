//! Rust implementation of clox from Crafting Interpreters - Robert Nystrom

#![allow(dead_code)]
#![deny(warnings)]

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::instrument;

use rlox::error::InterpretError;
use rlox::options::Options;
use rlox::vm::VM;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options: Options = argh::from_env();

    if options.tracing {
        tracing_subscriber::fmt::init();
    }

    if let Some(filepath) = options.filepath {
        run_file(filepath).await?;
    } else {
        repl().await?;
    }

    Ok(())
}

async fn repl() -> anyhow::Result<()> {
    // TODO: any IO errors in here should probably exit(74)
    // (and this function shouldn't return a Result)

    let vm = VM::new();
    let mut stdout = tokio::io::stdout();
    let reader = BufReader::new(tokio::io::stdin());

    let mut lines = reader.lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        if let Some(line) = lines.next_line().await? {
            // ignore any errors that come out of this
            // (tho we may want to exit(74) if it's an internal error)
            let _ = vm.interpret(line);
        } else {
            stdout.write_all(b"\n").await?;
            break;
        }
    }

    Ok(())
}

#[instrument(skip(filepath))]
async fn run_file(filepath: impl AsRef<Path>) -> anyhow::Result<()> {
    // TODO: this should exit(74) if we fail to read the file
    // (and this function shouldn't return a Result)
    let source = tokio::fs::read_to_string(filepath).await?;

    let vm = VM::new();
    match vm.interpret(source) {
        Ok(_) => Ok(()),
        Err(err) => match err {
            InterpretError::Internal => std::process::exit(1),
            InterpretError::Compile => std::process::exit(65),
            InterpretError::Runtime => std::process::exit(70),
        },
    }
}

use std::fs::read_to_string;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use ferrox::interpreter::context::StdioContext;
use ferrox::session::{RunStatus, Session};

#[derive(Debug, Parser)]
#[clap(name = "ferrox", version, about = "A tree-walking interpreter for the Lox language")]
struct CLArgs {
    /// Script to execute; omit it for an interactive prompt.
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    ferrox_main().expect("Encountered an error!")
}

fn ferrox_main() -> Result<ExitCode> {
    color_eyre::install().expect("Can't fail at first call!");
    let args = CLArgs::parse();
    match args.script {
        Some(path) => run_file(&path),
        None => run_prompt(),
    }
}

fn run_file(path: &PathBuf) -> Result<ExitCode> {
    let Ok(source) = read_to_string(path) else {
        println!("Could not open file: {}", path.display());
        return Ok(ExitCode::from(60));
    };
    let session = Session::new(false);
    let mut context = StdioContext;
    let code = match session.run(&source, &mut context) {
        RunStatus::Ok => ExitCode::SUCCESS,
        RunStatus::HadError => ExitCode::from(65),
        RunStatus::HadRuntimeError => ExitCode::from(70),
    };
    Ok(code)
}

fn run_prompt() -> Result<ExitCode> {
    let session = Session::new(true);
    let mut context = StdioContext;
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        // A failed line poisons nothing; the next prompt starts clean.
        let _ = session.run(&line, &mut context);
    }
    Ok(ExitCode::SUCCESS)
}

use std::sync::Arc;

use log::debug;

use crate::interpreter::{SystemContext, TreeWalkInterpreter};
use crate::lexer::Lexer;
use crate::parser::{ErrorLocation, Parser};
use crate::resolver::Resolver;

/// Outcome of running one source string, mirrored by the process exit
/// codes: 0, 65 and 70 respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    HadError,
    HadRuntimeError,
}

/// Drives a source string through scan, parse, resolve and run, rendering
/// every diagnostic through the output sink. The interpreter persists
/// across calls, so a prompt session keeps its global definitions while
/// error state never outlives the line that produced it.
pub struct Session {
    interpreter: TreeWalkInterpreter,
}

impl Session {
    pub fn new(repl: bool) -> Self {
        Self {
            interpreter: TreeWalkInterpreter::new(repl),
        }
    }

    pub fn run<C: SystemContext>(&self, source: &str, context: &mut C) -> RunStatus {
        let (tokens, scan_errors) = Lexer::new(source).scan();
        let mut had_error = !scan_errors.is_empty();
        for error in &scan_errors {
            context.writeln(&format!("[line {}] Error: {}", error.line, error.kind));
        }

        let (ast, parse_errors) = Parser::new(source, tokens).parse();
        had_error |= !parse_errors.is_empty();
        for error in &parse_errors {
            context.writeln(&report_at(error.line, &error.location, &error.kind));
        }
        if had_error {
            return RunStatus::HadError;
        }

        let program = match Resolver::new().resolve(ast) {
            Ok(program) => program,
            Err(errors) => {
                for error in &errors {
                    context.writeln(&report_at(error.line, &error.location, &error.kind));
                }
                return RunStatus::HadError;
            }
        };

        debug!("executing {} top-level statements", program.top_level().len());
        let program = Arc::new(program);
        match self.interpreter.run(&program, context) {
            Ok(()) => RunStatus::Ok,
            Err(error) => {
                context.writeln(&format!("{}\n[line {}]", error.kind, error.line));
                RunStatus::HadRuntimeError
            }
        }
    }
}

fn report_at(line: u32, location: &ErrorLocation, message: &impl std::fmt::Display) -> String {
    match location {
        ErrorLocation::Eof => format!("[line {line}] Error at end: {message}"),
        ErrorLocation::Lexeme(lexeme) => format!("[line {line}] Error at '{lexeme}': {message}"),
    }
}

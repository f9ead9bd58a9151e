//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::fs;
use std::path::Path;

use crate::backend::ir::NullBuilder;
use crate::backend::ssa::SsaModule;
use crate::frontend::diagnostics::format_error;
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::frontend::token::TokenKind;

use super::{CliError, CliResult, ExitCode};

/// Maximum source file size (16 MB). Larger files are rejected rather than
/// read into memory whole.
const MAX_SOURCE_SIZE: u64 = 16 * 1024 * 1024;

fn read_source(file_path: &str) -> CliResult<String> {
    let metadata =
        fs::metadata(file_path).map_err(|e| CliError::failure(format!("error: {}: {}", file_path, e)))?;
    if !Path::new(file_path).is_file() {
        return Err(CliError::failure(format!("error: {}: not a file", file_path)));
    }
    if metadata.len() > MAX_SOURCE_SIZE {
        return Err(CliError::failure(format!(
            "error: {}: source file exceeds {} bytes",
            file_path, MAX_SOURCE_SIZE
        )));
    }
    fs::read_to_string(file_path).map_err(|e| CliError::failure(format!("error: {}: {}", file_path, e)))
}

/// Compile a source file: run the front end with the SSA backend and print
/// the module on success.
pub fn compile_file(file_path: &str) -> CliResult<ExitCode> {
    let source = read_source(file_path)?;
    let mut module = SsaModule::new();
    let mut parser = Parser::new(&source, &mut module);
    match parser.parse() {
        Ok(()) => {
            println!("Valid parse.");
            print!("{}", module.render());
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => Err(CliError::failure(format_error(file_path, &error))),
    }
}

/// Run the front end only, with a backend that builds nothing.
pub fn check_file(file_path: &str) -> CliResult<ExitCode> {
    let source = read_source(file_path)?;
    let mut builder = NullBuilder::new();
    let mut parser = Parser::new(&source, &mut builder);
    match parser.parse() {
        Ok(()) => {
            println!("Valid parse.");
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => Err(CliError::failure(format_error(file_path, &error))),
    }
}

/// Dump the token stream, one token per line, then any lexical errors.
pub fn lex_file(file_path: &str) -> CliResult<ExitCode> {
    let source = read_source(file_path)?;
    let mut lexer = Lexer::new(&source);
    loop {
        lexer.scan();
        let token = lexer.current();
        println!("line {}: {:?}", token.line, token.kind);
        if token.kind == TokenKind::Eof {
            break;
        }
    }
    let errors = lexer.take_errors();
    for error in &errors {
        eprintln!("{}", format_error(file_path, error));
    }
    if errors.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

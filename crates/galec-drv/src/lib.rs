//! galec-drv - Compiler driver.
//!
//! Orchestrates the pipeline: reads a source file or a package directory,
//! runs lexing and parsing (concurrently, over the token channel),
//! resolution, and IR emission, and offers the debug paths (`-T`, `-A`)
//! plus linking through the system C compiler.

pub mod reporting;

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

use galec_lex::{lex, TokenKind, TokenStream};
use galec_par::{parse, File, NodeIds};
use galec_sem::resolve_package;
use galec_util::files::source_files_in_dir;
use galec_util::{CompileError, FilePos, FileSpan, Result, TargetMachine};

/// Wall-clock cost of each compilation phase, reported by `-P`.
#[derive(Debug)]
pub struct PhaseTimes {
    pub parse: Duration,
    pub resolve: Duration,
    pub emit: Duration,
}

fn path_arc(path: &Path) -> Arc<str> {
    Arc::from(path.to_string_lossy().as_ref())
}

fn lex_file(path: &Path) -> Result<TokenStream> {
    let src = fs::read_to_string(path)?;
    Ok(lex(path_arc(path), src))
}

/// `-T`: writes one `<KIND>:<TEXT>:<LINE>:<COL>` line per token.
pub fn tokenize_file(path: &Path, out: &mut impl Write) -> Result<()> {
    let stream = lex_file(path)?;
    while let Some(tok) = stream.recv() {
        if tok.kind == TokenKind::Error {
            return Err(CompileError::source(tok.text, tok.span));
        }
        writeln!(
            out,
            "{}:{}:{}:{}",
            tok.kind, tok.text, tok.span.start.line, tok.span.start.col
        )?;
    }
    Ok(())
}

/// Parses a single source file.
pub fn parse_file(path: &Path, ids: &mut NodeIds) -> Result<File> {
    let stream = lex_file(path)?;
    parse(stream, ids)
}

/// Reads just the leading `package NAME` of a file, then cancels the
/// lexer and drains the channel so its task can finish.
pub fn package_name(path: &Path) -> Result<String> {
    let mut stream = lex_file(path)?;
    let result = read_package_header(&stream, path);
    stream.cancel();
    stream.drain();
    result
}

fn read_package_header(stream: &TokenStream, path: &Path) -> Result<String> {
    let header_err = || {
        CompileError::source(
            "malformed package header",
            FileSpan::point(path_arc(path), FilePos::START),
        )
    };
    let kw = stream.recv().ok_or_else(header_err)?;
    match kw.kind {
        TokenKind::Package => {}
        TokenKind::Error => return Err(CompileError::source(kw.text, kw.span)),
        _ => return Err(CompileError::source("malformed package header", kw.span)),
    }
    let name = stream.recv().ok_or_else(header_err)?;
    match name.kind {
        TokenKind::Identifier => Ok(name.text),
        TokenKind::Error => Err(CompileError::source(name.text, name.span)),
        _ => Err(CompileError::source("malformed package header", name.span)),
    }
}

/// Loads the package at `input`: either one source file, or every `.g`
/// file in a directory. All files must declare the same package name;
/// the check reads only each file's header via the cancellation path.
pub fn load_package(input: &Path) -> Result<Vec<File>> {
    let paths = if input.is_dir() {
        let paths = source_files_in_dir(input)?;
        if paths.is_empty() {
            return Err(CompileError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no .g files in {}", input.display()),
            )));
        }
        paths
    } else {
        vec![input.to_path_buf()]
    };

    let mut pkg: Option<String> = None;
    for path in &paths {
        let name = package_name(path)?;
        match &pkg {
            None => pkg = Some(name),
            Some(first) if *first != name => {
                return Err(CompileError::source(
                    format!("package {} conflicts with package {}", name, first),
                    FileSpan::point(path_arc(path), FilePos::START),
                ));
            }
            Some(_) => {}
        }
    }

    let mut ids = NodeIds::new();
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(parse_file(path, &mut ids)?);
    }
    Ok(files)
}

/// Compiles the package at `input` to an LLVM IR text module on `out`.
pub fn compile_to_ir(
    target: &dyn TargetMachine,
    input: &Path,
    out: &mut impl Write,
) -> Result<PhaseTimes> {
    let start = Instant::now();
    let files = load_package(input)?;
    let parse_time = start.elapsed();
    log::debug!("parsed {} file(s) in {:?}", files.len(), parse_time);

    let start = Instant::now();
    let resolved = resolve_package(target, &files)?;
    let resolve_time = start.elapsed();
    log::debug!("resolved package {} in {:?}", resolved.pkg_name, resolve_time);

    let start = Instant::now();
    galec_emit::emit_module(target, &resolved, &files, out)?;
    let emit_time = start.elapsed();
    log::debug!("emitted module in {:?}", emit_time);

    Ok(PhaseTimes {
        parse: parse_time,
        resolve: resolve_time,
        emit: emit_time,
    })
}

/// Turns an IR file into an executable with the system C compiler, which
/// also runs the assembler and linker.
pub fn link_ir_to_binary(ir_path: &Path, out_path: &Path) -> Result<()> {
    let status = Command::new("clang")
        .arg(ir_path)
        .arg("-o")
        .arg(out_path)
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(CompileError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("clang failed with {}", status),
        )))
    }
}

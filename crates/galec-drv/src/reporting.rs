//! User-facing error rendering.
//!
//! Prints `error: <message> at <path>:<line>:<col>` followed by the
//! offending source line with a caret under the column. Tabs render as
//! four spaces to keep the caret roughly aligned.

use std::fs;
use std::io::{self, Write};

use galec_util::{CompileError, FileSpan};

pub fn print_error(err: &CompileError) {
    eprintln!("error: {}", err);
    if let Some(span) = err.span() {
        // Best effort; a vanished source file only loses the caret.
        let _ = print_caret_line(&mut io::stderr(), span);
    }
}

fn print_caret_line(out: &mut impl Write, span: &FileSpan) -> io::Result<()> {
    let source = fs::read_to_string(&*span.path)?;
    let line = match source.lines().nth(span.start.line as usize - 1) {
        Some(line) => line.replace('\t', "    "),
        None => return Ok(()),
    };
    writeln!(out, "{}", line)?;
    let col = span.start.col as usize;
    for i in 0..line.chars().count() {
        if i == col - 1 {
            write!(out, "^")?;
        } else {
            write!(out, " ")?;
        }
    }
    writeln!(out)?;
    Ok(())
}

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::exit;

use anyhow::Context;
use galec_drv::{compile_to_ir, parse_file, reporting, tokenize_file, PhaseTimes};
use galec_par::NodeIds;
use galec_util::{native_target, CompileError};

const VERSION: &str = env!("CARGO_PKG_VERSION");

struct Options {
    tokenize_only: bool,
    parse_only: bool,
    profile: bool,
    version: bool,
    output: String,
    input: Option<PathBuf>,
}

impl Options {
    fn parse(args: impl Iterator<Item = String>) -> Result<Options, String> {
        let mut opts = Options {
            tokenize_only: false,
            parse_only: false,
            profile: false,
            version: false,
            output: "-".to_string(),
            input: None,
        };
        let mut args = args;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-T" => opts.tokenize_only = true,
                "-A" => opts.parse_only = true,
                "-P" => opts.profile = true,
                "-version" => opts.version = true,
                "-o" => {
                    opts.output = args
                        .next()
                        .ok_or_else(|| "flag -o requires an argument".to_string())?;
                }
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    return Err(format!("unknown flag {}", flag));
                }
                _ => {
                    if opts.input.is_some() {
                        return Err(
                            "bad number of args, please specify a single input".to_string()
                        );
                    }
                    opts.input = Some(PathBuf::from(arg));
                }
            }
        }
        Ok(opts)
    }
}

fn print_version() {
    println!("galec version {}", VERSION);
}

fn print_usage() {
    print_version();
    println!();
    println!("usage: galec [-T|-A|-P] [-o PATH|-] [-version] INPUT");
    println!();
    println!("  -T        tokenize only (for debugging)");
    println!("  -A        print the AST (for debugging)");
    println!("  -P        profile the compiler, writing ccrun.prof");
    println!("  -o PATH   file to write output to, - for stdout");
    println!("  -version  print version info and exit");
    println!();
    println!("INPUT is a source file or a directory of .g files forming one package.");
}

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()
        .ok();

    let opts = match Options::parse(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("error: {}", msg);
            print_usage();
            exit(1);
        }
    };

    if opts.version {
        print_version();
        return;
    }

    let Some(input) = opts.input.clone() else {
        print_usage();
        exit(1);
    };

    if let Err(err) = run(&opts, &input) {
        match err.downcast_ref::<CompileError>() {
            Some(compile_err) => reporting::print_error(compile_err),
            None => eprintln!("error: {:#}", err),
        }
        exit(1);
    }
}

fn run(opts: &Options, input: &std::path::Path) -> anyhow::Result<()> {
    let mut out: Box<dyn Write> = if opts.output == "-" {
        Box::new(io::stdout())
    } else {
        let file = fs::File::create(&opts.output)
            .with_context(|| format!("failed to open output file {}", opts.output))?;
        Box::new(file)
    };
    let mut out = io::BufWriter::new(&mut out);

    if opts.tokenize_only {
        tokenize_file(input, &mut out)?;
        out.flush()?;
        return Ok(());
    }

    if opts.parse_only {
        let mut ids = NodeIds::new();
        let ast = parse_file(input, &mut ids)?;
        writeln!(out, "{:#?}", ast)?;
        out.flush()?;
        return Ok(());
    }

    let target = native_target();
    let times = compile_to_ir(&*target, input, &mut out)?;
    out.flush()?;

    if opts.profile {
        write_profile(&times).context("failed to write ccrun.prof")?;
    }
    Ok(())
}

fn write_profile(times: &PhaseTimes) -> io::Result<()> {
    let mut file = fs::File::create("ccrun.prof")?;
    writeln!(file, "lex+parse {:?}", times.parse)?;
    writeln!(file, "resolve   {:?}", times.resolve)?;
    writeln!(file, "emit      {:?}", times.emit)?;
    writeln!(
        file,
        "total     {:?}",
        times.parse + times.resolve + times.emit
    )?;
    Ok(())
}

use std::{
    error::Error,
    fs,
    io::{self, Read},
    path::PathBuf,
    process,
};

use blockc::{
    compile::{compile_source, ProgramOutput},
    diagnostic::Level,
    util::fmt::tree,
    vm,
};
use clap::Parser;
use log::{error, info, LevelFilter};

/// Compiles every program unit of a block-language source file.
#[derive(Parser)]
#[command(name = "blockc", version, long_about = None)]
struct Cli {
    /// Execute each compiled program and print its output
    #[arg(long)]
    run: bool,

    /// Source file; standard input when absent or `-`
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,
}

impl Cli {
    fn read_source(&self) -> io::Result<String> {
        match &self.file {
            Some(path) if path.as_os_str() != "-" => fs::read_to_string(path),
            _ => {
                let mut src = String::new();
                io::stdin().read_to_string(&mut src)?;
                Ok(src)
            }
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()?;

    let src = cli.read_source()?;
    let outputs = compile_source(&src);
    info!("compiled {} program(s)", outputs.len());
    for output in &outputs {
        print_program(output, cli.run);
    }
    if !outputs.iter().all(ProgramOutput::is_ok) {
        process::exit(1);
    }
    Ok(())
}

fn print_program(output: &ProgramOutput, run: bool) {
    println!("Program {}", output.index);
    for diagnostic in output.diagnostics.at_least(Level::Info) {
        println!("{diagnostic}");
    }
    if let Some(cst) = &output.cst {
        println!("\nCST for program {}:\n{}", output.index, tree::print_cst_string(cst));
    }
    if let Some(ast) = &output.ast {
        println!("AST for program {}:\n{}", output.index, tree::print_ast_string(ast));
    }
    if let Some(scopes) = &output.scopes {
        println!("Symbol table for program {}:\n{scopes}", output.index);
    }
    if let Some(image) = &output.image {
        println!("Image for program {}:\n{image}", output.index);
        if run {
            match vm::run(image) {
                Ok(printed) => println!("Output of program {}: {printed}\n", output.index),
                Err(e) => error!("program {} failed: {e}", output.index),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flag_and_file() {
        let cli = Cli::try_parse_from(["blockc", "--run", "demos/programs.blk"])
            .expect("valid args");
        assert!(cli.run);
        assert_eq!(cli.file, Some(PathBuf::from("demos/programs.blk")));

        let cli = Cli::try_parse_from(["blockc", "-"]).expect("valid args");
        assert!(!cli.run);
        assert_eq!(cli.file, Some(PathBuf::from("-")));
    }

    #[test]
    fn rejects_unknown_flags_and_extra_files() {
        assert!(Cli::try_parse_from(["blockc", "--jit"]).is_err());
        assert!(Cli::try_parse_from(["blockc", "a.blk", "b.blk"]).is_err());
    }
}

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use smalt::{ClassTable, Decoder, compile_image};

/// Compile a bootstrap image and inspect the result.
#[derive(Parser)]
#[command(name = "smalt", version, about)]
struct Cli {
    /// Image source file to compile.
    image: PathBuf,

    /// Print the resolved class table.
    #[arg(long)]
    classes: bool,

    /// Print every compiled method's instructions.
    #[arg(long)]
    disassemble: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let source = match fs::read_to_string(&cli.image) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("cannot read {}: {e}", cli.image.display());
            return ExitCode::FAILURE;
        }
    };
    let table = match compile_image(&source) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("{}: {e}", cli.image.display());
            return ExitCode::FAILURE;
        }
    };
    println!(
        "{}: {} classes",
        cli.image.display(),
        table.len()
    );
    if cli.classes {
        print_classes(&table);
    }
    if cli.disassemble {
        disassemble(&table);
    }
    ExitCode::SUCCESS
}

fn print_classes(table: &ClassTable) {
    for (_, class) in table.iter() {
        let parent = match class.parent() {
            Some(id) => table.get(id).name.as_str(),
            None => "nil",
        };
        println!(
            "{} (meta {}, parent {}, size {})",
            class.name,
            table.get(class.metaclass()).name,
            parent,
            class.size,
        );
        if !class.variables.is_empty() {
            println!("  variables: {}", class.variables.join(" "));
        }
        for selector in class.methods.keys() {
            println!("  method: {selector}");
        }
    }
}

fn disassemble(table: &ClassTable) {
    for (_, class) in table.iter() {
        for (selector, method) in &class.methods {
            println!(
                "{}>>{} (max stack {})",
                class.name, selector, method.max_stack
            );
            for (index, literal) in method.literals.iter().enumerate() {
                println!("  literal {index}: {literal}");
            }
            let mut decoder = Decoder::new(&method.bytecode);
            loop {
                let at = decoder.offset();
                let Some(instruction) = decoder.decode_next() else {
                    break;
                };
                println!("  {at:>3}: {instruction}");
            }
        }
    }
}

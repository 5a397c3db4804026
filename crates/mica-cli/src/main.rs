mod debugger;

use std::fs;

use owo_colors::OwoColorize;

use mica_compiler::Compiler;
use mica_lexer::Lexer;
use mica_parser::Parser;
use mica_syntax::error::Error;
use mica_vm::Vm;

fn render_error(kind: &str, source: &str, err: &Error) {
    eprintln!("{}: {}", kind.red().bold(), err.msg.red());
    if let (Some(line), Some(col)) = (err.line, err.col) {
        eprintln!("  --> line {}, column {}", line, col);
        if let Some(src_line) = source.lines().nth(line - 1) {
            let line_num_str = format!("{:3} | ", line);
            eprintln!("     |");
            eprintln!("{}{}", line_num_str.bright_black(), src_line);

            let mut marker = String::new();
            marker.push_str(&" ".repeat(line_num_str.len()));
            if col > 1 {
                marker.push_str(&" ".repeat(col - 1));
            }
            marker.push('^');
            eprintln!("{}{}", marker.red(), " error here".red());
            eprintln!("     |");
        }
    }

    // Add helpful suggestions based on common errors
    if err.msg.contains("Undefined variable") {
        eprintln!(
            "{}",
            "Help: Did you forget to declare it with 'int name = value;'?".yellow()
        );
    } else if err.msg.contains("Unresolved call") {
        eprintln!(
            "{}",
            "Help: Check if the function name is spelled correctly or if it's defined.".yellow()
        );
    } else if err.msg.contains("division by zero") {
        eprintln!(
            "{}",
            "Help: Check if the divisor can be zero before dividing.".yellow()
        );
    } else if err.msg.contains("already declared") {
        eprintln!(
            "{}",
            "Help: A name can be declared once per scope; inner blocks may shadow it.".yellow()
        );
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: mica <file.mica> [--debug]");
        std::process::exit(1);
    }

    let path = &args[1];
    let debug_mode = args.iter().skip(2).any(|a| a == "--debug");

    let src = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!(
                "{}: {}",
                "error".red().bold(),
                format!("Failed to read {}: {}", path, e).red()
            );
            std::process::exit(1);
        }
    };

    let mut lexer = Lexer::new(&src);
    let tokens = match lexer.tokenize() {
        Ok(t) => t,
        Err(e) => {
            render_error("Lex error", &src, &e);
            std::process::exit(1);
        }
    };

    let mut parser = Parser::new(tokens);
    let program = match parser.parse_program() {
        Ok(p) => p,
        Err(e) => {
            render_error("Parse error", &src, &e);
            std::process::exit(1);
        }
    };

    let mut compiler = Compiler::new();
    let code = match compiler.compile(&program) {
        Ok(c) => c,
        Err(e) => {
            render_error("Compile error", &src, &e);
            std::process::exit(1);
        }
    };

    let mut vm = Vm::new();
    vm.load_program(code);

    if debug_mode {
        debugger::start(&mut vm);
    } else if let Err(e) = vm.run() {
        render_error("VM error", &src, &e);
        std::process::exit(1);
    }
}

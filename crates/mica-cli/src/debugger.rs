//! Interactive single-step front end for the VM.
//!
//! Drives only the documented VM surface: `step`, `run`, `set_step_mode` and
//! the state dump. With step mode on, `continue` pauses after every
//! instruction for an ENTER acknowledgment.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use mica_vm::Vm;

pub fn start(vm: &mut Vm) {
    vm.set_step_mode(true);
    print_help();

    let mut line = String::new();
    loop {
        print!("\n{} ", "(mica-db)".cyan());
        let _ = io::stdout().flush();

        line.clear();
        let n = match io::stdin().read_line(&mut line) {
            Ok(n) => n,
            Err(_) => break,
        };
        if n == 0 {
            // EOF
            println!();
            break;
        }
        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }

        match cmd {
            "s" | "step" => {
                if let Err(e) = vm.step() {
                    report_fault(&e);
                }
            }
            "c" | "continue" => {
                if let Err(e) = vm.run() {
                    report_fault(&e);
                }
            }
            "r" | "regs" => println!("{}", vm.state_dump()),
            "stack" => print_stack(vm),
            "q" | "quit" => break,
            "h" | "help" => print_help(),
            _ => println!("Unknown command. Type 'help' for commands."),
        }
    }
}

fn print_help() {
    println!("\n{}", "=== Mica Debugger Commands ===".bold());
    println!("step (s)     - Execute one instruction");
    println!("continue (c) - Run until halt");
    println!("regs (r)     - Show CPU state");
    println!("stack        - Show stack contents");
    println!("quit (q)     - Exit debugger");
    println!("help (h)     - Show this help");
}

fn print_stack(vm: &Vm) {
    let values = vm
        .stack()
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!("Stack: [{}]", values);
}

fn report_fault(err: &mica_syntax::error::Error) {
    eprintln!("{}: {}", "VM error".red().bold(), err.msg.red());
}

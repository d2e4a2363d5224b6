use minilisp::Interpreter;
use minilisp::ast::Value;
use minilisp::evaluator::Environment;
use minilisp::reader::ParseConfig;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

fn main() {
    init_tracing();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Log to stderr only when `RUST_LOG` is set, e.g. `RUST_LOG=minilisp=trace`.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn run_repl() {
    println!("minilisp");
    println!("Enter S-expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize line editor: {err}");
            return;
        }
    };
    let interpreter = Interpreter::with_config(ParseConfig {
        handle_comments: true,
    });

    loop {
        match rl.readline("lisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(interpreter.env());
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match interpreter.read(line) {
                    Ok(exprs) => {
                        for expr in &exprs {
                            match interpreter.eval(expr) {
                                Ok(value) => println!("{value}"),
                                Err(e) => {
                                    println!("Error: {e}");
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => println!("Error: {e}"),
                }

                interpreter.collect_garbage(&[]);
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("minilisp commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Special forms: quote, if, define, lambda");
    println!("Numbers are floating point; 0 is false, everything else is true.");
    println!("Comments start with ';' and run to the end of the line.");
    println!();
    println!("Examples:");
    println!("  (+ 1 2 3)");
    println!("  (define square (lambda (n) (* n n)))");
    println!("  (square 12)");
    println!("  (car (cons 1 (list 2 3)))");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate primitives from user definitions
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::NativeProcedure { .. } => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Primitive procedures ({}):", builtins.len());
        let mut col = 0;
        for name in builtins {
            print!("  {name:<12}");
            col += 1;
            if col % 5 == 0 {
                println!();
            }
        }
        if col % 5 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}

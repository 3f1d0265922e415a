use bebop::Engine;
use bebop::ast::Value;
use bebop::evaluator::Environment;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .init();

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

fn run_repl() {
    println!("Bebop document Lisp");
    println!("Enter expressions like: (+ 1 2) or (map [1 2 3] (\\ [x] [* x x]))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let engine = match Engine::new() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Could not load the prelude: {e}");
            process::exit(1);
        }
    };
    let mut render_mode = false;

    loop {
        match rl.readline("bebop> ") {
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
                        print_environment(engine.env());
                        continue;
                    }
                    ":render" => {
                        render_mode = !render_mode;
                        if render_mode {
                            println!("Render mode enabled: input is rendered as document text");
                        } else {
                            println!("Render mode disabled: each result is shown as a value");
                        }
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                if render_mode {
                    match engine.render(line) {
                        Ok(text) => println!("{text}"),
                        Err(e) => println!("Error: {e}"),
                    }
                    continue;
                }

                match engine.eval_source(line) {
                    Ok(values) => {
                        // nil (e.g. from def) is not echoed
                        for value in values.iter().filter(|v| !v.is_nil()) {
                            println!("{value}");
                        }
                    }
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
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
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :render    - Toggle document rendering of each input line");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Language:");
    println!("  Numbers: 42, -2.5     Strings: \"text\"     nil: []");
    println!("  Q-expressions are data: [1 2 3], [+ 1 2]");
    println!("  Definitions: (def [x] 10), (fun [square n] [* n n])");
    println!("  Lambdas: (\\ [a b] [+ a b]), partial application: ((\\ [a b] [+ a b]) 1)");
    println!("  Conditionals: (if (> x 5) [\"big\"] [\"small\"])");
    println!();
    println!("Examples:");
    println!("  (fac 5)");
    println!("  (filter (list 1 2 3 4) (\\ [x] [== (% x 2) 0]))");
    println!("  (h1 (concat \"Hello \" (echo (gcd 12 18))))");
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

    let mut builtins = Vec::new();
    let mut functions = Vec::new();
    let mut values = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::BuiltinFunction { .. } => builtins.push(name),
            Value::Lambda(_) => functions.push(name),
            _ => values.push((name, value)),
        }
    }

    for (title, names) in [("Primitives", builtins), ("Functions", functions)] {
        if names.is_empty() {
            continue;
        }
        println!("{title} ({}):", names.len());
        let mut col = 0;
        for name in names {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !values.is_empty() {
        println!("Values ({}):", values.len());
        for (name, value) in values {
            println!("  {name} = {value}");
        }
    }
}

//! # Gopa
//!
//! This binary is the interpreter for Gopa. It combines the lexer, parser,
//! and tree-walking evaluator into a single `run`/`repl`/`test` application.

mod cli;

use cli::*;

use std::io::{self, Write};
use std::path::Path;

use gopa::error::GopaError;
use gopa::interpreter::Interpreter;
use gopa::lexer::Lexer;
use gopa::parser;
use gopa::permissions::Permissions;
use gopa::scheduler::Scheduler;

fn main() {
    let args = Cli::init();
    simple_logger::init_with_level((&args.verbosity).into()).unwrap();

    let code = match args.command {
        Commands::Run(run_args) => run_file(run_args),
        Commands::Repl(repl_args) => run_repl(repl_args),
        Commands::Test => run_tests(),
    };
    std::process::exit(code);
}

fn run_file(args: RunArgs) -> i32 {
    let source = match std::fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: file not found: {} ({e})", args.file.display());
            return 1;
        }
    };

    let program = match Lexer::tokenize(&source).and_then(parser::parse) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let permissions = Permissions::parse(&args.perm);
    let stdout = io::stdout();
    let stderr = io::stderr();
    let stdin = io::stdin();
    let mut out = stdout.lock();
    let mut err_out = stderr.lock();
    let mut input = stdin.lock();

    let mut interpreter = match Interpreter::new(
        permissions,
        Scheduler::new(false),
        &mut out,
        &mut err_out,
        &mut input,
        args.debug,
    ) {
        Ok(interpreter) => interpreter,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    if let Err(e) = interpreter.run(&program) {
        eprintln!("Runtime error: {e}");
        return 1;
    }

    if args.forever {
        log::info!("entering --forever mode; pumping the scheduler once a second");
        loop {
            std::thread::sleep(std::time::Duration::from_secs(1));
            interpreter.pump_scheduler(1.0);
        }
    }

    0
}

fn run_repl(args: ReplArgs) -> i32 {
    println!("Gopa v0.2 REPL");
    println!("Type 'exit' to quit");
    println!();

    let permissions = Permissions::parse(&args.perm);
    let stdout = io::stdout();
    let stderr = io::stderr();
    let stdin = io::stdin();
    let mut out = stdout.lock();
    let mut err_out = stderr.lock();
    let mut input = stdin.lock();

    let mut interpreter = match Interpreter::new(
        permissions,
        Scheduler::new(false),
        &mut out,
        &mut err_out,
        &mut input,
        args.debug,
    ) {
        Ok(interpreter) => interpreter,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let mut buffer: Vec<String> = Vec::new();
    loop {
        let prompt = if buffer.is_empty() { "gopa> " } else { "... " };
        print!("{prompt}");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match interpreter.read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(_) => break,
        }
        let line = line.trim_end_matches(['\n', '\r']);
        if buffer.is_empty() && line.trim() == "exit" {
            break;
        }
        buffer.push(line.to_string());

        let source = buffer.join("\n");
        match Lexer::tokenize(&source).and_then(parser::parse) {
            Ok(program) => {
                // `run` already catches and prints non-debug runtime errors
                // per top-level statement; a `debug` error here ends the
                // session, matching a bare Python traceback aborting the REPL.
                if interpreter.run(&program).is_err() {
                    return 1;
                }
                buffer.clear();
            }
            // An incomplete statement (e.g. an unterminated `if`/`end` block)
            // looks like a lex/parse error; keep buffering instead of
            // reporting it, so multi-line input works.
            Err(GopaError::Lex { .. }) | Err(GopaError::Parse { .. }) => continue,
            Err(e) => {
                eprintln!("Error: {e}");
                buffer.clear();
            }
        }
    }

    0
}

/// Runs every `tests/cases/*.gopa` fixture against its `tests/expected/*.txt`
/// counterpart with every capability granted and virtual time enabled, so
/// `wait`/`after`/`every` fixtures settle deterministically.
fn run_tests() -> i32 {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let cases_dir = Path::new(manifest_dir).join("tests").join("cases");
    let expected_dir = Path::new(manifest_dir).join("tests").join("expected");

    if !cases_dir.exists() {
        eprintln!("Error: tests/cases directory not found");
        return 1;
    }

    let mut cases: Vec<_> = match std::fs::read_dir(&cases_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|e| e.to_str()) == Some("gopa"))
            .map(|e| e.path())
            .collect(),
        Err(e) => {
            eprintln!("Error: failed to read tests/cases: {e}");
            return 1;
        }
    };
    cases.sort();

    let mut passed = 0;
    let mut failed = 0;

    for case in cases {
        let name = case.file_stem().unwrap().to_string_lossy().to_string();
        print!("Running {name}... ");
        let _ = io::stdout().flush();

        let outcome = run_one_test(&case);
        match outcome {
            Ok(actual) => {
                let expected_path = expected_dir.join(format!("{name}.txt"));
                let result = if let Ok(expected) = std::fs::read_to_string(&expected_path) {
                    if name.to_lowercase().contains("random") {
                        !actual.is_empty()
                    } else {
                        actual.trim() == expected.trim()
                    }
                } else {
                    true
                };
                if result {
                    println!("PASS");
                    passed += 1;
                } else {
                    println!("FAIL");
                    println!("  Expected:\n{}", std::fs::read_to_string(&expected_path).unwrap_or_default());
                    println!("  Got:\n{actual}");
                    failed += 1;
                }
            }
            Err(e) => {
                println!("FAIL: {e}");
                failed += 1;
            }
        }
    }

    println!();
    println!("Tests: {passed} passed, {failed} failed");
    if failed == 0 {
        0
    } else {
        1
    }
}

fn run_one_test(path: &Path) -> Result<String, GopaError> {
    let source = std::fs::read_to_string(path).map_err(|e| GopaError::File {
        message: format!("failed to read {}: {e}", path.display()),
    })?;
    let program = Lexer::tokenize(&source).and_then(parser::parse)?;

    let mut out = Vec::new();
    let mut err_out = Vec::new();
    let mut input = io::Cursor::new(Vec::new());
    let mut interpreter = Interpreter::new(
        Permissions::all(),
        Scheduler::new(true),
        &mut out,
        &mut err_out,
        &mut input,
        false,
    )?;
    interpreter.run(&program)?;
    for _ in 0..10 {
        interpreter.pump_scheduler(0.1);
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

use std::{
    env, fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use pug::{
    codegen::{self, CodeGenerator},
    control_flow::ControlFlowAnalyzer,
    environment::{Env, Environment},
    evaluator,
    object::Object,
    parser,
    type_checker::TypeChecker,
};

const PROMPT: &str = "pug> ";

const USAGE: &str = "\
usage: pug [run] <file>
       pug build <file> [<out.s>]
       pug check <file>
       pug [repl]";

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("parser errors:{}", indented(.0))]
    Parse(Vec<parser::Error>),
    #[error("{}", Object::Error(.0.clone()))]
    Runtime(String),
    #[error("code generation failed: {0}")]
    Codegen(#[from] codegen::Error),
    #[error("found {0} problem(s)")]
    Check(usize),
    #[error("{}", USAGE)]
    Usage,
}

fn indented<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(|item| format!("\n  {item}")).collect()
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

/// Installs a subscriber only when `RUST_LOG` is set.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn run() -> Result<(), Error> {
    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        [] | ["repl" | "--repl"] => repl(),
        ["run", file] => run_file(Path::new(file)),
        ["build", file] => build(Path::new(file), None),
        ["build", file, out] => build(Path::new(file), Some(PathBuf::from(out))),
        ["check", file] => check(Path::new(file)),
        [file] if !file.starts_with('-') => run_file(Path::new(file)),
        _ => Err(Error::Usage),
    }
}

fn parse(src: &str) -> Result<pug::ast::Program, Error> {
    parser::parse_program(src).map_err(|(_, errors)| Error::Parse(errors))
}

fn run_file(path: &Path) -> Result<(), Error> {
    let src = fs::read_to_string(path)?;
    let program = parse(&src)?;
    match evaluator::eval_program(&program, &Environment::new()) {
        Object::Error(message) => Err(Error::Runtime(message)),
        Object::Null => Ok(()),
        result => {
            println!("=> {result}");
            Ok(())
        }
    }
}

fn build(path: &Path, out: Option<PathBuf>) -> Result<(), Error> {
    let src = fs::read_to_string(path)?;
    let program = parse(&src)?;
    let asm = CodeGenerator::new().generate(&program)?;
    let out = out.unwrap_or_else(|| path.with_extension("s"));
    fs::write(&out, asm)?;
    println!("wrote {}", out.display());
    Ok(())
}

fn check(path: &Path) -> Result<(), Error> {
    let src = fs::read_to_string(path)?;
    let program = parse(&src)?;

    let (ty, mut problems) = TypeChecker::new().check_program(&program);
    problems.extend(ControlFlowAnalyzer::new().analyze(&program.statements));

    println!("type: {ty}");
    if problems.is_empty() {
        return Ok(());
    }
    println!("problems:{}", indented(&problems));
    Err(Error::Check(problems.len()))
}

fn repl() -> Result<(), Error> {
    let env = Environment::new();
    let mut history = Vec::new();
    let mut stdout = io::stdout();

    println!("pug REPL");
    println!("Type ':help' for help, ':history' for command history, ':exit' to quit");

    let mut lines = io::stdin().lock().lines();
    loop {
        print!("{PROMPT}");
        stdout.flush()?;

        let Some(line) = lines.next().transpose()? else {
            println!();
            return Ok(());
        };
        let line = line.trim();

        match line {
            "" => {}
            ":exit" | ":quit" | ":q" => return Ok(()),
            ":help" | ":h" => print_help(),
            ":history" => {
                for (i, entry) in history.iter().enumerate() {
                    println!("  {}: {entry}", i + 1);
                }
            }
            command if command.starts_with(':') => {
                println!("unknown command: {command} (try ':help')");
            }
            _ => {
                history.push(line.to_owned());
                eval_line(line, &env);
            }
        }
    }
}

fn eval_line(line: &str, env: &Env) {
    match parse(line) {
        Ok(program) => match evaluator::eval_program(&program, env) {
            Object::Null => {}
            error @ Object::Error(_) => println!("{error}"),
            result => println!("=> {result}"),
        },
        Err(error) => println!("{error}"),
    }
}

fn print_help() {
    println!("commands:");
    println!("  :help, :h         show this help");
    println!("  :history          show the lines entered so far");
    println!("  :exit, :quit, :q  leave the REPL");
    println!();
    println!("examples:");
    println!("  let add = fn(a, b) {{ a + b }};");
    println!("  add(1, 2)");
    println!("  puts(\"hello\")");
}

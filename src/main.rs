use clap::Parser;
use dirs::home_dir;
use log::{debug, info};
use nu_ansi_term::{Color, Style};
use reedline::{DefaultHinter, FileBackedHistory, Reedline, Signal};
use std::{fs, path::PathBuf, process::ExitCode};
use tinybasic::{
    cli::{exit_status, Args, Commands},
    error::Result,
    extensions::ResultExtensions,
    io::{StdinInput, StdoutOutput},
    parser::{parse, render},
    repl::{Command, Entry, ProgramBuffer, REPLPrompt, SyntaxHighlighter},
    runtime::Interpreter,
    tokenizer::tokenize,
};

fn run_file(
    file: PathBuf,
    end_message: Option<String>,
    dump_tokens: bool,
    dump_ast: bool,
) -> Result<()> {
    let source = fs::read_to_string(file)?;

    let tokens = tokenize(&source)?;
    if dump_tokens {
        for token in &tokens {
            println!("{}", token);
        }
    }

    let ast = parse(&tokens)?;
    if dump_ast {
        for line in &ast {
            println!("{:?}", line);
        }
    }

    let mut interpreter = Interpreter::new(&ast);
    if let Some(message) = end_message {
        interpreter = interpreter.with_end_message(message);
    }
    interpreter.run(&mut StdoutOutput, &mut StdinInput)
}

fn check_file(file: PathBuf) -> Result<()> {
    let source = fs::read_to_string(file)?;

    let tokens = tokenize(&source)?;
    for token in &tokens {
        println!("{}", token);
    }

    let ast = parse(&tokens)?;
    for line in &ast {
        println!("{:?}", line);
    }

    Ok(())
}

fn list_file(file: PathBuf) -> Result<()> {
    let source = fs::read_to_string(file)?;

    let tokens = tokenize(&source)?;
    let ast = parse(&tokens)?;
    print!("{}", render(&ast));

    Ok(())
}

fn run_command(buffer: &mut ProgramBuffer, command: Command) -> Result<()> {
    match command {
        Command::Run => {
            let program = buffer.program()?;
            Interpreter::new(&program).run(&mut StdoutOutput, &mut StdinInput)
        }
        Command::List => {
            print!("{}", buffer.listing()?);
            Ok(())
        }
        Command::New => {
            buffer.clear();
            Ok(())
        }
    }
}

fn run_repl() -> Result<()> {
    let mut line_editor = Reedline::create()
        .with_hinter(Box::new(
            DefaultHinter::default().with_style(Style::new().italic().fg(Color::LightGray)),
        ))
        .with_highlighter(Box::new(SyntaxHighlighter));

    // Add file-backed history if possible
    if let Some(history) = home_dir()
        .map(|home| home.join(".tinybasic_history"))
        .and_then(|path| FileBackedHistory::with_file(100, path).ok())
        .map(Box::new)
    {
        line_editor = line_editor.with_history(history);
    } else {
        eprintln!("NOTE: Failed to load history. Persistence is now disabled.")
    }

    let prompt = REPLPrompt;
    let mut buffer = ProgramBuffer::new();

    loop {
        match line_editor.read_line(&prompt)? {
            Signal::Success(input) => {
                Result::pure(())
                    .and_then(|_| buffer.enter(&input))
                    .and_then(|entry| match entry {
                        Entry::Command(command) => run_command(&mut buffer, command),
                        Entry::Stored(number) | Entry::Deleted(number) => {
                            debug!("line {} updated", number);
                            Ok(())
                        }
                        Entry::Empty => Ok(()),
                    })
                    .inspect_err(|err| {
                        eprintln!("{}", err);
                    })
                    .ok();
            }
            Signal::CtrlD | Signal::CtrlC => {
                break Ok(());
            }
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = match args.command {
        Commands::Run {
            file,
            end_message,
            tokens,
            ast,
        } => {
            info!("FILE MODE");
            debug!("file: {:?}", file);

            run_file(file, end_message, tokens, ast)
        }
        Commands::Check { file } => {
            info!("CHECK MODE");
            debug!("file: {:?}", file);

            check_file(file)
        }
        Commands::List { file } => {
            info!("LIST MODE");
            debug!("file: {:?}", file);

            list_file(file)
        }
        Commands::Repl => {
            info!("REPL MODE");

            run_repl()
        }
    };

    let status = exit_status(
        &result.inspect_err(|err| {
            eprintln!("{}", err);
        }),
    );
    ExitCode::from(status)
}

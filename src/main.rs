use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use jobsim::Shell;
use jobsim::config::{Invocation, ShellConfig, USAGE};
use jobsim::shell::Flow;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = match ShellConfig::from_env() {
        Ok(Invocation::Run(config)) => config,
        Ok(Invocation::Help) => {
            println!("usage: {USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!("usage: {USAGE}");
            return ExitCode::from(2);
        }
    };

    let mut shell = match Shell::new(config) {
        Ok(shell) => shell,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    match repl(&mut shell) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn repl(shell: &mut Shell) -> io::Result<()> {
    println!("jobsim shell. Type 'help' for commands.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let mut stdout = io::stdout();
        write!(stdout, "{}", shell.config().prompt)?;
        stdout.flush()?;

        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };
        let line = line?;
        if shell.execute(&line, &mut stdout, &mut io::stderr())? == Flow::Exit {
            println!("bye");
            return Ok(());
        }
    }
}

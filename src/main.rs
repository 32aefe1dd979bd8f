use anyhow::Context;
use procsim::sim::{
    Command, Flow, Kernel, Launcher, OsLauncher, ParseError, SessionConfig, Shell,
    SimulatedLauncher,
};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = SessionConfig::from_env().context("invalid PROCSIM_* setting")?;
    match std::env::var("PROCSIM_LAUNCHER").as_deref() {
        Ok("simulated") => repl(Kernel::new(config, SimulatedLauncher::default())?),
        _ => repl(Kernel::new(config, OsLauncher::new())?),
    }
}

fn repl<L: Launcher>(kernel: Kernel<L>) -> anyhow::Result<()> {
    let shell = Shell::new(kernel);
    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    let mut line = String::new();

    loop {
        write!(out, "myshell> ")?;
        out.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            writeln!(out)?;
            break;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(ParseError::Empty) => continue,
            Err(e) => {
                writeln!(out, "{e}")?;
                continue;
            }
        };
        if shell.execute(command, &mut out)? == Flow::Exit {
            break;
        }
    }

    writeln!(out, "Exiting shell...")?;
    Ok(())
}

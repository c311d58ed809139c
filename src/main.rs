//! execmux CLI entry point
//!
//! Usage:
//!   execmux run <command>...        Run one command and wait for it
//!   execmux run --ssh HOST <cmd>    Run it on another host
//!   execmux many <line> <line>...   Run shell lines concurrently
//!   execmux config                  Show configuration

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use execmux::cli::{
    commands::{ConfigArgs, ManyArgs, OutputFormat, RunArgs},
    init_logging, Cli, Commands,
};
use execmux::config::{find_config_files, load_config, Config};
use execmux::error::{ErrorInfo, ExecError};
use execmux::executor::{wait_async, wait_for_many_async, wait_for_many_async_with, ExecResult};
use execmux::runner::{CommandSpec, ExecOptions, Launch, Runner};

/// How long a killed process gets to exit before we stop waiting for it
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_level, cli.verbose) {
        eprintln!("{}: {:#}", "warning".yellow().bold(), e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => run_command(args, &config, cli.verbose).await,
        Commands::Many(args) => run_many(args, &config).await,
        Commands::Config(args) => {
            show_config(args, &config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run one command, locally or through ssh
async fn run_command(args: RunArgs, config: &Config, verbose: bool) -> Result<ExitCode> {
    let mut runner = config.runner();
    if let Some(timeout) = args.timeout() {
        runner = runner.with_default_timeout(timeout);
    }

    let mut options = config.execution.exec_options();
    options.shell = options.shell && !args.no_shell;
    options.assert_success = args.assert_success;
    options.stdin = args.stdin.as_ref().map(|s| s.as_bytes().to_vec());
    options.env = args.env_as_map();
    options.working_dir = args.dir.clone();

    let command = args.command_spec();

    let outcome = match args.ssh {
        Some(ref host) => {
            let remote = runner
                .through_ssh(host.as_str())
                .with_ssh_command(config.remote.ssh_command.as_str());
            execute(&remote, command, &options, verbose).await
        }
        None => execute(&runner, command, &options, verbose).await,
    };

    match outcome {
        Ok(result) => {
            print_result(&result, args.format)?;
            Ok(exit_code_of(result.exit_code()))
        }
        Err(e) => report_failure(e, args.format).await,
    }
}

async fn execute<L: Launch>(
    runner: &Runner<L>,
    command: CommandSpec,
    options: &ExecOptions,
    verbose: bool,
) -> execmux::ExecOutcome<ExecResult> {
    if verbose {
        eprintln!("{}: {} via {}", "running".cyan(), command, runner.launcher().name());
    }
    runner.execute_tokio(command, options).await
}

/// Print an error the way the output format asks, killing a timed-out process
async fn report_failure(mut error: ExecError, format: OutputFormat) -> Result<ExitCode> {
    let info = ErrorInfo::from(&error);

    if let ExecError::Timeout(ref mut timed_out) = error {
        if let Some(result) = timed_out.take_result() {
            kill_and_reap(result).await;
        }
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(error
                .exit_code()
                .map(|code| exit_code_of(Some(code)))
                .unwrap_or(ExitCode::FAILURE))
        }
        OutputFormat::Text => Err(error.into()),
    }
}

async fn kill_and_reap(mut result: ExecResult) {
    if let Err(e) = result.kill() {
        tracing::warn!("Failed to kill {}: {}", result, e);
        return;
    }
    if let Err(e) = wait_async(result, Some(REAP_TIMEOUT)).await {
        tracing::warn!("Killed process did not exit: {}", e);
    }
}

fn print_result(result: &ExecResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result_json(result, true))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            std::io::stdout()
                .write_all(result.stdout())
                .context("Failed to write stdout")?;
            std::io::stderr()
                .write_all(result.stderr())
                .context("Failed to write stderr")?;
        }
    }
    Ok(())
}

fn result_json(result: &ExecResult, finished: bool) -> serde_json::Value {
    serde_json::json!({
        "command": result.command(),
        "pid": result.pid(),
        "finished": finished,
        "exit_code": result.exit_code(),
        "stdout": String::from_utf8_lossy(result.stdout()),
        "stderr": String::from_utf8_lossy(result.stderr()),
    })
}

/// Run shell lines concurrently; the ones still running at the deadline are
/// killed.
async fn run_many(args: ManyArgs, config: &Config) -> Result<ExitCode> {
    let runner = config.runner();
    let options = config.execution.exec_options();
    let timeout = args.timeout().unwrap_or_else(|| config.execution.timeout());

    let results = args
        .commands
        .iter()
        .map(|line| runner.execute_async(line.as_str(), &options))
        .collect::<Result<Vec<_>, _>>()?;

    let (mut results, finished) =
        wait_for_many_async_with(*runner.waiter(), results, timeout).await?;

    let mut killed = Vec::new();
    for (result, done) in results.iter_mut().zip(&finished) {
        if !done {
            result.kill()?;
            killed.push(result.pid());
        }
    }
    if !killed.is_empty() {
        tracing::debug!(?killed, "Killed unfinished commands");
        results = wait_for_many_async(results, Some(REAP_TIMEOUT)).await?.0;
    }

    let all_ok = results
        .iter()
        .zip(&finished)
        .all(|(result, done)| *done && result.exit_code() == Some(0));

    match args.format {
        OutputFormat::Json => {
            let entries = results
                .iter()
                .zip(&finished)
                .map(|(result, done)| result_json(result, *done))
                .collect::<Vec<_>>();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            for (result, done) in results.iter().zip(&finished) {
                let status = match (*done, result.exit_code()) {
                    (false, _) => "timed out".yellow(),
                    (true, Some(0)) => "exit 0".green(),
                    (true, code) => format!("exit {}", code.unwrap_or(-1)).as_str().red(),
                };
                println!("{} {}", result, status);
                std::io::stdout().write_all(result.stdout())?;
                std::io::stderr().write_all(result.stderr())?;
            }
        }
    }

    Ok(if all_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Show resolved configuration
fn show_config(args: ConfigArgs, config: &Config) -> Result<()> {
    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Text => {
            println!("{}:", "Execution".cyan());
            println!("  timeout: {}", config.execution.timeout);
            println!(
                "  sample_interval_ms: {}",
                config.execution.sample_interval_ms
            );
            println!("  shell: {}", config.execution.shell);
            println!("  close_other_fds: {}", config.execution.close_other_fds);
            println!();
            println!("{}:", "Remote".cyan());
            println!("  ssh_command: {}", config.remote.ssh_command);
            println!();
            println!("{}:", "Files Found".cyan());
            let files = find_config_files();
            if files.is_empty() {
                println!("  None");
            }
            for file in files {
                println!("  - {}", file.display());
            }
        }
    }
    Ok(())
}

/// Exit status mirroring the child's exit code where it fits
fn exit_code_of(code: Option<i32>) -> ExitCode {
    code.and_then(|code| u8::try_from(code).ok())
        .map(ExitCode::from)
        .unwrap_or(ExitCode::FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mirrors_child() {
        assert_eq!(exit_code_of(Some(0)), ExitCode::SUCCESS);
        assert_eq!(exit_code_of(Some(3)), ExitCode::from(3));
    }

    #[test]
    fn test_exit_code_out_of_range_is_failure() {
        assert_eq!(exit_code_of(Some(-15)), ExitCode::FAILURE);
        assert_eq!(exit_code_of(Some(300)), ExitCode::FAILURE);
        assert_eq!(exit_code_of(None), ExitCode::FAILURE);
    }
}

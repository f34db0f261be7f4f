use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{debug, info, warn};

use batchexec::cli::{Cli, Command};
use batchexec::clock::SystemClock;
use batchexec::config::ExecConfig;
use batchexec::console::{self, CommandRegistry};
use batchexec::exec::ExecSession;
use batchexec::executor::RunOutcome;
use batchexec::host::{Host, Notice, StdoutHost, TmuxHost};
use batchexec::log::ExecutionLog;
use batchexec::pacer::Pacer;
use batchexec::paths;
use batchexec::script::ExecError;
use batchexec::shell_completion;

fn config_source_label(config_path: Option<&Path>) -> String {
    config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults, no config.toml found)".to_string())
}

fn push_kv(output: &mut String, key: &str, value: impl std::fmt::Display) {
    output.push_str(&format!("  {key:<22} {value}\n"));
}

fn render_config_human(config: &ExecConfig, root: &Path, config_path: Option<&Path>) -> String {
    let mut output = String::new();
    output.push_str("Delays\n");
    push_kv(&mut output, "spawn", format!("{}s", config.delays.spawn_secs));
    push_kv(&mut output, "data", format!("{}s", config.delays.data_secs));
    push_kv(
        &mut output,
        "default",
        if config.delays.default_secs == 0.0 {
            "0s (yield one step)".to_string()
        } else {
            format!("{}s", config.delays.default_secs)
        },
    );
    output.push('\n');

    output.push_str("Scripts\n");
    for (idx, dir) in config.locator(root).search_dirs().iter().enumerate() {
        push_kv(&mut output, &format!("search[{idx}]"), dir.display());
    }
    push_kv(&mut output, "extension", &config.scripts.extension);
    output.push('\n');

    output.push_str("Host\n");
    push_kv(
        &mut output,
        "target",
        config.host.target.as_deref().unwrap_or("(none)"),
    );
    push_kv(
        &mut output,
        "poll_interval",
        format!("{}ms", config.host.poll_interval_millis),
    );
    output.push('\n');

    output.push_str("Log\n");
    push_kv(
        &mut output,
        "execution_log",
        config
            .execution_log_path(root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(disabled)".to_string()),
    );
    output.push('\n');

    output.push_str("Source Path\n");
    push_kv(&mut output, "path", config_source_label(config_path));

    output
}

fn render_config_json(config: &ExecConfig, root: &Path, config_path: Option<&Path>) -> Result<String> {
    let payload = serde_json::json!({
        "root": root.display().to_string(),
        "delays": &config.delays,
        "scripts": {
            "subdir": &config.scripts.subdir,
            "extension": &config.scripts.extension,
            "search_dirs": config
                .locator(root)
                .search_dirs()
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>(),
        },
        "host": &config.host,
        "log": {
            "execution_log": config
                .execution_log_path(root)
                .map(|p| p.display().to_string()),
        },
        "source_path": config_source_label(config_path),
    });

    serde_json::to_string_pretty(&payload).context("failed to serialize config to JSON")
}

fn build_session(config: &ExecConfig, root: &Path) -> Result<ExecSession> {
    let pacer = Pacer::new(config.delays()?);
    let clock = Arc::new(SystemClock::new(config.poll_interval()));
    let mut session = ExecSession::new(config.locator(root), pacer, clock);

    // Never create a config root just to hold the log.
    if !root.is_dir() {
        debug!(root = %root.display(), "config root missing, execution log skipped");
    } else if let Some(log_path) = config.execution_log_path(root) {
        match ExecutionLog::new(&log_path) {
            Ok(log) => {
                info!(log = %log_path.display(), "execution log enabled");
                session = session.with_log(Arc::new(log));
            }
            Err(e) => warn!(error = %format!("{e:#}"), "execution log disabled"),
        }
    }
    Ok(session)
}

fn connect_host(config: &ExecConfig, target: Option<String>, dry_run: bool) -> Result<Arc<dyn Host>> {
    if dry_run {
        return Ok(Arc::new(StdoutHost));
    }
    let Some(target) = target.or_else(|| config.host.target.clone()) else {
        bail!("no host target: pass --target <pane>, set host.target in config.toml, or use --dry-run");
    };
    let host = TmuxHost::connect(&target)?;
    info!(target = %host.target(), "connected to tmux host");
    Ok(Arc::new(host))
}

fn run_exec(session: &ExecSession, host: Arc<dyn Host>, file: &str) -> Result<()> {
    let script = match session.prepare(file) {
        Ok(script) => script,
        Err(ExecError::NotFound { name }) => {
            host.notify(&Notice::NotFound { name: name.clone() });
            return Err(ExecError::NotFound { name }.into());
        }
        Err(err @ ExecError::Load { .. }) => {
            host.notify(&Notice::LoadFailed {
                name: file.to_string(),
                reason: err.to_string(),
            });
            return Err(err.into());
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    ctrlc::set_handler(move || {
        stop_clone.store(true, Ordering::Relaxed);
    })
    .ok(); // fails only if a handler is already installed

    let outcome = session.launch(script, host, Some(stop))?.join()?;
    match outcome {
        RunOutcome::Completed(summary) => {
            info!(
                submitted = summary.submitted,
                echoed = summary.echoed,
                "exec finished"
            );
            Ok(())
        }
        RunOutcome::Abandoned { reason, summary } => {
            bail!(
                "batch abandoned after {} line(s): {}",
                summary.processed(),
                reason.describe()
            )
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let is_read_only = matches!(
        &cli.command,
        Command::Config { .. } | Command::List | Command::Completions { .. }
    );

    let filter = match cli.verbose {
        0 if is_read_only => "batchexec=warn",
        0 => "batchexec=info",
        1 => "batchexec=debug",
        _ => "batchexec=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = match cli.root {
        Some(root) => root,
        None => {
            let cwd = std::env::current_dir()
                .context("failed to get current directory (was it deleted?)")?;
            paths::resolve_config_root(&cwd)
        }
    };
    let (config, config_path) = ExecConfig::load(&root)?;
    match config_path {
        Some(ref p) => info!("loaded config from {}", p.display()),
        None => info!(root = %root.display(), "no config.toml found, using defaults"),
    }

    match cli.command {
        Command::Exec {
            file,
            target,
            dry_run,
        } => {
            let session = build_session(&config, &root)?;
            let host = connect_host(&config, target, dry_run)?;
            run_exec(&session, host, &file)?;
        }
        Command::List => {
            for name in config.locator(&root).list_candidates() {
                println!("{name}");
            }
        }
        Command::Console { target, dry_run } => {
            let session = Arc::new(build_session(&config, &root)?);
            let host = connect_host(&config, target, dry_run)?;

            let mut registry = CommandRegistry::new();
            console::register_exec(&mut registry, session.clone());
            console::register_builtins(&mut registry, session.clone());

            println!("\x1b[36m[exec]\x1b[0m console ready, type 'help' for commands, 'quit' to leave");
            console::run_console(&registry, &host)?;
            if session.stop() {
                println!("\x1b[36m[exec]\x1b[0m active batch cancelled");
            }
        }
        Command::Config { json } => {
            if json {
                println!("{}", render_config_json(&config, &root, config_path.as_deref())?);
            } else {
                print!("{}", render_config_human(&config, &root, config_path.as_deref()));
            }
        }
        Command::Completions { shell } => {
            shell_completion::print(shell)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_config_lists_search_dirs_and_defaults() {
        let config = ExecConfig::default();
        let root = Path::new("/srv/.batchexec");
        let rendered = render_config_human(&config, root, None);
        assert!(rendered.contains("/srv/.batchexec/scripts"));
        assert!(rendered.contains("0.4s"));
        assert!(rendered.contains("(none)"));
        assert!(rendered.contains("(defaults, no config.toml found)"));
    }

    #[test]
    fn json_config_reports_disabled_log_as_null() {
        let mut config = ExecConfig::default();
        config.log.execution_log = false;
        let root = Path::new("/srv/.batchexec");
        let json = render_config_json(&config, root, Some(root.join("config.toml").as_path())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["log"]["execution_log"].is_null());
        assert_eq!(value["delays"]["spawn_secs"], 0.4);
        assert_eq!(value["scripts"]["search_dirs"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn session_does_not_create_missing_config_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join(".batchexec");

        build_session(&ExecConfig::default(), &root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn session_opens_log_under_existing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join(".batchexec");
        std::fs::create_dir_all(&root).unwrap();

        build_session(&ExecConfig::default(), &root).unwrap();
        assert!(root.join("logs").join("execution.jsonl").is_file());
    }

    #[test]
    fn dry_run_never_needs_a_target() {
        let config = ExecConfig::default();
        assert!(connect_host(&config, None, true).is_ok());
    }
}

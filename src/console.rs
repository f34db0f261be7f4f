//! Interactive console with named commands.
//!
//! Mirrors a host-style terminal: registered commands (`exec`, `stop`,
//! `delay`) are handled locally, anything else is forwarded to the host as a
//! raw command. Registration is idempotent: a name can only be taken once.

use std::collections::BTreeMap;
use std::io::{self, BufRead, IsTerminal};
use std::sync::Arc;

use anyhow::Result;
use dialoguer::{Completion, Input};
use tracing::debug;

use crate::config::parse_delay_secs;
use crate::exec::ExecSession;
use crate::host::Host;
use crate::script::DelayTier;

type Action = Box<dyn Fn(&[&str], &Arc<dyn Host>) + Send + Sync>;

/// Words the console loop handles itself; offered in completion only.
const LOOP_KEYWORDS: &[&str] = &["quit"];
type OptionsFetcher = Box<dyn Fn() -> Vec<String> + Send + Sync>;

pub struct ConsoleCommand {
    name: String,
    description: String,
    action: Action,
    options: Option<OptionsFetcher>,
}

impl ConsoleCommand {
    pub fn new(
        name: &str,
        description: &str,
        action: impl Fn(&[&str], &Arc<dyn Host>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            description: description.to_string(),
            action: Box::new(action),
            options: None,
        }
    }

    /// Attach an argument completion source.
    pub fn with_options(mut self, fetcher: impl Fn() -> Vec<String> + Send + Sync + 'static) -> Self {
        self.options = Some(Box::new(fetcher));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    Unknown,
    Empty,
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, ConsoleCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command. Returns `false`, leaving the registry unchanged, if the
    /// name is already taken.
    pub fn register(&mut self, command: ConsoleCommand) -> bool {
        if self.commands.contains_key(&command.name) {
            debug!(name = %command.name, "command already registered");
            return false;
        }
        self.commands.insert(command.name.clone(), command);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> impl Iterator<Item = &ConsoleCommand> {
        self.commands.values()
    }

    /// Run the command named by the first word of `line`, if registered.
    pub fn dispatch(&self, line: &str, host: &Arc<dyn Host>) -> Dispatch {
        let args: Vec<&str> = line.split_whitespace().collect();
        let Some(name) = args.first() else {
            return Dispatch::Empty;
        };
        match self.commands.get(&name.to_ascii_lowercase()) {
            Some(command) => {
                (command.action)(&args, host);
                Dispatch::Handled
            }
            None => Dispatch::Unknown,
        }
    }

    /// Fresh argument candidates for a command; never cached.
    pub fn options(&self, name: &str) -> Vec<String> {
        self.commands
            .get(&name.to_ascii_lowercase())
            .and_then(|command| command.options.as_ref())
            .map(|fetch| fetch())
            .unwrap_or_default()
    }

    /// Complete a partially typed line: the command name first, then its
    /// argument from the command's options.
    pub fn complete(&self, input: &str) -> Option<String> {
        match input.split_once(' ') {
            None => {
                let typed = input.to_ascii_lowercase();
                let names: Vec<&str> = self
                    .commands
                    .keys()
                    .map(String::as_str)
                    .chain(LOOP_KEYWORDS.iter().copied())
                    .filter(|name| name.starts_with(&typed))
                    .collect();
                match names.as_slice() {
                    [only] => Some(format!("{only} ")),
                    _ => extend_prefix(&typed, &names),
                }
            }
            Some((name, partial)) => {
                let options = self.options(name);
                let matches: Vec<&str> = options
                    .iter()
                    .map(String::as_str)
                    .filter(|option| option.starts_with(partial))
                    .collect();
                extend_prefix(partial, &matches).map(|done| format!("{name} {done}"))
            }
        }
    }
}

impl Completion for CommandRegistry {
    fn get(&self, input: &str) -> Option<String> {
        self.complete(input)
    }
}

fn extend_prefix(typed: &str, matches: &[&str]) -> Option<String> {
    match matches {
        [] => None,
        [only] => Some(only.to_string()),
        _ => {
            let prefix = longest_common_prefix(matches);
            (prefix.len() > typed.len()).then(|| prefix.to_string())
        }
    }
}

fn longest_common_prefix<'a>(words: &[&'a str]) -> &'a str {
    let Some((first, rest)) = words.split_first() else {
        return "";
    };
    let mut prefix: &str = first;
    for word in rest {
        let shared = prefix
            .char_indices()
            .zip(word.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((i, c), _)| i + c.len_utf8())
            .unwrap_or(0);
        prefix = &prefix[..shared];
    }
    prefix
}

/// Register `exec <file>` backed by `session`.
pub fn register_exec(registry: &mut CommandRegistry, session: Arc<ExecSession>) -> bool {
    let for_options = session.clone();
    registry.register(
        ConsoleCommand::new(
            "exec",
            "Executes commands from a script (include the extension)",
            move |args, host| session.exec(args, host),
        )
        .with_options(move || {
            for_options
                .locator()
                .list_candidates()
                .into_iter()
                .collect()
        }),
    )
}

/// Register `stop`, `delay` and `help` backed by `session`.
///
/// `help` lists the commands registered at this point, so call this after
/// `register_exec`.
pub fn register_builtins(registry: &mut CommandRegistry, session: Arc<ExecSession>) {
    let for_stop = session.clone();
    registry.register(ConsoleCommand::new(
        "stop",
        "Cancel the running batch",
        move |_, host| {
            if for_stop.stop() {
                host.print("[exec] stopping batch");
            } else {
                host.print("[exec] no batch is running");
            }
        },
    ));

    registry.register(
        ConsoleCommand::new(
            "delay",
            "Show or set a pacing delay: delay [spawn|data|default] [secs]",
            move |args, host| delay_command(&session, args, host),
        )
        .with_options(|| {
            ["spawn", "data", "default"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        }),
    );

    register_help(registry);
}

fn register_help(registry: &mut CommandRegistry) -> bool {
    const DESCRIPTION: &str = "Show this list";
    let mut listing: Vec<String> = registry
        .commands()
        .map(|command| format!("  {:<8} {}", command.name(), command.description()))
        .chain(std::iter::once(format!("  {:<8} {DESCRIPTION}", "help")))
        .collect();
    listing.sort();
    listing.push(format!("  {:<8} Leave the console (also: exit)", "quit"));

    registry.register(ConsoleCommand::new("help", DESCRIPTION, move |_, host| {
        for line in &listing {
            host.print(line);
        }
    }))
}

fn delay_command(session: &ExecSession, args: &[&str], host: &Arc<dyn Host>) {
    let pacer = session.pacer();
    let delays = pacer.delays();
    match args {
        [_] => {
            for tier in [DelayTier::Spawn, DelayTier::Data, DelayTier::Default] {
                host.print(&format!("{tier:<8} {:.3}s", delays.get(tier).as_secs_f64()));
            }
        }
        [_, tier] => match DelayTier::from_label(tier) {
            Some(tier) => host.print(&format!("{tier:<8} {:.3}s", delays.get(tier).as_secs_f64())),
            None => host.print(&format!("[exec] unknown delay tier '{tier}'")),
        },
        [_, tier, secs, ..] => {
            let Some(tier) = DelayTier::from_label(tier) else {
                host.print(&format!("[exec] unknown delay tier '{tier}'"));
                return;
            };
            let parsed = secs
                .parse::<f64>()
                .map_err(anyhow::Error::from)
                .and_then(parse_delay_secs);
            match parsed {
                Ok(delay) => {
                    pacer.set_delay(tier, delay);
                    host.print(&format!("{tier:<8} {:.3}s", delay.as_secs_f64()));
                }
                Err(e) => host.print(&format!("[exec] invalid delay '{secs}': {e}")),
            }
        }
        [] => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn handle_line(registry: &CommandRegistry, host: &Arc<dyn Host>, line: &str) -> Flow {
    let line = line.trim();
    if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
        return Flow::Quit;
    }

    if registry.dispatch(line, host) == Dispatch::Unknown {
        host.submit(line);
    }
    Flow::Continue
}

/// Read console lines until `quit`, `exit` or end of input.
///
/// On a terminal, input supports tab completion over the registry; otherwise
/// lines are read from stdin as-is.
pub fn run_console(registry: &CommandRegistry, host: &Arc<dyn Host>) -> Result<()> {
    if io::stdin().is_terminal() {
        loop {
            let line: String = Input::new()
                .with_prompt("exec")
                .allow_empty(true)
                .completion_with(registry)
                .interact_text()?;
            if handle_line(registry, host, &line) == Flow::Quit {
                break;
            }
        }
    } else {
        run_lines(registry, host, io::stdin().lock())?;
    }
    Ok(())
}

fn run_lines(registry: &CommandRegistry, host: &Arc<dyn Host>, input: impl BufRead) -> Result<()> {
    for line in input.lines() {
        if handle_line(registry, host, &line?) == Flow::Quit {
            break;
        }
    }
    Ok(())
}

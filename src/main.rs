use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::mpsc::{self, Receiver, SyncSender},
    thread,
};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xrx_monitors::{
    RandrClient, XrEventListener, XrMonitorAction, XrMonitorEvent,
    XrMonitorManager, XrMonitorManagerError, XrTopology, config::XrConfig,
};

const USAGE: &str = "commands: list | refresh | on <offline#> | off <active#> | res <active#> <WxH> | quit";

#[derive(Debug, PartialEq, Eq)]
enum ShellInput {
    Action(XrMonitorAction),
    List,
    Quit,
}

impl From<XrMonitorAction> for ShellInput {
    fn from(action: XrMonitorAction) -> Self {
        Self::Action(action)
    }
}

fn parse_command(line: &str) -> Result<Option<ShellInput>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let mut index = || {
        words
            .next()
            .ok_or_else(|| format!("'{}' needs an output number", command))?
            .parse::<usize>()
            .map_err(|e| format!("bad output number: {}", e))
    };

    let input = match command {
        "list" | "ls" => ShellInput::List,
        "refresh" => XrMonitorAction::Refresh.into(),
        "on" => XrMonitorAction::Activate { index: index()? }.into(),
        "off" => XrMonitorAction::Deactivate { index: index()? }.into(),
        "res" => {
            let index = index()?;
            let label = words
                .next()
                .ok_or_else(|| "'res' needs a resolution such as 1280x720".to_string())?;
            XrMonitorAction::SetResolution {
                index,
                label: label.to_string(),
            }
            .into()
        }
        "quit" | "exit" => ShellInput::Quit,
        _ => return Err(USAGE.to_string()),
    };
    Ok(Some(input))
}

fn read_commands(tx: &SyncSender<ShellInput>) {
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        match parse_command(&line) {
            Ok(Some(input)) => {
                let quit = input == ShellInput::Quit;
                if tx.send(input).is_err() || quit {
                    return;
                }
            }
            Ok(None) => {}
            Err(message) => println!("{}", message),
        }
    }
    let _ = tx.send(ShellInput::Quit);
}

fn render(topology: &XrTopology) {
    println!("=== {} active outputs ===", topology.active_outputs.len());
    for (i, view) in topology.active_views().iter().enumerate() {
        let primary = if view.primary { " (primary)" } else { "" };
        println!(
            "  [{}] {}{} at ({}, {})",
            i, view.name, primary, view.position.x, view.position.y
        );
        for label in &view.resolutions {
            let current = if view.selected.as_deref() == Some(label.as_str()) {
                " [CURRENT]"
            } else {
                ""
            };
            println!("      {}{}", label, current);
        }
    }
    println!("=== {} offline outputs ===", topology.offline_outputs.len());
    for (i, name) in topology.offline_names().iter().enumerate() {
        println!("  [{}] {}", i, name);
    }
    println!();
}

fn render_event(event: &XrMonitorEvent) {
    match event {
        XrMonitorEvent::Updated(topology) => render(topology),
        XrMonitorEvent::ActionFailed { action, error } => {
            println!("{:?} failed: {}", action, error);
        }
    }
}

// Without a server only `quit` does anything
fn run_disconnected(rx: &Receiver<ShellInput>, reason: &XrMonitorManagerError) {
    while let Ok(input) = rx.recv() {
        if input == ShellInput::Quit {
            break;
        }
        println!("server features disabled: {}", reason);
    }
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(XrConfig::default_path)
    {
        Some(path) => XrConfig::load(&path)?,
        None => XrConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let (tx, rx) = mpsc::sync_channel::<ShellInput>(16);
    let stdin_tx = tx.clone();
    thread::Builder::new()
        .name("xrx-stdin".into())
        .spawn(move || read_commands(&stdin_tx))?;

    let client = match RandrClient::connect(config.display.as_deref()) {
        Ok(client) => client,
        Err(e) => {
            println!("server features disabled: {}", e);
            drop(tx);
            run_disconnected(&rx, &e);
            return Ok(());
        }
    };

    let listener = if config.live_updates {
        match XrEventListener::spawn(client.event_source(), tx) {
            Ok(listener) => Some(listener),
            Err(e) => {
                warn!("could not start the event listener: {e}");
                None
            }
        }
    } else {
        drop(tx);
        None
    };

    let mut manager = XrMonitorManager::new(client);
    info!("connected, {}", USAGE);
    render_event(&manager.handle_action(XrMonitorAction::Refresh));

    while let Ok(input) = rx.recv() {
        match input {
            ShellInput::Quit => break,
            ShellInput::List => render(&manager.topology()),
            ShellInput::Action(XrMonitorAction::Deactivate { index: 0 })
                if !manager.topology().active_outputs.is_empty() =>
            {
                println!("the primary output cannot be turned off");
            }
            ShellInput::Action(action) => render_event(&manager.handle_action(action)),
        }
    }

    // a listener blocked on a full channel sees the disconnect
    drop(rx);
    if let Some(listener) = listener {
        listener.stop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_actions() {
        assert_eq!(
            parse_command("on 1"),
            Ok(Some(ShellInput::Action(XrMonitorAction::Activate { index: 1 })))
        );
        assert_eq!(
            parse_command("  res 0 1280x720 "),
            Ok(Some(ShellInput::Action(XrMonitorAction::SetResolution {
                index: 0,
                label: "1280x720".into(),
            })))
        );
        assert_eq!(parse_command("quit"), Ok(Some(ShellInput::Quit)));
        assert_eq!(parse_command(""), Ok(None));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("off").is_err());
        assert!(parse_command("off x").is_err());
        assert!(parse_command("res 0").is_err());
        assert!(parse_command("rotate 0").is_err());
    }
}

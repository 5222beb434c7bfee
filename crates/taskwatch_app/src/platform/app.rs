use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::Context;
use chrono::Utc;
use taskwatch_core::{update, AppState, Msg};
use taskwatch_engine::{ClientStore, EngineHandle};
use watch_logging::{watch_debug, watch_info, LogDestination, LogSettings};

use super::config::ClientConfig;
use super::effects::{spawn_event_forwarder, EffectRunner};
use super::ui::commands::{parse_command, Command, HELP};
use super::ui::render::TerminalRenderer;

/// Command-line choices that override the config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    pub base_url: Option<String>,
    pub log_to_terminal: bool,
}

/// Everything the dispatch loop reacts to.
pub(crate) enum Inbox {
    Msg(Msg),
    Input(String),
    InputClosed,
}

pub fn run_app(options: RunOptions) -> anyhow::Result<()> {
    let loaded = ClientConfig::load(&options.config_path)?;
    let from_file = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    if let Some(base_url) = options.base_url {
        config.base_url = base_url;
    }

    let destination = if options.log_to_terminal {
        LogDestination::Both(config.log_path.clone())
    } else {
        LogDestination::File(config.log_path.clone())
    };
    watch_logging::initialize(LogSettings {
        destination,
        level: config.level_filter()?,
    });
    if !from_file {
        watch_info!("No config at {:?}; using defaults", options.config_path);
    }
    watch_info!("taskwatch starting against {}", config.base_url);

    let settings = config.engine_settings()?;
    let (engine, events) = EngineHandle::spawn(settings).context("failed to start engine")?;

    let mut store = ClientStore::open(&config.store_path);
    let restored = store.restore_session(Utc::now().timestamp_millis());

    let (inbox_tx, inbox_rx) = mpsc::channel::<Inbox>();
    spawn_event_forwarder(events, inbox_tx.clone());
    spawn_stdin_reader(inbox_tx.clone());

    let mut runner = EffectRunner::new(engine, store);
    let mut state = match &config.default_bearer {
        Some(bearer) => AppState::with_default_bearer(bearer.clone()),
        None => AppState::new(),
    };
    let mut renderer = TerminalRenderer::new();

    for msg in [Msg::Restore(restored), Msg::DashboardOpened] {
        state = dispatch(state, msg, &mut runner, &mut renderer)?;
    }

    while let Ok(item) = inbox_rx.recv() {
        let msg = match item {
            Inbox::Msg(msg) => msg,
            Inbox::InputClosed => break,
            Inbox::Input(line) => match parse_command(&line) {
                Ok(Command::Msg(msg)) => msg,
                Ok(Command::LoginPrefilled) => {
                    let login = state.view().login;
                    Msg::LoginSubmitted {
                        username: login.username,
                        password: login.password,
                        remember: login.remember,
                    }
                }
                Ok(Command::Help) => {
                    println!("{HELP}");
                    continue;
                }
                Ok(Command::Quit) => break,
                Err(message) => {
                    println!("{message}");
                    continue;
                }
            },
        };
        state = dispatch(state, msg, &mut runner, &mut renderer)?;
    }

    watch_info!("taskwatch exiting");
    Ok(())
}

fn dispatch(
    state: AppState,
    msg: Msg,
    runner: &mut EffectRunner,
    renderer: &mut TerminalRenderer,
) -> anyhow::Result<AppState> {
    let (mut state, effects) = update(state, msg);
    if !effects.is_empty() {
        watch_debug!("Running {} effects", effects.len());
    }
    runner.run(effects);

    let view = state.view();
    state.consume_dirty();
    if view.dirty.any() {
        let mut stdout = io::stdout().lock();
        for line in renderer.render(&view) {
            writeln!(stdout, "{line}")?;
        }
        stdout.flush()?;
    }
    Ok(state)
}

fn spawn_stdin_reader(inbox: mpsc::Sender<Inbox>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if inbox.send(Inbox::Input(line)).is_err() {
                return;
            }
        }
        let _ = inbox.send(Inbox::InputClosed);
    });
}

/// Botdesk dashboard binary
///
/// Wires the reconciliation core to a terminal: spawns the push-channel
/// client and the poll scheduler, pumps their output into the reconciler,
/// and draws an immutable state snapshot every tick. Teardown closes the
/// push channel and stops every poll handle before the terminal is restored,
/// so nothing fires after the page is gone.

mod ui;

use botdesk_client::{
    ApiClient, BotApi, ClientCommand, DashConfig, PollPurpose, PollScheduler, Reconciler,
    SocketClient, SocketHandle, market, run_once,
};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{collections::HashMap, io, sync::Arc, time::Duration};
use tokio::sync::{Mutex, mpsc};
use ui::{InputMode, PageInput};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Restore the terminal on crash before the default hook prints.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    let config = DashConfig::from_env();
    tracing::info!(
        "starting dashboard against {} / {}",
        config.socket.url,
        config.rest_base_url
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let reconciler = Arc::new(Mutex::new(Reconciler::new()));
    let api: Arc<dyn BotApi> = Arc::new(ApiClient::new(config.rest_base_url.clone()));

    // Push channel: events and connection state pumped into the reconciler.
    let (mut event_rx, mut state_rx, socket) =
        SocketClient::with_config(config.socket.clone()).start();
    {
        let reconciler = Arc::clone(&reconciler);
        tokio::spawn(async move {
            while let Some(envelope) = event_rx.recv().await {
                reconciler.lock().await.process_push(envelope);
            }
        });
    }
    {
        let reconciler = Arc::clone(&reconciler);
        tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                let connection = *state_rx.borrow();
                reconciler.lock().await.apply_connection_state(connection);
            }
        });
    }

    // Populate the page from REST before the first push event arrives.
    tokio::spawn(market::hydrate(Arc::clone(&api), Arc::clone(&reconciler)));

    // Periodic polling, one purpose each.
    let mut scheduler = PollScheduler::new();
    {
        let api = Arc::clone(&api);
        let reconciler = Arc::clone(&reconciler);
        let symbols = config.market_symbols.clone();
        scheduler.start_periodic(
            PollPurpose::Market,
            config.market_refresh_interval,
            move |gate| {
                market::refresh_market(
                    Arc::clone(&api),
                    Arc::clone(&reconciler),
                    symbols.clone(),
                    gate,
                )
            },
        );
    }
    {
        let api = Arc::clone(&api);
        let reconciler = Arc::clone(&reconciler);
        scheduler.start_periodic(
            PollPurpose::Trades,
            config.trades_refresh_interval,
            move |gate| market::refresh_trades(Arc::clone(&api), Arc::clone(&reconciler), gate),
        );
    }

    let result = run_app(&mut terminal, Arc::clone(&reconciler), api, socket.clone()).await;

    // Page teardown: nothing may fire after this point.
    socket.close();
    scheduler.stop_all();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result?;
    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    reconciler: Arc<Mutex<Reconciler>>,
    api: Arc<dyn BotApi>,
    socket: SocketHandle,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let (alert_tx, mut alert_rx) = mpsc::channel::<String>(8);
    let mut input = PageInput::default();

    loop {
        while let Ok(message) = alert_rx.try_recv() {
            input.alert = Some(message);
        }

        let snapshot = {
            let guard = reconciler.lock().await;
            guard.snapshot()
        };
        terminal.draw(|f| ui::render(f, &snapshot, &input))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                match input.mode {
                    InputMode::Normal => match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char('s') => {
                            socket.send(ClientCommand::StartBot);
                            input.alert = Some("start_bot sent".to_string());
                        }
                        KeyCode::Char('x') => {
                            socket.send(ClientCommand::StopBot);
                            input.alert = Some("stop_bot sent".to_string());
                        }
                        KeyCode::Char('/') => {
                            input.mode = InputMode::Symbol;
                            input.buffer.clear();
                        }
                        KeyCode::Char(':') => {
                            input.mode = InputMode::Settings;
                            input.buffer.clear();
                        }
                        _ => {}
                    },
                    InputMode::Symbol | InputMode::Settings => match key.code {
                        KeyCode::Esc => {
                            input.mode = InputMode::Normal;
                            input.buffer.clear();
                        }
                        KeyCode::Enter => {
                            submit_input(&mut input, &reconciler, &api, &alert_tx);
                        }
                        KeyCode::Backspace => {
                            input.buffer.pop();
                        }
                        KeyCode::Char(c) => input.buffer.push(c),
                        _ => {}
                    },
                }
            }
        }
    }
}

/// Handle Enter on the footer input line
///
/// Invalid entries are rejected here, before any request is made; valid ones
/// are dispatched as one-shot flows whose results land via the reconciler or
/// the alert channel.
fn submit_input(
    input: &mut PageInput,
    reconciler: &Arc<Mutex<Reconciler>>,
    api: &Arc<dyn BotApi>,
    alert_tx: &mpsc::Sender<String>,
) {
    let buffer = input.buffer.clone();
    let mode = input.mode;
    input.mode = InputMode::Normal;
    input.buffer.clear();

    match mode {
        InputMode::Normal => {}
        InputMode::Symbol => match market::normalize_symbol(&buffer) {
            Err(e) => input.alert = Some(e.to_string()),
            Ok(symbol) => {
                let reconciler = Arc::clone(reconciler);
                let api = Arc::clone(api);
                tokio::spawn(async move {
                    reconciler.lock().await.begin_lookup();
                    let (technical, sentiment) = tokio::join!(
                        run_once(market::lookup_technical(api.as_ref(), &symbol)),
                        run_once(market::lookup_sentiment(api.as_ref(), &symbol)),
                    );
                    let mut guard = reconciler.lock().await;
                    match technical {
                        Ok(report) => guard.apply_technical(report),
                        Err(e) => guard.fail_technical(e.to_string()),
                    }
                    match sentiment {
                        Ok(report) => guard.apply_sentiment(report),
                        Err(e) => guard.fail_sentiment(e.to_string()),
                    }
                });
            }
        },
        InputMode::Settings => {
            let fields = parse_settings_fields(&buffer);
            if fields.is_empty() {
                input.alert = Some("no settings provided".to_string());
                return;
            }
            let api = Arc::clone(api);
            let alert_tx = alert_tx.clone();
            tokio::spawn(async move {
                let message = match run_once(api.update_settings(&fields)).await {
                    Ok(response) if response.is_success() => {
                        "Settings saved successfully!".to_string()
                    }
                    Ok(response) => format!(
                        "Error saving settings: {}",
                        response
                            .message
                            .unwrap_or_else(|| "failed to save settings".to_string())
                    ),
                    Err(e) => format!("Error saving settings: {}", e),
                };
                let _ = alert_tx.send(message).await;
            });
        }
    }
}

/// Parse the `:` footer input: whitespace-separated KEY=VALUE pairs
fn parse_settings_fields(raw: &str) -> HashMap<String, String> {
    raw.split_whitespace()
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn init_logging() {
    // Raw-mode terminal and stdout logging don't mix; only log when a file
    // target is provided.
    if let Ok(path) = std::env::var("BOTDESK_LOG") {
        if let Ok(file) = std::fs::File::create(path) {
            use tracing_subscriber::EnvFilter;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings_fields() {
        let fields = parse_settings_fields("api_key=abc123 base_url=http://x notakeyvalue");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("api_key").map(String::as_str), Some("abc123"));
        assert_eq!(fields.get("base_url").map(String::as_str), Some("http://x"));
        assert!(parse_settings_fields("   ").is_empty());
    }
}

use anyhow::Result;
use chatrelay::api::TransportClient;
use chatrelay::config::ClientConfig;
use chatrelay::runtime::{Command, Dispatcher};
use chatrelay::state::LoginGate;
use chatrelay::terminal::{InputParser, LineAction, TerminalView, HELP};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    chatrelay::logging::init();

    let config = ClientConfig::load()?;
    config.validate()?;

    let client = TransportClient::new(&config)?;
    let gate = LoginGate::new(config.access_code.clone());
    let needs_login = !gate.is_authorized();
    let mut dispatcher = Dispatcher::new(client, TerminalView::new(std::io::stdout()), gate);

    eprintln!("relay: {}\n{HELP}", config.relay_url);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    if needs_login {
        eprintln!("* enter /login <code> to start");
    } else {
        let _ = command_tx.send(Command::RefreshModels);
    }

    let interrupt_tx = command_tx.clone();
    tokio::spawn(async move {
        // Ctrl+C stops the response; end of input quits.
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt_tx.send(Command::Stop).is_err() {
                break;
            }
        }
    });
    tokio::spawn(read_input(command_tx));

    dispatcher.run(command_rx).await
}

async fn read_input(commands: mpsc::UnboundedSender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut parser = InputParser::new();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::error!(%error, "failed to read input");
                break;
            }
        };
        match parser.parse(&line) {
            LineAction::Command(command) => {
                let quit = command == Command::Quit;
                if commands.send(command).is_err() || quit {
                    return;
                }
            }
            LineAction::Help => eprintln!("{HELP}"),
            LineAction::Invalid(message) => eprintln!("* {message}"),
            LineAction::Nothing => {}
        }
    }
    let _ = commands.send(Command::Quit);
}

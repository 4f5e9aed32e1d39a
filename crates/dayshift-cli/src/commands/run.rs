use dayshift_core::{ActivityKind, Command, Config};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{open_controller, print_events, CommandResult, Lifetime};

/// Foreground session on a single-threaded runtime.
pub fn run(config: Config) -> CommandResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(config));
    // A pending stdin read cannot be cancelled; don't wait for it.
    runtime.shutdown_background();
    result
}

async fn serve(config: Config) -> CommandResult {
    let (mut controller, startup) = open_controller(&config, Lifetime::Foreground)?;
    print_events(&startup)?;
    print_events(&[controller.snapshot()])?;

    let (command_tx, command_rx) = mpsc::channel(32);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    tokio::spawn(forward_stdin(command_tx));
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let Err(e) = print_events(&[event]) {
                warn!(error = %e, "failed to print event");
            }
        }
    });

    info!("session running in the foreground, type 'quit' to stop");
    controller.run(command_rx, event_tx).await;
    // The loop dropped its sender; the printer drains and exits.
    let _ = printer.await;
    Ok(())
}

async fn forward_stdin(commands: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let command = match lines.next_line().await {
            Ok(Some(line)) => parse_line(&line),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        let quit = command == Command::Quit;
        if commands.send(command).await.is_err() || quit {
            break;
        }
    }
}

/// Recognized words become commands; any other line is a key press.
fn parse_line(line: &str) -> Command {
    match line.trim().to_ascii_lowercase().as_str() {
        "quit" | "exit" | "q" => Command::Quit,
        "reset" => Command::Reset,
        "cancel" => Command::Cancel,
        "listen" => Command::Listen,
        "hide" => Command::Visibility(false),
        "show" => Command::Visibility(true),
        _ => Command::Activity(ActivityKind::KeyDown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_map_to_commands() {
        assert_eq!(parse_line("quit"), Command::Quit);
        assert_eq!(parse_line("  Reset "), Command::Reset);
        assert_eq!(parse_line("cancel"), Command::Cancel);
        assert_eq!(parse_line("listen"), Command::Listen);
        assert_eq!(parse_line("show"), Command::Visibility(true));
    }

    #[test]
    fn other_lines_are_key_presses() {
        assert_eq!(parse_line(""), Command::Activity(ActivityKind::KeyDown));
        assert_eq!(
            parse_line("good morning"),
            Command::Activity(ActivityKind::KeyDown)
        );
    }
}

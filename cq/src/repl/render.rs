//! Terminal rendering of reply events

use colored::Colorize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::coordination::{Channel, StatusRecord};
use crate::events::ReplyEvent;
use crate::session::StatusSnapshot;

fn tag(channel: Channel) -> colored::ColoredString {
    match channel {
        Channel::Main => "[main]".bright_blue(),
        Channel::Secondary => "[secondary]".bright_magenta(),
    }
}

/// One line per event; `None` for events not shown unless `verbose`
pub fn format_event(event: &ReplyEvent, verbose: bool) -> Option<String> {
    match event {
        ReplyEvent::Text { channel, text } => Some(format!("{} {}", tag(*channel), text.dimmed())),
        ReplyEvent::Final { channel, text } => Some(format!("{} {}", tag(*channel), text)),
        ReplyEvent::Progress { text } => Some(format!("{} {}", "[progress]".yellow(), text)),
        ReplyEvent::Phase { phase } => verbose.then(|| format!("(main: {})", phase).dimmed().to_string()),
        ReplyEvent::Error { message } => Some(format!("{} {}", "[error]".red(), message)),
    }
}

fn format_record(name: &str, record: Option<&StatusRecord>) -> String {
    match record {
        None => format!("  {:10} {}", name, "idle".dimmed()),
        Some(r) => {
            let state = if r.processing { "processing".green() } else { "idle".normal() };
            let tool = r.tool_name.as_deref().unwrap_or("-");
            let progress = r.progress.map(|p| format!("{}%", p)).unwrap_or_else(|| "-".to_string());
            let aborted = if r.aborted { " (aborted)".red().to_string() } else { String::new() };
            format!("  {:10} {} tool={} progress={}{}", name, state, tool, progress, aborted)
        }
    }
}

pub fn format_snapshot(snapshot: &StatusSnapshot) -> String {
    let mut lines = vec![
        format_record("main", snapshot.main.as_ref()),
        format_record("secondary", snapshot.secondary.as_ref()),
    ];
    if let Some(progress) = &snapshot.progress {
        lines.push(format!(
            "  {:10} {} {}% ({})",
            "tool",
            progress.tool_name,
            progress.progress,
            progress.status
        ));
    }
    if let Some(phase) = snapshot.phase {
        lines.push(format!("  {:10} {}", "phase", phase));
    }
    lines.join("\n")
}

fn print_event(event: &ReplyEvent, verbose: bool) {
    if let Some(line) = format_event(event, verbose) {
        println!("{}", line);
    }
}

/// Print events as they arrive until `stop` fires or the bus closes
///
/// Events already queued when `stop` fires are still printed.
pub fn spawn_printer(mut rx: broadcast::Receiver<ReplyEvent>, verbose: bool, stop: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                received = rx.recv() => match received {
                    Ok(event) => print_event(&event, verbose),
                    Err(RecvError::Lagged(skipped)) => {
                        println!("{}", format!("({} events skipped)", skipped).dimmed());
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    while let Ok(event) = rx.try_recv() {
                        print_event(&event, verbose);
                    }
                    break;
                }
            }
        }
    })
}

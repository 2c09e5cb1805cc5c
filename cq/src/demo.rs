//! Scripted walkthrough of the two channels
//!
//! Scenario 1 starts a long operation and asks two questions while it runs.
//! Scenario 2 is a quick lookup once the channel is free again.

use std::time::Duration;

use colored::Colorize;
use tracing::info;

use crate::session::{Conversation, SendOutcome};

/// One user message and how long to wait before sending it
#[derive(Debug, Clone)]
pub struct DemoStep {
    pub delay: Duration,
    pub text: &'static str,
}

impl DemoStep {
    const fn new(delay_ms: u64, text: &'static str) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            text,
        }
    }
}

/// Long operation with interim questions
pub const LONG_OPERATION_SCENARIO: &[DemoStep] = &[
    DemoStep::new(0, "Change my package to Premium Plus"),
    DemoStep::new(3_000, "What's the status of my request?"),
    DemoStep::new(2_000, "How much data do I have left?"),
];

/// Quick lookup, answered on the main channel
pub const QUICK_QUERY_SCENARIO: &[DemoStep] = &[DemoStep::new(0, "What's my current package?")];

/// Send each step in order, then wait for the main channel to finish
pub async fn run_scenario(conversation: &Conversation, steps: &[DemoStep]) -> Vec<SendOutcome> {
    let mut outcomes = Vec::with_capacity(steps.len());
    for step in steps {
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        println!();
        println!("{} {}", ">>> User:".bright_green(), step.text);
        info!(text = step.text, "Demo step");
        let outcome = conversation.send(step.text).await;
        if let SendOutcome::MainStarted { .. } = &outcome {
            println!("{}", "(running on the main channel in the background)".dimmed());
        }
        outcomes.push(outcome);
    }
    conversation.wait_idle().await;
    outcomes
}

/// Both scenarios with banners
pub async fn run_demo(conversation: &Conversation) {
    let session = conversation.session();
    println!("{}", "=".repeat(60));
    println!("{}", "Dual-Channel Conversation Demo".bright_cyan().bold());
    println!("{}", "=".repeat(60));
    println!("Namespace: {}", session.namespace);

    println!();
    println!("{}", "SCENARIO 1: Long operation with interim questions".bold());
    println!("{}", "-".repeat(60));
    run_scenario(conversation, LONG_OPERATION_SCENARIO).await;

    println!();
    println!("{}", "SCENARIO 2: Quick query".bold());
    println!("{}", "-".repeat(60));
    run_scenario(conversation, QUICK_QUERY_SCENARIO).await;

    println!();
    println!("{}", "Demo completed!".bright_cyan());
}

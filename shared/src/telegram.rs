use reqwest::Client;
use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tracing::{Event, Level, Subscriber};

const MARKDOWN_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

pub enum Alert {
    Event { message: String, level: Level },
    Summary(String),
}

enum Command {
    Send(Alert),
    Flush(oneshot::Sender<()>),
}

/// Forwards warnings and errors to a Telegram chat.
///
/// Messages are queued on an unbounded channel and delivered by a background
/// task, so emitting a log line never waits on the network.
#[derive(Clone)]
pub struct TelegramSubscriber {
    sender: mpsc::UnboundedSender<Command>,
}

pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn render(alert: &Alert) -> String {
    match alert {
        Alert::Event { message, level } => {
            format!("*{}*: `{}`", level.as_str(), escape_markdown(message))
        }
        Alert::Summary(text) => escape_markdown(text),
    }
}

async fn send_message(
    client: &Client,
    bot_token: &str,
    chat_id: &str,
    text: String,
) -> anyhow::Result<reqwest::Response> {
    let url = format!("https://api.telegram.org/bot{}/sendMessage", bot_token);
    let params = [
        ("chat_id", chat_id),
        ("text", &text),
        ("parse_mode", "MarkdownV2"),
    ];

    Ok(client.post(&url).form(&params).send().await?)
}

async fn sender_task(
    mut reader: mpsc::UnboundedReceiver<Command>,
    client: Client,
    bot_token: String,
    chat_id: String,
) {
    while let Some(command) = reader.recv().await {
        let alert = match command {
            Command::Send(alert) => alert,
            Command::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        match send_message(&client, &bot_token, &chat_id, render(&alert)).await {
            Ok(response) if response.status().is_success() => {}
            // stderr only: routing this through tracing would loop back here
            Ok(response) => eprintln!(
                "Failed to deliver alert: Received HTTP {}",
                response.status()
            ),
            Err(e) => eprintln!("Failed to deliver alert: {}", e),
        }
    }
}

impl TelegramSubscriber {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(sender_task(receiver, Client::new(), bot_token, chat_id));
        Self { sender }
    }

    pub fn alert(&self, message: &str, level: Level) {
        let _ = self.sender.send(Command::Send(Alert::Event {
            message: message.to_string(),
            level,
        }));
    }

    pub fn summary(&self, text: &str) {
        let _ = self.sender.send(Command::Send(Alert::Summary(text.to_string())));
    }

    /// Waits until every message queued so far has been handed to Telegram.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl<S: Subscriber> tracing_subscriber::Layer<S> for TelegramSubscriber {
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let level = event.metadata().level();
        if level > &Level::WARN {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.alert(&visitor.to_string(), *level);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl fmt::Display for MessageVisitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for field in &self.fields {
            write!(f, " {}", field)?;
        }
        Ok(())
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

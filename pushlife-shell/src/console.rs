//! Console rendition of the display shell: commands, prompt UI, intent output.

use std::sync::Arc;

use async_trait::async_trait;
use pushlife_core::{
    LifecycleOrchestrator, LoopbackTransport, NotificationPayload, Prompt, PromptChoice,
    PromptPresenter, RouteIntent,
};
use tokio::sync::{oneshot, Mutex};

pub const HELP: &str = "\
commands:
  state                 show permission, token and lifecycle phase
  token                 fetch the messaging token
  delete-token          delete the messaging token
  subscribe <topic>     subscribe to a topic
  unsubscribe <topic>   unsubscribe from a topic
  sync                  send the token to the server
  permission            ask for notification permission again
  push <json>           deliver a foreground message
  tap <json>            tap a notification while backgrounded
  rotate <token>        issue a new token
  open | dismiss        answer the pending prompt
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    State,
    Token,
    DeleteToken,
    Subscribe(String),
    Unsubscribe(String),
    Sync,
    Permission,
    Push(NotificationPayload),
    Tap(NotificationPayload),
    Rotate(String),
    Answer(PromptChoice),
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };
    let arg = |name: &str| {
        if rest.is_empty() {
            Err(format!("{} needs an argument", name))
        } else {
            Ok(rest.to_string())
        }
    };
    let payload = |name: &str| {
        let json = arg(name)?;
        NotificationPayload::from_json(&json).map_err(|e| format!("invalid payload: {}", e))
    };
    match word {
        "state" => Ok(Command::State),
        "token" => Ok(Command::Token),
        "delete-token" => Ok(Command::DeleteToken),
        "subscribe" => arg("subscribe").map(Command::Subscribe),
        "unsubscribe" => arg("unsubscribe").map(Command::Unsubscribe),
        "sync" => Ok(Command::Sync),
        "permission" => Ok(Command::Permission),
        "push" => payload("push").map(Command::Push),
        "tap" => payload("tap").map(Command::Tap),
        "rotate" => arg("rotate").map(Command::Rotate),
        "open" => Ok(Command::Answer(PromptChoice::Open)),
        "dismiss" => Ok(Command::Answer(PromptChoice::Dismiss)),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command {:?} (try help)", other)),
    }
}

/// Shows foreground prompts and waits for `open` or `dismiss` from stdin.
pub struct ConsolePresenter {
    pending: Mutex<Option<oneshot::Sender<PromptChoice>>>,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }

    /// Resolve the pending prompt. False when none is showing.
    pub async fn answer(&self, choice: PromptChoice) -> bool {
        match self.pending.lock().await.take() {
            Some(tx) => tx.send(choice).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl PromptPresenter for ConsolePresenter {
    async fn present(&self, prompt: Prompt) -> PromptChoice {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().await = Some(tx);
        println!("[{}] {}", prompt.title, prompt.body);
        println!("  ({:?}: {:?}) open | dismiss ?", prompt.kind, prompt.presentation);
        // A replaced or dropped prompt counts as dismissed.
        rx.await.unwrap_or(PromptChoice::Dismiss)
    }
}

pub fn print_intent(intent: &RouteIntent) {
    match intent {
        RouteIntent::Navigate { screen, params } if params.is_empty() => {
            println!("-> navigate to {}", screen)
        }
        RouteIntent::Navigate { screen, params } => {
            println!("-> navigate to {} {:?}", screen, params)
        }
        RouteIntent::OpenUrl(url) => println!("-> open url {}", url),
    }
}

pub struct Console {
    pub orchestrator: Arc<LifecycleOrchestrator>,
    pub transport: Arc<LoopbackTransport>,
    pub presenter: Arc<ConsolePresenter>,
}

impl Console {
    /// Run one command. Returns false when the shell should exit.
    pub async fn handle(&self, cmd: Command) -> bool {
        match cmd {
            Command::State => {
                let s = self.orchestrator.state();
                println!(
                    "permission: {}",
                    if s.permission_granted { "granted" } else { "denied" }
                );
                println!(
                    "token: {}",
                    s.token.as_ref().map(|t| t.as_str()).unwrap_or("not available")
                );
                println!("phase: {:?} (ready: {})", s.phase, s.ready());
                if let Some(p) = &s.initial_notification {
                    println!("launched by: {}", p.title().unwrap_or("(untitled)"));
                }
            }
            Command::Token => match self.orchestrator.get_token().await {
                Some(t) => println!("token: {}", t),
                None => println!("token not available"),
            },
            Command::DeleteToken => {
                let ok = self.orchestrator.delete_token().await;
                println!("{}", if ok { "token deleted" } else { "failed to delete token" });
            }
            Command::Subscribe(topic) => {
                if self.orchestrator.subscribe_to_topic(&topic).await {
                    println!("subscribed to {}", topic);
                } else {
                    println!("failed to subscribe");
                }
            }
            Command::Unsubscribe(topic) => {
                if self.orchestrator.unsubscribe_from_topic(&topic).await {
                    println!("unsubscribed from {}", topic);
                } else {
                    println!("failed to unsubscribe");
                }
            }
            Command::Sync => {
                let ok = self.orchestrator.send_token_to_server().await;
                println!("{}", if ok { "token sent" } else { "token not sent" });
            }
            Command::Permission => {
                println!("permission: {:?}", self.orchestrator.request_permission().await);
            }
            Command::Push(p) => {
                if self.transport.push_foreground(p).await == 0 {
                    println!("no foreground listener");
                }
            }
            Command::Tap(p) => {
                if self.transport.tap(p).await == 0 {
                    println!("no tap listener");
                }
            }
            Command::Rotate(t) => {
                self.transport.rotate_token(t).await;
            }
            Command::Answer(choice) => {
                if !self.presenter.answer(choice).await {
                    println!("no prompt pending");
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushlife_core::{Config, GrantResult, Platform};

    use crate::consent::StaticConsent;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("state"), Ok(Command::State));
        assert_eq!(
            parse_command("  subscribe   news_updates "),
            Ok(Command::Subscribe("news_updates".into()))
        );
        assert_eq!(parse_command("open"), Ok(Command::Answer(PromptChoice::Open)));
        assert!(parse_command("subscribe").is_err());
        assert!(parse_command("launch rockets").is_err());
        assert!(parse_command("").is_err());
    }

    #[test]
    fn parses_payload_commands() {
        match parse_command(r#"tap {"data":{"screen":"Deals","id":"42"}}"#) {
            Ok(Command::Tap(p)) => assert_eq!(p.data_value("screen"), Some("Deals")),
            other => panic!("expected Tap, got {:?}", other),
        }
        assert!(parse_command("push {not json").is_err());
    }

    #[tokio::test]
    async fn answer_without_prompt_is_false() {
        let presenter = ConsolePresenter::new();
        assert!(!presenter.answer(PromptChoice::Open).await);
    }

    #[tokio::test]
    async fn answer_resolves_pending_prompt() {
        let presenter = Arc::new(ConsolePresenter::new());
        let shown = presenter.clone();
        let prompt = tokio::spawn(async move {
            shown
                .present(Prompt {
                    title: "Hi".into(),
                    body: "You have a new message.".into(),
                    kind: pushlife_core::NotificationKind::Default,
                    presentation: pushlife_core::router::Presentation::Plain,
                })
                .await
        });
        while !presenter.answer(PromptChoice::Open).await {
            tokio::task::yield_now().await;
        }
        assert_eq!(prompt.await.unwrap(), PromptChoice::Open);
    }

    #[tokio::test]
    async fn console_drives_orchestrator() {
        let transport = Arc::new(LoopbackTransport::new());
        let presenter = Arc::new(ConsolePresenter::new());
        let (orchestrator, _intents) = LifecycleOrchestrator::new(
            Config::default(),
            Platform::Other,
            transport.clone(),
            Arc::new(StaticConsent(GrantResult::Granted)),
            presenter.clone(),
        );
        let console = Console {
            orchestrator: Arc::new(orchestrator),
            transport: transport.clone(),
            presenter,
        };
        assert!(console.handle(Command::Subscribe("news_updates".into())).await);
        assert!(transport.is_subscribed("news_updates").await);
        assert!(console.handle(Command::Token).await);
        assert!(console.orchestrator.state().has_token());
        assert!(!console.handle(Command::Quit).await);
    }
}

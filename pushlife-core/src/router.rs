//! Notification router: classify payloads and turn them into shell intents.
//! The router never navigates itself; it emits `RouteIntent`s for the shell.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::payload::NotificationPayload;

/// Which delivery state produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryContext {
    Foreground,
    BackgroundTap,
    ColdStartTap,
}

impl DeliveryContext {
    /// Taps already express intent; only foreground arrivals ask first.
    pub fn needs_prompt(self) -> bool {
        matches!(self, DeliveryContext::Foreground)
    }
}

/// Closed set of notification styles, from the `type` data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    BigText,
    BigPicture,
    Inbox,
    ActionButtons,
    Default,
}

impl NotificationKind {
    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            "big_text" => NotificationKind::BigText,
            "big_picture" => NotificationKind::BigPicture,
            "inbox" => NotificationKind::Inbox,
            "action_buttons" => NotificationKind::ActionButtons,
            _ => NotificationKind::Default,
        }
    }
}

/// Kind-specific content for the foreground prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    Plain,
    BigText { text: String },
    BigPicture { image_url: Option<String> },
    Inbox { lines: Vec<String> },
    ActionButtons { actions: Vec<String> },
}

/// Interactive choice shown for a foreground notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    pub presentation: Presentation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    Dismiss,
    Open,
}

/// Shell-side UI for the foreground prompt.
#[async_trait]
pub trait PromptPresenter: Send + Sync {
    async fn present(&self, prompt: Prompt) -> PromptChoice;
}

/// Request for the shell to fulfil.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteIntent {
    Navigate {
        screen: String,
        params: BTreeMap<String, String>,
    },
    OpenUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    pub kind: NotificationKind,
    pub context: DeliveryContext,
    /// The user's answer when a prompt was shown.
    pub choice: Option<PromptChoice>,
    pub intents: Vec<RouteIntent>,
}

impl RouteOutcome {
    pub fn prompted(&self) -> bool {
        self.choice.is_some()
    }
}

/// Read the `type` field. Unknown or missing values are Default.
pub fn classify(payload: &NotificationPayload) -> NotificationKind {
    payload
        .data_value("type")
        .map(NotificationKind::from_type_tag)
        .unwrap_or(NotificationKind::Default)
}

/// Build the kind-specific presentation. Missing kind data degrades to empty.
pub fn presentation(payload: &NotificationPayload, kind: NotificationKind) -> Presentation {
    match kind {
        NotificationKind::BigText => Presentation::BigText {
            text: payload.body().unwrap_or_default().to_string(),
        },
        NotificationKind::BigPicture => Presentation::BigPicture {
            image_url: payload.data_value("image").map(str::to_string),
        },
        NotificationKind::Inbox => Presentation::Inbox {
            lines: split_list(payload.data_value("lines"), '\n'),
        },
        NotificationKind::ActionButtons => Presentation::ActionButtons {
            actions: split_list(payload.data_value("actions"), ','),
        },
        NotificationKind::Default => Presentation::Plain,
    }
}

fn split_list(value: Option<&str>, sep: char) -> Vec<String> {
    value
        .map(|v| {
            v.split(sep)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn is_id_like(key: &str) -> bool {
    key == "id" || key.ends_with("_id") || key.ends_with("Id")
}

/// Navigation and URL intents carried by the payload's data. Both may be present.
pub fn intents_for(payload: &NotificationPayload) -> Vec<RouteIntent> {
    let mut out = Vec::new();
    if let Some(screen) = payload.data_value("screen") {
        let params = payload
            .data
            .iter()
            .filter(|(k, v)| is_id_like(k) && !v.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.push(RouteIntent::Navigate {
            screen: screen.to_string(),
            params,
        });
    }
    if let Some(url) = payload.data_value("url") {
        out.push(RouteIntent::OpenUrl(url.to_string()));
    }
    out
}

pub struct NotificationRouter {
    presenter: Arc<dyn PromptPresenter>,
    intents: UnboundedSender<RouteIntent>,
    fallback_title: String,
    fallback_body: String,
}

impl NotificationRouter {
    pub fn new(
        presenter: Arc<dyn PromptPresenter>,
        intents: UnboundedSender<RouteIntent>,
        fallback_title: impl Into<String>,
        fallback_body: impl Into<String>,
    ) -> Self {
        Self {
            presenter,
            intents,
            fallback_title: fallback_title.into(),
            fallback_body: fallback_body.into(),
        }
    }

    pub fn prompt_for(&self, payload: &NotificationPayload, kind: NotificationKind) -> Prompt {
        Prompt {
            title: payload
                .title()
                .filter(|t| !t.is_empty())
                .unwrap_or(&self.fallback_title)
                .to_string(),
            body: payload
                .body()
                .filter(|b| !b.is_empty())
                .unwrap_or(&self.fallback_body)
                .to_string(),
            kind,
            presentation: presentation(payload, kind),
        }
    }

    /// Route one payload. Foreground arrivals go through the prompt first;
    /// taps act immediately.
    pub async fn route(
        &self,
        payload: &NotificationPayload,
        context: DeliveryContext,
    ) -> RouteOutcome {
        let kind = classify(payload);
        log::info!(
            "routing {:?} notification ({:?}) id={}",
            kind,
            context,
            payload.message_id.as_deref().unwrap_or("-")
        );
        let choice = if context.needs_prompt() {
            let choice = self.presenter.present(self.prompt_for(payload, kind)).await;
            log::debug!("foreground prompt answered: {:?}", choice);
            Some(choice)
        } else {
            None
        };
        let intents = match choice {
            Some(PromptChoice::Dismiss) => Vec::new(),
            Some(PromptChoice::Open) | None => self.act(payload),
        };
        RouteOutcome {
            kind,
            context,
            choice,
            intents,
        }
    }

    fn act(&self, payload: &NotificationPayload) -> Vec<RouteIntent> {
        let intents = intents_for(payload);
        for intent in &intents {
            if self.intents.send(intent.clone()).is_err() {
                log::debug!("no shell listening for route intents; dropped {:?}", intent);
            }
        }
        intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPresenter;
    use tokio::sync::mpsc;

    fn payload(json: &str) -> NotificationPayload {
        NotificationPayload::from_json(json).unwrap()
    }

    fn router(
        choice: PromptChoice,
    ) -> (
        NotificationRouter,
        Arc<ScriptedPresenter>,
        mpsc::UnboundedReceiver<RouteIntent>,
    ) {
        let presenter = Arc::new(ScriptedPresenter::new(choice));
        let (tx, rx) = mpsc::unbounded_channel();
        let r = NotificationRouter::new(
            presenter.clone(),
            tx,
            "New notification",
            "You have a new message.",
        );
        (r, presenter, rx)
    }

    #[test]
    fn classification_is_total() {
        let cases = [
            ("big_text", NotificationKind::BigText),
            ("big_picture", NotificationKind::BigPicture),
            ("inbox", NotificationKind::Inbox),
            ("action_buttons", NotificationKind::ActionButtons),
            ("BIG_TEXT", NotificationKind::Default),
            ("carousel", NotificationKind::Default),
            ("", NotificationKind::Default),
        ];
        for (tag, kind) in cases {
            let mut p = NotificationPayload::default();
            p.data.insert("type".into(), tag.into());
            assert_eq!(classify(&p), kind, "tag {:?}", tag);
        }
        assert_eq!(classify(&NotificationPayload::default()), NotificationKind::Default);
    }

    #[test]
    fn presentations_degrade_to_empty() {
        let p = payload(r#"{"data":{"type":"inbox","lines":"one\n\ntwo"}}"#);
        assert_eq!(
            presentation(&p, classify(&p)),
            Presentation::Inbox {
                lines: vec!["one".into(), "two".into()]
            }
        );
        let p = payload(r#"{"data":{"type":"action_buttons"}}"#);
        assert_eq!(
            presentation(&p, classify(&p)),
            Presentation::ActionButtons { actions: vec![] }
        );
        let p = payload(r#"{"data":{"type":"big_picture","image":"https://img/x.png"}}"#);
        assert_eq!(
            presentation(&p, classify(&p)),
            Presentation::BigPicture {
                image_url: Some("https://img/x.png".into())
            }
        );
    }

    #[test]
    fn navigate_and_url_co_occur() {
        let p = payload(
            r#"{"data":{"screen":"Order","orderId":"7","user_id":"u1","note":"x","url":"https://example.com"}}"#,
        );
        let intents = intents_for(&p);
        assert_eq!(intents.len(), 2);
        match &intents[0] {
            RouteIntent::Navigate { screen, params } => {
                assert_eq!(screen, "Order");
                assert_eq!(params.get("orderId").map(String::as_str), Some("7"));
                assert_eq!(params.get("user_id").map(String::as_str), Some("u1"));
                assert!(!params.contains_key("note"));
            }
            other => panic!("expected Navigate, got {:?}", other),
        }
        assert_eq!(intents[1], RouteIntent::OpenUrl("https://example.com".into()));
    }

    #[tokio::test]
    async fn tap_acts_without_prompt() {
        let (r, presenter, mut rx) = router(PromptChoice::Dismiss);
        let p = payload(
            r#"{"notification":{"title":"Sale","body":"50% off"},"data":{"screen":"Deals","id":"42"}}"#,
        );
        let out = r.route(&p, DeliveryContext::BackgroundTap).await;
        assert!(!out.prompted());
        assert!(presenter.shown().is_empty());
        let expected = RouteIntent::Navigate {
            screen: "Deals".into(),
            params: BTreeMap::from([("id".to_string(), "42".to_string())]),
        };
        assert_eq!(out.intents, vec![expected.clone()]);
        assert_eq!(rx.recv().await, Some(expected));
    }

    #[tokio::test]
    async fn foreground_prompt_uses_fallback_body() {
        let (r, presenter, mut rx) = router(PromptChoice::Open);
        let p = payload(r#"{"notification":{"title":"Hi"},"data":{}}"#);
        let out = r.route(&p, DeliveryContext::Foreground).await;
        assert_eq!(out.choice, Some(PromptChoice::Open));
        assert_eq!(out.context, DeliveryContext::Foreground);
        assert!(out.intents.is_empty());
        assert!(rx.try_recv().is_err());
        let shown = presenter.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Hi");
        assert_eq!(shown[0].body, "You have a new message.");
    }

    #[tokio::test]
    async fn foreground_dismiss_emits_nothing() {
        let (r, _presenter, mut rx) = router(PromptChoice::Dismiss);
        let p = payload(r#"{"data":{"screen":"Deals","url":"https://example.com"}}"#);
        let out = r.route(&p, DeliveryContext::Foreground).await;
        assert_eq!(out.choice, Some(PromptChoice::Dismiss));
        assert!(out.intents.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_foreground_payload_still_prompts() {
        let (r, presenter, _rx) = router(PromptChoice::Open);
        r.route(&NotificationPayload::default(), DeliveryContext::Foreground)
            .await;
        let shown = presenter.shown();
        assert_eq!(shown[0].title, "New notification");
        assert_eq!(shown[0].presentation, Presentation::Plain);
    }

    #[tokio::test]
    async fn dropped_shell_receiver_is_not_fatal() {
        let (r, _presenter, rx) = router(PromptChoice::Open);
        drop(rx);
        let p = payload(r#"{"data":{"url":"https://example.com"}}"#);
        let out = r.route(&p, DeliveryContext::ColdStartTap).await;
        assert_eq!(out.intents.len(), 1);
    }
}

//! Service-worker event handling.
//!
//! The `on_*` methods only decide what to do. [`ServiceWorkerHandler::run`]
//! carries the decision out on a [`WorkerRuntime`] and resolves once every
//! step has finished, which is what the event's `waitUntil` waits on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::{
    browser::platform::Permission,
    error::Error,
    types::notification::DEFAULT_URL,
};

pub const DEFAULT_ICON: &str = "/icons/icon-192x192.png";
pub const DEFAULT_TAG: &str = "news-update";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

/// What gets handed to `registration.showNotification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub image: Option<String>,
    pub tag: String,
    pub data: NotificationData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    /// Raw text of the push message, if it carried any.
    Push(Option<String>),
    NotificationClick(Notification),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    Focus(WindowClient),
    OpenWindow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    SkipWaiting,
    ClaimClients,
}

#[derive(Debug, Deserialize)]
struct PushData {
    title: String,
    body: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    tag: Option<String>,
}

#[async_trait]
pub trait WorkerRuntime: Send + Sync {
    fn permission(&self) -> Permission;

    async fn show_notification(
        &self,
        notification: &Notification,
    ) -> Result<(), Error>;

    async fn close_notification(
        &self,
        notification: &Notification,
    ) -> Result<(), Error>;

    async fn window_clients(&self) -> Result<Vec<WindowClient>, Error>;

    async fn focus(&self, client: &WindowClient) -> Result<(), Error>;

    async fn open_window(&self, url: &str) -> Result<(), Error>;

    async fn skip_waiting(&self) -> Result<(), Error>;

    async fn claim_clients(&self) -> Result<(), Error>;
}

#[derive(Debug, Clone)]
pub struct ServiceWorkerHandler {
    origin: Url,
    icon: String,
    tag: String,
}

impl ServiceWorkerHandler {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            icon: String::from(DEFAULT_ICON),
            tag: String::from(DEFAULT_TAG),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// `None` means nothing is shown: permission is not granted or the data
    /// is not a notification payload.
    pub fn on_push(
        &self,
        permission: Permission,
        data: Option<&str>,
    ) -> Option<Notification> {
        if permission != Permission::Granted {
            debug!("Push ignored, permission is {}", permission);
            return None;
        }

        let data = match data {
            Some(data) => data,
            None => {
                warn!("Push without data ignored");
                return None;
            },
        };

        let data: PushData = match serde_json::from_str(data) {
            Ok(data) => data,
            Err(e) => {
                warn!("Malformed push payload ignored: {}", e);
                return None;
            },
        };

        Some(Notification {
            title: data.title,
            body: data.body,
            icon: data.icon.unwrap_or_else(|| self.icon.to_owned()),
            image: data.image,
            tag: data.tag.unwrap_or_else(|| self.tag.to_owned()),
            data: NotificationData {
                url: data.url.unwrap_or_else(|| String::from(DEFAULT_URL)),
            },
        })
    }

    /// Focuses a window already showing the target, otherwise opens one.
    pub fn on_notification_click(
        &self,
        notification: &Notification,
        windows: &[WindowClient],
    ) -> ClickAction {
        let target = self.resolve(&notification.data.url);

        let open = windows.iter().find(|client| {
            match (&target, Url::parse(&client.url)) {
                (Some(target), Ok(url)) => &url == target,
                _ => client.url == notification.data.url,
            }
        });

        match open {
            Some(client) => ClickAction::Focus(client.clone()),
            None => ClickAction::OpenWindow(
                target
                    .map(String::from)
                    .unwrap_or_else(|| notification.data.url.to_owned()),
            ),
        }
    }

    pub fn on_install(&self) -> LifecycleAction {
        LifecycleAction::SkipWaiting
    }

    pub fn on_activate(&self) -> LifecycleAction {
        LifecycleAction::ClaimClients
    }

    pub async fn run<R: WorkerRuntime>(
        &self,
        runtime: &R,
        event: WorkerEvent,
    ) -> Result<(), Error> {
        match event {
            WorkerEvent::Install => {
                self.apply(runtime, self.on_install()).await
            },
            WorkerEvent::Activate => {
                self.apply(runtime, self.on_activate()).await
            },
            WorkerEvent::Push(data) => {
                let permission = runtime.permission();
                match self.on_push(permission, data.as_deref()) {
                    Some(notification) => {
                        runtime.show_notification(&notification).await
                    },
                    None => Ok(()),
                }
            },
            WorkerEvent::NotificationClick(notification) => {
                runtime.close_notification(&notification).await?;
                let windows = runtime.window_clients().await?;

                match self.on_notification_click(&notification, &windows) {
                    ClickAction::Focus(client) => runtime.focus(&client).await,
                    ClickAction::OpenWindow(url) => {
                        runtime.open_window(&url).await
                    },
                }
            },
        }
    }

    async fn apply<R: WorkerRuntime>(
        &self,
        runtime: &R,
        action: LifecycleAction,
    ) -> Result<(), Error> {
        match action {
            LifecycleAction::SkipWaiting => runtime.skip_waiting().await,
            LifecycleAction::ClaimClients => runtime.claim_clients().await,
        }
    }

    fn resolve(&self, url: &str) -> Option<Url> {
        self.origin.join(url).ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn handler() -> ServiceWorkerHandler {
        ServiceWorkerHandler::new(Url::parse("https://news.example").unwrap())
    }

    fn notification(url: &str) -> Notification {
        Notification {
            title: String::from("Hi"),
            body: String::from("There"),
            icon: String::from(DEFAULT_ICON),
            image: None,
            tag: String::from(DEFAULT_TAG),
            data: NotificationData {
                url: String::from(url),
            },
        }
    }

    #[derive(Default)]
    struct RecordingRuntime {
        permission: Permission,
        windows: Vec<WindowClient>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingRuntime {
        fn record(&self, call: String) -> Result<(), Error> {
            self.calls.lock().unwrap().push(call);
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkerRuntime for RecordingRuntime {
        fn permission(&self) -> Permission {
            self.permission
        }

        async fn show_notification(
            &self,
            notification: &Notification,
        ) -> Result<(), Error> {
            self.record(format!("show {}", notification.title))
        }

        async fn close_notification(
            &self,
            notification: &Notification,
        ) -> Result<(), Error> {
            self.record(format!("close {}", notification.tag))
        }

        async fn window_clients(&self) -> Result<Vec<WindowClient>, Error> {
            Ok(self.windows.clone())
        }

        async fn focus(&self, client: &WindowClient) -> Result<(), Error> {
            self.record(format!("focus {}", client.id))
        }

        async fn open_window(&self, url: &str) -> Result<(), Error> {
            self.record(format!("open {}", url))
        }

        async fn skip_waiting(&self) -> Result<(), Error> {
            self.record(String::from("skip-waiting"))
        }

        async fn claim_clients(&self) -> Result<(), Error> {
            self.record(String::from("claim"))
        }
    }

    #[test]
    fn test_push_builds_notification_with_defaults() {
        let data = r#"{"title":"X","body":"Y","url":"/z","image":"http://i"}"#;
        let shown = handler().on_push(Permission::Granted, Some(data)).unwrap();

        assert_eq!(
            shown,
            Notification {
                title: String::from("X"),
                body: String::from("Y"),
                icon: String::from("/icons/icon-192x192.png"),
                image: Some(String::from("http://i")),
                tag: String::from("news-update"),
                data: NotificationData {
                    url: String::from("/z"),
                },
            }
        );
    }

    #[test]
    fn test_push_payload_can_override_icon_and_tag() {
        let data = r#"{"title":"X","body":"Y","icon":"/a.png","tag":"alerts"}"#;
        let shown = handler().on_push(Permission::Granted, Some(data)).unwrap();

        assert_eq!(shown.icon, "/a.png");
        assert_eq!(shown.tag, "alerts");
        assert_eq!(shown.data.url, "/");
    }

    #[test]
    fn test_push_is_ignored_without_permission_or_valid_data() {
        let data = r#"{"title":"X","body":"Y"}"#;
        let handler = handler();

        assert!(handler.on_push(Permission::Default, Some(data)).is_none());
        assert!(handler.on_push(Permission::Denied, Some(data)).is_none());
        assert!(handler.on_push(Permission::Granted, None).is_none());
        assert!(handler
            .on_push(Permission::Granted, Some("not json"))
            .is_none());
        assert!(handler
            .on_push(Permission::Granted, Some(r#"{"title":"X"}"#))
            .is_none());
    }

    #[test]
    fn test_click_focuses_matching_window() {
        let windows = vec![
            WindowClient {
                id: String::from("home"),
                url: String::from("https://news.example/"),
            },
            WindowClient {
                id: String::from("story"),
                url: String::from("https://news.example/news/42"),
            },
        ];

        let action =
            handler()
                .on_notification_click(&notification("/news/42"), &windows);
        assert_eq!(action, ClickAction::Focus(windows[1].clone()));
    }

    #[test]
    fn test_click_opens_window_when_none_match() {
        let windows = vec![WindowClient {
            id: String::from("home"),
            url: String::from("https://news.example/"),
        }];

        let action =
            handler().on_notification_click(&notification("/news/7"), &windows);
        assert_eq!(
            action,
            ClickAction::OpenWindow(String::from("https://news.example/news/7"))
        );
    }

    #[test]
    fn test_install_and_activate_take_control() {
        assert_eq!(handler().on_install(), LifecycleAction::SkipWaiting);
        assert_eq!(handler().on_activate(), LifecycleAction::ClaimClients);
    }

    #[tokio::test]
    async fn test_run_executes_every_step() {
        let handler = handler();
        let runtime = RecordingRuntime {
            permission: Permission::Granted,
            windows: vec![WindowClient {
                id: String::from("home"),
                url: String::from("https://news.example/"),
            }],
            ..RecordingRuntime::default()
        };

        handler.run(&runtime, WorkerEvent::Install).await.unwrap();
        handler.run(&runtime, WorkerEvent::Activate).await.unwrap();
        handler
            .run(
                &runtime,
                WorkerEvent::Push(Some(String::from(
                    r#"{"title":"Hi","body":"x"}"#,
                ))),
            )
            .await
            .unwrap();
        handler
            .run(&runtime, WorkerEvent::Push(Some(String::from("{"))))
            .await
            .unwrap();
        handler
            .run(&runtime, WorkerEvent::NotificationClick(notification("/")))
            .await
            .unwrap();
        handler
            .run(
                &runtime,
                WorkerEvent::NotificationClick(notification("/sports")),
            )
            .await
            .unwrap();

        assert_eq!(
            runtime.calls(),
            vec![
                "skip-waiting",
                "claim",
                "show Hi",
                "close news-update",
                "focus home",
                "close news-update",
                "open https://news.example/sports",
            ]
        );
    }
}

//! Page-side subscription lifecycle.
//!
//! Permission moves `default -> granted | denied`; the subscription moves
//! `none -> active -> none`. The store row is only written after the platform
//! has really established the subscription.

use std::sync::Arc;

use tracing::{error, info};

use crate::{
    browser::platform::{Permission, PushPlatform},
    dao::SubscriptionStore,
    error::Error,
    types::PushSubscription,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    #[default]
    Unknown,
    Available,
    /// Terminal. Nothing else is attempted.
    NotAvailable,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LifecycleState {
    pub availability: Availability,
    pub permission: Permission,
    pub subscription: Option<PushSubscription>,
}

impl LifecycleState {
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

pub struct SubscriptionManager<P> {
    platform: P,
    store: Arc<dyn SubscriptionStore>,
    public_key: String,
    state: LifecycleState,
}

impl<P: PushPlatform> SubscriptionManager<P> {
    pub fn new(
        platform: P,
        store: Arc<dyn SubscriptionStore>,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            store,
            public_key: public_key.into(),
            state: LifecycleState::default(),
        }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Checks support, reads the current permission and, when already
    /// granted, picks up any subscription that survived locally.
    pub async fn initialize(&mut self) -> Result<&LifecycleState, Error> {
        if !self.platform.is_supported() {
            self.state.availability = Availability::NotAvailable;
            return Ok(&self.state);
        }

        self.state.availability = Availability::Available;
        self.state.permission = self.platform.permission();

        if self.state.permission == Permission::Granted {
            self.check_existing().await?;
        }

        Ok(&self.state)
    }

    /// Adopts an existing local subscription and re-syncs it to the store.
    /// The re-sync is best effort.
    pub async fn check_existing(&mut self) -> Result<bool, Error> {
        if self.state.availability == Availability::NotAvailable {
            return Ok(false);
        }

        let subscription = self.platform.get_subscription().await?;

        if let Some(subscription) = &subscription {
            if let Some(keys) = &subscription.keys {
                self.store.try_upsert(&subscription.endpoint, keys).await;
            }
        }

        self.state.subscription = subscription;
        Ok(self.state.is_subscribed())
    }

    /// Asks for permission and subscribes when it is granted. A denied or
    /// dismissed prompt leaves the state unsubscribed and is not retried.
    pub async fn request_permission(&mut self) -> Result<bool, Error> {
        if self.state.availability == Availability::NotAvailable {
            return Err(Error::PushUnsupported);
        }

        let permission = self.platform.request_permission().await?;
        self.state.permission = permission;

        if permission != Permission::Granted {
            info!("Notification permission {}", permission);
            return Ok(false);
        }

        self.subscribe_to_push().await?;
        Ok(true)
    }

    pub async fn subscribe_to_push(
        &mut self,
    ) -> Result<PushSubscription, Error> {
        if self.state.availability == Availability::NotAvailable {
            return Err(Error::PushUnsupported);
        }
        if self.state.permission != Permission::Granted {
            return Err(Error::PermissionDenied);
        }

        let subscription = match self.platform.get_subscription().await? {
            Some(existing) => existing,
            None => self.platform.subscribe(&self.public_key).await?,
        };

        let keys = subscription.keys.as_ref().ok_or_else(|| {
            Error::InvalidSubscription(String::from("missing keys"))
        })?;

        if !self.store.upsert(&subscription.endpoint, keys).await? {
            return Err(Error::InvalidSubscription(String::from(
                "incomplete endpoint or keys",
            )));
        }

        self.state.subscription = Some(subscription.clone());
        Ok(subscription)
    }

    /// Cancels the local subscription, then removes its row. Failures are
    /// logged only.
    pub async fn unsubscribe(&mut self) {
        if let Err(e) = self.try_unsubscribe().await {
            error!("Unsubscribe failed: {}", e);
        }
    }

    async fn try_unsubscribe(&mut self) -> Result<(), Error> {
        let subscription = match self.platform.get_subscription().await? {
            Some(subscription) => subscription,
            None => {
                self.state.subscription = None;
                return Ok(());
            },
        };

        if !self.platform.unsubscribe(&subscription).await? {
            return Err(Error::Platform(String::from("unsubscribe refused")));
        }
        self.state.subscription = None;
        self.store.delete_by_endpoint(&subscription.endpoint).await?;

        Ok(())
    }
}

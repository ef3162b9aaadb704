// src/notify.rs - Alert delivery: desktop-notification permission gate and follow-up request
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const FORWARD_HEAD_MESSAGE: &str = "Forward head posture detected. Straighten up.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPermission {
    Granted,
    Denied,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostureAlert {
    pub session: Uuid,
    // 1 for the first firing of the current sustained episode.
    pub firing: u64,
    pub raised_at: DateTime<Local>,
    pub message: &'static str,
}

pub trait Notifier: Send + Sync {
    fn permission(&self) -> NotificationPermission;

    fn show(&self, alert: &PostureAlert);

    fn follow_up(&self, _alert: &PostureAlert) {}
}

pub fn deliver(notifier: &dyn Notifier, alert: &PostureAlert) {
    match notifier.permission() {
        NotificationPermission::Granted => notifier.show(alert),
        NotificationPermission::Denied => debug!("Notification permission denied, alert #{} not shown", alert.firing),
        NotificationPermission::Unsupported => {
            debug!("Notifications unsupported, alert #{} not shown", alert.firing)
        }
    }
    notifier.follow_up(alert);
}

pub struct LogNotifier {
    permission: NotificationPermission,
    follow_up_delay: Duration,
    runtime: Option<Handle>,
}

impl LogNotifier {
    pub fn new(permission: NotificationPermission, follow_up_delay: Duration) -> Self {
        match permission {
            NotificationPermission::Granted => info!("Notification permission granted"),
            NotificationPermission::Denied => info!("Notification permission denied"),
            NotificationPermission::Unsupported => warn!("This environment does not support notifications"),
        }

        Self {
            permission,
            follow_up_delay,
            runtime: Handle::try_current().ok(),
        }
    }
}

impl Notifier for LogNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn show(&self, alert: &PostureAlert) {
        warn!(
            session = %alert.session,
            firing = alert.firing,
            "{}",
            alert.message
        );
    }

    fn follow_up(&self, alert: &PostureAlert) {
        let Some(runtime) = self.runtime.as_ref() else {
            return;
        };
        let delay = self.follow_up_delay;
        let firing = alert.firing;
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Follow-up request for alert #{} sent", firing);
        });
    }
}

pub struct RecordingNotifier {
    permission: NotificationPermission,
    shown: Mutex<Vec<PostureAlert>>,
    follow_ups: Mutex<u64>,
}

impl RecordingNotifier {
    pub fn new(permission: NotificationPermission) -> Self {
        Self {
            permission,
            shown: Mutex::new(Vec::new()),
            follow_ups: Mutex::new(0),
        }
    }

    pub fn shown(&self) -> Vec<PostureAlert> {
        self.shown.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn follow_ups(&self) -> u64 {
        *self.follow_ups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Notifier for RecordingNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn show(&self, alert: &PostureAlert) {
        self.shown.lock().unwrap_or_else(PoisonError::into_inner).push(alert.clone());
    }

    fn follow_up(&self, _alert: &PostureAlert) {
        *self.follow_ups.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}

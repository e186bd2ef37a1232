use std::time::{
    Duration,
    Instant,
};
use tokio::sync::mpsc;
use tracing::{
    error,
    info,
};

pub const TOAST_TTL: Duration = Duration::from_secs(6);
const MAX_TOASTS: usize = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ToastLevel {
    Loading,
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug)]
pub struct Toast {
    /// Toasts sharing a key replace each other, so a loading toast can turn
    /// into its success or error outcome in place.
    pub key: Option<&'static str>,
    pub level: ToastLevel,
    pub message: String,
    pub created_at: Instant,
}

impl Toast {
    pub fn new(key: Option<&'static str>, level: ToastLevel, message: impl Into<String>) -> Self {
        Self {
            key,
            level,
            message: message.into(),
            created_at: Instant::now(),
        }
    }

    fn expired(&self, now: Instant) -> bool {
        self.level != ToastLevel::Loading && now.duration_since(self.created_at) >= TOAST_TTL
    }
}

#[derive(Debug, Default)]
pub struct ToastQueue {
    toasts: Vec<Toast>,
}

impl ToastQueue {
    pub fn push(&mut self, toast: Toast) {
        if let Some(key) = toast.key
            && let Some(existing) = self.toasts.iter_mut().find(|t| t.key == Some(key))
        {
            *existing = toast;
            return;
        }
        self.toasts.push(toast);
        if self.toasts.len() > MAX_TOASTS {
            let drain = self.toasts.len() - MAX_TOASTS;
            self.toasts.drain(0..drain);
        }
    }

    /// Drops expired toasts, returning whether anything changed.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| !t.expired(now));
        before != self.toasts.len()
    }

    pub fn visible(&self) -> &[Toast] {
        &self.toasts
    }
}

/// Cloneable handle that background tasks use to surface progress.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Toast>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<Toast>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Toast>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn loading(&self, key: &'static str, message: impl Into<String>) {
        self.send(Toast::new(Some(key), ToastLevel::Loading, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(Toast::new(None, ToastLevel::Info, message));
    }

    pub fn success(&self, key: &'static str, message: impl Into<String>) {
        self.send(Toast::new(Some(key), ToastLevel::Success, message));
    }

    pub fn error(&self, key: &'static str, message: impl Into<String>) {
        self.send(Toast::new(Some(key), ToastLevel::Error, message));
    }

    fn send(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Error => error!(message = %toast.message, "toast"),
            _ => info!(message = %toast.message, "toast"),
        }
        // The UI may already be gone during shutdown.
        let _ = self.tx.send(toast);
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn push__same_key__replaces_in_place() {
        // given
        let mut queue = ToastQueue::default();
        queue.push(Toast::new(Some("join"), ToastLevel::Loading, "Approving USDC..."));
        queue.push(Toast::new(None, ToastLevel::Info, "other"));

        // when
        queue.push(Toast::new(Some("join"), ToastLevel::Success, "done"));

        // then
        let visible = queue.visible();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].message, "done");
        assert_eq!(visible[0].level, ToastLevel::Success);
    }

    #[test]
    fn prune__expires_finished_toasts_but_keeps_loading() {
        // given
        let mut queue = ToastQueue::default();
        queue.push(Toast::new(Some("join"), ToastLevel::Loading, "waiting"));
        queue.push(Toast::new(None, ToastLevel::Error, "boom"));

        // when
        let changed = queue.prune(Instant::now() + TOAST_TTL);

        // then
        assert!(changed);
        assert_eq!(queue.visible().len(), 1);
        assert_eq!(queue.visible()[0].level, ToastLevel::Loading);
    }

    #[test]
    fn push__caps_queue_length() {
        let mut queue = ToastQueue::default();
        for i in 0..(MAX_TOASTS + 3) {
            queue.push(Toast::new(None, ToastLevel::Info, format!("t{i}")));
        }
        assert_eq!(queue.visible().len(), MAX_TOASTS);
        assert_eq!(queue.visible()[0].message, "t3");
    }

    #[tokio::test]
    async fn notifier__delivers_toasts_in_order() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.loading("join", "a");
        notifier.success("join", "b");
        assert_eq!(rx.recv().await.unwrap().message, "a");
        assert_eq!(rx.recv().await.unwrap().message, "b");
    }
}

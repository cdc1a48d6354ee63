//! Dismissible in-app messages shown for failed or completed actions.

pub const TOAST_DURATION_MS: u32 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToastId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: ToastId,
    pub level: ToastLevel,
    pub message: String,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ToastQueue {
    toasts: Vec<Toast>,
    next_id: u64,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) -> ToastId {
        self.push(ToastLevel::Info, message.into())
    }

    pub fn error(&mut self, message: impl Into<String>) -> ToastId {
        self.push(ToastLevel::Error, message.into())
    }

    fn push(&mut self, level: ToastLevel, message: String) -> ToastId {
        self.next_id += 1;
        let id = ToastId(self.next_id);
        match level {
            ToastLevel::Info => tracing::info!(toast = %message),
            ToastLevel::Error => tracing::warn!(toast = %message),
        }
        self.toasts.push(Toast {
            id,
            level,
            message,
            duration_ms: TOAST_DURATION_MS,
        });
        id
    }

    pub fn dismiss(&mut self, id: ToastId) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.id != id);
        self.toasts.len() != before
    }

    pub fn active(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.toasts.last()
    }
}

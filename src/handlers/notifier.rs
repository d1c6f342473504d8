use std::sync::Mutex;

/// Channel for one-shot, user-visible notices (the page's alert box)
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Queues notices until the page picks them up. Each notice is handed out once.
#[derive(Default)]
pub struct NoticeBoard {
    pending: Mutex<Vec<String>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_all(&self) -> Vec<String> {
        match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for NoticeBoard {
    async fn notify(&self, message: &str) {
        log::info!("🔔 Notice for user: {}", message);
        match self.pending.lock() {
            Ok(mut pending) => pending.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
    }
}

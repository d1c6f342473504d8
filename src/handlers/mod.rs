pub mod kitchen;
pub mod notifier;

pub use kitchen::{KitchenOrchestrator, KitchenState};
pub use notifier::{NoticeBoard, Notifier};

pub mod telegram;

pub use telegram::{Attachment, NotifyError, TelegramNotifier};

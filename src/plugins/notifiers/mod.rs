// Notifier plugin implementations
pub mod discord;
pub mod email;
pub mod sms;

pub use discord::DiscordNotifier;
pub use email::EmailNotifier;
pub use sms::SmsNotifier;

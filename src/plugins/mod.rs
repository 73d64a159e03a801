pub mod dispatcher;
pub mod notifiers;
pub mod traits;

pub use dispatcher::{ChannelOutcome, DispatchReport, NotificationDispatcher};
pub use traits::{NotificationEvent, NotificationResult, NotifierPlugin};

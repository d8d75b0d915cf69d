pub mod message_ledger;
pub mod messaging;
pub mod notification_dispatcher;
pub mod read_state;
pub mod thread_registry;

pub use message_ledger::MessageLedger;
pub use messaging::{MessagingService, SendMessage};
pub use notification_dispatcher::{NotificationDispatcher, NotificationQuery};
pub use read_state::ReadStateTracker;
pub use thread_registry::ThreadRegistry;

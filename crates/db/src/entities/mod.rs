//! Database entities.

pub mod complaint;
pub mod history_entry;
pub mod notification;
pub mod user;

pub use complaint::Entity as Complaint;
pub use history_entry::Entity as HistoryEntry;
pub use notification::Entity as Notification;
pub use user::Entity as User;

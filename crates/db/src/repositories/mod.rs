//! Database repositories.

mod complaint;
mod history;
mod notification;
mod user;

pub use complaint::{ComplaintRepository, TransitionUpdate};
pub use history::HistoryRepository;
pub use notification::NotificationRepository;
pub use user::UserRepository;

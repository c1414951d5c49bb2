//! Business logic services.

pub mod complaint;
pub mod escalation;
pub mod notification;
pub mod projection;
pub mod user;

pub use complaint::{
    ActedByMeView, ComplaintOverview, ComplaintService, ComplaintTrack, CreateComplaintInput,
    LaterRejectedView, WorkflowStats,
};
pub use escalation::EscalationService;
pub use notification::NotificationService;
pub use projection::{ActorView, DeadlineView, HistoryEntryView};
pub use user::{CreateUserInput, UserService};

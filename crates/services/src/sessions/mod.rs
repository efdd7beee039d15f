mod service;
mod view;

// Public API of the session subsystem.
pub use service::{AnswerOutcome, LaunchOutcome, SessionService};
pub use view::{OrganizationOverview, SessionSummaryView, SessionWorkspace};

pub(crate) use service::load_session;

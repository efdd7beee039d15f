mod finding;
mod ids;
mod report;
mod response;
mod session;
mod template;

pub use ids::{
    AuditorId, OrganizationId, ParseIdError, QuestionId, ResponseId, SessionId, TemplateId,
};

pub use finding::Finding;
pub use report::NarrativeReport;
pub use response::{
    FindingResolution, FindingSeverity, Response, ResponseError, ResponsePatch, ResponseStatus,
};
pub use session::{AuditSession, AuditorRef, SessionError, SessionStatus};
pub use template::{
    Question, QuestionKind, Section, Template, TemplateError, decode_sections, encode_sections,
    sections_from_value,
};

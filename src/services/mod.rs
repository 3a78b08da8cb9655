pub mod audit_service;
pub mod org_service;
pub mod ticket_service;
pub mod user_service;

pub use audit_service::AuditService;
pub use org_service::{OrgService, OrgError};
pub use ticket_service::{TicketService, TicketError, TicketStatus};
pub use user_service::{UserService, UserError};

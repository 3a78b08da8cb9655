pub mod audit;
pub mod organization;
pub mod ticket;
pub mod user;

pub use audit::AuditEntry;
pub use organization::{MemberView, Organization, OrgMembershipView};
pub use ticket::{Tag, Ticket, TicketEvent};
pub use user::User;

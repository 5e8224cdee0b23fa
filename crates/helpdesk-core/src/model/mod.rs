mod attachment;
mod followup;
mod ticket;
mod user;

pub use attachment::{
    Attachment, AttachmentKind, AttachmentOwner, FileListing, NewAttachment, UploadedFile,
};
pub use followup::{Followup, FollowupDetail, FollowupType, NewFollowup};
pub use ticket::{
    NewTicket, Ticket, TicketDetail, TicketFields, TicketPriority, TicketStatus, TicketWithOwner,
};
pub use user::{NewUser, User, UserSummary};

pub mod messaging_service;

pub use messaging_service::{Collaborators, MessagingService};

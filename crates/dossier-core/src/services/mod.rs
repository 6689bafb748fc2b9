//! Services shared by every dossier client.

mod scheduling;

pub use scheduling::{AcceptTarget, SchedulingService};

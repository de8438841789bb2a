pub mod admin_commands;
pub mod form_flow;
pub mod setup_commands;
pub mod ticket_commands;
pub mod ticket_db;
pub mod ticket_service;

/// Hard cap on configured form questions per guild
pub const MAX_QUESTIONS: usize = 10;

/// How long the sequencer waits for each form answer when
/// `FORM_TIMEOUT_SECONDS` is not set
pub const DEFAULT_FORM_TIMEOUT_SECONDS: u64 = 5 * 60;

/// Grace window between closing a ticket and deleting its channel
pub const CLOSE_GRACE_SECONDS: u64 = 10;

pub const TICKET_CHANNEL_PREFIX: &str = "ticket-";

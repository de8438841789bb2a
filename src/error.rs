use thiserror::Error;

use crate::services::tickets::MAX_QUESTIONS;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("A maximum of {MAX_QUESTIONS} form questions are allowed")]
    TooManyQuestions,
    #[error("At least one question is required")]
    NoQuestions,
    #[error("Form-type tickets require a target channel")]
    MissingTargetChannel,
    #[error("You already have a form session in progress")]
    FormInProgress,
    #[error("Form session registry is poisoned")]
    PoisonedSessions,
}

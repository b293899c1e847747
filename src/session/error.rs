use crate::session::models::Screen;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Please enter your name and quiz code")]
    MissingNameOrCode,

    #[error("Join is not available on the {0} screen")]
    JoinUnavailable(Screen),

    #[error("A join request is already in flight")]
    JoinInFlight,

    #[error("Answer {0} is outside the answer slots")]
    InvalidAnswer(u8),

    #[error("No question to answer on the {0} screen")]
    NoQuestion(Screen),

    #[error("Answer already submitted for this question")]
    AlreadyAnswered,

    #[error("Session controller has shut down")]
    ControllerGone,
}

use tracing::{debug, info};

use crate::{
    client::{
        models::{AnswerRequest, AnswerResponse, JoinRequest, JoinResponse, QuestionPayload, QuizStateResponse},
        quiz_client_error::QuizClientError,
    },
    session::{
        error::SessionError,
        models::{
            ANSWER_SLOTS, AnswerSubmission, Participant, QUESTION_SECONDS, QuestionKey,
            QuestionView, Screen, ScoreState, SessionCode, SessionView, SubmissionState, Toast,
            ToastSeverity,
        },
        toast::ToastSlot,
    },
};

const JOINED_MESSAGE: &str = "Successfully joined! Waiting for quiz to start...";
const PREFILLED_MESSAGE: &str = "Quiz code filled from QR scan! Enter your name to join.";
const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit answer";

/// Outcome of applying a question fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionUpdate {
    /// Response belonged to a phase that has already been left.
    Stale,
    Unchanged,
    NewQuestion,
    Ended,
}

/// Answer in flight, tagged with the question it was given for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnswer {
    pub question: QuestionKey,
    pub submission: AnswerSubmission,
}

impl PendingAnswer {
    pub fn to_request(&self) -> AnswerRequest {
        AnswerRequest {
            quiz_id: self.submission.session_id.clone(),
            name: self.submission.display_name.clone(),
            answer: self.submission.answer_index,
            time_left: self.submission.time_remaining,
        }
    }
}

/// All mutable participant state and the rules for moving between screens.
///
/// Every remote response is applied through this type, so it decides on its
/// own whether a late or duplicated response still matters. `epoch` advances
/// on every screen phase change and responses carry the epoch they were
/// issued under.
#[derive(Debug)]
pub struct SessionState {
    screen: Screen,
    participant: Participant,
    code: SessionCode,
    question: Option<QuestionView>,
    time_left: u32,
    question_round: u64,
    selected_answer: Option<u8>,
    submission: SubmissionState,
    score: ScoreState,
    toast: ToastSlot,
    epoch: u64,
    join_in_flight: bool,
    start_detected: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Join,
            participant: Participant::default(),
            code: SessionCode::default(),
            question: None,
            time_left: QUESTION_SECONDS,
            question_round: 0,
            selected_answer: None,
            submission: SubmissionState::NotSubmitted,
            score: ScoreState::default(),
            toast: ToastSlot::default(),
            epoch: 0,
            join_in_flight: false,
            start_detected: false,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    /// Bumped whenever a new question is shown; the countdown restarts with it.
    pub fn question_round(&self) -> u64 {
        self.question_round
    }

    pub fn submission(&self) -> SubmissionState {
        self.submission
    }

    pub fn score(&self) -> ScoreState {
        self.score
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn question(&self) -> Option<&QuestionView> {
        self.question.as_ref()
    }

    pub fn toast(&self) -> Option<&Toast> {
        self.toast.current()
    }

    pub fn set_name(&mut self, raw: &str) {
        self.participant.set_display_name(raw);
    }

    pub fn set_code(&mut self, raw: &str) {
        if self.screen == Screen::Join {
            self.code = SessionCode::from_input(raw);
        }
    }

    /// Applies a code handed over at launch, e.g. from a scanned link.
    pub fn prefill_code(&mut self, raw: &str) {
        if raw.trim().is_empty() || self.screen != Screen::Join {
            return;
        }

        self.code = SessionCode::from_input(raw.trim());
        self.toast.show(PREFILLED_MESSAGE, ToastSeverity::Success);
    }

    pub fn expire_toast(&mut self, id: u64) -> bool {
        self.toast.expire(id)
    }

    pub fn begin_join(&mut self) -> Result<JoinRequest, SessionError> {
        if self.screen != Screen::Join {
            return Err(SessionError::JoinUnavailable(self.screen));
        }
        if self.join_in_flight {
            return Err(SessionError::JoinInFlight);
        }

        let name = self.participant.display_name().trim();
        if name.is_empty() || self.code.is_blank() {
            let error = SessionError::MissingNameOrCode;
            self.toast.show(error.to_string(), ToastSeverity::Error);
            return Err(error);
        }

        let request = JoinRequest {
            name: name.to_string(),
            code: self.code.normalized(),
        };

        self.join_in_flight = true;
        Ok(request)
    }

    pub fn join_succeeded(&mut self, response: JoinResponse) {
        self.join_in_flight = false;
        if self.screen != Screen::Join {
            return;
        }

        if response.quiz_id.trim().is_empty() {
            self.toast.show("Failed to join quiz", ToastSeverity::Error);
            return;
        }

        info!("Joined quiz {} as {}", response.quiz_id, self.participant.display_name().trim());
        self.participant.assign_session(response.quiz_id);
        self.enter(Screen::Waiting);
        self.toast.show(JOINED_MESSAGE, ToastSeverity::Success);
    }

    pub fn join_failed(&mut self, error: &QuizClientError) {
        self.join_in_flight = false;
        if self.screen == Screen::Join {
            self.toast.show(error.join_message(), ToastSeverity::Error);
        }
    }

    /// Session to poll for start, if the start poller should issue a request.
    pub fn start_poll_target(&self) -> Option<&str> {
        match (self.screen, self.start_detected) {
            (Screen::Waiting, false) => self.participant.session_id(),
            _ => None,
        }
    }

    /// Returns true exactly once, when the quiz is first seen as started.
    pub fn start_polled(&mut self, epoch: u64, response: QuizStateResponse) -> bool {
        if epoch != self.epoch || self.start_poll_target().is_none() {
            return false;
        }

        if !response.has_started() {
            debug!("Quiz not started yet");
            return false;
        }

        info!("Quiz started at index {}", response.current_index);
        self.start_detected = true;
        true
    }

    /// The start-triggered fetch failed; let the start poller try again.
    pub fn start_fetch_failed(&mut self, epoch: u64) {
        if epoch == self.epoch && self.screen == Screen::Waiting {
            self.start_detected = false;
        }
    }

    /// Session to poll for the next question, if the refresh poller is live.
    pub fn refresh_target(&self) -> Option<&str> {
        if self.screen.is_question_phase() {
            return self.participant.session_id();
        }
        None
    }

    pub fn question_fetched(
        &mut self,
        epoch: u64,
        payload: Option<QuestionPayload>,
    ) -> QuestionUpdate {
        let expecting = match self.screen {
            Screen::Waiting => self.start_detected,
            Screen::Question | Screen::AnswerSubmitted => true,
            Screen::Join | Screen::Final => false,
        };
        if epoch != self.epoch || !expecting {
            return QuestionUpdate::Stale;
        }

        let Some(view) = payload.and_then(QuestionView::from_payload) else {
            info!("No current question, quiz has ended");
            self.enter(Screen::Final);
            return QuestionUpdate::Ended;
        };

        let same_question = self
            .question
            .as_ref()
            .is_some_and(|current| current.key == view.key);
        if self.screen.is_question_phase() && same_question {
            return QuestionUpdate::Unchanged;
        }

        info!("New question: {}", view.question_text);
        if self.screen == Screen::Waiting {
            self.enter(Screen::Question);
        } else {
            self.screen = Screen::Question;
        }

        self.question = Some(view);
        self.time_left = QUESTION_SECONDS;
        self.question_round += 1;
        self.submission = SubmissionState::NotSubmitted;
        self.selected_answer = None;
        self.score.last_answer_correct = false;

        QuestionUpdate::NewQuestion
    }

    pub fn countdown_active(&self) -> bool {
        self.screen == Screen::Question && !self.submission.is_answered() && self.time_left > 0
    }

    pub fn tick_countdown(&mut self) -> bool {
        if !self.countdown_active() {
            return false;
        }

        self.time_left -= 1;
        true
    }

    pub fn begin_submission(&mut self, answer_index: u8) -> Result<PendingAnswer, SessionError> {
        if self.screen != Screen::Question {
            return Err(SessionError::NoQuestion(self.screen));
        }
        if !self.submission.accepts_submission() {
            return Err(SessionError::AlreadyAnswered);
        }
        if answer_index >= ANSWER_SLOTS {
            return Err(SessionError::InvalidAnswer(answer_index));
        }

        let (Some(question), Some(session_id)) = (&self.question, self.participant.session_id())
        else {
            return Err(SessionError::NoQuestion(self.screen));
        };

        let pending = PendingAnswer {
            question: question.key.clone(),
            submission: AnswerSubmission {
                session_id: session_id.to_string(),
                display_name: self.participant.display_name().to_string(),
                answer_index,
                time_remaining: self.time_left,
            },
        };

        self.selected_answer = Some(answer_index);
        self.submission = SubmissionState::Pending;
        Ok(pending)
    }

    pub fn submission_succeeded(&mut self, question: &QuestionKey, response: AnswerResponse) {
        self.score.score = self.score.score.max(response.score);

        if self.screen == Screen::Final {
            debug!("Quiz already ended; keeping only the score from the answer result");
            return;
        }
        if !self.is_pending_for(question) {
            debug!("Ignoring late answer result for a previous question");
            return;
        }

        self.score.last_answer_correct = response.correct;
        self.submission = SubmissionState::Submitted;
        self.screen = Screen::AnswerSubmitted;
    }

    pub fn submission_failed(&mut self, question: &QuestionKey) {
        if self.screen == Screen::Final {
            return;
        }

        self.toast.show(SUBMIT_FAILED_MESSAGE, ToastSeverity::Error);
        if self.is_pending_for(question) {
            self.submission = SubmissionState::Failed;
            self.selected_answer = None;
        }
    }

    fn is_pending_for(&self, question: &QuestionKey) -> bool {
        self.submission == SubmissionState::Pending
            && self
                .question
                .as_ref()
                .is_some_and(|current| &current.key == question)
    }

    fn enter(&mut self, screen: Screen) {
        debug!("Screen {} -> {}", self.screen, screen);
        self.screen = screen;
        self.epoch += 1;
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            screen: self.screen,
            display_name: self.participant.display_name().to_string(),
            code: self.code.as_str().to_string(),
            question_text: self.question.as_ref().map(|q| q.question_text.clone()),
            time_left: self.time_left,
            selected_answer: self.selected_answer,
            is_answered: self.submission.is_answered(),
            submission: self.submission,
            score: self.score,
            toast: self.toast.current().cloned(),
        }
    }
}

use std::{sync::Arc, time::Duration};

use futures::{
    FutureExt, StreamExt,
    future::BoxFuture,
    stream::FuturesUnordered,
};
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    client::{
        models::{AnswerResponse, JoinRequest, JoinResponse, QuestionPayload, QuizStateResponse},
        quiz_client::QuizApi,
        quiz_client_error::QuizClientError,
    },
    config::config::LaunchConfig,
    session::{
        error::SessionError,
        models::{QuestionKey, Screen, SessionCommand, SessionView},
        state::{PendingAnswer, QuestionUpdate, SessionState},
        toast::TOAST_LIFETIME,
    },
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub poll_interval: Duration,
    pub countdown_tick: Duration,
    pub toast_lifetime: Duration,
}

impl SessionTimings {
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Self::default()
        }
    }
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            countdown_tick: COUNTDOWN_TICK,
            toast_lifetime: TOAST_LIFETIME,
        }
    }
}

/// Cheap handle the presentation layer uses to drive and observe a session.
/// Dropping every handle tears the controller down.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    views: watch::Receiver<SessionView>,
}

impl SessionHandle {
    pub fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::ControllerGone)
    }

    pub fn set_name(&self, name: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::SetName(name.into()))
    }

    pub fn set_code(&self, code: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::SetCode(code.into()))
    }

    pub fn join(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Join)
    }

    pub fn submit_answer(&self, answer_index: u8) -> Result<(), SessionError> {
        self.send(SessionCommand::SubmitAnswer(answer_index))
    }

    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Shutdown)
    }

    pub fn view(&self) -> SessionView {
        self.views.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.views.clone()
    }
}

enum Completion {
    Joined(Result<JoinResponse, QuizClientError>),
    StatePolled {
        epoch: u64,
        result: Result<QuizStateResponse, QuizClientError>,
    },
    QuestionFetched {
        epoch: u64,
        result: Result<Option<QuestionPayload>, QuizClientError>,
    },
    Answered {
        question: QuestionKey,
        result: Result<AnswerResponse, QuizClientError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollKind {
    Start,
    Refresh,
}

struct Poller {
    kind: PollKind,
    epoch: u64,
    interval: Interval,
}

impl Poller {
    fn new(kind: PollKind, epoch: u64, period: Duration) -> Self {
        // First tick one full period after arming.
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            kind,
            epoch,
            interval,
        }
    }
}

struct Countdown {
    round: u64,
    deadline: Instant,
}

struct ToastExpiry {
    id: u64,
    deadline: Instant,
}

/// Drives one participant session on a single task.
///
/// Commands, poll ticks, countdown ticks, toast expiry and request completions
/// are all handled by one `select!` loop. After every event the live timers
/// are reconciled against [`SessionState`], so a timer never outlives the
/// screen that armed it. Requests run concurrently in `in_flight` and their
/// results are applied in completion order.
pub struct SessionController {
    api: Arc<dyn QuizApi>,
    state: SessionState,
    timings: SessionTimings,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    views: watch::Sender<SessionView>,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
    poller: Option<Poller>,
    countdown: Option<Countdown>,
    toast_expiry: Option<ToastExpiry>,
}

impl SessionController {
    pub fn new(api: Arc<dyn QuizApi>, timings: SessionTimings) -> (Self, SessionHandle) {
        let state = SessionState::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(state.view());

        let controller = Self {
            api,
            state,
            timings,
            commands: command_rx,
            views: view_tx,
            in_flight: FuturesUnordered::new(),
            poller: None,
            countdown: None,
            toast_expiry: None,
        };

        let handle = SessionHandle {
            commands: command_tx,
            views: view_rx,
        };

        (controller, handle)
    }

    /// Consumes launch parameters so they only ever apply once.
    pub fn apply_launch(&mut self, launch: &mut LaunchConfig) {
        if let Some(name) = launch.name.take() {
            self.state.set_name(&name);
        }

        if let Some(code) = launch.code.take() {
            info!("Prefilling join code from launch parameters");
            self.state.prefill_code(&code);
        }

        self.sync();
    }

    pub async fn run(mut self) {
        info!("Session controller started");
        self.sync();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.handle_completion(completion);
                }
                kind = next_poll(&mut self.poller) => self.handle_poll(kind),
                round = next_countdown(&self.countdown) => {
                    self.countdown = None;
                    if self.state.question_round() == round {
                        self.state.tick_countdown();
                    }
                }
                id = next_toast_expiry(&self.toast_expiry) => {
                    self.toast_expiry = None;
                    self.state.expire_toast(id);
                }
            }

            self.sync();
        }

        info!(
            "Session controller stopped on {} screen with {} request(s) in flight",
            self.state.screen(),
            self.in_flight.len()
        );
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SetName(name) => self.state.set_name(&name),
            SessionCommand::SetCode(code) => self.state.set_code(&code),
            SessionCommand::Join => match self.state.begin_join() {
                Ok(request) => self.request_join(request),
                Err(e) => debug!("Join not sent: {}", e),
            },
            SessionCommand::SubmitAnswer(answer_index) => {
                match self.state.begin_submission(answer_index) {
                    Ok(pending) => self.request_answer(pending),
                    Err(e) => debug!("Answer not sent: {}", e),
                }
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn handle_poll(&mut self, kind: PollKind) {
        match kind {
            PollKind::Start => {
                if let Some(quiz_id) = self.state.start_poll_target().map(str::to_string) {
                    self.request_state(quiz_id);
                }
            }
            PollKind::Refresh => {
                if let Some(quiz_id) = self.state.refresh_target().map(str::to_string) {
                    self.request_question(quiz_id);
                }
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Joined(Ok(response)) => self.state.join_succeeded(response),
            Completion::Joined(Err(e)) => {
                warn!("Failed to join quiz: {}", e);
                self.state.join_failed(&e);
            }
            Completion::StatePolled { epoch, result } => match result {
                Ok(response) => {
                    if !self.state.start_polled(epoch, response) {
                        return;
                    }
                    if let Some(quiz_id) = self.state.participant().session_id() {
                        let quiz_id = quiz_id.to_string();
                        self.request_question(quiz_id);
                    }
                }
                Err(e) => warn!("Error polling quiz state: {}", e),
            },
            Completion::QuestionFetched { epoch, result } => match result {
                Ok(payload) => match self.state.question_fetched(epoch, payload) {
                    QuestionUpdate::Stale => debug!("Dropped question response from a previous phase"),
                    QuestionUpdate::Unchanged => {}
                    QuestionUpdate::NewQuestion => debug!("Question changed, countdown reset"),
                    QuestionUpdate::Ended => info!("Quiz finished"),
                },
                Err(e) => {
                    warn!("Error fetching question: {}", e);
                    self.state.start_fetch_failed(epoch);
                }
            },
            Completion::Answered { question, result } => match result {
                Ok(response) => self.state.submission_succeeded(&question, response),
                Err(e) => {
                    error!("Failed to submit answer: {}", e);
                    self.state.submission_failed(&question);
                }
            },
        }
    }

    fn request_join(&mut self, request: JoinRequest) {
        debug!("Joining quiz with code {}", request.code);
        let api = Arc::clone(&self.api);
        self.in_flight.push(
            async move { Completion::Joined(api.join(&request).await) }.boxed(),
        );
    }

    fn request_state(&mut self, quiz_id: String) {
        let api = Arc::clone(&self.api);
        let epoch = self.state.epoch();
        self.in_flight.push(
            async move {
                let result = api.quiz_state(&quiz_id).await;
                Completion::StatePolled { epoch, result }
            }
            .boxed(),
        );
    }

    fn request_question(&mut self, quiz_id: String) {
        let api = Arc::clone(&self.api);
        let epoch = self.state.epoch();
        self.in_flight.push(
            async move {
                let result = api.current_question(&quiz_id).await;
                Completion::QuestionFetched { epoch, result }
            }
            .boxed(),
        );
    }

    fn request_answer(&mut self, pending: PendingAnswer) {
        info!(
            "Submitting answer {} with {}s left",
            pending.submission.answer_index, pending.submission.time_remaining
        );
        let api = Arc::clone(&self.api);
        self.in_flight.push(
            async move {
                let result = api.submit_answer(&pending.to_request()).await;
                Completion::Answered {
                    question: pending.question,
                    result,
                }
            }
            .boxed(),
        );
    }

    fn sync(&mut self) {
        self.reconcile_poller();
        self.reconcile_countdown();
        self.reconcile_toast();

        let next = self.state.view();
        self.views.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn reconcile_poller(&mut self) {
        let wanted = match self.state.screen() {
            Screen::Waiting if self.state.start_poll_target().is_some() => Some(PollKind::Start),
            Screen::Question | Screen::AnswerSubmitted => Some(PollKind::Refresh),
            _ => None,
        };
        let epoch = self.state.epoch();

        match (&self.poller, wanted) {
            (Some(poller), Some(kind)) if poller.kind == kind && poller.epoch == epoch => {}
            (_, Some(kind)) => {
                debug!("Arming {:?} poller", kind);
                self.poller = Some(Poller::new(kind, epoch, self.timings.poll_interval));
            }
            (Some(poller), None) => {
                debug!("Stopping {:?} poller", poller.kind);
                self.poller = None;
            }
            (None, None) => {}
        }
    }

    fn reconcile_countdown(&mut self) {
        if !self.state.countdown_active() {
            self.countdown = None;
            return;
        }

        let round = self.state.question_round();
        if self.countdown.as_ref().is_some_and(|c| c.round == round) {
            return;
        }

        self.countdown = Some(Countdown {
            round,
            deadline: Instant::now() + self.timings.countdown_tick,
        });
    }

    fn reconcile_toast(&mut self) {
        let Some(toast) = self.state.toast() else {
            self.toast_expiry = None;
            return;
        };

        if self.toast_expiry.as_ref().is_some_and(|e| e.id == toast.id) {
            return;
        }

        self.toast_expiry = Some(ToastExpiry {
            id: toast.id,
            deadline: Instant::now() + self.timings.toast_lifetime,
        });
    }
}

async fn next_poll(poller: &mut Option<Poller>) -> PollKind {
    match poller {
        Some(poller) => {
            poller.interval.tick().await;
            poller.kind
        }
        None => std::future::pending().await,
    }
}

async fn next_countdown(countdown: &Option<Countdown>) -> u64 {
    match countdown {
        Some(countdown) => {
            tokio::time::sleep_until(countdown.deadline).await;
            countdown.round
        }
        None => std::future::pending().await,
    }
}

async fn next_toast_expiry(expiry: &Option<ToastExpiry>) -> u64 {
    match expiry {
        Some(expiry) => {
            tokio::time::sleep_until(expiry.deadline).await;
            expiry.id
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use reqwest::StatusCode;
    use tokio::time::{Instant, sleep};
    use tracing::level_filters::LevelFilter;

    use crate::{
        client::models::{AnswerRequest, JoinRequest},
        config::config::LaunchConfig,
        session::{
            controller::{SessionController, SessionHandle, SessionTimings},
            error::SessionError,
            models::{Screen, SessionView, SubmissionState},
        },
        tests::fake_api::{Call, FakeError, FakeQuizApi, is_answer, is_question, is_state},
    };

    fn setup_logging() {
        let _ = tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(LevelFilter::DEBUG)
            .with_test_writer()
            .try_init();
    }

    fn start(api: &Arc<FakeQuizApi>) -> SessionHandle {
        setup_logging();
        let (controller, handle) = SessionController::new(api.clone(), SessionTimings::default());
        tokio::spawn(controller.run());
        handle
    }

    async fn wait_for(
        handle: &SessionHandle,
        predicate: impl FnMut(&SessionView) -> bool,
    ) -> SessionView {
        let mut views = handle.subscribe();
        let view = views
            .wait_for(predicate)
            .await
            .expect("controller stopped")
            .clone();
        view
    }

    async fn join(handle: &SessionHandle) -> SessionView {
        handle.set_name("Amy").unwrap();
        handle.set_code("ab12cd").unwrap();
        handle.join().unwrap();
        wait_for(handle, |v| v.screen == Screen::Waiting).await
    }

    async fn join_and_start(handle: &SessionHandle) -> SessionView {
        join(handle).await;
        wait_for(handle, |v| v.screen == Screen::Question).await
    }

    #[tokio::test(start_paused = true)]
    async fn join_uppercases_code_and_enters_waiting() {
        let api = FakeQuizApi::new();
        api.join_ok("Q1").state(false, 0);
        let handle = start(&api);

        let view = join(&handle).await;

        assert_eq!(
            api.calls()[0],
            Call::Join(JoinRequest {
                name: "Amy".into(),
                code: "AB12CD".into(),
            })
        );
        assert_eq!(view.screen, Screen::Waiting);
        assert_eq!(
            view.toast.unwrap().message,
            "Successfully joined! Waiting for quiz to start..."
        );

        sleep(Duration::from_millis(2100)).await;
        assert_eq!(api.calls()[1], Call::State("Q1".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_join_stays_on_join_and_toast_expires() {
        let api = FakeQuizApi::new();
        api.join_err(FakeError::Rejected("Quiz not found".into()));
        let handle = start(&api);

        handle.set_name("Amy").unwrap();
        handle.set_code("zzzzzz").unwrap();
        handle.join().unwrap();

        let view = wait_for(&handle, |v| v.toast.is_some()).await;
        let shown_at = Instant::now();
        assert_eq!(view.screen, Screen::Join);
        assert_eq!(view.toast.unwrap().message, "Quiz not found");
        assert_eq!(api.calls().len(), 1);

        sleep(Duration::from_millis(2900)).await;
        assert!(handle.view().toast.is_some());

        wait_for(&handle, |v| v.toast.is_none()).await;
        assert_eq!(shown_at.elapsed(), Duration::from_secs(3));

        sleep(Duration::from_secs(10)).await;
        assert_eq!(api.calls().len(), 1);
        assert_eq!(handle.view().screen, Screen::Join);
    }

    #[tokio::test(start_paused = true)]
    async fn join_without_json_error_uses_generic_message() {
        let api = FakeQuizApi::new();
        api.join_err(FakeError::Status(StatusCode::INTERNAL_SERVER_ERROR));
        let handle = start(&api);

        handle.set_name("Amy").unwrap();
        handle.set_code("ab12cd").unwrap();
        handle.join().unwrap();

        let view = wait_for(&handle, |v| v.toast.is_some()).await;
        assert_eq!(view.toast.unwrap().message, "Failed to join quiz");
        assert_eq!(view.screen, Screen::Join);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_name_never_reaches_server() {
        let api = FakeQuizApi::new();
        let handle = start(&api);

        handle.set_code("ab12cd").unwrap();
        handle.join().unwrap();

        let view = wait_for(&handle, |v| v.toast.is_some()).await;
        assert_eq!(
            view.toast.unwrap().message,
            "Please enter your name and quiz code"
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_toast_replaces_older_one() {
        let api = FakeQuizApi::new();
        let handle = start(&api);

        handle.join().unwrap();
        let first = wait_for(&handle, |v| v.toast.is_some()).await.toast.unwrap();
        let first_at = Instant::now();

        sleep(Duration::from_secs(2)).await;
        handle.join().unwrap();
        let second = wait_for(&handle, |v| v.toast.as_ref().is_some_and(|t| t.id != first.id))
            .await
            .toast
            .unwrap();

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(handle.view().toast.map(|t| t.id), Some(second.id));

        wait_for(&handle, |v| v.toast.is_none()).await;
        assert_eq!(first_at.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn start_detected_on_fourth_poll_fetches_once() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1")
            .state(false, -1)
            .state(false, -1)
            .state(false, -1)
            .state(true, 0);
        api.question("Q1");
        let handle = start(&api);

        join(&handle).await;
        let joined_at = Instant::now();

        let view = wait_for(&handle, |v| v.screen == Screen::Question).await;
        assert_eq!(joined_at.elapsed(), Duration::from_secs(8));
        assert_eq!(view.question_text.as_deref(), Some("Q1"));
        assert_eq!(view.time_left, 20);

        let calls = api.calls();
        assert_eq!(calls.len(), 6);
        assert!(calls[1..5].iter().all(is_state));
        assert_eq!(calls[5], Call::Question("QUIZ-1".into()));

        // Start polling is over; only the refresh poller runs now.
        sleep(Duration::from_secs(5)).await;
        assert_eq!(api.count(is_state), 4);
        assert_eq!(api.count(is_question), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn negative_index_keeps_waiting() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(true, -1);
        let handle = start(&api);

        join(&handle).await;
        sleep(Duration::from_millis(20_500)).await;

        assert_eq!(handle.view().screen, Screen::Waiting);
        assert_eq!(api.count(is_state), 10);
        assert_eq!(api.count(is_question), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn state_poll_errors_do_not_stop_polling() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1")
            .state_err(FakeError::Status(StatusCode::BAD_GATEWAY))
            .state_err(FakeError::Status(StatusCode::BAD_GATEWAY))
            .state(true, 0);
        api.question("Q1");
        let handle = start(&api);

        join(&handle).await;
        let joined_at = Instant::now();
        wait_for(&handle, |v| v.screen == Screen::Question).await;

        assert_eq!(joined_at.elapsed(), Duration::from_secs(6));
        assert_eq!(api.count(is_state), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_fetch_retries_on_next_tick() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(true, 0);
        api.question_err(FakeError::Status(StatusCode::INTERNAL_SERVER_ERROR))
            .question("Q1");
        let handle = start(&api);

        join(&handle).await;
        let joined_at = Instant::now();
        sleep(Duration::from_millis(2500)).await;
        assert_eq!(handle.view().screen, Screen::Waiting);

        wait_for(&handle, |v| v.screen == Screen::Question).await;
        assert_eq!(joined_at.elapsed(), Duration::from_secs(4));
        assert_eq!(api.count(is_state), 2);
        assert_eq!(api.count(is_question), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn same_question_is_noop_and_new_question_resets() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(true, 0);
        api.question("Q1").question("Q1").question("Q1").question("Q2");
        let handle = start(&api);

        join_and_start(&handle).await;
        let shown_at = Instant::now();

        sleep(Duration::from_millis(5500)).await;
        let view = handle.view();
        assert_eq!(api.count(is_question), 3);
        assert_eq!(view.question_text.as_deref(), Some("Q1"));
        assert_eq!(view.time_left, 15);

        let view = wait_for(&handle, |v| v.question_text.as_deref() == Some("Q2")).await;
        assert_eq!(shown_at.elapsed(), Duration::from_secs(6));
        assert_eq!(view.screen, Screen::Question);
        assert_eq!(view.time_left, 20);
        assert!(!view.is_answered);
        assert_eq!(view.selected_answer, None);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_result_updates_score() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(true, 0).question("Q1");
        api.answer_ok(true, 300.0);
        let handle = start(&api);

        join_and_start(&handle).await;
        sleep(Duration::from_millis(6500)).await;
        assert_eq!(handle.view().time_left, 14);

        handle.submit_answer(2).unwrap();
        let view = wait_for(&handle, |v| v.screen == Screen::AnswerSubmitted).await;

        assert_eq!(view.score.score, 300.0);
        assert!(view.score.last_answer_correct);
        assert_eq!(view.selected_answer, Some(2));
        assert_eq!(view.submission, SubmissionState::Submitted);

        let answers: Vec<Call> = api.calls().into_iter().filter(is_answer).collect();
        assert_eq!(
            answers,
            vec![Call::Answer(AnswerRequest {
                quiz_id: "QUIZ-1".into(),
                name: "Amy".into(),
                answer: 2,
                time_left: 14,
            })]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_submit_sends_one_answer() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(true, 0).question("Q1");
        api.answer_ok(false, 0.0);
        let gate = api.gate_answers();
        let handle = start(&api);

        join_and_start(&handle).await;
        handle.submit_answer(1).unwrap();
        handle.submit_answer(1).unwrap();
        handle.submit_answer(3).unwrap();

        let view = wait_for(&handle, |v| v.is_answered).await;
        assert_eq!(view.selected_answer, Some(1));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(api.count(is_answer), 1);

        gate.notify_one();
        let view = wait_for(&handle, |v| v.screen == Screen::AnswerSubmitted).await;
        assert_eq!(view.selected_answer, Some(1));
        assert!(!view.score.last_answer_correct);
        assert_eq!(api.count(is_answer), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submission_can_be_retried() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(true, 0).question("Q1");
        api.answer_err(FakeError::Status(StatusCode::INTERNAL_SERVER_ERROR))
            .answer_ok(true, 100.0);
        let handle = start(&api);

        join_and_start(&handle).await;
        handle.submit_answer(0).unwrap();

        let view = wait_for(&handle, |v| v.submission == SubmissionState::Failed).await;
        assert_eq!(view.toast.unwrap().message, "Failed to submit answer");
        assert!(!view.is_answered);
        assert_eq!(view.screen, Screen::Question);

        handle.submit_answer(1).unwrap();
        let view = wait_for(&handle, |v| v.screen == Screen::AnswerSubmitted).await;
        assert_eq!(view.score.score, 100.0);
        assert_eq!(api.count(is_answer), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_stops_at_zero_without_submitting() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(true, 0).question("Q1");
        let handle = start(&api);

        join_and_start(&handle).await;
        let shown_at = Instant::now();

        wait_for(&handle, |v| v.time_left == 0).await;
        assert_eq!(shown_at.elapsed(), Duration::from_secs(20));

        sleep(Duration::from_secs(5)).await;
        let view = handle.view();
        assert_eq!(view.time_left, 0);
        assert_eq!(view.screen, Screen::Question);
        assert_eq!(api.count(is_answer), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_freezes_once_answered() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(true, 0).question("Q1");
        api.answer_ok(true, 50.0);
        let _gate = api.gate_answers();
        let handle = start(&api);

        join_and_start(&handle).await;
        sleep(Duration::from_millis(3500)).await;
        handle.submit_answer(0).unwrap();
        wait_for(&handle, |v| v.is_answered).await;

        sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.view().time_left, 17);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_question_ends_quiz_after_answer() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(true, 0);
        api.question("Q1").no_question();
        api.answer_ok(true, 200.0);
        let handle = start(&api);

        join_and_start(&handle).await;
        let shown_at = Instant::now();
        handle.submit_answer(3).unwrap();
        wait_for(&handle, |v| v.screen == Screen::AnswerSubmitted).await;

        let view = wait_for(&handle, |v| v.screen == Screen::Final).await;
        assert_eq!(shown_at.elapsed(), Duration::from_secs(2));
        assert_eq!(view.score.score, 200.0);

        let fetches = api.count(is_question);
        sleep(Duration::from_secs(10)).await;
        assert_eq!(api.count(is_question), fetches);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_result_after_final_keeps_final() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(true, 0);
        api.question("Q1").no_question();
        api.answer_ok(true, 150.5);
        let gate = api.gate_answers();
        let handle = start(&api);

        join_and_start(&handle).await;
        handle.submit_answer(1).unwrap();
        wait_for(&handle, |v| v.is_answered).await;
        wait_for(&handle, |v| v.screen == Screen::Final).await;
        let fetches = api.count(is_question);

        gate.notify_one();
        let view = wait_for(&handle, |v| v.score.score > 0.0).await;
        assert_eq!(view.screen, Screen::Final);
        assert_eq!(view.score.score, 150.5);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.view().screen, Screen::Final);
        assert_eq!(api.count(is_question), fetches);
        assert_eq!(api.count(is_answer), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quiz_without_questions_ends_from_waiting() {
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(true, 0).no_question();
        let handle = start(&api);

        join(&handle).await;
        let view = wait_for(&handle, |v| v.screen == Screen::Final).await;

        assert_eq!(view.question_text, None);
        sleep(Duration::from_secs(10)).await;
        assert_eq!(api.count(is_state), 1);
        assert_eq!(api.count(is_question), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn launch_code_is_consumed_once() {
        setup_logging();
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(false, 0);
        let (mut controller, handle) =
            SessionController::new(api.clone(), SessionTimings::default());

        let mut launch = LaunchConfig {
            code: Some("ab12cd".into()),
            name: None,
        };
        controller.apply_launch(&mut launch);
        assert!(launch.code.is_none());

        let view = handle.view();
        assert_eq!(view.code, "AB12CD");
        assert_eq!(
            view.toast.unwrap().message,
            "Quiz code filled from QR scan! Enter your name to join."
        );

        tokio::spawn(controller.run());
        handle.set_name("Amy").unwrap();
        handle.join().unwrap();
        wait_for(&handle, |v| v.screen == Screen::Waiting).await;

        assert_eq!(
            api.calls()[0],
            Call::Join(JoinRequest {
                name: "Amy".into(),
                code: "AB12CD".into(),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_all_timers() {
        setup_logging();
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(false, 0);
        let (controller, handle) = SessionController::new(api.clone(), SessionTimings::default());
        let task = tokio::spawn(controller.run());

        join(&handle).await;
        sleep(Duration::from_millis(4500)).await;
        assert_eq!(api.count(is_state), 2);

        handle.shutdown().unwrap();
        task.await.unwrap();

        sleep(Duration::from_secs(10)).await;
        assert_eq!(api.count(is_state), 2);
        assert_eq!(handle.join(), Err(SessionError::ControllerGone));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_tears_down_controller() {
        setup_logging();
        let api = FakeQuizApi::new();
        let (controller, handle) = SessionController::new(api.clone(), SessionTimings::default());
        let task = tokio::spawn(controller.run());

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn poll_interval_is_configurable() {
        setup_logging();
        let api = FakeQuizApi::new();
        api.join_ok("QUIZ-1").state(false, 0);
        let timings = SessionTimings::with_poll_interval(Duration::from_millis(500));
        let (controller, handle) = SessionController::new(api.clone(), timings);
        tokio::spawn(controller.run());

        join(&handle).await;
        sleep(Duration::from_millis(2100)).await;
        assert_eq!(api.count(is_state), 4);
    }
}

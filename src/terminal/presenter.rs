use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::session::{
    controller::SessionHandle,
    models::{ANSWER_SLOTS, Screen, SessionCommand, SessionView, ToastSeverity},
};

const SLOT_SHAPES: [&str; ANSWER_SLOTS as usize] = ["▲", "◆", "★", "●"];

pub fn slot_label(index: u8) -> char {
    char::from(b'A' + index)
}

/// Maps one line of input to a command for the current screen.
pub fn parse_command(screen: Screen, line: &str) -> Option<SessionCommand> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("/quit") {
        return Some(SessionCommand::Shutdown);
    }

    match screen {
        Screen::Join => {
            let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
            match verb.to_ascii_lowercase().as_str() {
                "name" => Some(SessionCommand::SetName(rest.to_string())),
                "code" => Some(SessionCommand::SetCode(rest.to_string())),
                "join" => Some(SessionCommand::Join),
                _ => None,
            }
        }
        Screen::Question => parse_answer(line).map(SessionCommand::SubmitAnswer),
        Screen::Waiting | Screen::AnswerSubmitted | Screen::Final => None,
    }
}

fn parse_answer(line: &str) -> Option<u8> {
    let mut chars = line.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return None;
    };

    let index = match c.to_ascii_uppercase() {
        'A'..='D' => c.to_ascii_uppercase() as u8 - b'A',
        '1'..='4' => c as u8 - b'1',
        _ => return None,
    };

    Some(index)
}

/// Lines to print when moving from `previous` to `next`.
pub fn render(previous: Option<&SessionView>, next: &SessionView) -> Vec<String> {
    let mut lines = Vec::new();
    let screen_changed = previous.is_none_or(|p| p.screen != next.screen);
    let question_changed = previous.is_none_or(|p| p.question_text != next.question_text);

    if screen_changed || (next.screen == Screen::Question && question_changed) {
        lines.extend(render_screen(next));
    } else if next.screen == Screen::Question
        && previous.is_some_and(|p| p.time_left != next.time_left)
        && !next.is_answered
    {
        lines.push(format!("  {}s left", next.time_left));
    }

    if next.screen == Screen::Question
        && next.is_answered
        && previous.is_some_and(|p| !p.is_answered)
    {
        lines.push("Answer submitted!".to_string());
    }

    let toast_changed = match (previous.and_then(|p| p.toast.as_ref()), &next.toast) {
        (_, None) => false,
        (Some(old), Some(new)) => old.id != new.id,
        (None, Some(_)) => true,
    };
    if let Some(toast) = next.toast.as_ref().filter(|_| toast_changed) {
        let tag = match toast.severity {
            ToastSeverity::Success => "ok",
            ToastSeverity::Error => "error",
        };
        lines.push(format!("[{}] {}", tag, toast.message));
    }

    lines
}

fn render_screen(view: &SessionView) -> Vec<String> {
    match view.screen {
        Screen::Join => vec![
            "== Join Quiz ==".to_string(),
            format!("name: {}  code: {}", view.display_name, view.code),
            "Type `name <your name>`, `code <quiz code>`, then `join`.".to_string(),
        ],
        Screen::Waiting => vec![
            "== You're In! ==".to_string(),
            format!("Waiting for quiz to start... ({})", view.display_name),
        ],
        Screen::Question => {
            let mut lines = vec![
                "== Quiz in Progress ==".to_string(),
                "Watch the host screen for the question, then pick an answer:".to_string(),
            ];
            lines.extend((0..ANSWER_SLOTS).map(|index| {
                format!("  {} {}", SLOT_SHAPES[index as usize], slot_label(index))
            }));
            lines.push(format!("  {}s left", view.time_left));
            lines
        }
        Screen::AnswerSubmitted => vec![
            if view.score.last_answer_correct {
                "Correct!".to_string()
            } else {
                "Incorrect".to_string()
            },
            format!("Score: {}", view.score.score),
            "Waiting for the next question...".to_string(),
        ],
        Screen::Final => vec![
            "== Quiz Complete! ==".to_string(),
            format!("Great job, {}!", view.display_name),
            format!("Final Score: {}", view.score.score),
            "Results will be shared by your instructor".to_string(),
        ],
    }
}

fn print(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

/// Renders session views to stdout and feeds stdin lines back as commands
/// until input ends or the controller stops.
pub async fn run(handle: SessionHandle) {
    let mut views = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut shown = views.borrow_and_update().clone();
    print(render(None, &shown));

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    debug!("Session controller gone, stopping presenter");
                    break;
                }
                let next = views.borrow_and_update().clone();
                print(render(Some(&shown), &next));
                shown = next;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let Some(command) = parse_command(shown.screen, &line) else {
                        continue;
                    };
                    if handle.send(command).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = handle.shutdown();
                    break;
                }
                Err(e) => {
                    warn!("Failed to read input: {}", e);
                    let _ = handle.shutdown();
                    break;
                }
            }
        }
    }
}

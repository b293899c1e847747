use std::time::Duration;

use crate::session::models::{Toast, ToastSeverity};

pub const TOAST_LIFETIME: Duration = Duration::from_secs(3);

/// Holds at most one toast. Showing a new one replaces the current one and
/// expiry only clears the toast it was scheduled for.
#[derive(Debug, Default)]
pub struct ToastSlot {
    current: Option<Toast>,
    next_id: u64,
}

impl ToastSlot {
    pub fn show(&mut self, message: impl Into<String>, severity: ToastSeverity) -> u64 {
        self.next_id += 1;
        self.current = Some(Toast {
            id: self.next_id,
            message: message.into(),
            severity,
        });

        self.next_id
    }

    pub fn expire(&mut self, id: u64) -> bool {
        match &self.current {
            Some(toast) if toast.id == id => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&Toast> {
        self.current.as_ref()
    }
}

//! Status banner state.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Loading,
    Success,
    Error,
}

impl StatusKind {
    /// Success messages clear themselves; every other kind stays up.
    pub fn auto_clears(self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
}

/// Banner plus a generation counter so a stale auto-clear timer cannot hide
/// a newer message.
#[derive(Clone, Debug, Default)]
pub struct StatusBanner {
    current: Option<StatusMessage>,
    generation: u64,
}

impl StatusBanner {
    /// Shows a message. Returns the generation to arm an auto-clear timer
    /// with, for kinds that auto-clear.
    pub fn show(&mut self, text: impl Into<String>, kind: StatusKind) -> Option<u64> {
        self.generation += 1;
        self.current = Some(StatusMessage {
            text: text.into(),
            kind,
        });
        kind.auto_clears().then_some(self.generation)
    }

    pub fn clear(&mut self) {
        self.generation += 1;
        self.current = None;
    }

    /// Clears only if nothing was shown or cleared since `generation`.
    pub fn expire(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.current.is_none() {
            return false;
        }
        self.current = None;
        true
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_success_arms_a_timer() {
        let mut banner = StatusBanner::default();
        assert_eq!(banner.show("x", StatusKind::Error), None);
        assert_eq!(banner.show("x", StatusKind::Loading), None);
        assert_eq!(banner.show("x", StatusKind::Info), None);
        assert!(banner.show("done", StatusKind::Success).is_some());
    }

    #[test]
    fn expire_clears_matching_generation() {
        let mut banner = StatusBanner::default();
        let generation = banner.show("done", StatusKind::Success).unwrap();
        assert!(banner.expire(generation));
        assert!(banner.current().is_none());
    }

    #[test]
    fn stale_expire_keeps_newer_message() {
        let mut banner = StatusBanner::default();
        let generation = banner.show("done", StatusKind::Success).unwrap();
        banner.show("boom", StatusKind::Error);
        assert!(!banner.expire(generation));
        assert_eq!(banner.current().unwrap().text, "boom");
    }
}

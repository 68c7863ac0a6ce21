//! Transient user-facing notifications. Views push them, the CLI prints
//! them, the board shows the newest one in its footer.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

#[derive(Debug, Default)]
pub struct Notices {
    items: Vec<Notice>,
}

impl Notices {
    pub fn success(&mut self, message: impl Into<String>) {
        let notice = Notice::success(message);
        tracing::debug!(message = %notice.message, "notice");
        self.items.push(notice);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let notice = Notice::error(message);
        tracing::warn!(message = %notice.message, "error notice");
        self.items.push(notice);
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.items.last()
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.items)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Notice::is_error)
    }
}

pub mod conversation;
pub mod message;
pub mod user;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

// Re-export for convenience
pub use conversation::{Conversation, ConversationSummary, LastMessage, ParticipantPair};
pub use message::{Message, MessageView, NewMessage, SentMessage};
pub use user::{DmPermission, UserKey};

/// 1-based page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> AppResult<Self> {
        if page == 0 {
            return Err(AppError::Validation("page must be at least 1".into()));
        }
        if page_size == 0 {
            return Err(AppError::Validation("page_size must be at least 1".into()));
        }
        Ok(Self { page, page_size })
    }

    pub fn clamp(self, max_page_size: u32) -> Self {
        Self {
            page: self.page,
            page_size: self.page_size.min(max_page_size.max(1)),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

/// `?page=&page_size=` as sent by clients; both optional.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn into_page(self, default_page_size: u32) -> AppResult<PageRequest> {
        PageRequest::new(
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(default_page_size),
        )
    }
}

/// Current time truncated to the microsecond precision Postgres stores.
pub fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

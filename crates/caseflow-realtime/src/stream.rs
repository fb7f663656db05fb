//! Filtered event streams

use crate::message::InboundMessage;
use caseflow_model::{CaseId, UserId};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Which messages a subscriber wants to see
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Only messages scoped to this case
    pub case_id: Option<CaseId>,
    /// Only messages scoped to this user
    pub user_id: Option<UserId>,
}

impl EventFilter {
    /// Everything
    #[inline]
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Messages for one case
    #[inline]
    #[must_use]
    pub fn case(case_id: CaseId) -> Self {
        Self {
            case_id: Some(case_id),
            user_id: None,
        }
    }

    /// Messages for one user
    #[inline]
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self {
            case_id: None,
            user_id: Some(user_id),
        }
    }

    /// Whether `message` passes
    #[must_use]
    pub fn matches(&self, message: &InboundMessage) -> bool {
        self.case_id.map_or(true, |id| message.case_id == Some(id))
            && self.user_id.map_or(true, |id| message.user_id == Some(id))
    }
}

/// A subscription to one of the client's sub-streams
#[derive(Debug)]
pub struct EventStream {
    rx: broadcast::Receiver<InboundMessage>,
    filter: EventFilter,
}

impl EventStream {
    pub(crate) fn new(rx: broadcast::Receiver<InboundMessage>, filter: EventFilter) -> Self {
        Self { rx, filter }
    }

    /// Next matching message; `None` once the client is gone
    ///
    /// Messages missed because the subscriber fell behind are skipped.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) if self.filter.matches(&message) => return Some(message),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("event subscriber lagged, skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching message already buffered, without waiting
    pub fn try_recv(&mut self) -> Option<InboundMessage> {
        loop {
            match self.rx.try_recv() {
                Ok(message) if self.filter.matches(&message) => return Some(message),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("event subscriber lagged, skipped {} messages", skipped);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Filter in effect
    #[inline]
    #[must_use]
    pub fn filter(&self) -> EventFilter {
        self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use serde_json::json;

    #[tokio::test]
    async fn filter_by_case_skips_other_cases() {
        let (tx, rx) = broadcast::channel(8);
        let mut stream = EventStream::new(rx, EventFilter::case(CaseId(10)));

        tx.send(InboundMessage::new(MessageKind::TaskCreated, json!({})).for_case(CaseId(11)))
            .unwrap();
        tx.send(InboundMessage::new(MessageKind::TaskDeleted, json!({})).for_case(CaseId(10)))
            .unwrap();

        let got = stream.recv().await.unwrap();
        assert_eq!(got.kind, MessageKind::TaskDeleted);
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn unscoped_message_fails_scoped_filter() {
        let msg = InboundMessage::new(MessageKind::Notification, json!({}));
        assert!(EventFilter::any().matches(&msg));
        assert!(!EventFilter::user(UserId(1)).matches(&msg));
    }
}

use std::fmt;

/// Where a connection is in its single request/response exchange.
///
/// Stages only move forward, in declaration order. Any stage may jump
/// straight to [`Stage::Closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Accepted,
    RequestRead,
    ResponseWritten,
    Closed,
}

impl Stage {
    #[inline]
    pub fn is_closed(self) -> bool {
        self == Stage::Closed
    }

    /// Whether moving from `self` to `next` keeps the stage order.
    #[inline]
    pub fn can_advance_to(self, next: Stage) -> bool {
        next > self
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Accepted => "accepted",
            Stage::RequestRead => "request-read",
            Stage::ResponseWritten => "response-written",
            Stage::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order() {
        assert!(Stage::Accepted.can_advance_to(Stage::RequestRead));
        assert!(Stage::Accepted.can_advance_to(Stage::Closed));
        assert!(!Stage::ResponseWritten.can_advance_to(Stage::RequestRead));
        assert!(!Stage::Closed.can_advance_to(Stage::Closed));
    }
}

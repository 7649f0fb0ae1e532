//! Response head and reason-phrase override.

use std::borrow::Cow;

use http::Response;

/// The head of a response before the body is attached.
pub type ResponseHead = Response<()>;

/// Overrides the reason phrase written in the status line.
///
/// Insert it into the response extensions; without it the phrase comes from
/// [`reason_phrase`](crate::protocol::reason_phrase).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPhrase(Cow<'static, str>);

impl ReasonPhrase {
    /// Returns `None` when the phrase contains characters a status line can't carry.
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Option<Self> {
        let reason = reason.into();
        let valid = reason.bytes().all(|b| b == b'\t' || b == b' ' || (b.is_ascii_graphic()) || b >= 0x80);
        valid.then_some(Self(reason))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_line_breaks() {
        assert!(ReasonPhrase::new("Bad\r\nInjected: yes").is_none());
        assert_eq!(ReasonPhrase::new("Teapot Ready").unwrap().as_str(), "Teapot Ready");
    }
}

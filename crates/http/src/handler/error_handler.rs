use bytes::Bytes;
use http::{HeaderValue, Response, StatusCode, header};
use http_body_util::Full;

/// Builds the response the server sends when it answers on its own behalf:
/// an oversized request (413), a malformed one (400), or a handler that
/// failed or produced nothing (500).
///
/// Any `Fn(StatusCode, &str, &str) -> Response<Full<Bytes>>` closure is an
/// `ErrorHandler`. The arguments are the status, its reason phrase and a
/// message describing the failure.
pub trait ErrorHandler: Send + Sync {
    fn error_response(&self, status: StatusCode, reason: &str, message: &str) -> Response<Full<Bytes>>;
}

impl<F> ErrorHandler for F
where
    F: Fn(StatusCode, &str, &str) -> Response<Full<Bytes>> + Send + Sync,
{
    fn error_response(&self, status: StatusCode, reason: &str, message: &str) -> Response<Full<Bytes>> {
        self(status, reason, message)
    }
}

/// The minimal HTML error page used when no [`ErrorHandler`] is configured.
pub fn default_error_response(status: StatusCode, reason: &str, message: &str) -> Response<Full<Bytes>> {
    let code = status.as_u16();
    let reason = escape_html(reason);
    let message = escape_html(message);
    let page = format!(
        "<!DOCTYPE html>\n<html><head><title>{code} {reason}</title></head>\
         <body><h1>{code} {reason}</h1><p>{message}</p></body></html>\n"
    );

    let mut response = Response::new(Full::new(Bytes::from(page)));
    *response.status_mut() = status;
    if let Ok(content_type) = HeaderValue::from_str(mime::TEXT_HTML_UTF_8.as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    response
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body::Body;

    #[test]
    fn default_page() {
        let response = default_error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request Entity Too Large", "limit is <100> bytes");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/html; charset=utf-8");
        assert!(response.body().size_hint().exact().unwrap() > 0);
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<script>\"x\" & 'y'</script>"), "&lt;script&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/script&gt;");
    }

    #[test]
    fn closures_are_error_handlers() {
        let handler = |status: StatusCode, reason: &str, _message: &str| {
            let mut response = Response::new(Full::new(Bytes::from(reason.to_owned())));
            *response.status_mut() = status;
            response
        };

        let response = handler.error_response(StatusCode::BAD_REQUEST, "Bad Request", "bad");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body().size_hint().exact(), Some(11));
    }
}

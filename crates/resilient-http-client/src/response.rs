use http::{HeaderMap, StatusCode};
use std::fmt;
use std::io::{self, Cursor, Read};

/// Body of a [`Response`].
pub enum ResponseBody {
    /// Fully materialized text.
    Text(String),
    /// Unread body, consumed incrementally.
    Stream(Box<dyn Read + Send>),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        ResponseBody::Text(text)
    }
}

impl From<&str> for ResponseBody {
    fn from(text: &str) -> Self {
        ResponseBody::Text(text.to_owned())
    }
}

/// A received HTTP response.
///
/// The async path always materializes the body as text; the blocking path
/// may hand back a stream.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<ResponseBody>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Response with a text body and no headers.
    pub fn text_response(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status, HeaderMap::new(), ResponseBody::Text(body.into()))
    }

    /// Response whose body is read from `reader` on demand.
    pub fn streaming(status: StatusCode, headers: HeaderMap, reader: impl Read + Send + 'static) -> Self {
        Self::new(status, headers, ResponseBody::Stream(Box::new(reader)))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Returns true for 5xx statuses.
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Reads the whole body as UTF-8 text.
    pub fn text(self) -> io::Result<String> {
        match self.body {
            ResponseBody::Text(text) => Ok(text),
            ResponseBody::Stream(mut reader) => {
                let mut text = String::new();
                reader.read_to_string(&mut text)?;
                Ok(text)
            }
        }
    }

    /// Streams the body, whichever form it has.
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        match self.body {
            ResponseBody::Text(text) => Box::new(Cursor::new(text.into_bytes())),
            ResponseBody::Stream(reader) => reader,
        }
    }
}

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use std::time::Duration;

/// An outgoing HTTP request.
///
/// Requests are immutable once built. Every attempt of a retried call sends
/// the same request; the body is reference-counted, so attempts share it.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl Request {
    /// Starts building a request.
    pub fn builder(method: Method, uri: Uri) -> RequestBuilder {
        RequestBuilder {
            request: Request {
                method,
                uri,
                headers: HeaderMap::new(),
                body: None,
                timeout: None,
            },
        }
    }

    /// Starts building a `GET` request.
    pub fn get(uri: Uri) -> RequestBuilder {
        Self::builder(Method::GET, uri)
    }

    /// Starts building a `POST` request.
    pub fn post(uri: Uri) -> RequestBuilder {
        Self::builder(Method::POST, uri)
    }

    /// Starts a builder pre-filled with this request.
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            request: self.clone(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Headers; a name may map to several values.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Deadline for one attempt of this request. Transports must honour it.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Appends a header value, keeping earlier values for the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.request.headers.append(name, value);
        self
    }

    /// Appends every entry of `headers`.
    pub fn headers(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.request.headers.append(name.clone(), value.clone());
        }
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    /// Sets a per-request deadline overriding the client's request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request.timeout = Some(timeout);
        self
    }

    pub(crate) fn timeout_if_unset(mut self, timeout: Duration) -> Self {
        self.request.timeout.get_or_insert(timeout);
        self
    }

    /// Adds values for header names the request does not carry yet.
    pub(crate) fn default_headers(mut self, defaults: &HeaderMap) -> Self {
        for name in defaults.keys() {
            if !self.request.headers.contains_key(name) {
                for value in defaults.get_all(name) {
                    self.request.headers.append(name.clone(), value.clone());
                }
            }
        }
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}

use std::collections::HashMap;
use std::str::FromStr;

use failure::{Error as FailureError, Fail};
use futures::prelude::*;
use serde::de::DeserializeOwned;
use serde::ser::Serialize;
use serde_json::{self, Value};

use errors::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
}

/// Transport-free request handed to the controller.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: String,
    /// Keys are lowercase.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Request {
    /// Splits `uri` into path and query string.
    pub fn new(method: Method, uri: &str) -> Self {
        let mut parts = uri.splitn(2, '?');
        Self {
            method,
            path: parts.next().unwrap_or_default().to_string(),
            query: parts.next().unwrap_or_default().to_string(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn with_body<S: Into<String>>(mut self, body: S) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|v| v.as_str())
    }

    /// Value of a query parameter, `None` when missing or unparsable.
    pub fn query_param<T: FromStr>(&self, key: &str) -> Option<T> {
        self.query
            .split('&')
            .filter_map(|pair| {
                let mut kv = pair.splitn(2, '=');
                match (kv.next(), kv.next()) {
                    (Some(k), Some(v)) if k == key => Some(v),
                    _ => None,
                }
            })
            .next()
            .and_then(|v| v.parse().ok())
    }
}

/// Envelope of every answer: `status` is 1 on success and 0 on failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status_code: u16,
    pub body: ApiResponse,
}

impl Response {
    pub fn ok(message: &str, data: Value) -> Self {
        Self {
            status_code: 200,
            body: ApiResponse {
                status: 1,
                message: message.to_string(),
                data: Some(data),
            },
        }
    }

    pub fn from_error(e: &FailureError) -> Self {
        let status_code = status_code(e);
        let message = if status_code == 500 {
            error!("Request failed: {}", describe(e));
            "Internal Server Error".to_string()
        } else {
            debug!("Request rejected with {}: {}", status_code, describe(e));
            describe(e)
        };

        Self {
            status_code,
            body: ApiResponse {
                status: 0,
                message,
                data: None,
            },
        }
    }

    pub fn not_found() -> Self {
        let e: FailureError = format_err!("Route not found").context(Error::NotFound).into();
        Self::from_error(&e)
    }
}

pub fn status_code(e: &FailureError) -> u16 {
    match error_kind(e) {
        Some(Error::NotFound) => 404,
        Some(Error::Validation) | Some(Error::Parse) | Some(Error::InvalidSignature) => 400,
        Some(Error::ConcurrentModification) => 409,
        Some(Error::UpstreamGateway) => 502,
        _ => 500,
    }
}

fn describe(e: &FailureError) -> String {
    e.iter_chain().map(|cause| cause.to_string()).collect::<Vec<_>>().join(": ")
}

pub type ControllerFuture = Box<dyn Future<Item = Response, Error = FailureError> + Send>;

pub fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, FailureError> {
    serde_json::from_str(body).map_err(|e| e.context(Error::Parse).into())
}

/// Turns a service future into a response, mapping failures onto status codes.
pub fn serialize_future<T, F>(message: &'static str, f: F) -> ControllerFuture
where
    T: Serialize,
    F: Future<Item = T, Error = FailureError> + Send + 'static,
{
    Box::new(f.then(move |res| {
        let res = res.and_then(|v| serde_json::to_value(v).map_err(FailureError::from));
        Ok::<_, FailureError>(match res {
            Ok(data) => Response::ok(message, data),
            Err(e) => Response::from_error(&e),
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_are_parsed() {
        let req = Request::new(Method::Get, "/snacks/getSnackOrder?order_id=7&active_week=2");

        assert_eq!(req.path, "/snacks/getSnackOrder");
        assert_eq!(req.query_param::<i32>("order_id"), Some(7));
        assert_eq!(req.query_param::<i32>("active_week"), Some(2));
        assert_eq!(req.query_param::<i32>("customer_id"), None);
    }

    #[test]
    fn error_kinds_map_onto_status_codes() {
        let cases = vec![
            (Error::NotFound, 404),
            (Error::Validation, 400),
            (Error::Parse, 400),
            (Error::InvalidSignature, 400),
            (Error::ConcurrentModification, 409),
            (Error::UpstreamGateway, 502),
            (Error::InsufficientInventory, 500),
        ];
        for (kind, code) in cases {
            let e: FailureError = format_err!("boom").context(kind).into();
            assert_eq!(status_code(&e), code);
        }
        assert_eq!(status_code(&format_err!("boom")), 500);
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let e: FailureError = format_err!("password=hunter2").context(Error::Connection).into();

        let resp = Response::from_error(&e);

        assert_eq!(resp.status_code, 500);
        assert_eq!(resp.body.status, 0);
        assert_eq!(resp.body.message, "Internal Server Error");
    }
}

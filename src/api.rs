//! REST client for the stokvel backend.
//!
//! Every authenticated call attaches the stored bearer token. A 401 from any
//! authenticated endpoint invalidates the shared session before the error
//! reaches the caller, and once the session is gone no further authenticated
//! request leaves the process until the next login.

use crate::error::{ApiError, ApiResult};
use crate::model::{
    Announcement, Contribution, ContributionStatus, LoginRequest, LoginResponse, Member,
    NewAnnouncement, NewContribution, NewMember, RecordId, Stats, StatusUpdate,
};
use crate::session::{SessionContext, LOGIN_FAILED};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// A request relative to the configured base URL
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for the wire so the client can be exercised without a network.
/// Implementations return every HTTP status as a response; only transport
/// failures are errors.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> ApiResult<HttpResponse>;
}

/// Transport over HTTP(S) using a ureq agent with a global timeout
pub struct HttpTransport {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> ApiResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut req = self
            .agent
            .request(request.method.as_str(), &url)
            .set("Content-Type", "application/json");
        if let Some(token) = &request.bearer {
            req = req.set("Authorization", &format!("Bearer {}", token));
        }

        let result = match &request.body {
            Some(body) => req.send_json(body),
            None => req.call(),
        };

        match result {
            Ok(r) => {
                let status = r.status();
                let body = r
                    .into_string()
                    .map_err(|e| ApiError::Network(e.to_string()))?;
                Ok(HttpResponse { status, body })
            }
            Err(ureq::Error::Status(code, resp)) => Ok(HttpResponse {
                status: code,
                body: resp.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(t)) => Err(ApiError::Network(t.to_string())),
        }
    }
}

/// Pull the server's `error` (or `message`) string out of an error body
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|k| value.get(k).and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// Percent-encode an id for use as a single path segment
fn segment(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

pub struct ApiClient {
    transport: Box<dyn Transport>,
    session: Rc<SessionContext>,
}

impl ApiClient {
    pub fn new(transport: Box<dyn Transport>, session: Rc<SessionContext>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Rc<SessionContext> {
        &self.session
    }

    fn call(&self, method: Method, path: String, body: Option<Value>) -> ApiResult<HttpResponse> {
        let bearer = match self.session.bearer() {
            Some(token) => token,
            None => {
                tracing::debug!(path = %path, "refusing authenticated call without a session");
                return Err(ApiError::SessionExpired);
            }
        };

        let request = HttpRequest {
            method,
            path,
            bearer: Some(bearer),
            body,
        };
        let response = self.transport.send(&request)?;
        tracing::debug!(
            method = method.as_str(),
            path = %request.path,
            status = response.status,
            "api call"
        );

        if response.status == 401 {
            self.session.on_unauthorized();
            return Err(ApiError::SessionExpired);
        }
        if !response.is_success() {
            return Err(ApiError::Server {
                status: response.status,
                message: server_message(&response.body),
            });
        }
        Ok(response)
    }

    fn get<T: DeserializeOwned>(&self, path: String) -> ApiResult<T> {
        let response = self.call(Method::Get, path, None)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn send_unit<B: Serialize>(&self, method: Method, path: String, body: Option<&B>) -> ApiResult<()> {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        self.call(method, path, body)?;
        Ok(())
    }

    /// `POST /auth/login`. Rejected credentials become `ApiError::Auth`; the
    /// session is not touched here.
    pub fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        let body = serde_json::to_value(LoginRequest { email, password })
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let request = HttpRequest {
            method: Method::Post,
            path: "/auth/login".to_string(),
            bearer: None,
            body: Some(body),
        };
        let response = self.transport.send(&request)?;
        tracing::debug!(status = response.status, "login");

        match response.status {
            s if (200..300).contains(&s) => serde_json::from_str(&response.body)
                .map_err(|e| ApiError::Decode(e.to_string())),
            400 | 401 | 403 | 404 => Err(ApiError::Auth(
                server_message(&response.body).unwrap_or_else(|| LOGIN_FAILED.to_string()),
            )),
            status => Err(ApiError::Server {
                status,
                message: server_message(&response.body),
            }),
        }
    }

    pub fn list_members(&self) -> ApiResult<Vec<Member>> {
        self.get("/members".to_string())
    }

    pub fn get_member(&self, id: &RecordId) -> ApiResult<Member> {
        self.get(format!("/members/{}", segment(id.as_str())))
    }

    pub fn create_member(&self, member: &NewMember) -> ApiResult<()> {
        self.send_unit(Method::Post, "/members".to_string(), Some(member))
    }

    pub fn update_member(&self, id: &RecordId, member: &NewMember) -> ApiResult<()> {
        self.send_unit(
            Method::Put,
            format!("/members/{}", segment(id.as_str())),
            Some(member),
        )
    }

    pub fn delete_member(&self, id: &RecordId) -> ApiResult<()> {
        self.send_unit::<()>(
            Method::Delete,
            format!("/members/{}", segment(id.as_str())),
            None,
        )
    }

    pub fn list_contributions(&self) -> ApiResult<Vec<Contribution>> {
        self.get("/contributions".to_string())
    }

    pub fn create_contribution(&self, contribution: &NewContribution) -> ApiResult<()> {
        self.send_unit(Method::Post, "/contributions".to_string(), Some(contribution))
    }

    pub fn update_contribution_status(
        &self,
        id: &RecordId,
        status: &ContributionStatus,
    ) -> ApiResult<()> {
        self.send_unit(
            Method::Put,
            format!("/contributions/{}", segment(id.as_str())),
            Some(&StatusUpdate { status }),
        )
    }

    pub fn list_announcements(&self) -> ApiResult<Vec<Announcement>> {
        self.get("/announcements".to_string())
    }

    pub fn create_announcement(&self, announcement: &NewAnnouncement) -> ApiResult<()> {
        self.send_unit(
            Method::Post,
            "/announcements".to_string(),
            Some(announcement),
        )
    }

    pub fn delete_announcement(&self, id: &RecordId) -> ApiResult<()> {
        self.send_unit::<()>(
            Method::Delete,
            format!("/announcements/{}", segment(id.as_str())),
            None,
        )
    }

    pub fn member_stats(&self, member_id: &RecordId) -> ApiResult<Stats> {
        self.get(format!("/stats/{}", segment(member_id.as_str())))
    }
}

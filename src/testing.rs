//! In-memory stand-in for the stokvel backend, used by unit tests.

use crate::api::{ApiClient, HttpRequest, HttpResponse, Method, Transport};
use crate::error::{ApiError, ApiResult};
use crate::model::{
    Announcement, Contribution, ContributionStatus, Member, Priority, RecordId, Role, User,
};
use crate::session::SessionContext;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const MEMBER_TOKEN: &str = "member-token";
const PASSWORD: &str = "secret";

struct Account {
    email: &'static str,
    token: &'static str,
    user: User,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    members: Vec<Member>,
    contributions: Vec<Contribution>,
    announcements: Vec<Announcement>,
    next_id: u64,
    requests: Vec<HttpRequest>,
    fail_next: Option<(u16, Option<String>)>,
    fail_path: Option<String>,
    disconnect_next: bool,
}

/// Cloning shares the same backend state
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Rc<RefCell<State>>,
}

fn member(id: &str, name: &str, email: &str, role: Role, bank: bool) -> Member {
    Member {
        id: RecordId::new(id),
        name: name.to_string(),
        id_number: Some("9001010000000".to_string()),
        phone: Some("0820000000".to_string()),
        email: Some(email.to_string()),
        status: Some("Active".to_string()),
        role: Some(role),
        bank_name: bank.then(|| "FNB".to_string()),
        account_holder: bank.then(|| name.to_string()),
        account_number: bank.then(|| "62000000001".to_string()),
        branch_code: bank.then(|| "250655".to_string()),
    }
}

fn contribution(id: u64, member_id: &str, month: &str, status: ContributionStatus) -> Contribution {
    Contribution {
        id: RecordId::new(id.to_string()),
        member_id: RecordId::new(member_id),
        month: month.to_string(),
        amount: 300.0,
        date_paid: (status == ContributionStatus::Paid).then(|| "2026-01-05".to_string()),
        status,
    }
}

fn user_of(m: &Member) -> User {
    User {
        id: m.id.clone(),
        name: m.name.clone(),
        role: m.role.unwrap_or_default(),
        status: m.status.clone().unwrap_or_default(),
    }
}

fn respond(status: u16, body: Value) -> ApiResult<HttpResponse> {
    Ok(HttpResponse {
        status,
        body: body.to_string(),
    })
}

fn str_field(body: &Value, key: &str) -> String {
    body.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn opt_field(body: &Value, key: &str) -> Option<String> {
    Some(str_field(body, key)).filter(|s| !s.is_empty())
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend seeded with an admin, two members, three contributions and
    /// two announcements
    pub fn with_fixtures() -> Self {
        let backend = Self::new();
        {
            let mut s = backend.state.borrow_mut();
            let admin = member("A1", "Nomsa Admin", "admin@example.com", Role::Admin, true);
            let lerato = member("M1", "Lerato Khumalo", "member@example.com", Role::Member, true);
            let thandi = member("M2", "Thandi Mokoena", "thandi@example.com", Role::Member, false);
            s.accounts = vec![
                Account {
                    email: "admin@example.com",
                    token: ADMIN_TOKEN,
                    user: user_of(&admin),
                },
                Account {
                    email: "member@example.com",
                    token: MEMBER_TOKEN,
                    user: user_of(&lerato),
                },
            ];
            s.members = vec![admin, lerato, thandi];
            s.contributions = vec![
                contribution(1, "M1", "January 2026", ContributionStatus::Paid),
                contribution(2, "M2", "January 2026", ContributionStatus::Pending),
                contribution(3, "M1", "February 2026", ContributionStatus::Pending),
            ];
            s.announcements = vec![
                Announcement {
                    id: RecordId::new("1"),
                    title: "AGM".to_string(),
                    message: "Annual meeting on Sunday at 2pm".to_string(),
                    priority: Priority::High,
                    announcement_date: Some("2026-02-01".to_string()),
                },
                Announcement {
                    id: RecordId::new("2"),
                    title: "Welcome".to_string(),
                    message: "Welcome to the club".to_string(),
                    priority: Priority::Normal,
                    announcement_date: None,
                },
            ];
            s.next_id = 100;
        }
        backend
    }

    pub fn client(&self, session: Rc<SessionContext>) -> ApiClient {
        ApiClient::new(Box::new(self.clone()), session)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.state
            .borrow()
            .requests
            .iter()
            .map(|r| format!("{} {}", r.method.as_str(), r.path))
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state.borrow_mut().requests.clear();
    }

    /// Answer the next request with an error status
    pub fn fail_next(&self, status: u16, message: Option<&str>) {
        self.state.borrow_mut().fail_next = Some((status, message.map(str::to_string)));
    }

    /// Answer every request to `path` with a 500
    pub fn fail_path(&self, path: &str) {
        self.state.borrow_mut().fail_path = Some(path.to_string());
    }

    pub fn disconnect_next(&self) {
        self.state.borrow_mut().disconnect_next = true;
    }

    /// Expire every issued token
    pub fn revoke_tokens(&self) {
        for account in self.state.borrow_mut().accounts.iter_mut() {
            account.token = "revoked";
        }
    }

    fn next_id(s: &mut State) -> u64 {
        s.next_id += 1;
        s.next_id
    }
}

impl Transport for MockBackend {
    fn send(&self, request: &HttpRequest) -> ApiResult<HttpResponse> {
        let mut s = self.state.borrow_mut();
        s.requests.push(request.clone());

        if std::mem::take(&mut s.disconnect_next) {
            return Err(ApiError::Network("connection reset".to_string()));
        }
        if let Some((status, message)) = s.fail_next.take() {
            return respond(status, json!({ "error": message }));
        }
        if s.fail_path.as_deref() == Some(request.path.as_str()) {
            return respond(500, json!({ "error": "internal error" }));
        }

        let body = request.body.clone().unwrap_or(Value::Null);
        let parts: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();

        if request.method == Method::Post && parts == ["auth", "login"] {
            let email = str_field(&body, "email");
            let password = str_field(&body, "password");
            return match s.accounts.iter().find(|a| a.email == email) {
                Some(a) if password == PASSWORD => respond(
                    200,
                    json!({ "token": a.token, "user": a.user }),
                ),
                _ => respond(401, json!({ "error": "Invalid credentials" })),
            };
        }

        let caller = request
            .bearer
            .as_deref()
            .and_then(|t| s.accounts.iter().find(|a| a.token == t))
            .map(|a| a.user.clone());
        let caller = match caller {
            Some(c) => c,
            None => return respond(401, json!({ "error": "Invalid token" })),
        };
        let admin = caller.role == Role::Admin;
        let forbidden = || respond(403, json!({ "error": "Admin access required" }));

        match (request.method, parts.as_slice()) {
            (Method::Get, ["members"]) => {
                if !admin {
                    return forbidden();
                }
                respond(200, json!(s.members))
            }
            (Method::Get, ["members", id]) => match s.members.iter().find(|m| m.id.as_str() == *id) {
                Some(m) => respond(200, json!(m)),
                None => respond(404, json!({ "error": "Member not found" })),
            },
            (Method::Post, ["members"]) => {
                if !admin {
                    return forbidden();
                }
                let id = format!("M{}", Self::next_id(&mut s));
                let mut m = member(
                    &id,
                    &str_field(&body, "name"),
                    &str_field(&body, "email"),
                    Role::from_str(&str_field(&body, "role")).unwrap_or_default(),
                    false,
                );
                m.id_number = opt_field(&body, "idNumber");
                m.phone = opt_field(&body, "phone");
                m.status = opt_field(&body, "status");
                m.bank_name = opt_field(&body, "bankName");
                m.account_holder = opt_field(&body, "accountHolder");
                m.account_number = opt_field(&body, "accountNumber");
                m.branch_code = opt_field(&body, "branchCode");
                s.members.push(m.clone());
                respond(201, json!(m))
            }
            (Method::Put, ["members", id]) => {
                if !admin {
                    return forbidden();
                }
                match s.members.iter_mut().find(|m| m.id.as_str() == *id) {
                    Some(m) => {
                        m.name = str_field(&body, "name");
                        m.email = opt_field(&body, "email");
                        m.id_number = opt_field(&body, "idNumber");
                        m.phone = opt_field(&body, "phone");
                        m.status = opt_field(&body, "status");
                        m.role = Role::from_str(&str_field(&body, "role"));
                        m.bank_name = opt_field(&body, "bankName");
                        m.account_holder = opt_field(&body, "accountHolder");
                        m.account_number = opt_field(&body, "accountNumber");
                        m.branch_code = opt_field(&body, "branchCode");
                        respond(200, json!(m))
                    }
                    None => respond(404, json!({ "error": "Member not found" })),
                }
            }
            (Method::Delete, ["members", id]) => {
                if !admin {
                    return forbidden();
                }
                let before = s.members.len();
                s.members.retain(|m| m.id.as_str() != *id);
                if s.members.len() == before {
                    return respond(404, json!({ "error": "Member not found" }));
                }
                respond(200, json!({ "message": "Member deleted" }))
            }
            (Method::Get, ["contributions"]) => respond(200, json!(s.contributions)),
            (Method::Post, ["contributions"]) => {
                if !admin {
                    return forbidden();
                }
                let id = Self::next_id(&mut s);
                let c = Contribution {
                    id: RecordId::new(id.to_string()),
                    member_id: RecordId::new(str_field(&body, "memberId")),
                    month: str_field(&body, "month"),
                    amount: body.get("amount").and_then(|v| v.as_f64()).unwrap_or(0.0),
                    status: ContributionStatus::from(str_field(&body, "status")),
                    date_paid: opt_field(&body, "date"),
                };
                s.contributions.push(c.clone());
                respond(201, json!(c))
            }
            (Method::Put, ["contributions", id]) => {
                if !admin {
                    return forbidden();
                }
                match s.contributions.iter_mut().find(|c| c.id.as_str() == *id) {
                    Some(c) => {
                        c.status = ContributionStatus::from(str_field(&body, "status"));
                        respond(200, json!(c))
                    }
                    None => respond(404, json!({ "error": "Contribution not found" })),
                }
            }
            (Method::Get, ["announcements"]) => respond(200, json!(s.announcements)),
            (Method::Post, ["announcements"]) => {
                if !admin {
                    return forbidden();
                }
                let id = Self::next_id(&mut s);
                let a = Announcement {
                    id: RecordId::new(id.to_string()),
                    title: str_field(&body, "title"),
                    message: str_field(&body, "message"),
                    priority: Priority::from_str(&str_field(&body, "priority")).unwrap_or_default(),
                    announcement_date: Some("2026-03-01".to_string()),
                };
                // Newest first, as the server orders them
                s.announcements.insert(0, a.clone());
                respond(201, json!(a))
            }
            (Method::Delete, ["announcements", id]) => {
                if !admin {
                    return forbidden();
                }
                s.announcements.retain(|a| a.id.as_str() != *id);
                respond(200, json!({ "message": "Announcement deleted" }))
            }
            (Method::Get, ["stats", id]) => {
                let paid: Vec<&Contribution> = s
                    .contributions
                    .iter()
                    .filter(|c| c.member_id.as_str() == *id && c.status == ContributionStatus::Paid)
                    .collect();
                let total: f64 = paid.iter().map(|c| c.amount).sum();
                respond(
                    200,
                    json!({
                        "totalSaved": total,
                        "monthsContributed": paid.len(),
                        "estimatedPayout": total * 12.0,
                    }),
                )
            }
            _ => respond(404, json!({ "error": "Not found" })),
        }
    }
}

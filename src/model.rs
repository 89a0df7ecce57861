//! Wire types exchanged with the stokvel backend.
//!
//! Records arrive from the server in snake_case (`member_id`, `bank_name`);
//! create payloads are sent in camelCase (`memberId`, `bankName`), and stats
//! come back in camelCase. The serde attributes below encode that split.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Treat an explicit `null` like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept a JSON number or a numeric string such as `"300.00"`. Null and
/// unparsable strings read as zero.
fn number_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr + Default,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Num(T),
        Str(String),
    }
    Ok(match Option::<Raw<T>>::deserialize(deserializer)? {
        Some(Raw::Num(n)) => n,
        Some(Raw::Str(s)) => s.trim().parse().unwrap_or_default(),
        None => T::default(),
    })
}

/// Identifier of a backend record. The server uses both strings ("M1") and
/// integers (contribution ids), so both decode into the same string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => RecordId(n.to_string()),
            Raw::Str(s) => RecordId(s),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "member" => Some(Role::Member),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// The logged-in user, as returned by `/auth/login` and kept in storage
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: RecordId,
    pub name: String,
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn first_name(&self) -> &str {
        self.name.split(' ').next().unwrap_or(&self.name)
    }
}

/// An authenticated session: opaque bearer token plus its user
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Banking details. Shown only to admins, and only after an explicit reveal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BankDetails<'a> {
    pub bank_name: Option<&'a str>,
    pub account_holder: Option<&'a str>,
    pub account_number: Option<&'a str>,
    pub branch_code: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Member {
    pub id: RecordId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub account_holder: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub branch_code: Option<String>,
}

impl Member {
    pub fn bank_details(&self) -> BankDetails<'_> {
        BankDetails {
            bank_name: self.bank_name.as_deref(),
            account_holder: self.account_holder.as_deref(),
            account_number: self.account_number.as_deref(),
            branch_code: self.branch_code.as_deref(),
        }
    }
}

/// Payload for `POST /members` and `PUT /members/:id`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub name: String,
    pub id_number: String,
    pub phone: String,
    pub email: String,
    /// Left out of the body when empty, so updates keep the current password
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub status: String,
    pub role: Role,
    pub bank_name: String,
    pub account_holder: String,
    pub account_number: String,
    pub branch_code: String,
}

impl Default for NewMember {
    fn default() -> Self {
        Self {
            name: String::new(),
            id_number: String::new(),
            phone: String::new(),
            email: String::new(),
            password: "member123".to_string(),
            status: "Active".to_string(),
            role: Role::Member,
            bank_name: String::new(),
            account_holder: String::new(),
            account_number: String::new(),
            branch_code: String::new(),
        }
    }
}

impl NewMember {
    /// Payload that rewrites `member` as it is, for editing before `PUT`.
    /// The password is left empty so it is not sent.
    pub fn from_member(member: &Member) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            name: member.name.clone(),
            id_number: text(&member.id_number),
            phone: text(&member.phone),
            email: text(&member.email),
            password: String::new(),
            status: member.status.clone().unwrap_or_else(|| "Active".to_string()),
            role: member.role.unwrap_or_default(),
            bank_name: text(&member.bank_name),
            account_holder: text(&member.account_holder),
            account_number: text(&member.account_number),
            branch_code: text(&member.branch_code),
        }
    }
}

/// Contribution status. `Overdue` is understood when the server sends it but
/// nothing in this client ever sets it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ContributionStatus {
    Paid,
    Pending,
    Overdue,
    Other(String),
}

impl ContributionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ContributionStatus::Paid => "Paid",
            ContributionStatus::Pending => "Pending",
            ContributionStatus::Overdue => "Overdue",
            ContributionStatus::Other(s) => s,
        }
    }

    /// Parse a status an admin may set; only Paid and Pending are settable
    pub fn settable(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "paid" => Some(ContributionStatus::Paid),
            "pending" => Some(ContributionStatus::Pending),
            _ => None,
        }
    }
}

impl Default for ContributionStatus {
    fn default() -> Self {
        ContributionStatus::Pending
    }
}

impl From<String> for ContributionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Paid" => ContributionStatus::Paid,
            "Pending" => ContributionStatus::Pending,
            "Overdue" => ContributionStatus::Overdue,
            _ => ContributionStatus::Other(s),
        }
    }
}

impl From<ContributionStatus> for String {
    fn from(s: ContributionStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for ContributionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_CONTRIBUTION_AMOUNT: f64 = 300.0;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Contribution {
    pub id: RecordId,
    pub member_id: RecordId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub month: String,
    #[serde(default, deserialize_with = "number_or_string")]
    pub amount: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ContributionStatus,
    #[serde(default)]
    pub date_paid: Option<String>,
}

/// Payload for `POST /contributions`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContribution {
    pub member_id: String,
    pub month: String,
    pub amount: f64,
    pub status: ContributionStatus,
    pub date: Option<String>,
}

impl Default for NewContribution {
    fn default() -> Self {
        Self {
            member_id: String::new(),
            month: String::new(),
            amount: DEFAULT_CONTRIBUTION_AMOUNT,
            status: ContributionStatus::Pending,
            date: None,
        }
    }
}

/// Body of `PUT /contributions/:id`
#[derive(Debug, Serialize)]
pub struct StatusUpdate<'a> {
    pub status: &'a ContributionStatus,
}

/// Announcement priority. Anything other than "high" reads as normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        Priority::from_str(&s).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Announcement {
    pub id: RecordId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,
    #[serde(default, alias = "date")]
    pub announcement_date: Option<String>,
}

/// Payload for `POST /announcements`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NewAnnouncement {
    pub title: String,
    pub message: String,
    pub priority: Priority,
}

/// Per-member figures computed by the server
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default, deserialize_with = "number_or_string")]
    pub total_saved: f64,
    #[serde(default, deserialize_with = "number_or_string")]
    pub months_contributed: u32,
    #[serde(default, deserialize_with = "number_or_string")]
    pub estimated_payout: f64,
}

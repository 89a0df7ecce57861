//! Application state and the mutate-then-reload flows.
//!
//! Every successful mutation is followed by a full reload; in-memory
//! collections are only ever replaced wholesale from a fresh [`Snapshot`].
//! Operations never return errors: failures land in a single banner slot
//! (the latest replaces the previous) and the operation reports `false`.

use crate::activity::ActivityLog;
use crate::api::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::loader::{self, Snapshot};
use crate::model::{
    ContributionStatus, Member, NewAnnouncement, NewContribution, NewMember, RecordId, Session,
    User,
};
use crate::session::{self, LOGIN_FAILED};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

const REQUIRED_FIELDS: &str = "Please fill in all required fields";
const ADMIN_ONLY: &str = "Only administrators can do that";
const LOAD_FAILED: &str = "Failed to load data. Please try again.";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Home,
    Members,
    Contributions,
    Announcements,
}

/// Clears the shared loading flag when dropped
struct LoadingGuard {
    flag: Rc<Cell<bool>>,
}

impl LoadingGuard {
    fn acquire(flag: &Rc<Cell<bool>>) -> ApiResult<Self> {
        if flag.replace(true) {
            return Err(ApiError::Busy);
        }
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

pub fn validate_new_member(member: &NewMember) -> ApiResult<()> {
    for (field, value) in [
        ("name", &member.name),
        ("email", &member.email),
        ("idNumber", &member.id_number),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::validation(field, REQUIRED_FIELDS));
        }
    }
    if !EMAIL_RE.is_match(member.email.trim()) {
        return Err(ApiError::validation(
            "email",
            "Please enter a valid email address",
        ));
    }
    Ok(())
}

pub fn validate_new_contribution(contribution: &NewContribution) -> ApiResult<()> {
    if contribution.member_id.trim().is_empty() {
        return Err(ApiError::validation("memberId", REQUIRED_FIELDS));
    }
    if contribution.month.trim().is_empty() {
        return Err(ApiError::validation("month", REQUIRED_FIELDS));
    }
    if !contribution.amount.is_finite() || contribution.amount < 0.0 {
        return Err(ApiError::validation(
            "amount",
            "Amount must be a non-negative number",
        ));
    }
    validate_settable(&contribution.status)
}

fn validate_settable(status: &ContributionStatus) -> ApiResult<()> {
    match status {
        ContributionStatus::Paid | ContributionStatus::Pending => Ok(()),
        _ => Err(ApiError::validation(
            "status",
            "Status must be Paid or Pending",
        )),
    }
}

pub fn validate_new_announcement(announcement: &NewAnnouncement) -> ApiResult<()> {
    if announcement.title.trim().is_empty() {
        return Err(ApiError::validation("title", REQUIRED_FIELDS));
    }
    if announcement.message.trim().is_empty() {
        return Err(ApiError::validation("message", REQUIRED_FIELDS));
    }
    Ok(())
}

pub struct Dashboard {
    api: ApiClient,
    activity: Option<ActivityLog>,
    snapshot: Snapshot,
    loading: Rc<Cell<bool>>,
    error: Option<String>,
    revealed: HashSet<RecordId>,
    tab: Tab,
}

impl Dashboard {
    pub fn new(api: ApiClient, activity: Option<ActivityLog>) -> Self {
        Self {
            api,
            activity,
            snapshot: Snapshot::default(),
            loading: Rc::new(Cell::new(false)),
            error: None,
            revealed: HashSet::new(),
            tab: Tab::Home,
        }
    }

    fn record(&mut self, f: impl FnOnce(&mut ActivityLog) -> anyhow::Result<()>) {
        if let Some(log) = self.activity.as_mut() {
            if let Err(e) = f(log) {
                tracing::warn!("failed to write activity log: {:#}", e);
            }
        }
    }

    /// Resume a stored session, if any, and load its data. Returns whether
    /// a stored session was found; a stale token is only discovered by the
    /// reload, which then ends the session.
    pub fn restore(&mut self) -> bool {
        let session = match self.api.session().restore() {
            Some(session) => session,
            None => return false,
        };
        let user_id = session.user.id.to_string();
        self.record(|log| log.session_restored(&user_id));
        self.reload();
        true
    }

    pub fn login(&mut self, email: &str, password: &str) -> bool {
        let _guard = match LoadingGuard::acquire(&self.loading) {
            Ok(g) => g,
            Err(e) => {
                self.error = Some(e.to_string());
                return false;
            }
        };
        self.error = None;

        match session::login(&self.api, email, password) {
            Ok(session) => {
                let (id, role) = (session.user.id.to_string(), session.user.role.as_str());
                self.record(|log| log.login(&id, role));
                // Nothing from a previous user survives a switch
                self.reset();
                self.reload_with(&session);
                true
            }
            Err(e) => {
                tracing::info!("login failed: {}", e);
                self.error = Some(e.user_message(LOGIN_FAILED, true));
                false
            }
        }
    }

    pub fn logout(&mut self) {
        self.api.session().logout();
        self.reset();
        self.record(|log| log.logout());
    }

    fn reset(&mut self) {
        self.snapshot = Snapshot::default();
        self.revealed.clear();
        self.error = None;
        self.tab = Tab::Home;
    }

    /// Re-fetch everything for the current session
    pub fn reload(&mut self) -> bool {
        let _guard = match LoadingGuard::acquire(&self.loading) {
            Ok(g) => g,
            Err(e) => {
                self.error = Some(e.to_string());
                return false;
            }
        };
        match self.api.session().current() {
            Some(session) => self.reload_with(&session),
            None => {
                self.reset();
                false
            }
        }
    }

    fn reload_with(&mut self, session: &Session) -> bool {
        match loader::reload_all(&self.api, session) {
            Ok(snapshot) => {
                let counts = (
                    snapshot.contributions.len(),
                    snapshot.announcements.len(),
                    snapshot.members.as_ref().map(Vec::len),
                );
                self.snapshot = snapshot;
                self.error = None;
                self.record(|log| log.reload(counts.0, counts.1, counts.2));
                true
            }
            Err(e) => {
                tracing::warn!("reload failed: {}", e);
                let msg = e.to_string();
                self.record(|log| log.reload_failed(&msg));
                self.handle_error(e, LOAD_FAILED, false);
                false
            }
        }
    }

    fn handle_error(&mut self, err: ApiError, fallback: &str, prefer_server: bool) {
        if err.is_session_expired() {
            // The API client already cleared storage; drop what we were showing
            self.reset();
            self.record(|log| log.session_expired());
            return;
        }
        self.error = Some(err.user_message(fallback, prefer_server));
    }

    /// Run an admin mutation, then reload on success
    fn mutate(
        &mut self,
        kind: &str,
        target: Option<&str>,
        fallback: &str,
        prefer_server: bool,
        op: impl FnOnce(&ApiClient) -> ApiResult<()>,
    ) -> bool {
        if !self.is_admin() {
            self.handle_error(
                ApiError::validation("role", ADMIN_ONLY),
                fallback,
                prefer_server,
            );
            return false;
        }
        let _guard = match LoadingGuard::acquire(&self.loading) {
            Ok(g) => g,
            Err(e) => {
                self.error = Some(e.to_string());
                return false;
            }
        };

        match op(&self.api) {
            Ok(()) => {
                tracing::info!(kind, id = ?target, "mutation applied");
                self.error = None;
                if let Some(session) = self.api.session().current() {
                    self.reload_with(&session);
                }
                true
            }
            Err(e) => {
                tracing::warn!(kind, id = ?target, "mutation failed: {}", e);
                self.handle_error(e, fallback, prefer_server);
                false
            }
        }
    }

    pub fn add_member(&mut self, member: NewMember) -> bool {
        if let Err(e) = validate_new_member(&member) {
            self.handle_error(e, "", false);
            return false;
        }
        self.mutate("create_member", None, "Failed to add member", true, |api| {
            api.create_member(&member)
        })
    }

    /// Save edits to an existing member. An empty password is not sent.
    pub fn update_member(&mut self, id: &RecordId, member: NewMember) -> bool {
        if let Err(e) = validate_new_member(&member) {
            self.handle_error(e, "", false);
            return false;
        }
        self.mutate(
            "update_member",
            Some(id.as_str()),
            "Failed to update member",
            true,
            |api| api.update_member(id, &member),
        )
    }

    /// Fetch one member fresh from the server (admin only)
    pub fn member_details(&mut self, id: &RecordId) -> Option<Member> {
        if !self.is_admin() {
            self.handle_error(ApiError::validation("role", ADMIN_ONLY), "", false);
            return None;
        }
        match self.api.get_member(id) {
            Ok(member) => Some(member),
            Err(e) => {
                self.handle_error(e, "Failed to load member", true);
                None
            }
        }
    }

    pub fn delete_member(&mut self, id: &RecordId) -> bool {
        self.mutate(
            "delete_member",
            Some(id.as_str()),
            "Failed to delete member",
            false,
            |api| api.delete_member(id),
        )
    }

    pub fn add_contribution(&mut self, contribution: NewContribution) -> bool {
        if let Err(e) = validate_new_contribution(&contribution) {
            self.handle_error(e, "", false);
            return false;
        }
        self.mutate(
            "create_contribution",
            Some(contribution.member_id.as_str()),
            "Failed to add contribution",
            false,
            |api| api.create_contribution(&contribution),
        )
    }

    pub fn update_contribution_status(&mut self, id: &RecordId, status: ContributionStatus) -> bool {
        if let Err(e) = validate_settable(&status) {
            self.handle_error(e, "", false);
            return false;
        }
        self.mutate(
            "update_contribution_status",
            Some(id.as_str()),
            "Failed to update contribution",
            false,
            |api| api.update_contribution_status(id, &status),
        )
    }

    pub fn add_announcement(&mut self, announcement: NewAnnouncement) -> bool {
        if let Err(e) = validate_new_announcement(&announcement) {
            self.handle_error(e, "", false);
            return false;
        }
        self.mutate(
            "create_announcement",
            None,
            "Failed to add announcement",
            false,
            |api| api.create_announcement(&announcement),
        )
    }

    pub fn delete_announcement(&mut self, id: &RecordId) -> bool {
        self.mutate(
            "delete_announcement",
            Some(id.as_str()),
            "Failed to delete announcement",
            false,
            |api| api.delete_announcement(id),
        )
    }

    /// Flip the bank-details reveal for one member. Returns whether the
    /// details are now visible; always false for non-admins.
    pub fn toggle_bank_details(&mut self, id: &RecordId) -> bool {
        if !self.is_admin() {
            return false;
        }
        if !self.revealed.remove(id) {
            self.revealed.insert(id.clone());
            return true;
        }
        false
    }

    pub fn revealed(&self) -> &HashSet<RecordId> {
        &self.revealed
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn user(&self) -> Option<User> {
        self.api.session().user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.session().is_authenticated()
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|u| u.is_admin())
    }

    pub fn session_expired(&self) -> bool {
        self.api.session().was_expired()
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    /// Switch tabs. The members tab is admin-only.
    pub fn set_tab(&mut self, tab: Tab) -> bool {
        if tab == Tab::Members && !self.is_admin() {
            return false;
        }
        self.tab = tab;
        true
    }

    pub fn activity_path(&self) -> Option<&std::path::Path> {
        self.activity.as_ref().map(|a| a.path.as_path())
    }
}

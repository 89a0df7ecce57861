//! Full reload of everything the dashboard shows.
//!
//! Fetches run one after another: contributions, announcements, members (admin
//! sessions only), then the caller's stats. The first failure aborts the rest
//! and nothing is returned, so the caller's previous snapshot stays intact.

use crate::api::ApiClient;
use crate::error::ApiResult;
use crate::model::{Announcement, Contribution, Member, Session, Stats};

/// Everything fetched by one reload cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub contributions: Vec<Contribution>,
    pub announcements: Vec<Announcement>,
    /// `None` for member sessions, which never fetch the member list
    pub members: Option<Vec<Member>>,
    pub stats: Stats,
}

impl Snapshot {
    pub fn members(&self) -> &[Member] {
        self.members.as_deref().unwrap_or(&[])
    }
}

pub fn reload_all(api: &ApiClient, session: &Session) -> ApiResult<Snapshot> {
    let contributions = api.list_contributions()?;
    let announcements = api.list_announcements()?;
    let members = if session.user.is_admin() {
        Some(api.list_members()?)
    } else {
        None
    };
    let stats = api.member_stats(&session.user.id)?;

    tracing::debug!(
        contributions = contributions.len(),
        announcements = announcements.len(),
        members = members.as_ref().map(Vec::len),
        "reload complete"
    );

    Ok(Snapshot {
        contributions,
        announcements,
        members,
        stats,
    })
}

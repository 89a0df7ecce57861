//! Derived views over a snapshot and their text rendering.
//!
//! The filters here are pure: they never fail on empty collections or on
//! records with missing optional fields.

use crate::config::DisplayConfig;
use crate::loader::Snapshot;
use crate::model::{
    Announcement, Contribution, ContributionStatus, Member, Priority, RecordId, User,
};
use std::collections::HashSet;
use std::fmt::Write;

pub const UNKNOWN_MEMBER: &str = "Unknown";
const MASKED: &str = "••••••";
const MISSING: &str = "-";

/// Contributions belonging to `member_id`, in arrival order
pub fn contributions_for<'a>(
    contributions: &'a [Contribution],
    member_id: &RecordId,
) -> Vec<&'a Contribution> {
    contributions
        .iter()
        .filter(|c| &c.member_id == member_id)
        .collect()
}

/// The first `limit` of a member's own contributions
pub fn recent_contributions<'a>(
    contributions: &'a [Contribution],
    member_id: &RecordId,
    limit: usize,
) -> Vec<&'a Contribution> {
    let mut mine = contributions_for(contributions, member_id);
    mine.truncate(limit);
    mine
}

/// The first `limit` announcements in server order
pub fn recent_announcements(announcements: &[Announcement], limit: usize) -> &[Announcement] {
    &announcements[..announcements.len().min(limit)]
}

/// Contributions a user may see: admins see all, members their own
pub fn visible_contributions<'a>(contributions: &'a [Contribution], user: &User) -> Vec<&'a Contribution> {
    if user.is_admin() {
        contributions.iter().collect()
    } else {
        contributions_for(contributions, &user.id)
    }
}

/// Name for a member id, or "Unknown" for deleted/unseen members
pub fn member_name<'a>(members: &'a [Member], id: &RecordId) -> &'a str {
    members
        .iter()
        .find(|m| &m.id == id)
        .map(|m| m.name.as_str())
        .unwrap_or(UNKNOWN_MEMBER)
}

pub fn paid_count(contributions: &[Contribution], member_id: &RecordId) -> usize {
    contributions
        .iter()
        .filter(|c| &c.member_id == member_id && c.status == ContributionStatus::Paid)
        .count()
}

/// Format a money amount as "R 1,234" (two decimals only when needed)
pub fn format_amount(amount: f64, currency: &str) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    if frac == 0 {
        format!("{} {}{}", currency, sign, grouped)
    } else {
        format!("{} {}{}.{:02}", currency, sign, grouped, frac)
    }
}

fn or_missing(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(MISSING)
}

fn status_marker(status: &ContributionStatus) -> &'static str {
    match status {
        ContributionStatus::Paid => "✓",
        ContributionStatus::Pending => "…",
        ContributionStatus::Overdue => "!",
        ContributionStatus::Other(_) => "?",
    }
}

pub fn render_dashboard(user: &User, snapshot: &Snapshot, display: &DisplayConfig) -> String {
    let mut out = String::new();
    let stats = &snapshot.stats;
    let _ = writeln!(out, "Hi, {}!", user.first_name());
    let _ = writeln!(
        out,
        "  Total saved:      {}",
        format_amount(stats.total_saved, display.currency())
    );
    let _ = writeln!(
        out,
        "                    {} months contributed",
        stats.months_contributed
    );
    let _ = writeln!(
        out,
        "  Estimated payout: {}",
        format_amount(stats.estimated_payout, display.currency())
    );
    let _ = writeln!(
        out,
        "  Status:           {} (ID: {})",
        or_missing(Some(user.status.as_str())),
        user.id
    );

    let _ = writeln!(out, "\nMy recent contributions:");
    let mine = recent_contributions(
        &snapshot.contributions,
        &user.id,
        display.recent_contributions(),
    );
    if mine.is_empty() {
        let _ = writeln!(out, "  No contributions yet");
    }
    for c in mine {
        let _ = writeln!(
            out,
            "  {} {:<16} {:>10}  {}",
            status_marker(&c.status),
            c.month,
            format_amount(c.amount, display.currency()),
            c.status
        );
    }

    let _ = writeln!(out, "\nRecent announcements:");
    let recent = recent_announcements(&snapshot.announcements, display.recent_announcements());
    if recent.is_empty() {
        let _ = writeln!(out, "  No announcements");
    }
    for a in recent {
        let _ = writeln!(out, "  - {}: {}", a.title, a.message);
    }
    out
}

pub fn render_members(snapshot: &Snapshot, revealed: &HashSet<RecordId>) -> String {
    let mut out = String::new();
    let members = snapshot.members();
    let _ = writeln!(out, "Members ({}):", members.len());
    if members.is_empty() {
        let _ = writeln!(out, "  No members");
    }
    for m in members {
        write_member(
            &mut out,
            m,
            paid_count(&snapshot.contributions, &m.id),
            revealed.contains(&m.id),
        );
    }
    out
}

/// One member in full, as fetched by id
pub fn render_member(member: &Member, contributions: &[Contribution], revealed: bool) -> String {
    let mut out = String::new();
    write_member(&mut out, member, paid_count(contributions, &member.id), revealed);
    let _ = writeln!(
        out,
        "      id number: {} | role: {}",
        or_missing(member.id_number.as_deref()),
        or_missing(member.role.map(|r| r.as_str()))
    );
    out
}

fn write_member(out: &mut String, m: &Member, paid: usize, revealed: bool) {
    let _ = writeln!(
        out,
        "  [{}] {} <{}> {} | {} | paid: {}",
        m.id,
        m.name,
        or_missing(m.email.as_deref()),
        or_missing(m.phone.as_deref()),
        or_missing(m.status.as_deref()),
        paid
    );
    let bank = m.bank_details();
    if revealed {
        let _ = writeln!(
            out,
            "      bank: {} | holder: {} | account: {} | branch: {}",
            or_missing(bank.bank_name),
            or_missing(bank.account_holder),
            or_missing(bank.account_number),
            or_missing(bank.branch_code)
        );
    } else {
        let _ = writeln!(out, "      bank: {} (use /reveal {} to view)", MASKED, m.id);
    }
}

pub fn render_contributions(snapshot: &Snapshot, user: &User, display: &DisplayConfig) -> String {
    let mut out = String::new();
    let visible = visible_contributions(&snapshot.contributions, user);
    let _ = writeln!(out, "Contributions ({}):", visible.len());
    if visible.is_empty() {
        let _ = writeln!(out, "  No contributions found");
    }
    for c in visible {
        let name = if user.is_admin() {
            member_name(snapshot.members(), &c.member_id)
        } else {
            user.name.as_str()
        };
        let _ = writeln!(
            out,
            "  #{:<5} {:<20} {:<16} {:>10}  {} {:<8} {}",
            c.id,
            name,
            c.month,
            format_amount(c.amount, display.currency()),
            status_marker(&c.status),
            c.status,
            or_missing(c.date_paid.as_deref())
        );
    }
    out
}

pub fn render_announcements(announcements: &[Announcement]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Announcements ({}):", announcements.len());
    if announcements.is_empty() {
        let _ = writeln!(out, "  No announcements");
    }
    for a in announcements {
        let flag = if a.priority == Priority::High { " [HIGH]" } else { "" };
        let _ = writeln!(
            out,
            "  #{} {}{} ({})",
            a.id,
            a.title,
            flag,
            or_missing(a.announcement_date.as_deref())
        );
        let _ = writeln!(out, "      {}", a.message);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Role, Stats};

    fn contribution(id: &str, member: &str, status: ContributionStatus) -> Contribution {
        Contribution {
            id: RecordId::new(id),
            member_id: RecordId::new(member),
            month: format!("Month {}", id),
            amount: 300.0,
            status,
            date_paid: None,
        }
    }

    fn user(id: &str, role: Role) -> User {
        User {
            id: RecordId::new(id),
            name: "Lerato Khumalo".to_string(),
            role,
            status: "Active".to_string(),
        }
    }

    fn member(id: &str, name: &str) -> Member {
        Member {
            id: RecordId::new(id),
            name: name.to_string(),
            id_number: None,
            phone: None,
            email: None,
            status: None,
            role: None,
            bank_name: None,
            account_holder: None,
            account_number: None,
            branch_code: None,
        }
    }

    #[test]
    fn test_filter_by_member() {
        let all = vec![
            contribution("1", "M1", ContributionStatus::Paid),
            contribution("2", "M2", ContributionStatus::Pending),
        ];
        let mine = contributions_for(&all, &RecordId::new("M1"));
        assert_eq!(mine, vec![&all[0]]);
    }

    #[test]
    fn test_recent_contributions_cap_keeps_arrival_order() {
        let all: Vec<Contribution> = (1..=8)
            .map(|i| contribution(&i.to_string(), "M1", ContributionStatus::Paid))
            .collect();
        let recent = recent_contributions(&all, &RecordId::new("M1"), 5);
        let ids: Vec<&str> = recent.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_empty_collections() {
        assert!(contributions_for(&[], &RecordId::new("M1")).is_empty());
        assert!(recent_announcements(&[], 3).is_empty());
        assert_eq!(paid_count(&[], &RecordId::new("M1")), 0);
        assert_eq!(member_name(&[], &RecordId::new("M1")), UNKNOWN_MEMBER);
    }

    #[test]
    fn test_recent_announcements_keeps_server_order() {
        let anns: Vec<Announcement> = ["c", "a", "b", "d"]
            .iter()
            .enumerate()
            .map(|(i, t)| Announcement {
                id: RecordId::new(i.to_string()),
                title: t.to_string(),
                message: String::new(),
                priority: Priority::Normal,
                announcement_date: None,
            })
            .collect();
        let titles: Vec<&str> = recent_announcements(&anns, 3)
            .iter()
            .map(|a| a.title.as_str())
            .collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_visible_contributions_by_role() {
        let all = vec![
            contribution("1", "M1", ContributionStatus::Paid),
            contribution("2", "M2", ContributionStatus::Pending),
        ];
        assert_eq!(visible_contributions(&all, &user("M1", Role::Member)).len(), 1);
        assert_eq!(visible_contributions(&all, &user("A1", Role::Admin)).len(), 2);
    }

    #[test]
    fn test_orphaned_contribution_shows_unknown() {
        let snapshot = Snapshot {
            contributions: vec![contribution("9", "GONE", ContributionStatus::Pending)],
            members: Some(vec![member("M1", "Lerato Khumalo")]),
            ..Snapshot::default()
        };
        let text = render_contributions(&snapshot, &user("A1", Role::Admin), &DisplayConfig::default());
        assert!(text.contains(UNKNOWN_MEMBER));
    }

    #[test]
    fn test_paid_count() {
        let all = vec![
            contribution("1", "M1", ContributionStatus::Paid),
            contribution("2", "M1", ContributionStatus::Pending),
            contribution("3", "M1", ContributionStatus::Paid),
            contribution("4", "M2", ContributionStatus::Paid),
        ];
        assert_eq!(paid_count(&all, &RecordId::new("M1")), 2);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0, "R"), "R 0");
        assert_eq!(format_amount(300.0, "R"), "R 300");
        assert_eq!(format_amount(1500.0, "R"), "R 1,500");
        assert_eq!(format_amount(1234567.5, "R"), "R 1,234,567.50");
        assert_eq!(format_amount(-42.0, "R"), "R -42");
    }

    #[test]
    fn test_bank_details_masked_until_revealed() {
        let mut m = member("M1", "Lerato Khumalo");
        m.bank_name = Some("FNB".to_string());
        m.account_number = Some("62000000001".to_string());
        let snapshot = Snapshot {
            members: Some(vec![m, member("M2", "Thandi Mokoena")]),
            ..Snapshot::default()
        };

        let hidden = render_members(&snapshot, &HashSet::new());
        assert!(!hidden.contains("62000000001"));
        assert!(hidden.contains(MASKED));

        let revealed: HashSet<RecordId> = [RecordId::new("M1"), RecordId::new("M2")].into();
        let shown = render_members(&snapshot, &revealed);
        assert!(shown.contains("62000000001"));
        // Member without bank fields renders placeholders rather than failing
        assert!(shown.contains("bank: - | holder: -"));
    }

    #[test]
    fn test_render_single_member() {
        let mut m = member("M1", "Lerato Khumalo");
        m.id_number = Some("9001010000000".to_string());
        m.role = Some(Role::Member);
        let paid = vec![contribution("1", "M1", ContributionStatus::Paid)];

        let text = render_member(&m, &paid, false);
        assert!(text.contains("[M1] Lerato Khumalo"));
        assert!(text.contains("paid: 1"));
        assert!(text.contains("id number: 9001010000000 | role: member"));
        assert!(text.contains(MASKED));
    }

    #[test]
    fn test_render_dashboard() {
        let snapshot = Snapshot {
            contributions: vec![
                contribution("1", "M1", ContributionStatus::Paid),
                contribution("2", "M2", ContributionStatus::Paid),
            ],
            stats: Stats {
                total_saved: 3600.0,
                months_contributed: 12,
                estimated_payout: 43200.0,
            },
            ..Snapshot::default()
        };
        let text = render_dashboard(&user("M1", Role::Member), &snapshot, &DisplayConfig::default());
        assert!(text.starts_with("Hi, Lerato!"));
        assert!(text.contains("R 3,600"));
        assert!(text.contains("12 months contributed"));
        assert!(text.contains("R 43,200"));
        assert!(text.contains("Month 1"));
        assert!(!text.contains("Month 2"));
        assert!(text.contains("No announcements"));
    }

    #[test]
    fn test_render_announcements_flags_high_priority() {
        let anns = vec![Announcement {
            id: RecordId::new("1"),
            title: "AGM".to_string(),
            message: "Sunday".to_string(),
            priority: Priority::High,
            announcement_date: None,
        }];
        let text = render_announcements(&anns);
        assert!(text.contains("AGM [HIGH]"));
        assert!(text.contains("(-)"));
    }
}

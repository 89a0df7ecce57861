use crate::{
    config::Config,
    dashboard::{Dashboard, Tab},
    model::{ContributionStatus, NewAnnouncement, NewContribution, NewMember, Priority, RecordId, Role},
    views, Args,
};
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::cell::RefCell;
use std::collections::HashMap;

pub struct Context {
    pub args: Args,
    pub config: Config,
    pub dashboard: RefCell<Dashboard>,
}

pub fn run_once(ctx: &Context, line: &str) -> Result<()> {
    let line = line.trim();
    let line = if line.starts_with('/') {
        line.to_string()
    } else {
        format!("/{}", line)
    };
    handle_command(ctx, &line);
    match ctx.dashboard.borrow().error() {
        Some(err) => Err(anyhow::anyhow!("{}", err)),
        None => Ok(()),
    }
}

pub fn run_repl(ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("stokvel - type /help for commands, /exit to quit");
    greet(&ctx);

    loop {
        match rl.readline(&prompt(&ctx)) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                // Keep passwords typed inline out of history
                if !line.starts_with("/login") {
                    rl.add_history_entry(line)?;
                }

                if !line.starts_with('/') {
                    println!("Commands start with '/'. Type /help for a list.");
                    continue;
                }
                if handle_command(&ctx, line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

fn prompt(ctx: &Context) -> String {
    match ctx.dashboard.borrow().user() {
        Some(user) if user.is_admin() => format!("{} (admin)> ", user.first_name()),
        Some(user) => format!("{}> ", user.first_name()),
        None => "login> ".to_string(),
    }
}

fn greet(ctx: &Context) {
    let dash = ctx.dashboard.borrow();
    match dash.user() {
        Some(user) => {
            println!("Welcome back, {}.", user.first_name());
            print_tab(ctx, &dash);
        }
        None => println!("Not logged in. Use /login <email>"),
    }
    print_banner(&dash);
}

fn print_banner(dash: &Dashboard) {
    if let Some(err) = dash.error() {
        eprintln!("! {}  (/dismiss to clear)", err);
    }
}

fn print_tab(ctx: &Context, dash: &Dashboard) {
    let user = match dash.user() {
        Some(user) => user,
        None => return,
    };
    let snapshot = dash.snapshot();
    let display = &ctx.config.display;
    let text = match dash.tab() {
        Tab::Home => views::render_dashboard(&user, snapshot, display),
        Tab::Members => views::render_members(snapshot, dash.revealed()),
        Tab::Contributions => views::render_contributions(snapshot, &user, display),
        Tab::Announcements => views::render_announcements(&snapshot.announcements),
    };
    print!("{}", text);
}

fn confirm(ctx: &Context, question: &str) -> bool {
    if ctx.args.yes {
        return true;
    }
    dialoguer::Confirm::new()
        .with_prompt(question)
        .default(false)
        .interact()
        .unwrap_or(false)
}

/// Parse `key=value` arguments into a map. Keys are case-insensitive and
/// `-` is treated as `_`.
pub fn parse_fields(args: &[String]) -> Result<HashMap<String, String>, String> {
    let mut fields = HashMap::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("Expected key=value, got '{}'", arg))?;
        fields.insert(key.trim().to_lowercase().replace('-', "_"), value.to_string());
    }
    Ok(fields)
}

fn take(fields: &mut HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| fields.remove(*k))
}

fn reject_unknown(fields: HashMap<String, String>) -> Result<(), String> {
    let mut unknown: Vec<String> = fields.into_keys().collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort();
    Err(format!("Unknown field(s): {}", unknown.join(", ")))
}

pub fn new_member_from(fields: HashMap<String, String>) -> Result<NewMember, String> {
    let mut member = NewMember::default();
    apply_member_fields(&mut member, fields)?;
    Ok(member)
}

/// Overwrite only the fields given, leaving the rest of `member` as is
pub fn apply_member_fields(
    member: &mut NewMember,
    mut fields: HashMap<String, String>,
) -> Result<(), String> {
    let text_fields: [(&mut String, &[&str]); 10] = [
        (&mut member.name, &["name"]),
        (&mut member.id_number, &["id_number", "idnumber", "id"]),
        (&mut member.phone, &["phone"]),
        (&mut member.email, &["email"]),
        (&mut member.password, &["password"]),
        (&mut member.status, &["status"]),
        (&mut member.bank_name, &["bank_name", "bankname", "bank"]),
        (&mut member.account_holder, &["account_holder", "accountholder", "holder"]),
        (&mut member.account_number, &["account_number", "accountnumber", "account"]),
        (&mut member.branch_code, &["branch_code", "branchcode", "branch"]),
    ];
    for (slot, keys) in text_fields {
        if let Some(value) = take(&mut fields, keys) {
            *slot = value;
        }
    }
    if let Some(role) = take(&mut fields, &["role"]) {
        member.role = Role::from_str(&role).ok_or_else(|| format!("Unknown role '{}'", role))?;
    }
    reject_unknown(fields)
}

pub fn new_contribution_from(mut fields: HashMap<String, String>) -> Result<NewContribution, String> {
    let mut contribution = NewContribution::default();
    contribution.member_id =
        take(&mut fields, &["member_id", "memberid", "member"]).unwrap_or_default();
    contribution.month = take(&mut fields, &["month"]).unwrap_or_default();
    if let Some(amount) = take(&mut fields, &["amount"]) {
        contribution.amount = amount
            .trim()
            .parse()
            .map_err(|_| format!("Invalid amount '{}'", amount))?;
    }
    if let Some(status) = take(&mut fields, &["status"]) {
        contribution.status = ContributionStatus::settable(&status)
            .ok_or_else(|| format!("Status must be Paid or Pending, got '{}'", status))?;
    }
    contribution.date = take(&mut fields, &["date", "date_paid"]).filter(|d| !d.is_empty());
    reject_unknown(fields)?;
    Ok(contribution)
}

pub fn new_announcement_from(mut fields: HashMap<String, String>) -> Result<NewAnnouncement, String> {
    let mut announcement = NewAnnouncement {
        title: take(&mut fields, &["title"]).unwrap_or_default(),
        message: take(&mut fields, &["message", "msg"]).unwrap_or_default(),
        priority: Priority::Normal,
    };
    if let Some(priority) = take(&mut fields, &["priority"]) {
        announcement.priority = Priority::from_str(&priority)
            .ok_or_else(|| format!("Priority must be normal or high, got '{}'", priority))?;
    }
    reject_unknown(fields)?;
    Ok(announcement)
}

/// Run one slash command. Returns true when the REPL should exit.
fn handle_command(ctx: &Context, cmd: &str) -> bool {
    let words = match shell_words::split(cmd) {
        Ok(words) => words,
        Err(e) => {
            println!("Could not parse command: {}", e);
            return false;
        }
    };
    let (name, args) = match words.split_first() {
        Some((name, args)) => (name.as_str(), args),
        None => return false,
    };

    match name {
        "/exit" | "/quit" => return true,
        "/help" => print_help(),
        "/login" => handle_login(ctx, args),
        _ if !ctx.dashboard.borrow().is_authenticated() => {
            println!("Not logged in. Use /login <email>");
        }
        "/logout" => {
            ctx.dashboard.borrow_mut().logout();
            println!("Logged out.");
        }
        "/whoami" => {
            if let Some(user) = ctx.dashboard.borrow().user() {
                println!("{} [{}] {} ({})", user.name, user.id, user.role.as_str(), user.status);
            }
        }
        "/reload" => {
            if ctx.dashboard.borrow_mut().reload() {
                println!("Data refreshed.");
            }
        }
        "/dashboard" | "/home" => show_tab(ctx, Tab::Home),
        "/members" => show_tab(ctx, Tab::Members),
        "/contributions" => show_tab(ctx, Tab::Contributions),
        "/announcements" => show_tab(ctx, Tab::Announcements),
        "/reveal" => match args.first() {
            Some(id) => {
                let id = RecordId::new(id.as_str());
                let mut dash = ctx.dashboard.borrow_mut();
                if !dash.is_admin() {
                    println!("Only administrators can view banking details.");
                } else {
                    let shown = dash.toggle_bank_details(&id);
                    println!(
                        "Banking details for {} {}.",
                        id,
                        if shown { "shown" } else { "hidden" }
                    );
                    drop(dash);
                    show_tab(ctx, Tab::Members);
                }
            }
            None => println!("Usage: /reveal <member-id>"),
        },
        "/add-member" => {
            let member = parse_fields(args).and_then(new_member_from);
            match member {
                Ok(member) => {
                    if ctx.dashboard.borrow_mut().add_member(member) {
                        println!("Member added.");
                    }
                }
                Err(e) => println!("{}", e),
            }
        }
        "/member" => match args.first() {
            Some(id) => {
                let id = RecordId::new(id.as_str());
                let mut dash = ctx.dashboard.borrow_mut();
                if let Some(member) = dash.member_details(&id) {
                    let revealed = dash.revealed().contains(&id);
                    print!(
                        "{}",
                        views::render_member(&member, &dash.snapshot().contributions, revealed)
                    );
                }
            }
            None => println!("Usage: /member <member-id>"),
        },
        "/update-member" => match args.split_first() {
            Some((id, fields)) => {
                let id = RecordId::new(id.as_str());
                let fields = match parse_fields(fields) {
                    Ok(fields) => fields,
                    Err(e) => {
                        println!("{}", e);
                        return false;
                    }
                };
                let mut dash = ctx.dashboard.borrow_mut();
                if let Some(current) = dash.member_details(&id) {
                    let mut member = NewMember::from_member(&current);
                    match apply_member_fields(&mut member, fields) {
                        Ok(()) => {
                            if dash.update_member(&id, member) {
                                println!("Member {} updated.", id);
                            }
                        }
                        Err(e) => println!("{}", e),
                    }
                }
            }
            None => println!("Usage: /update-member <member-id> key=value..."),
        },
        "/delete-member" => match args.first() {
            Some(id) => {
                if confirm(ctx, "Are you sure you want to delete this member?")
                    && ctx
                        .dashboard
                        .borrow_mut()
                        .delete_member(&RecordId::new(id.as_str()))
                {
                    println!("Member deleted.");
                }
            }
            None => println!("Usage: /delete-member <member-id>"),
        },
        "/add-contribution" => match parse_fields(args).and_then(new_contribution_from) {
            Ok(contribution) => {
                if ctx.dashboard.borrow_mut().add_contribution(contribution) {
                    println!("Contribution recorded.");
                }
            }
            Err(e) => println!("{}", e),
        },
        "/mark" => match (args.first(), args.get(1)) {
            (Some(id), Some(status)) => match ContributionStatus::settable(status) {
                Some(status) => {
                    if ctx
                        .dashboard
                        .borrow_mut()
                        .update_contribution_status(&RecordId::new(id.as_str()), status)
                    {
                        println!("Contribution {} updated.", id);
                    }
                }
                None => println!("Status must be paid or pending"),
            },
            _ => println!("Usage: /mark <contribution-id> paid|pending"),
        },
        "/announce" => match parse_fields(args).and_then(new_announcement_from) {
            Ok(announcement) => {
                if ctx.dashboard.borrow_mut().add_announcement(announcement) {
                    println!("Announcement posted.");
                }
            }
            Err(e) => println!("{}", e),
        },
        "/delete-announcement" => match args.first() {
            Some(id) => {
                if confirm(ctx, "Delete this announcement?")
                    && ctx
                        .dashboard
                        .borrow_mut()
                        .delete_announcement(&RecordId::new(id.as_str()))
                {
                    println!("Announcement deleted.");
                }
            }
            None => println!("Usage: /delete-announcement <id>"),
        },
        "/dismiss" => ctx.dashboard.borrow_mut().dismiss_error(),
        _ => println!("Unknown command: {}", name),
    }

    let dash = ctx.dashboard.borrow();
    if dash.session_expired() && !dash.is_authenticated() {
        println!("Session expired. Please log in again with /login <email>");
    }
    print_banner(&dash);
    false
}

fn handle_login(ctx: &Context, args: &[String]) {
    let email = match args.first() {
        Some(email) => email.clone(),
        None => {
            println!("Usage: /login <email> [password]");
            return;
        }
    };
    let password = match args.get(1) {
        Some(p) => p.clone(),
        None => match dialoguer::Password::new().with_prompt("Password").interact() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Input error: {}", e);
                return;
            }
        },
    };

    let ok = ctx.dashboard.borrow_mut().login(&email, &password);
    if ok {
        let dash = ctx.dashboard.borrow();
        if let Some(user) = dash.user() {
            println!("Logged in as {} ({}).", user.name, user.role.as_str());
        }
        print_tab(ctx, &dash);
    }
}

fn show_tab(ctx: &Context, tab: Tab) {
    let mut dash = ctx.dashboard.borrow_mut();
    if !dash.set_tab(tab) {
        println!("That view is only available to administrators.");
        return;
    }
    drop(dash);
    print_tab(ctx, &ctx.dashboard.borrow());
}

fn print_help() {
    println!("Session:");
    println!("  /login <email> [password] - log in (password prompted if omitted)");
    println!("  /logout                   - log out and forget the stored session");
    println!("  /whoami                   - show the current user");
    println!("  /reload                   - refetch everything");
    println!("Views:");
    println!("  /dashboard                - totals, payout estimate, recent activity");
    println!("  /contributions            - contribution history");
    println!("  /announcements            - all announcements");
    println!("  /members                  - member list (admin)");
    println!("  /reveal <id>              - show/hide a member's banking details (admin)");
    println!("Admin:");
    println!("  /add-member name=.. email=.. id_number=.. [phone=.. role=member|admin");
    println!("              status=.. password=.. bank_name=.. account_holder=..");
    println!("              account_number=.. branch_code=..]");
    println!("  /member <id>              - fetch one member's full record");
    println!("  /update-member <id> key=value..  - change the given fields only");
    println!("  /delete-member <id>");
    println!("  /add-contribution member=<id> month=\"March 2026\" [amount=300 status=pending date=..]");
    println!("  /mark <contribution-id> paid|pending");
    println!("  /announce title=\"..\" message=\"..\" [priority=normal|high]");
    println!("  /delete-announcement <id>");
    println!("Other:");
    println!("  /dismiss                  - clear the error banner");
    println!("  /help, /exit");
}

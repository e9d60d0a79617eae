//! gi issue commands
//!
//! Every mutating command works on a clone of the indexed issue, so a
//! cancelled prompt or a failed validation leaves the store untouched.

use serde::Serialize;

use super::Session;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::{parse_filter_expr, FilterOperator, Rule};
use crate::identity;
use crate::issue::Issue;
use crate::output::{emit_success, issue_detail, issue_table, HumanOutput};
use crate::prompt::{confirm, Prompter};
use crate::property::Property;
use crate::record::{Document, Record};

/// Options for `gi new`
pub struct NewOptions {
    pub title: Option<String>,
    pub sets: Vec<String>,
    pub no_edit: bool,
    pub yes: bool,
}

/// Options for `gi edit`
pub struct EditOptions {
    pub id: String,
    pub sets: Vec<String>,
    pub no_edit: bool,
    pub yes: bool,
}

/// Options for `gi comment`
pub struct CommentOptions {
    pub id: String,
    pub message: Option<String>,
}

/// Options for `gi list` and `gi my`
pub struct ListOptions {
    pub sort: Option<String>,
    pub filter: Option<String>,
    pub all: bool,
}

#[derive(Serialize)]
struct IssueReport {
    id: String,
    issue: Document,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    changed: Vec<String>,
}

#[derive(Serialize)]
struct ListReport {
    total: usize,
    issues: Vec<Document>,
}

#[derive(Serialize)]
struct ShowReport {
    issue: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    comments: Option<Vec<Document>>,
}

#[derive(Serialize)]
struct CommentReport {
    issue_id: String,
    comment: Document,
}

#[derive(Serialize)]
struct CloseReport {
    id: String,
    closed: bool,
}

#[derive(Serialize)]
struct DeleteReport {
    id: String,
    comments_deleted: usize,
}

#[derive(Serialize)]
struct ReindexReport {
    issues: usize,
    head: Option<String>,
}

/// Split `field=value`.
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    let (field, value) = raw.split_once('=').ok_or_else(|| {
        Error::InvalidArgument(format!("'{raw}' must look like field=value"))
    })?;
    let field = field.trim();
    if field.is_empty() {
        return Err(Error::InvalidArgument(format!("'{raw}' is missing a field name")));
    }
    Ok((field.to_string(), value.to_string()))
}

fn apply_assignments<R: Record>(record: &mut R, sets: &[String]) -> Result<()> {
    for raw in sets {
        let (name, value) = parse_assignment(raw)?;
        let field = record.get_property_mut(&name)?;
        if !field.is_editable() {
            return Err(Error::InvalidArgument(format!("field '{name}' is not editable")));
        }
        field.set(&value)?;
    }
    Ok(())
}

fn confirmed(prompter: &mut dyn Prompter, skip: bool, question: &str, default: bool) -> Result<()> {
    if skip || confirm(prompter, question, default)? {
        Ok(())
    } else {
        Err(Error::Cancelled)
    }
}

/// Rules for `list`: the user's filter plus hidden statuses unless `all`.
pub(crate) fn list_rules(config: &Config, filter: Option<&str>, all: bool) -> Result<Vec<Rule>> {
    let mut rules = match filter {
        Some(expr) => parse_filter_expr(expr)?,
        None => Vec::new(),
    };
    if !all {
        rules.extend(
            config
                .list
                .hidden_statuses
                .iter()
                .map(|status| Rule::parse("status__not", status)),
        );
    }
    Ok(rules)
}

fn emit_issue(
    session: &Session,
    command: &str,
    header: String,
    issue: &Issue,
    changed: Vec<String>,
) -> Result<()> {
    let report = IssueReport {
        id: issue.id(),
        issue: issue.to_document(),
        changed,
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("title", issue.title());
    human.push_summary("status", issue.status());
    for name in &report.changed {
        human.push_summary("changed", name.clone());
    }
    emit_success(session.output, command, &report, Some(&human))
}

pub fn run_new(session: &mut Session, prompter: &mut dyn Prompter, options: NewOptions) -> Result<()> {
    let mut document = Document::new();
    if let Some(title) = options.title {
        document.insert("title".to_string(), title);
    }

    let mut issue = Issue::from_document(session.ctx(), &*session.store, &document)?;
    apply_assignments(&mut issue, &options.sets)?;
    if !options.no_edit {
        issue.interactively_edit(prompter)?;
    }
    issue.stamp_creation();
    issue.check()?;
    confirmed(prompter, options.yes, "Create issue (y)? ", true)?;

    issue.save(session.store.as_mut())?;
    let id = issue.id();
    session.store.commit(&format!("Added issue {id}"))?;
    tracing::info!(id = %id, "created issue");

    emit_issue(session, "new", format!("Added issue {id}"), &issue, Vec::new())
}

fn list_issues(session: &mut Session, command: &str, rules: &[Rule], sort: Option<&str>) -> Result<()> {
    let color = session.output.color;
    let issues = session
        .manager
        .filter(&*session.store, rules, FilterOperator::And, sort)?;

    let report = ListReport {
        total: issues.len(),
        issues: issues.iter().map(|issue| issue.to_document()).collect(),
    };

    let human = if issues.is_empty() {
        HumanOutput::new("No issues found")
    } else {
        let mut lines = issue_table(&issues, color).into_iter();
        let mut human = HumanOutput::new(lines.next().unwrap_or_default());
        for line in lines {
            human.push_detail(line);
        }
        human.push_detail(String::new());
        human.push_detail(format!("Total Issues: {}", report.total));
        human
    };

    emit_success(session.output, command, &report, Some(&human))
}

pub fn run_list(session: &mut Session, options: ListOptions) -> Result<()> {
    let rules = list_rules(&session.config, options.filter.as_deref(), options.all)?;
    list_issues(session, "list", &rules, options.sort.as_deref())
}

pub fn run_my(session: &mut Session, options: ListOptions) -> Result<()> {
    let needle = identity::assignee_needle(&session.ctx().current_user).to_string();
    let mut rules = vec![Rule::parse("assigned_to", &needle)];
    rules.extend(list_rules(&session.config, options.filter.as_deref(), options.all)?);
    list_issues(session, "my", &rules, options.sort.as_deref())
}

pub fn run_show(session: &mut Session, id: &str, all: bool) -> Result<()> {
    let mut issue = session.manager.get(&*session.store, id)?.clone();
    let comments = if all {
        Some(issue.comments(session.manager.ctx(), &*session.store)?.to_vec())
    } else {
        None
    };

    let report = ShowReport {
        issue: issue.to_document(),
        comments: comments
            .as_ref()
            .map(|comments| comments.iter().map(Record::to_document).collect()),
    };

    let mut lines = issue_detail(&issue, comments.as_deref(), session.output.color).into_iter();
    let mut human = HumanOutput::new(lines.next().unwrap_or_default());
    for line in lines {
        human.push_detail(line);
    }
    emit_success(session.output, "show", &report, Some(&human))
}

pub fn run_edit(session: &mut Session, prompter: &mut dyn Prompter, options: EditOptions) -> Result<()> {
    let mut issue = session.manager.get(&*session.store, &options.id)?.clone();
    let before = issue.to_document();

    apply_assignments(&mut issue, &options.sets)?;
    if !options.no_edit {
        issue.interactively_edit(prompter)?;
    }
    issue.touch();
    issue.check()?;
    confirmed(prompter, options.yes, "Save changes (y)? ", true)?;

    let changed: Vec<String> = issue
        .to_document()
        .into_iter()
        .filter(|(name, value)| name != "updated_on" && before.get(name) != Some(value))
        .map(|(name, _)| name)
        .collect();

    issue.save(session.store.as_mut())?;
    let id = issue.id();
    session.store.commit(&format!("Edited issue {id}"))?;
    tracing::info!(id = %id, changed = changed.len(), "edited issue");

    emit_issue(session, "edit", format!("Edited issue {id}"), &issue, changed)
}

pub fn run_comment(
    session: &mut Session,
    prompter: &mut dyn Prompter,
    options: CommentOptions,
) -> Result<()> {
    let issue = session.manager.get(&*session.store, &options.id)?.clone();
    let mut comment = issue.new_comment(session.manager.ctx(), &*session.store)?;
    match options.message {
        Some(text) => comment.set("description", &text)?,
        None => comment.interactively_edit(prompter)?,
    }
    comment.check()?;

    comment.save(session.store.as_mut())?;
    let id = issue.id();
    session.store.commit(&format!("Added comment on issue {id}"))?;
    tracing::info!(issue = %id, comment = %comment.id(), "added comment");

    let report = CommentReport {
        issue_id: id.clone(),
        comment: comment.to_document(),
    };
    let mut human = HumanOutput::new(format!("Added comment on issue {id}"));
    human.push_summary("comment", comment.id());
    emit_success(session.output, "comment", &report, Some(&human))
}

pub fn run_close(session: &mut Session, id: &str) -> Result<()> {
    let mut issue = session.manager.get(&*session.store, id)?.clone();
    let id = issue.id();

    if !issue.close()? {
        let report = CloseReport { id, closed: false };
        let human = HumanOutput::new("Issue already closed");
        return emit_success(session.output, "close", &report, Some(&human));
    }

    issue.save(session.store.as_mut())?;
    session.store.commit(&format!("Closed issue {id}"))?;
    tracing::info!(id = %id, "closed issue");

    let report = CloseReport {
        id: id.clone(),
        closed: true,
    };
    let mut human = HumanOutput::new(format!("Closed issue {id}"));
    human.push_summary("title", issue.title());
    emit_success(session.output, "close", &report, Some(&human))
}

pub fn run_delete(session: &mut Session, prompter: &mut dyn Prompter, id: &str, yes: bool) -> Result<()> {
    let mut issue = session.manager.get(&*session.store, id)?.clone();
    let id = issue.id();
    let count = issue.comments(session.manager.ctx(), &*session.store)?.len();
    confirmed(
        prompter,
        yes,
        &format!("Delete issue {id} and {count} comment(s) (y)? "),
        false,
    )?;

    let deleted = issue.delete(session.manager.ctx(), session.store.as_mut())?;
    session.store.commit(&format!("Deleted issue {id}"))?;
    tracing::info!(id = %id, comments = deleted, "deleted issue");

    let report = DeleteReport {
        id: id.clone(),
        comments_deleted: deleted,
    };
    let mut human = HumanOutput::new(format!("Deleted issue {id}"));
    human.push_summary("comments deleted", deleted.to_string());
    emit_success(session.output, "delete", &report, Some(&human))
}

pub fn run_reindex(session: &mut Session) -> Result<()> {
    let issues = session.manager.update_db(&*session.store)?;
    let head = session.store.current_head()?;

    let report = ReindexReport {
        issues,
        head: head.clone(),
    };
    let mut human = HumanOutput::new(format!("Indexed {issues} issue(s)"));
    if let Some(head) = head {
        human.push_summary("head", head);
    }
    emit_success(session.output, "reindex", &report, Some(&human))
}

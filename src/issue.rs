//! Issue records and their comments.

use chrono::NaiveDateTime;
use crossterm::style::Color;

use crate::comment::Comment;
use crate::error::Result;
use crate::property::{
    DateProperty, DescriptionProperty, Field, IdProperty, OptionProperty, OptionSpec, PropertyMeta,
    TextProperty,
};
use crate::record::{Record, RecordContext};
use crate::store::Store;

pub const STATUS_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("new", 'n', Color::Yellow),
    OptionSpec::new("assigned", 'a', Color::Green),
    OptionSpec::new("invalid", 'i', Color::White),
    OptionSpec::new("closed", 'c', Color::White),
];

pub const TYPE_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("bug", 'b', Color::Yellow),
    OptionSpec::new("feature", 'f', Color::Green),
];

pub const STATUS_CLOSED: &str = "closed";

const DISPLAY_ORDER: &[&str] = &[
    "id",
    "title",
    "type",
    "reported_from",
    "assigned_to",
    "created_on",
    "updated_on",
    "status",
    "description",
];

/// An issue stored under `<id>/issue`.
#[derive(Debug, Clone)]
pub struct Issue {
    fields: Vec<Field>,
    comments: Option<Vec<Comment>>,
}

impl Issue {
    fn text(&self, name: &str) -> String {
        self.value_of(name).unwrap_or_default()
    }

    pub fn title(&self) -> String {
        self.text("title")
    }

    pub fn status(&self) -> String {
        self.text("status")
    }

    pub fn issue_type(&self) -> String {
        self.text("type")
    }

    pub fn assigned_to(&self) -> String {
        self.text("assigned_to")
    }

    pub fn reported_from(&self) -> String {
        self.text("reported_from")
    }

    pub fn created_on(&self) -> Option<NaiveDateTime> {
        self.get_property("created_on")
            .ok()
            .and_then(Field::as_date)
            .and_then(DateProperty::timestamp)
    }

    pub fn updated_on(&self) -> Option<NaiveDateTime> {
        self.get_property("updated_on")
            .ok()
            .and_then(Field::as_date)
            .and_then(DateProperty::timestamp)
    }

    pub fn is_closed(&self) -> bool {
        self.status() == STATUS_CLOSED
    }

    /// Prefix shared by the keys of this issue's comments.
    pub fn comments_prefix(&self) -> String {
        format!("{}/comments/", self.id())
    }

    /// Comments sorted by creation time, scanned from `store` on first use.
    pub fn comments(&mut self, ctx: &RecordContext, store: &dyn Store) -> Result<&[Comment]> {
        if self.comments.is_none() {
            let prefix = self.comments_prefix();
            let mut comments = Vec::new();
            for key in store.keys()? {
                if key.starts_with(&prefix) {
                    comments.push(Comment::load(ctx, store, &store.get(&key)?)?);
                }
            }
            comments.sort_by_key(Comment::created_on);
            tracing::debug!(issue = %self.id(), count = comments.len(), "loaded comments");
            self.comments = Some(comments);
        }
        Ok(self.comments.as_deref().unwrap_or_default())
    }

    /// Forget the loaded comments; the next access rescans.
    pub fn reset_comments(&mut self) {
        self.comments = None;
    }

    /// A new comment bound to this issue, not saved yet.
    pub fn new_comment(&self, ctx: &RecordContext, store: &dyn Store) -> Result<Comment> {
        Comment::for_issue(ctx, store, &self.id())
    }

    /// Delete every comment, then the issue itself; returns the comment count.
    pub fn delete(&mut self, ctx: &RecordContext, store: &mut dyn Store) -> Result<usize> {
        self.reset_comments();
        let paths: Vec<String> = self
            .comments(ctx, &*store)?
            .iter()
            .map(Comment::path)
            .collect();
        for path in &paths {
            store.delete(path)?;
        }
        store.delete(&self.path())?;
        self.comments = Some(Vec::new());
        Ok(paths.len())
    }

    /// Mark the issue closed; `false` when it already was.
    pub fn close(&mut self) -> Result<bool> {
        if self.is_closed() {
            return Ok(false);
        }
        self.set("status", STATUS_CLOSED)?;
        self.touch();
        Ok(true)
    }
}

impl Record for Issue {
    fn blank(ctx: &RecordContext) -> Self {
        let users = ctx.contributors.clone();
        let fields = vec![
            Field::Id(IdProperty::new("id", true)),
            Field::Text(TextProperty::new(
                PropertyMeta::new("title").allow_empty(false),
            )),
            Field::Option(OptionProperty::new("type", TYPE_OPTIONS, "bug")),
            Field::Text(TextProperty::with_default(
                PropertyMeta::new("reported_from").completion(users.clone()),
                ctx.current_user.clone(),
            )),
            Field::Text(TextProperty::new(
                PropertyMeta::new("assigned_to").completion(users),
            )),
            Field::Date(DateProperty::new(
                PropertyMeta::new("created_on").editable(false).allow_empty(false),
                true,
                false,
            )),
            Field::Date(DateProperty::new(
                PropertyMeta::new("updated_on").editable(false).allow_empty(false),
                false,
                true,
            )),
            Field::Option(OptionProperty::new("status", STATUS_OPTIONS, "new")),
            Field::Description(DescriptionProperty::new(PropertyMeta::new("description"))),
        ];
        Self {
            fields,
            comments: None,
        }
    }

    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    fn display_order(&self) -> &'static [&'static str] {
        DISPLAY_ORDER
    }

    fn path(&self) -> String {
        format!("{}/issue", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::prompt::ScriptedPrompter;
    use crate::property::parse_timestamp;
    use crate::record::Document;
    use crate::store::MemoryStore;

    fn ctx() -> RecordContext {
        RecordContext::new("Alice <alice@example.com>")
            .with_contributors(vec!["Bob <bob@example.com>".to_string()])
    }

    fn titled(store: &dyn Store, title: &str) -> Issue {
        let mut doc = Document::new();
        doc.insert("title".to_string(), title.to_string());
        Issue::from_document(&ctx(), store, &doc).unwrap()
    }

    #[test]
    fn new_issue_takes_defaults() {
        let store = MemoryStore::new();
        let issue = titled(&store, "fix crash");
        assert_eq!(issue.title(), "fix crash");
        assert_eq!(issue.status(), "new");
        assert_eq!(issue.issue_type(), "bug");
        assert_eq!(issue.reported_from(), "Alice <alice@example.com>");
        assert_eq!(issue.id().len(), 64);
        assert!(issue.created_on().is_some());
        assert_eq!(issue.created_on(), issue.updated_on());
    }

    #[test]
    fn interactive_edit_walks_display_order() {
        let mut issue = Issue::blank(&ctx());
        issue.set("id", "abc").unwrap();
        let mut prompter = ScriptedPrompter::new([
            "fix crash",
            "f",
            "",
            "Bob <bob@example.com>",
            "",
            "line one",
            ".",
        ]);
        issue.interactively_edit(&mut prompter).unwrap();

        assert_eq!(issue.title(), "fix crash");
        assert_eq!(issue.issue_type(), "feature");
        assert_eq!(issue.assigned_to(), "Bob <bob@example.com>");
        assert_eq!(issue.status(), "new");
        assert_eq!(issue.value_of("description").unwrap(), "line one");
        assert!(issue.updated_on().is_some());
        assert_eq!(prompter.remaining(), 0);
    }

    #[test]
    fn cancelled_edit_surfaces() {
        let mut issue = Issue::blank(&ctx());
        let mut prompter = ScriptedPrompter::new(["only title"]);
        assert!(matches!(
            issue.interactively_edit(&mut prompter),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn comments_are_sorted_by_creation() {
        let mut store = MemoryStore::new();
        let mut issue = titled(&store, "fix crash");
        issue.save(&mut store).unwrap();

        for (id, created, text) in [
            ("ccc", "2024-01-03 00:00:00", "third"),
            ("aaa", "2024-01-01 00:00:00", "first"),
            ("bbb", "2024-01-02 00:00:00", "second"),
        ] {
            let doc: Document = [
                ("id", id),
                ("issue_id", issue.id().as_str()),
                ("created_on", created),
                ("description", text),
            ]
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
            let comment = Comment::from_document(&ctx(), &store, &doc).unwrap();
            comment.save(&mut store).unwrap();
        }

        let texts: Vec<String> = issue
            .comments(&ctx(), &store)
            .unwrap()
            .iter()
            .map(|c| c.value_of("description").unwrap())
            .collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn comments_are_cached_until_reset() {
        let mut store = MemoryStore::new();
        let mut issue = titled(&store, "fix crash");
        issue.save(&mut store).unwrap();
        assert!(issue.comments(&ctx(), &store).unwrap().is_empty());

        let mut comment = issue.new_comment(&ctx(), &store).unwrap();
        comment.set("description", "late").unwrap();
        comment.save(&mut store).unwrap();
        assert!(issue.comments(&ctx(), &store).unwrap().is_empty());

        issue.reset_comments();
        assert_eq!(issue.comments(&ctx(), &store).unwrap().len(), 1);
    }

    #[test]
    fn delete_cascades_to_comments() {
        let mut store = MemoryStore::new();
        let mut keep = titled(&store, "keep me");
        keep.save(&mut store).unwrap();
        let mut issue = titled(&store, "fix crash");
        issue.save(&mut store).unwrap();
        for text in ["one", "two"] {
            let mut comment = issue.new_comment(&ctx(), &store).unwrap();
            comment.set("description", text).unwrap();
            comment.save(&mut store).unwrap();
        }

        assert_eq!(issue.delete(&ctx(), &mut store).unwrap(), 2);
        assert_eq!(store.keys().unwrap(), vec![keep.path()]);
    }

    #[test]
    fn delete_rescans_comments_added_after_caching() {
        let mut store = MemoryStore::new();
        let mut keep = titled(&store, "keep me");
        keep.save(&mut store).unwrap();
        let mut issue = titled(&store, "fix crash");
        issue.save(&mut store).unwrap();
        assert!(issue.comments(&ctx(), &store).unwrap().is_empty());

        let mut comment = issue.new_comment(&ctx(), &store).unwrap();
        comment.set("description", "added elsewhere").unwrap();
        comment.save(&mut store).unwrap();

        assert_eq!(issue.delete(&ctx(), &mut store).unwrap(), 1);
        assert_eq!(store.keys().unwrap(), vec![keep.path()]);
    }

    #[test]
    fn close_is_idempotent() {
        let store = MemoryStore::new();
        let mut issue = titled(&store, "fix crash");
        issue.set("updated_on", "2000-01-01 00:00:00").unwrap();
        assert!(issue.close().unwrap());
        assert!(issue.is_closed());
        assert!(issue.updated_on() > parse_timestamp("2000-01-01 00:00:00"));
        assert!(!issue.close().unwrap());
    }
}

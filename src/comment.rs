use chrono::NaiveDateTime;

use crate::error::Result;
use crate::property::{DateProperty, DescriptionProperty, Field, IdProperty, PropertyMeta, TextProperty};
use crate::record::{Document, Record, RecordContext};
use crate::store::Store;

const DISPLAY_ORDER: &[&str] = &["reported_from", "created_on", "description"];

/// A comment stored under `<issue id>/comments/<id>`.
#[derive(Debug, Clone)]
pub struct Comment {
    fields: Vec<Field>,
}

impl Comment {
    /// A new comment on `issue_id` with a fresh identifier.
    pub fn for_issue(ctx: &RecordContext, store: &dyn Store, issue_id: &str) -> Result<Self> {
        let mut document = Document::new();
        document.insert("issue_id".to_string(), issue_id.to_string());
        Self::from_document(ctx, store, &document)
    }

    pub fn issue_id(&self) -> String {
        self.value_of("issue_id").unwrap_or_default()
    }

    pub fn created_on(&self) -> Option<NaiveDateTime> {
        self.get_property("created_on")
            .ok()
            .and_then(Field::as_date)
            .and_then(DateProperty::timestamp)
    }
}

impl Record for Comment {
    fn blank(ctx: &RecordContext) -> Self {
        let fields = vec![
            Field::Text(TextProperty::with_default(
                PropertyMeta::new("reported_from").completion(ctx.contributors.clone()),
                ctx.current_user.clone(),
            )),
            Field::Id(IdProperty::new("issue_id", false)),
            Field::Date(DateProperty::new(
                PropertyMeta::new("created_on").editable(false).allow_empty(false),
                true,
                false,
            )),
            Field::Description(DescriptionProperty::new(
                PropertyMeta::new("description").allow_empty(false),
            )),
            Field::Id(IdProperty::new("id", true)),
        ];
        Self { fields }
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
        format!("{}/comments/{}", self.issue_id(), self.id())
    }
}

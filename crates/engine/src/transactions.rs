//! Transaction records of a workspace.
//!
//! A transaction belongs to exactly one workspace collection. `id` and
//! `recorded_by` never change after creation; everything else is replaced as a
//! whole by [`TransactionFields`].

use chrono::{DateTime, SubsecRound, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents, ResultEngine, TransactionId, WorkspaceId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub amount: MoneyCents,
    pub category: String,
    pub note: Option<String>,
    pub is_income: bool,
    pub occurred_at: DateTime<Utc>,
    /// Email of the identity that created the record.
    pub recorded_by: String,
}

/// Mutable fields of a transaction, used both to create and to replace.
///
/// Only [`TransactionFields::new`] builds one, so a value in hand has passed
/// validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionFields {
    pub(crate) amount: MoneyCents,
    pub(crate) category: String,
    pub(crate) note: Option<String>,
    pub(crate) is_income: bool,
    pub(crate) occurred_at: DateTime<Utc>,
}

impl TransactionFields {
    pub fn new(
        amount: MoneyCents,
        category: &str,
        note: Option<&str>,
        is_income: bool,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let fields = Self {
            amount,
            category: category.trim().to_string(),
            note: normalize_optional_text(note),
            is_income,
            // Month ranges are millisecond precise.
            occurred_at: occurred_at.trunc_subsecs(3),
        };
        fields.validate()?;
        Ok(fields)
    }

    /// Checks the invariants `new` establishes. Write paths call it again
    /// right before the store.
    pub(crate) fn validate(&self) -> ResultEngine<()> {
        self.amount.ensure_transaction_amount()?;
        if self.category.trim().is_empty() {
            return Err(EngineError::Validation(
                "category must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn amount(&self) -> MoneyCents {
        self.amount
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn is_income(&self) -> bool {
        self.is_income
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workspace_id: String,
    pub amount_minor: i64,
    pub category: String,
    pub note: Option<String>,
    pub is_income: bool,
    pub occurred_at: DateTimeUtc,
    pub recorded_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Transaction {
    fn from(model: Model) -> Self {
        Self {
            id: TransactionId::new(model.id),
            amount: MoneyCents::new(model.amount_minor),
            category: model.category,
            note: model.note,
            is_income: model.is_income,
            occurred_at: model.occurred_at,
            recorded_by: model.recorded_by,
        }
    }
}

impl ActiveModel {
    pub(crate) fn new_record(
        id: &TransactionId,
        workspace_id: &WorkspaceId,
        fields: &TransactionFields,
        recorded_by: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        use sea_orm::ActiveValue::Set;

        Self {
            id: Set(id.to_string()),
            workspace_id: Set(workspace_id.to_string()),
            amount_minor: Set(fields.amount.cents()),
            category: Set(fields.category.clone()),
            note: Set(fields.note.clone()),
            is_income: Set(fields.is_income),
            occurred_at: Set(fields.occurred_at),
            recorded_by: Set(recorded_by.to_string()),
            created_at: Set(created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn fields_trim_category_and_drop_blank_note() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let fields =
            TransactionFields::new(MoneyCents::new(100), "  Food ", Some("   "), false, at)
                .unwrap();
        assert_eq!(fields.category, "Food");
        assert_eq!(fields.note, None);
    }

    #[test]
    fn empty_category_is_rejected() {
        let at = Utc::now();
        assert!(matches!(
            TransactionFields::new(MoneyCents::new(100), " ", None, true, at),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn negative_amount_is_rejected() {
        let at = Utc::now();
        assert!(matches!(
            TransactionFields::new(MoneyCents::new(-5), "Food", None, false, at),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn amounts_above_the_cap_are_rejected() {
        assert!(matches!(
            TransactionFields::new(MoneyCents::new(i64::MAX), "Food", None, true, Utc::now()),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn validate_catches_fields_built_in_place() {
        let fields = TransactionFields {
            amount: MoneyCents::new(-500),
            category: String::new(),
            note: None,
            is_income: false,
            occurred_at: Utc::now(),
        };
        assert!(matches!(fields.validate(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn timestamps_are_truncated_to_milliseconds() {
        let at = Utc
            .with_ymd_and_hms(2024, 3, 31, 23, 59, 59)
            .unwrap()
            .checked_add_signed(chrono::Duration::nanoseconds(999_999_999))
            .unwrap();
        let fields = TransactionFields::new(MoneyCents::new(1), "Food", None, false, at).unwrap();
        assert_eq!(fields.occurred_at.timestamp_subsec_millis(), 999);
        assert_eq!(fields.occurred_at.timestamp_subsec_nanos(), 999_000_000);
    }
}

//! Document workflow types shared by all five document kinds
//!
//! Import, Export, Return, Waste and Reconciliation documents all move
//! through the same state machine; the kind only selects which stock
//! mutation an approval performs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five document kinds handled by the approval workflow engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Import,
    Export,
    Return,
    Waste,
    Reconciliation,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Import => "import",
            DocumentKind::Export => "export",
            DocumentKind::Return => "return",
            DocumentKind::Waste => "waste",
            DocumentKind::Reconciliation => "reconciliation",
        }
    }

    /// Cache key of the assembled document view
    pub fn cache_key(&self, id: Uuid) -> String {
        format!("{}:{}", self.as_str(), id)
    }
}

/// Shared document status.
///
/// `approved` and `rejected` are terminal; `cancelled` is reachable from
/// `pending` only. Approval is the single transition that mutates stock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DocumentStatus::Pending),
            "approved" => Some(DocumentStatus::Approved),
            "rejected" => Some(DocumentStatus::Rejected),
            "cancelled" => Some(DocumentStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Approved | DocumentStatus::Rejected)
    }

    /// Whether the machine admits `self -> next`
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (
                DocumentStatus::Pending,
                DocumentStatus::Approved | DocumentStatus::Rejected | DocumentStatus::Cancelled
            )
        )
    }
}

/// A single business-rule violation.
///
/// Validation always returns the full list so every problem is surfaced at
/// once, with messages in English and Vietnamese.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub message_vi: String,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        message_vi: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            message_vi: message_vi.into(),
        }
    }
}

/// Purpose of an Export document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExportPurpose {
    Production,
    Sale,
    Damage,
    Return,
    Transfer,
}

impl ExportPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportPurpose::Production => "production",
            ExportPurpose::Sale => "sale",
            ExportPurpose::Damage => "damage",
            ExportPurpose::Return => "return",
            ExportPurpose::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "production" => Some(ExportPurpose::Production),
            "sale" => Some(ExportPurpose::Sale),
            "damage" => Some(ExportPurpose::Damage),
            "return" => Some(ExportPurpose::Return),
            "transfer" => Some(ExportPurpose::Transfer),
            _ => None,
        }
    }
}

/// Reason for a Return document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    Excess,
    Defective,
    MenuChange,
    Expired,
    Other,
}

impl ReturnReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnReason::Excess => "excess",
            ReturnReason::Defective => "defective",
            ReturnReason::MenuChange => "menu_change",
            ReturnReason::Expired => "expired",
            ReturnReason::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "excess" => Some(ReturnReason::Excess),
            "defective" => Some(ReturnReason::Defective),
            "menu_change" => Some(ReturnReason::MenuChange),
            "expired" => Some(ReturnReason::Expired),
            "other" => Some(ReturnReason::Other),
            _ => None,
        }
    }
}

/// Physical condition of a returned line
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    Good,
    Fair,
    Poor,
    Damaged,
    Expired,
}

impl ItemCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCondition::Good => "good",
            ItemCondition::Fair => "fair",
            ItemCondition::Poor => "poor",
            ItemCondition::Damaged => "damaged",
            ItemCondition::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "good" => Some(ItemCondition::Good),
            "fair" => Some(ItemCondition::Fair),
            "poor" => Some(ItemCondition::Poor),
            "damaged" => Some(ItemCondition::Damaged),
            "expired" => Some(ItemCondition::Expired),
            _ => None,
        }
    }

    /// Only goods returned in good condition re-enter sellable stock
    pub fn restocks(&self) -> bool {
        matches!(self, ItemCondition::Good)
    }
}

/// Classification of a Waste document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WasteType {
    Damage,
    Expiry,
    Breakage,
    NaturalLoss,
    CookingLoss,
    Quality,
    Other,
}

impl WasteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WasteType::Damage => "damage",
            WasteType::Expiry => "expiry",
            WasteType::Breakage => "breakage",
            WasteType::NaturalLoss => "natural_loss",
            WasteType::CookingLoss => "cooking_loss",
            WasteType::Quality => "quality",
            WasteType::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "damage" => Some(WasteType::Damage),
            "expiry" => Some(WasteType::Expiry),
            "breakage" => Some(WasteType::Breakage),
            "natural_loss" => Some(WasteType::NaturalLoss),
            "cooking_loss" => Some(WasteType::CookingLoss),
            "quality" => Some(WasteType::Quality),
            "other" => Some(WasteType::Other),
            _ => None,
        }
    }
}

/// Working shift covered by a reconciliation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ShiftType {
    Morning,
    Afternoon,
    Evening,
    FullDay,
}

impl ShiftType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftType::Morning => "morning",
            ShiftType::Afternoon => "afternoon",
            ShiftType::Evening => "evening",
            ShiftType::FullDay => "full_day",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "morning" => Some(ShiftType::Morning),
            "afternoon" => Some(ShiftType::Afternoon),
            "evening" => Some(ShiftType::Evening),
            "full_day" => Some(ShiftType::FullDay),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_reaches_every_other_state() {
        let pending = DocumentStatus::Pending;
        assert!(pending.can_transition_to(DocumentStatus::Approved));
        assert!(pending.can_transition_to(DocumentStatus::Rejected));
        assert!(pending.can_transition_to(DocumentStatus::Cancelled));
    }

    #[test]
    fn approved_and_rejected_are_terminal() {
        for terminal in [DocumentStatus::Approved, DocumentStatus::Rejected] {
            assert!(terminal.is_terminal());
            for next in [
                DocumentStatus::Pending,
                DocumentStatus::Approved,
                DocumentStatus::Rejected,
                DocumentStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn cancelled_admits_no_approval() {
        assert!(!DocumentStatus::Cancelled.can_transition_to(DocumentStatus::Approved));
        assert!(!DocumentStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Approved,
            DocumentStatus::Rejected,
            DocumentStatus::Cancelled,
        ] {
            assert_eq!(DocumentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::from_str("draft"), None);
    }

    #[test]
    fn only_good_condition_restocks() {
        assert!(ItemCondition::Good.restocks());
        for c in [
            ItemCondition::Fair,
            ItemCondition::Poor,
            ItemCondition::Damaged,
            ItemCondition::Expired,
        ] {
            assert!(!c.restocks());
        }
    }

    #[test]
    fn cache_keys_are_kind_scoped() {
        let id = Uuid::new_v4();
        assert_eq!(
            DocumentKind::Import.cache_key(id),
            format!("import:{}", id)
        );
        assert_ne!(
            DocumentKind::Import.cache_key(id),
            DocumentKind::Export.cache_key(id)
        );
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{double_option, put, RowPatch};

pub type ItemId = Uuid;

/// What kind of experience an item is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ItemType {
    Place,
    Activity,
    Product,
    #[default]
    Other,
}

impl ItemType {
    pub const ALL: [ItemType; 4] = [
        ItemType::Place,
        ItemType::Activity,
        ItemType::Product,
        ItemType::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ItemType::Place => "Place",
            ItemType::Activity => "Activity",
            ItemType::Product => "Product",
            ItemType::Other => "Other",
        }
    }

    /// Icon name the UI renders for this type.
    pub fn icon(&self) -> &'static str {
        match self {
            ItemType::Place => "map-pin",
            ItemType::Activity => "compass",
            ItemType::Product => "gift",
            ItemType::Other => "star",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityCategory {
    Adventure,
    Culture,
    FoodAndDrink,
    Nature,
    Relaxation,
    Sports,
    Entertainment,
    Learning,
    Social,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TravelCompanion {
    Solo,
    Friends,
    Family,
    Work,
    Other,
}

/// Cost bracket, ordered from free to expensive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BudgetCategory {
    NoCost,
    Low,
    Medium,
    High,
}

/// Column value of `timeframe_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeframeType {
    #[serde(rename = "Specific Date")]
    SpecificDate,
    Week,
    Month,
    Year,
    #[default]
    Someday,
}

/// When an item is meant to happen.
///
/// Each variant carries exactly the one target field its type allows, so a
/// month timeframe can never also carry a week or a year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "timeframeType")]
pub enum Timeframe {
    #[serde(rename = "Specific Date", rename_all = "camelCase")]
    SpecificDate { target_date: NaiveDate },
    /// ISO week, `YYYY-Www`
    #[serde(rename_all = "camelCase")]
    Week { target_week: String },
    /// `YYYY-MM`
    #[serde(rename_all = "camelCase")]
    Month { target_month: String },
    #[serde(rename_all = "camelCase")]
    Year { target_year: i32 },
    #[default]
    Someday,
}

/// The five timeframe columns as stored by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimeframeColumns {
    pub timeframe_type: TimeframeType,
    pub target_date: Option<NaiveDate>,
    pub target_week: Option<String>,
    pub target_month: Option<String>,
    pub target_year: Option<i32>,
}

impl Timeframe {
    pub fn kind(&self) -> TimeframeType {
        match self {
            Timeframe::SpecificDate { .. } => TimeframeType::SpecificDate,
            Timeframe::Week { .. } => TimeframeType::Week,
            Timeframe::Month { .. } => TimeframeType::Month,
            Timeframe::Year { .. } => TimeframeType::Year,
            Timeframe::Someday => TimeframeType::Someday,
        }
    }

    pub fn to_columns(&self) -> TimeframeColumns {
        let mut columns = TimeframeColumns {
            timeframe_type: self.kind(),
            ..TimeframeColumns::default()
        };
        match self {
            Timeframe::SpecificDate { target_date } => columns.target_date = Some(*target_date),
            Timeframe::Week { target_week } => columns.target_week = Some(target_week.clone()),
            Timeframe::Month { target_month } => columns.target_month = Some(target_month.clone()),
            Timeframe::Year { target_year } => columns.target_year = Some(*target_year),
            Timeframe::Someday => {}
        }
        columns
    }

    /// Reads the field matching `timeframe_type`; the others are ignored.
    /// A type whose field is missing falls back to `Someday`.
    pub fn from_columns(columns: TimeframeColumns) -> Timeframe {
        let timeframe = match columns.timeframe_type {
            TimeframeType::SpecificDate => columns
                .target_date
                .map(|target_date| Timeframe::SpecificDate { target_date }),
            TimeframeType::Week => columns
                .target_week
                .map(|target_week| Timeframe::Week { target_week }),
            TimeframeType::Month => columns
                .target_month
                .map(|target_month| Timeframe::Month { target_month }),
            TimeframeType::Year => columns
                .target_year
                .map(|target_year| Timeframe::Year { target_year }),
            TimeframeType::Someday => Some(Timeframe::Someday),
        };
        timeframe.unwrap_or_else(|| {
            tracing::warn!(
                timeframe_type = ?columns.timeframe_type,
                "timeframe row is missing its target field, treating as someday"
            );
            Timeframe::Someday
        })
    }

    fn write_patch(&self, patch: &mut RowPatch) {
        let columns = self.to_columns();
        put(patch, "timeframe_type", columns.timeframe_type);
        put(patch, "target_date", columns.target_date);
        put(patch, "target_week", columns.target_week);
        put(patch, "target_month", columns.target_month);
        put(patch, "target_year", columns.target_year);
    }
}

/// One bucket-list entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub id: ItemId,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_category: Option<ActivityCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_companion: Option<TravelCompanion>,
    #[serde(flatten)]
    pub timeframe: Timeframe,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub squad_members: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WishlistItem {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// `wishlist_items` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: ItemId,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub item_type: ItemType,
    pub activity_category: Option<ActivityCategory>,
    pub travel_companion: Option<TravelCompanion>,
    #[serde(default)]
    pub timeframe_type: Option<TimeframeType>,
    pub target_date: Option<NaiveDate>,
    pub target_week: Option<String>,
    pub target_month: Option<String>,
    pub target_year: Option<i32>,
    pub budget: Option<BudgetCategory>,
    pub destination: Option<String>,
    pub link: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub squad_members: Option<Vec<Uuid>>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<ItemRow> for WishlistItem {
    fn from(row: ItemRow) -> Self {
        let timeframe = Timeframe::from_columns(TimeframeColumns {
            timeframe_type: row.timeframe_type.unwrap_or_default(),
            target_date: row.target_date,
            target_week: row.target_week,
            target_month: row.target_month,
            target_year: row.target_year,
        });
        WishlistItem {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            item_type: row.item_type,
            activity_category: row.activity_category,
            travel_companion: row.travel_companion,
            timeframe,
            budget: row.budget,
            destination: row.destination,
            link: row.link,
            notes: row.notes,
            tags: row.tags.unwrap_or_default(),
            squad_members: row.squad_members.unwrap_or_default(),
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        }
    }
}

/// Input for creating an item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub item_type: ItemType,
    #[serde(default)]
    pub activity_category: Option<ActivityCategory>,
    #[serde(default)]
    pub travel_companion: Option<TravelCompanion>,
    #[serde(flatten)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub budget: Option<BudgetCategory>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub squad_members: Vec<Uuid>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewItem {
    pub fn new(title: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            title: title.into(),
            item_type,
            ..Self::default()
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Trims text, cleans tags and drops squad members unless travelling with friends.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = blank_to_none(self.description);
        self.destination = blank_to_none(self.destination);
        self.link = blank_to_none(self.link);
        self.notes = blank_to_none(self.notes);
        self.image_url = blank_to_none(self.image_url);
        self.tags = normalize_tags(self.tags);
        if self.travel_companion != Some(TravelCompanion::Friends) {
            self.squad_members.clear();
        }
        self
    }
}

/// Insert payload for `wishlist_items`; id and timestamps are server-assigned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewItemRow {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub item_type: ItemType,
    pub activity_category: Option<ActivityCategory>,
    pub travel_companion: Option<TravelCompanion>,
    pub timeframe_type: TimeframeType,
    pub target_date: Option<NaiveDate>,
    pub target_week: Option<String>,
    pub target_month: Option<String>,
    pub target_year: Option<i32>,
    pub budget: Option<BudgetCategory>,
    pub destination: Option<String>,
    pub link: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub squad_members: Vec<Uuid>,
    pub image_url: Option<String>,
}

impl NewItemRow {
    pub fn new(user_id: Uuid, item: NewItem) -> Self {
        let columns = item.timeframe.to_columns();
        NewItemRow {
            user_id,
            title: item.title,
            description: item.description,
            item_type: item.item_type,
            activity_category: item.activity_category,
            travel_companion: item.travel_companion,
            timeframe_type: columns.timeframe_type,
            target_date: columns.target_date,
            target_week: columns.target_week,
            target_month: columns.target_month,
            target_year: columns.target_year,
            budget: item.budget,
            destination: item.destination,
            link: item.link,
            notes: item.notes,
            tags: item.tags,
            squad_members: item.squad_members,
            image_url: item.image_url,
        }
    }
}

/// Sparse change to an item.
///
/// `None` leaves a field untouched. For optional fields `Some(None)` clears
/// the stored value, so only include the keys you mean to change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub activity_category: Option<Option<ActivityCategory>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub travel_companion: Option<Option<TravelCompanion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub budget: Option<Option<BudgetCategory>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub destination: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub link: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squad_members: Option<Vec<Uuid>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self == &ItemPatch::default()
    }

    pub fn normalized(mut self) -> Self {
        self.title = self.title.map(|title| title.trim().to_string());
        self.tags = self.tags.map(normalize_tags);
        if matches!(self.travel_companion, Some(companion) if companion != Some(TravelCompanion::Friends))
        {
            self.squad_members = Some(Vec::new());
        }
        self
    }

    /// Column patch with exactly the keys this patch sets.
    pub fn to_row(&self) -> RowPatch {
        let mut patch = RowPatch::new();
        if let Some(title) = &self.title {
            put(&mut patch, "title", title);
        }
        if let Some(description) = &self.description {
            put(&mut patch, "description", description);
        }
        if let Some(item_type) = &self.item_type {
            put(&mut patch, "item_type", item_type);
        }
        if let Some(category) = &self.activity_category {
            put(&mut patch, "activity_category", category);
        }
        if let Some(companion) = &self.travel_companion {
            put(&mut patch, "travel_companion", companion);
        }
        if let Some(timeframe) = &self.timeframe {
            timeframe.write_patch(&mut patch);
        }
        if let Some(budget) = &self.budget {
            put(&mut patch, "budget", budget);
        }
        if let Some(destination) = &self.destination {
            put(&mut patch, "destination", destination);
        }
        if let Some(link) = &self.link {
            put(&mut patch, "link", link);
        }
        if let Some(notes) = &self.notes {
            put(&mut patch, "notes", notes);
        }
        if let Some(tags) = &self.tags {
            put(&mut patch, "tags", tags);
        }
        if let Some(members) = &self.squad_members {
            put(&mut patch, "squad_members", members);
        }
        if let Some(image_url) = &self.image_url {
            put(&mut patch, "image_url", image_url);
        }
        if let Some(completed_at) = &self.completed_at {
            put(&mut patch, "completed_at", completed_at);
        }
        patch
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trims tags, drops empties and case-insensitive duplicates, keeps first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .collect()
}

// List and item rules - pure validation, no storage
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::patch::Patch;

pub const MAX_LIST_NAME_LEN: usize = 128;
pub const MAX_DESCRIPTION_LEN: usize = 512;
pub const MAX_NOTES_BYTES: usize = 65_535;
pub const MAX_ITEM_FIELD_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListIcon {
    House,
    Car,
    Plane,
    Pencil,
    Apple,
    Broccoli,
    Tv,
    Sunflower,
}

impl ListIcon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::House => "HOUSE",
            Self::Car => "CAR",
            Self::Plane => "PLANE",
            Self::Pencil => "PENCIL",
            Self::Apple => "APPLE",
            Self::Broccoli => "BROCCOLI",
            Self::Tv => "TV",
            Self::Sunflower => "SUNFLOWER",
        }
    }
}

impl FromStr for ListIcon {
    type Err = ListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOUSE" => Ok(Self::House),
            "CAR" => Ok(Self::Car),
            "PLANE" => Ok(Self::Plane),
            "PENCIL" => Ok(Self::Pencil),
            "APPLE" => Ok(Self::Apple),
            "BROCCOLI" => Ok(Self::Broccoli),
            "TV" => Ok(Self::Tv),
            "SUNFLOWER" => Ok(Self::Sunflower),
            _ => Err(ListError::UnknownIcon(s.to_string())),
        }
    }
}

/// Validated list creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewList {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<ListIcon>,
}

impl NewList {
    pub fn parse(
        name: &str,
        description: Option<&str>,
        icon: Option<&str>,
    ) -> Result<Self, ListError> {
        Ok(Self {
            name: list_name(name)?,
            description: optional(description)
                .map(|d| bounded(d, MAX_DESCRIPTION_LEN, "description"))
                .transpose()?,
            icon: optional(icon).map(|i| i.parse()).transpose()?,
        })
    }
}

/// Validated partial list update. Empty strings clear optional fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListUpdate {
    pub name: Option<String>,
    pub description: Patch<String>,
    pub notes: Patch<String>,
    pub icon: Patch<ListIcon>,
}

impl ListUpdate {
    pub fn parse(
        name: Option<&str>,
        description: Patch<String>,
        notes: Patch<String>,
        icon: Patch<String>,
    ) -> Result<Self, ListError> {
        let update = Self {
            name: name.map(list_name).transpose()?,
            description: match description.normalized() {
                Patch::Set(d) => Patch::Set(bounded(&d, MAX_DESCRIPTION_LEN, "description")?),
                other => other,
            },
            notes: match notes {
                // Notes keep their whitespace; only an empty string clears.
                Patch::Set(n) if n.is_empty() => Patch::Clear,
                Patch::Set(n) if n.len() > MAX_NOTES_BYTES => {
                    return Err(ListError::TooLong("notes", MAX_NOTES_BYTES))
                }
                other => other,
            },
            icon: match icon.normalized() {
                Patch::Set(i) => Patch::Set(i.parse()?),
                other => retag(other),
            },
        };

        if update.name.is_none()
            && update.description.is_absent()
            && update.notes.is_absent()
            && update.icon.is_absent()
        {
            return Err(ListError::EmptyUpdate);
        }
        Ok(update)
    }

    pub fn icon_value(&self) -> Option<&'static str> {
        self.icon.value().map(ListIcon::as_str)
    }
}

/// Validated item creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub description: String,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: Option<String>,
}

impl NewItem {
    pub fn parse(
        description: &str,
        quantity: Option<&str>,
        unit: Option<&str>,
        category: Option<&str>,
    ) -> Result<Self, ListError> {
        Ok(Self {
            description: item_description(description)?,
            quantity: item_field(quantity, "quantity")?,
            unit: item_field(unit, "unit")?,
            category: item_field(category, "category")?,
        })
    }
}

/// Validated partial item update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub starred: Option<bool>,
    pub quantity: Patch<String>,
    pub unit: Patch<String>,
    pub category: Patch<String>,
}

impl ItemUpdate {
    pub fn parse(
        description: Option<&str>,
        completed: Option<bool>,
        starred: Option<bool>,
        quantity: Patch<String>,
        unit: Patch<String>,
        category: Patch<String>,
    ) -> Result<Self, ListError> {
        let field = |patch: Patch<String>, label: &'static str| -> Result<_, ListError> {
            match patch {
                Patch::Set(v) if v.trim().is_empty() => Ok(Patch::Clear),
                Patch::Set(v) => Ok(Patch::Set(capped(v, MAX_ITEM_FIELD_LEN, label)?)),
                other => Ok(other),
            }
        };
        let update = Self {
            description: description.map(item_description).transpose()?,
            completed,
            starred,
            quantity: field(quantity, "quantity")?,
            unit: field(unit, "unit")?,
            category: field(category, "category")?,
        };

        if update.description.is_none()
            && update.completed.is_none()
            && update.starred.is_none()
            && update.quantity.is_absent()
            && update.unit.is_absent()
            && update.category.is_absent()
        {
            return Err(ListError::EmptyUpdate);
        }
        Ok(update)
    }
}

fn retag<T, U>(patch: Patch<T>) -> Patch<U> {
    match patch {
        Patch::Absent => Patch::Absent,
        _ => Patch::Clear,
    }
}

fn optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn bounded(value: &str, max: usize, label: &'static str) -> Result<String, ListError> {
    capped(value.trim().to_string(), max, label)
}

fn capped(value: String, max: usize, label: &'static str) -> Result<String, ListError> {
    if value.chars().count() > max {
        return Err(ListError::TooLong(label, max));
    }
    Ok(value)
}

fn list_name(raw: &str) -> Result<String, ListError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ListError::Required("name"));
    }
    bounded(name, MAX_LIST_NAME_LEN, "name")
}

fn item_description(raw: &str) -> Result<String, ListError> {
    let description = raw.trim();
    if description.is_empty() {
        return Err(ListError::Required("description"));
    }
    bounded(description, MAX_DESCRIPTION_LEN, "description")
}

/// Free text kept exactly as sent; blank means unset.
fn item_field(value: Option<&str>, label: &'static str) -> Result<Option<String>, ListError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| capped(v.to_string(), MAX_ITEM_FIELD_LEN, label))
        .transpose()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListError {
    Required(&'static str),
    TooLong(&'static str, usize),
    UnknownIcon(String),
    EmptyUpdate,
}

impl fmt::Display for ListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required(field) => write!(f, "{} is required", field),
            Self::TooLong(field, max) => write!(f, "{} must be at most {} long", field, max),
            Self::UnknownIcon(icon) => write!(f, "unknown icon: {}", icon),
            Self::EmptyUpdate => write!(f, "nothing to update"),
        }
    }
}

impl std::error::Error for ListError {}

impl From<ListError> for AppError {
    fn from(err: ListError) -> Self {
        AppError::Validation(err.to_string())
    }
}

//! Form rules checked before anything is sent to the gateway

use chrono::{NaiveDate, Weekday};
use url::Url;

use crate::error::ValidationErrors;
use crate::models::{CollectionPatch, ItemPatch, NewCollection, NewItem, ProfilePatch, Timeframe};

pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 1000;
pub const NOTES_MAX: usize = 2000;
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2200;

fn check_title(errors: &mut ValidationErrors, title: &str) {
    let len = title.trim().chars().count();
    if len == 0 {
        errors.add("title", "Title is required");
    } else if len > TITLE_MAX {
        errors.add("title", format!("Title must be at most {} characters", TITLE_MAX));
    }
}

fn check_max(errors: &mut ValidationErrors, field: &'static str, value: Option<&str>, max: usize) {
    if let Some(value) = value {
        if value.chars().count() > max {
            errors.add(field, format!("Must be at most {} characters", max));
        }
    }
}

fn check_http_url(errors: &mut ValidationErrors, field: &'static str, value: Option<&str>) {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return;
    };
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.add(field, "Must be a valid http(s) URL"),
    }
}

/// `YYYY-Www` naming a week that exists in that ISO year.
pub fn is_iso_week(value: &str) -> bool {
    let Some((year, week)) = value.split_once("-W") else {
        return false;
    };
    if year.len() != 4 || week.len() != 2 {
        return false;
    }
    match (year.parse::<i32>(), week.parse::<u32>()) {
        (Ok(year), Ok(week)) => NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).is_some(),
        _ => false,
    }
}

/// `YYYY-MM`
pub fn is_year_month(value: &str) -> bool {
    let Some((year, month)) = value.split_once('-') else {
        return false;
    };
    year.len() == 4
        && month.len() == 2
        && year.chars().all(|c| c.is_ascii_digit())
        && matches!(month.parse::<u32>(), Ok(1..=12))
}

fn check_timeframe(errors: &mut ValidationErrors, timeframe: &Timeframe) {
    match timeframe {
        Timeframe::Week { target_week } if !is_iso_week(target_week) => {
            errors.add("targetWeek", "Week must look like 2025-W07");
        }
        Timeframe::Month { target_month } if !is_year_month(target_month) => {
            errors.add("targetMonth", "Month must look like 2025-06");
        }
        Timeframe::Year { target_year } if !YEAR_RANGE.contains(target_year) => {
            errors.add(
                "targetYear",
                format!(
                    "Year must be between {} and {}",
                    YEAR_RANGE.start(),
                    YEAR_RANGE.end()
                ),
            );
        }
        _ => {}
    }
}

pub fn validate_new_item(item: &NewItem) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_title(&mut errors, &item.title);
    check_max(&mut errors, "description", item.description.as_deref(), DESCRIPTION_MAX);
    check_max(&mut errors, "notes", item.notes.as_deref(), NOTES_MAX);
    check_http_url(&mut errors, "link", item.link.as_deref());
    check_http_url(&mut errors, "imageUrl", item.image_url.as_deref());
    check_timeframe(&mut errors, &item.timeframe);
    errors.into_result()
}

/// Only the fields present in the patch are checked.
pub fn validate_item_patch(patch: &ItemPatch) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(title) = &patch.title {
        check_title(&mut errors, title);
    }
    if let Some(description) = &patch.description {
        check_max(&mut errors, "description", description.as_deref(), DESCRIPTION_MAX);
    }
    if let Some(notes) = &patch.notes {
        check_max(&mut errors, "notes", notes.as_deref(), NOTES_MAX);
    }
    if let Some(link) = &patch.link {
        check_http_url(&mut errors, "link", link.as_deref());
    }
    if let Some(image_url) = &patch.image_url {
        check_http_url(&mut errors, "imageUrl", image_url.as_deref());
    }
    if let Some(timeframe) = &patch.timeframe {
        check_timeframe(&mut errors, timeframe);
    }
    errors.into_result()
}

pub fn validate_new_collection(collection: &NewCollection) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_title(&mut errors, &collection.title);
    check_max(
        &mut errors,
        "description",
        collection.description.as_deref(),
        DESCRIPTION_MAX,
    );
    errors.into_result()
}

pub fn validate_collection_patch(patch: &CollectionPatch) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(title) = &patch.title {
        check_title(&mut errors, title);
    }
    if let Some(description) = &patch.description {
        check_max(&mut errors, "description", description.as_deref(), DESCRIPTION_MAX);
    }
    errors.into_result()
}

pub const DISPLAY_NAME_MAX: usize = 50;
pub const BIO_MAX: usize = 500;

pub fn validate_profile_patch(patch: &ProfilePatch) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(name) = &patch.display_name {
        let len = name.trim().chars().count();
        if len == 0 {
            errors.add("displayName", "Name is required");
        } else if len > DISPLAY_NAME_MAX {
            errors.add(
                "displayName",
                format!("Name must be at most {} characters", DISPLAY_NAME_MAX),
            );
        }
    }
    if let Some(bio) = &patch.bio {
        check_max(&mut errors, "bio", bio.as_deref(), BIO_MAX);
    }
    errors.into_result()
}

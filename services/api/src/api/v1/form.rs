//! Multipart event forms.
//!
//! Create and update share one field set. Unknown field names are rejected,
//! and so is a field sent twice.

use std::str::FromStr;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use chrono::NaiveDate;

use crate::api::error::{ApiError, FieldError};
use crate::db::EventUpdate;
use crate::media::{PosterUpload, MAX_POSTER_BYTES};
use crate::model::Category;
use crate::workflow::moderation::EventDraft;

const TEXT_FIELDS: [&str; 9] = [
    "title",
    "description",
    "category",
    "date",
    "time",
    "venue",
    "external_form_url",
    "has_refreshments",
    "registration_deadline",
];

const POSTER_FIELD: &str = "poster";

/// Raw form values, before create/update rules are applied.
#[derive(Debug, Default)]
pub struct EventForm {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    date: Option<String>,
    time: Option<String>,
    venue: Option<String>,
    external_form_url: Option<String>,
    has_refreshments: Option<String>,
    registration_deadline: Option<String>,
    pub poster: Option<PosterUpload>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("payload_too_large", e.body_text())
    } else {
        ApiError::bad_request("invalid_multipart", e.body_text())
    }
}

impl EventForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = EventForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            if name == POSTER_FIELD {
                if form.poster.is_some() {
                    return Err(duplicate(&name));
                }
                form.poster = read_poster(field).await?;
                continue;
            }

            if !TEXT_FIELDS.contains(&name.as_str()) {
                return Err(ApiError::bad_request(
                    "unknown_field",
                    format!("Unknown form field '{name}'"),
                ));
            }

            let value = field.text().await.map_err(multipart_error)?;
            let slot = form.slot(&name);
            if slot.is_some() {
                return Err(duplicate(&name));
            }
            *slot = Some(value);
        }

        Ok(form)
    }

    fn slot(&mut self, name: &str) -> &mut Option<String> {
        match name {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "category" => &mut self.category,
            "date" => &mut self.date,
            "time" => &mut self.time,
            "venue" => &mut self.venue,
            "external_form_url" => &mut self.external_form_url,
            "has_refreshments" => &mut self.has_refreshments,
            _ => &mut self.registration_deadline,
        }
    }

    /// Fields for a new event. Title, description, date, time and venue are
    /// required; category defaults to `Other`.
    pub fn into_draft(self) -> Result<(EventDraft, Option<PosterUpload>), ApiError> {
        let mut errors = Vec::new();

        let title = required(&mut errors, "title", self.title);
        let description = required(&mut errors, "description", self.description);
        let time = required(&mut errors, "time", self.time);
        let venue = required(&mut errors, "venue", self.venue);
        let date = required(&mut errors, "date", self.date)
            .and_then(|raw| parsed::<NaiveDate>(&mut errors, "date", &raw));
        let category = non_blank(self.category)
            .and_then(|raw| parsed::<Category>(&mut errors, "category", &raw))
            .unwrap_or_default();
        let has_refreshments = non_blank(self.has_refreshments)
            .and_then(|raw| parse_flag(&mut errors, &raw))
            .unwrap_or(false);
        let registration_deadline = non_blank(self.registration_deadline)
            .and_then(|raw| parsed::<NaiveDate>(&mut errors, "registration_deadline", &raw));

        match (title, description, date, time, venue) {
            (Some(title), Some(description), Some(date), Some(time), Some(venue))
                if errors.is_empty() =>
            {
                let draft = EventDraft {
                    title,
                    description,
                    category,
                    date,
                    time,
                    venue,
                    external_form_url: non_blank(self.external_form_url),
                    has_refreshments,
                    registration_deadline,
                };
                Ok((draft, self.poster))
            }
            _ => Err(invalid(errors)),
        }
    }

    /// Fields for an edit. Everything is optional; an empty
    /// `external_form_url` or `registration_deadline` clears it.
    pub fn into_update(self) -> Result<(EventUpdate, Option<PosterUpload>), ApiError> {
        let mut errors = Vec::new();

        let mut not_blank = |name: &str, value: Option<String>| match value {
            Some(v) if v.trim().is_empty() => {
                errors.push(FieldError::new(name, "cannot be blank"));
                None
            }
            other => other.map(|v| v.trim().to_string()),
        };

        let title = not_blank("title", self.title);
        let description = not_blank("description", self.description);
        let time = not_blank("time", self.time);
        let venue = not_blank("venue", self.venue);
        let date = not_blank("date", self.date);
        let category = not_blank("category", self.category);

        let date = date.and_then(|raw| parsed::<NaiveDate>(&mut errors, "date", &raw));
        let category = category.and_then(|raw| parsed::<Category>(&mut errors, "category", &raw));
        let has_refreshments = non_blank(self.has_refreshments)
            .and_then(|raw| parse_flag(&mut errors, &raw));
        let external_form_url = self.external_form_url.map(|v| non_blank(Some(v)));
        let registration_deadline = match self.registration_deadline.map(|v| non_blank(Some(v))) {
            Some(Some(raw)) => parsed::<NaiveDate>(&mut errors, "registration_deadline", &raw)
                .map(|d| Some(Some(d)))
                .unwrap_or(None),
            Some(None) => Some(None),
            None => None,
        };

        if !errors.is_empty() {
            return Err(invalid(errors));
        }

        let update = EventUpdate {
            title,
            description,
            category,
            date,
            time,
            venue,
            poster_url: None,
            external_form_url,
            has_refreshments,
            registration_deadline,
        };
        Ok((update, self.poster))
    }
}

/// An empty file part means no poster was chosen.
async fn read_poster(field: Field<'_>) -> Result<Option<PosterUpload>, ApiError> {
    let file_name = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(multipart_error)?;

    if bytes.is_empty() {
        return Ok(None);
    }
    if bytes.len() > MAX_POSTER_BYTES {
        return Err(ApiError::payload_too_large(
            "poster_too_large",
            format!("Poster exceeds the {MAX_POSTER_BYTES} byte limit"),
        ));
    }

    Ok(Some(PosterUpload {
        bytes,
        file_name,
        content_type,
    }))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(errors: &mut Vec<FieldError>, name: &str, value: Option<String>) -> Option<String> {
    let value = non_blank(value);
    if value.is_none() {
        errors.push(FieldError::new(name, "is required"));
    }
    value
}

fn parsed<T>(errors: &mut Vec<FieldError>, name: &str, raw: &str) -> Option<T>
where
    T: FromStr,
{
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            let hint = match name {
                "category" => "must be one of Workshop, Talk, Hackathon, Seminar, Other",
                _ => "must be a date in YYYY-MM-DD format",
            };
            errors.push(FieldError::new(name, hint));
            None
        }
    }
}

fn parse_flag(errors: &mut Vec<FieldError>, raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => {
            errors.push(FieldError::new("has_refreshments", "must be true or false"));
            None
        }
    }
}

fn duplicate(name: &str) -> ApiError {
    ApiError::bad_request("duplicate_field", format!("Form field '{name}' was sent more than once"))
}

fn invalid(errors: Vec<FieldError>) -> ApiError {
    ApiError::bad_request("invalid_event", "Event form is invalid").with_details(errors)
}

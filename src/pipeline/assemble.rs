// src/pipeline/assemble.rs

//! Feed assembler: normalized items plus channel settings to a [`FeedDocument`].

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::models::{
    Channel, ChannelConfig, Content, FeedDocument, FeedItem, FieldSet, Guid, Labels, RssItem,
};

const POSTER_STYLE: &str = "max-width: 100%; height: auto;";

/// Build the document for one feed.
///
/// Items keep their incoming order. An unknown timezone falls back to UTC
/// (config validation rejects it earlier).
pub fn assemble(
    channel: &ChannelConfig,
    items: Vec<FeedItem>,
    fields: &FieldSet,
    labels: &Labels,
    now: DateTime<Utc>,
) -> FeedDocument {
    let channel = Channel {
        title: channel.title.clone(),
        link: channel.link.clone(),
        description: channel.description.clone(),
        language: channel.language.clone(),
        self_link: channel.self_link.clone(),
        last_build_date: build_date(now, &channel.timezone),
    };

    let items = items
        .iter()
        .map(|item| render_item(item, fields, labels))
        .collect();

    FeedDocument { channel, items }
}

fn render_item(item: &FeedItem, fields: &FieldSet, labels: &Labels) -> RssItem {
    RssItem {
        title: Content::Plain(item.title.clone()),
        link: item.link.clone(),
        guid: fields.guid.then(|| Guid {
            value: item.link.clone(),
            is_permalink: true,
        }),
        description: describe(item, fields, labels).map(Content::Markup),
        pub_date: item
            .release_date
            .filter(|_| fields.pub_date)
            .map(pub_date),
    }
}

/// HTML description from the item's present parts, `None` if there are none.
pub fn describe(item: &FeedItem, fields: &FieldSet, labels: &Labels) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    if fields.poster {
        if let Some(poster) = &item.poster {
            parts.push(format!(
                r#"<img src="{}" alt="{} {}" style="{}"/>"#,
                encode_double_quoted_attribute(poster),
                encode_double_quoted_attribute(&item.title),
                encode_double_quoted_attribute(&labels.poster_alt),
                POSTER_STYLE
            ));
        }
    }
    if fields.score {
        if let Some(score) = item.score {
            parts.push(line(&labels.score, &format!("{score}%")));
        }
    }
    if fields.genres && !item.genres.is_empty() {
        parts.push(line(&labels.genres, &item.genres.join(", ")));
    }
    if fields.providers && !item.providers.is_empty() {
        parts.push(line(&labels.providers, &item.providers.join(", ")));
    }
    if fields.year {
        if let Some(year) = item.display_year() {
            parts.push(line(&labels.year, &year.to_string()));
        }
    }
    if fields.duration {
        if let Some(minutes) = item.duration_minutes {
            parts.push(line(&labels.duration, &format!("{minutes} min")));
        }
    }
    if fields.minimal_age {
        if let Some(age) = item.minimal_age {
            parts.push(line(&labels.minimal_age, &format!("{age}+")));
        }
    }
    if fields.overview {
        if let Some(overview) = &item.overview {
            parts.push(format!("<p>{}</p>", encode_text(overview)));
        }
    }
    if fields.cross_ref {
        if let Some(link) = &item.cross_ref {
            parts.push(format!(
                r#"<p><a href="{}">{}</a></p>"#,
                encode_double_quoted_attribute(link),
                encode_text(&labels.cross_ref)
            ));
        }
    }

    (!parts.is_empty()).then(|| parts.concat())
}

fn line(label: &str, value: &str) -> String {
    format!("<p>{}: {}</p>", encode_text(label), encode_text(value))
}

/// RFC 822 date at midnight UTC.
pub fn pub_date(date: NaiveDate) -> String {
    date.format("%a, %d %b %Y 00:00:00 +0000").to_string()
}

fn build_date(now: DateTime<Utc>, timezone: &str) -> String {
    const FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";
    match Tz::from_str(timezone) {
        Ok(tz) => now.with_timezone(&tz).format(FORMAT).to_string(),
        Err(_) => {
            log::warn!("Unknown timezone '{}', using UTC", timezone);
            now.format(FORMAT).to_string()
        }
    }
}

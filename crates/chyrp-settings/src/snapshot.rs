//! Immutable settings snapshot and the named fields projected from it.

use crate::error::SettingsError;
use crate::types::{SettingValue, SettingsMap};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const SOCIAL_PREFIX: &str = "social_";

/// Settings promoted to a named, typed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SiteTitle,
    SiteDescription,
    SiteUrl,
    ContactEmail,
    Theme,
    Locale,
    Timezone,
    PostsPerPage,
    FeedItems,
    EnableComments,
    EnableRegistration,
    EnableWebmentions,
    EnableFeeds,
    EnableMarkdown,
    SocialLinks,
}

impl Field {
    pub const ALL: [Field; 15] = [
        Field::SiteTitle,
        Field::SiteDescription,
        Field::SiteUrl,
        Field::ContactEmail,
        Field::Theme,
        Field::Locale,
        Field::Timezone,
        Field::PostsPerPage,
        Field::FeedItems,
        Field::EnableComments,
        Field::EnableRegistration,
        Field::EnableWebmentions,
        Field::EnableFeeds,
        Field::EnableMarkdown,
        Field::SocialLinks,
    ];

    /// camelCase name used by views.
    pub fn name(&self) -> &'static str {
        match self {
            Field::SiteTitle => "siteTitle",
            Field::SiteDescription => "siteDescription",
            Field::SiteUrl => "siteUrl",
            Field::ContactEmail => "contactEmail",
            Field::Theme => "theme",
            Field::Locale => "locale",
            Field::Timezone => "timezone",
            Field::PostsPerPage => "postsPerPage",
            Field::FeedItems => "feedItems",
            Field::EnableComments => "enableComments",
            Field::EnableRegistration => "enableRegistration",
            Field::EnableWebmentions => "enableWebmentions",
            Field::EnableFeeds => "enableFeeds",
            Field::EnableMarkdown => "enableMarkdown",
            Field::SocialLinks => "socialLinks",
        }
    }

    /// Setting key backing the field. `SocialLinks` gathers every
    /// `social_<network>` key instead.
    pub fn key(&self) -> &'static str {
        match self {
            Field::SiteTitle => "site_title",
            Field::SiteDescription => "site_description",
            Field::SiteUrl => "site_url",
            Field::ContactEmail => "contact_email",
            Field::Theme => "theme",
            Field::Locale => "locale",
            Field::Timezone => "timezone",
            Field::PostsPerPage => "posts_per_page",
            Field::FeedItems => "feed_items",
            Field::EnableComments => "enable_comments",
            Field::EnableRegistration => "enable_registration",
            Field::EnableWebmentions => "enable_webmentions",
            Field::EnableFeeds => "enable_feeds",
            Field::EnableMarkdown => "enable_markdown",
            Field::SocialLinks => "social_*",
        }
    }

    /// Value served before the first successful load, or when the stored
    /// value has the wrong type.
    pub fn default_value(&self) -> SettingValue {
        let defaults = SiteFields::default();
        defaults.get(*self)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = SettingsError;

    /// Accepts the camelCase name or the backing key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.name() == s || f.key() == s)
            .ok_or_else(|| SettingsError::Validation(format!("Unknown field: {}", s)))
    }
}

/// Typed projections of the settings views use most.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteFields {
    pub site_title: String,
    pub site_description: String,
    pub site_url: String,
    pub contact_email: String,
    pub theme: String,
    pub locale: String,
    pub timezone: String,
    pub posts_per_page: u32,
    pub feed_items: u32,
    pub enable_comments: bool,
    pub enable_registration: bool,
    pub enable_webmentions: bool,
    pub enable_feeds: bool,
    pub enable_markdown: bool,
    /// Network name (`github`, `mastodon`, ...) to profile URL.
    pub social_links: BTreeMap<String, String>,
}

impl Default for SiteFields {
    fn default() -> Self {
        Self {
            site_title: "Chyrp Lite".to_string(),
            site_description: String::new(),
            site_url: String::new(),
            contact_email: String::new(),
            theme: "blossom".to_string(),
            locale: "en_US".to_string(),
            timezone: "Etc/UTC".to_string(),
            posts_per_page: 5,
            feed_items: 20,
            enable_comments: true,
            enable_registration: false,
            enable_webmentions: false,
            enable_feeds: true,
            enable_markdown: true,
            social_links: BTreeMap::new(),
        }
    }
}

impl SiteFields {
    pub fn project(values: &SettingsMap) -> Self {
        let d = Self::default();
        let string = |field: Field, default: String| match values.get(field.key()) {
            Some(SettingValue::String(s)) => s.clone(),
            _ => default,
        };
        let flag = |field: Field, default: bool| match values.get(field.key()) {
            Some(SettingValue::Bool(b)) => *b,
            _ => default,
        };
        let count = |field: Field, default: u32| match values.get(field.key()) {
            Some(SettingValue::Number(n)) if n.is_finite() && *n >= 0.0 => {
                n.round().min(f64::from(u32::MAX)) as u32
            }
            _ => default,
        };

        let social_links = values
            .iter()
            .filter_map(|(key, value)| {
                let network = key.strip_prefix(SOCIAL_PREFIX)?;
                let url = value.as_str()?.trim();
                (!network.is_empty() && !url.is_empty())
                    .then(|| (network.to_string(), url.to_string()))
            })
            .collect();

        Self {
            site_title: string(Field::SiteTitle, d.site_title),
            site_description: string(Field::SiteDescription, d.site_description),
            site_url: string(Field::SiteUrl, d.site_url),
            contact_email: string(Field::ContactEmail, d.contact_email),
            theme: string(Field::Theme, d.theme),
            locale: string(Field::Locale, d.locale),
            timezone: string(Field::Timezone, d.timezone),
            posts_per_page: count(Field::PostsPerPage, d.posts_per_page),
            feed_items: count(Field::FeedItems, d.feed_items),
            enable_comments: flag(Field::EnableComments, d.enable_comments),
            enable_registration: flag(Field::EnableRegistration, d.enable_registration),
            enable_webmentions: flag(Field::EnableWebmentions, d.enable_webmentions),
            enable_feeds: flag(Field::EnableFeeds, d.enable_feeds),
            enable_markdown: flag(Field::EnableMarkdown, d.enable_markdown),
            social_links,
        }
    }

    pub fn get(&self, field: Field) -> SettingValue {
        match field {
            Field::SiteTitle => self.site_title.clone().into(),
            Field::SiteDescription => self.site_description.clone().into(),
            Field::SiteUrl => self.site_url.clone().into(),
            Field::ContactEmail => self.contact_email.clone().into(),
            Field::Theme => self.theme.clone().into(),
            Field::Locale => self.locale.clone().into(),
            Field::Timezone => self.timezone.clone().into(),
            Field::PostsPerPage => SettingValue::Number(f64::from(self.posts_per_page)),
            Field::FeedItems => SettingValue::Number(f64::from(self.feed_items)),
            Field::EnableComments => self.enable_comments.into(),
            Field::EnableRegistration => self.enable_registration.into(),
            Field::EnableWebmentions => self.enable_webmentions.into(),
            Field::EnableFeeds => self.enable_feeds.into(),
            Field::EnableMarkdown => self.enable_markdown.into(),
            Field::SocialLinks => SettingValue::Json(serde_json::Value::Object(
                self.social_links
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            )),
        }
    }
}

/// One complete, immutable copy of the settings key space.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSnapshot {
    values: SettingsMap,
    fields: SiteFields,
    version: u64,
    fetched_at: DateTime<Utc>,
}

impl SettingsSnapshot {
    pub fn new(values: SettingsMap, version: u64) -> Self {
        let fields = SiteFields::project(&values);
        Self {
            values,
            fields,
            version,
            fetched_at: Utc::now(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn values(&self) -> &SettingsMap {
        &self.values
    }

    pub fn fields(&self) -> &SiteFields {
        &self.fields
    }

    /// 1 for the first successful load, incremented on every reload.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(entries: &[(&str, SettingValue)]) -> SettingsMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_projection_reads_typed_values() {
        let values = map(&[
            ("site_title", "My Blog".into()),
            ("enable_comments", false.into()),
            ("posts_per_page", 12.0.into()),
        ]);
        let fields = SiteFields::project(&values);
        assert_eq!(fields.site_title, "My Blog");
        assert!(!fields.enable_comments);
        assert_eq!(fields.posts_per_page, 12);
        assert_eq!(fields.theme, "blossom");
    }

    #[test]
    fn test_wrong_type_falls_back_to_default() {
        let values = map(&[("enable_comments", "nope".into()), ("posts_per_page", (-3.0).into())]);
        let fields = SiteFields::project(&values);
        assert!(fields.enable_comments);
        assert_eq!(fields.posts_per_page, 5);
    }

    #[test]
    fn test_social_links_gathered() {
        let values = map(&[
            ("social_github", "https://github.com/me".into()),
            ("social_mastodon", " ".into()),
            ("social_", "https://nowhere".into()),
            ("socialite", "x".into()),
        ]);
        let fields = SiteFields::project(&values);
        assert_eq!(fields.social_links.len(), 1);
        assert_eq!(fields.social_links["github"], "https://github.com/me");
        assert_eq!(
            fields.get(Field::SocialLinks),
            SettingValue::Json(json!({"github": "https://github.com/me"}))
        );
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("siteTitle".parse::<Field>().unwrap(), Field::SiteTitle);
        assert_eq!("enable_feeds".parse::<Field>().unwrap(), Field::EnableFeeds);
        assert!("colour".parse::<Field>().is_err());
    }

    #[test]
    fn test_field_defaults() {
        assert_eq!(Field::SiteTitle.default_value(), SettingValue::String("Chyrp Lite".into()));
        assert_eq!(Field::PostsPerPage.default_value(), SettingValue::Number(5.0));
        assert_eq!(Field::EnableRegistration.default_value(), SettingValue::Bool(false));
    }

    #[test]
    fn test_snapshot_accessors() {
        let snapshot = SettingsSnapshot::new(map(&[("site_title", "A".into())]), 3);
        assert_eq!(snapshot.version(), 3);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("site_title"), Some(&SettingValue::String("A".into())));
        assert_eq!(snapshot.fields().site_title, "A");
    }
}

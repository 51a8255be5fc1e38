// Content Record Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::job::{ContentId, JobId, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Content record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    /// Created by the pipeline, not yet validated
    Draft,
    /// Passed the validation gate
    Published,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(ContentStatus::Draft),
            "published" => Ok(ContentStatus::Published),
            other => Err(DomainError::UnknownStatus {
                kind: "content",
                value: other.to_string(),
            }),
        }
    }
}

/// Text fields written by the generation steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentField {
    Title,
    SeoTitle,
    MetaDescription,
    Body,
}

impl ContentField {
    /// Column name in the content store
    pub fn column(&self) -> &'static str {
        match self {
            ContentField::Title => "title",
            ContentField::SeoTitle => "seo_title",
            ContentField::MetaDescription => "meta_description",
            ContentField::Body => "body",
        }
    }
}

/// One generated piece of content, owned by the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: ContentId,
    pub user_id: UserId,
    /// Back-reference for reporting; the job does not own the record
    pub job_id: Option<JobId>,
    pub keyword: String,
    pub source_url: Option<String>,
    pub title: String,
    pub seo_title: String,
    pub meta_description: String,
    pub body: String,
    pub status: ContentStatus,
    pub tokens_used: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ContentRecord {
    /// Draft stub inserted before any generation step runs
    pub fn stub(
        id: impl Into<String>,
        created_at: i64,
        user_id: impl Into<String>,
        job_id: Option<JobId>,
        keyword: impl Into<String>,
        source_url: Option<String>,
    ) -> Self {
        let keyword = keyword.into();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            job_id,
            title: format!("Generating: {}", keyword),
            keyword,
            source_url,
            seo_title: String::new(),
            meta_description: String::new(),
            body: String::new(),
            status: ContentStatus::Draft,
            tokens_used: 0,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn field(&self, field: ContentField) -> &str {
        match field {
            ContentField::Title => &self.title,
            ContentField::SeoTitle => &self.seo_title,
            ContentField::MetaDescription => &self.meta_description,
            ContentField::Body => &self.body,
        }
    }

    pub fn set_field(&mut self, field: ContentField, text: impl Into<String>) {
        let text = text.into();
        match field {
            ContentField::Title => self.title = text,
            ContentField::SeoTitle => self.seo_title = text,
            ContentField::MetaDescription => self.meta_description = text,
            ContentField::Body => self.body = text,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }
}

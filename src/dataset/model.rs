//! Content recommendation data model
//!
//! Users, content, interactions, recommendations, and per-region trends.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Geographic region a user or trend belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "North America")]
    NorthAmerica,
    #[serde(rename = "Europe")]
    Europe,
    #[serde(rename = "Asia")]
    Asia,
    #[serde(rename = "South America")]
    SouthAmerica,
}

impl Region {
    /// Display name, as stored in documents
    pub fn name(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "North America",
            Region::Europe => "Europe",
            Region::Asia => "Asia",
            Region::SouthAmerica => "South America",
        }
    }

    /// Cloud region hosting this region's partition
    pub fn cloud_region(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "us-east-1",
            Region::Europe => "eu-central-1",
            Region::Asia => "ap-south-1",
            Region::SouthAmerica => "sa-east-1",
        }
    }

    pub fn all() -> Vec<Region> {
        vec![
            Region::NorthAmerica,
            Region::Europe,
            Region::Asia,
            Region::SouthAmerica,
        ]
    }

    /// Parse a display name, slug, or cloud region code
    pub fn from_str(s: &str) -> Option<Region> {
        match s.to_lowercase().replace(['_', '-'], " ").trim() {
            "north america" | "na" | "us east 1" => Some(Region::NorthAmerica),
            "europe" | "eu" | "eu central 1" => Some(Region::Europe),
            "asia" | "ap south 1" => Some(Region::Asia),
            "south america" | "sa" | "sa east 1" => Some(Region::SouthAmerica),
            _ => None,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Webseries,
    Documentary,
}

impl ContentType {
    pub fn all() -> [ContentType; 3] {
        [
            ContentType::Movie,
            ContentType::Webseries,
            ContentType::Documentary,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Webseries => "webseries",
            ContentType::Documentary => "documentary",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    #[serde(rename = "Sci-Fi")]
    SciFi,
    Romance,
    Thriller,
    Comedy,
    Drama,
}

impl Genre {
    pub fn all() -> [Genre; 5] {
        [
            Genre::SciFi,
            Genre::Romance,
            Genre::Thriller,
            Genre::Comedy,
            Genre::Drama,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    View,
    Like,
    Share,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: u8,
    pub gender: String,
    pub interests: Vec<Genre>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub location: Region,
    pub latitude: f64,
    pub longitude: f64,
    pub profile: UserProfile,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    /// e.g. "95 mins"
    pub duration: String,
    pub actors: Vec<String>,
    pub release_date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub content_id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub genre: Genre,
    pub tags: Vec<String>,
    pub metadata: ContentMetadata,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub content_id: String,
    pub interaction_type: InteractionType,
    pub timestamp: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub user_id: String,
    pub content_id: String,
    /// Relevance score out of 5
    pub score: f64,
    pub reason: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub total_views: u64,
    pub total_likes: u64,
    pub total_shares: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionalTrend {
    pub region: Region,
    pub top_content: String,
    pub trending_content: Vec<String>,
    pub engagement_metrics: EngagementMetrics,
}

/// The complete synthetic dataset
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub users: Vec<User>,
    pub content: Vec<Content>,
    pub interactions: Vec<Interaction>,
    pub recommendations: Vec<Recommendation>,
    pub regional_trends: Vec<RegionalTrend>,
}

impl Dataset {
    /// Load a dataset from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open dataset: {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse dataset: {}", path.display()))
    }

    /// Save the dataset as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }

        let file = File::create(path)
            .with_context(|| format!("Failed to create dataset: {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write dataset: {}", path.display()))
    }

    /// Trends belonging to one region
    pub fn trends_in(&self, region: Region) -> impl Iterator<Item = &RegionalTrend> {
        self.regional_trends.iter().filter(move |t| t.region == region)
    }

    /// Format entity counts
    pub fn format_summary(&self) -> String {
        format!(
            "users={} content={} interactions={} recommendations={} regional_trends={}",
            self.users.len(),
            self.content.len(),
            self.interactions.len(),
            self.recommendations.len(),
            self.regional_trends.len()
        )
    }
}

//! Recommendation queries
//!
//! The two read queries every store is benchmarked on, plus the ranking
//! rules shared by backends that evaluate them client-side.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::dataset::{ContentType, Region, RegionalTrend};

/// Rows returned by a regional query
pub const REGIONAL_LIMIT: usize = 10;

/// Rows returned by a global query
pub const GLOBAL_LIMIT: usize = 5;

/// A read query against the regional trends collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrendQuery {
    /// Most engaging content of one region
    Regional { region: Region },
    /// Most viewed content summed across every region
    Global,
}

impl TrendQuery {
    /// Display name used for reports
    pub fn display_name(&self) -> String {
        match self {
            TrendQuery::Regional { region } => format!("{region} Regional Query"),
            TrendQuery::Global => "Global Content Query".to_string(),
        }
    }

    pub fn region(&self) -> Option<Region> {
        match self {
            TrendQuery::Regional { region } => Some(*region),
            TrendQuery::Global => None,
        }
    }

    /// Build from a scope name and optional region
    pub fn parse(scope: &str, region: Option<&str>) -> Option<Self> {
        match scope.to_lowercase().as_str() {
            "regional" | "local" => {
                let region = Region::from_str(region?)?;
                Some(TrendQuery::Regional { region })
            }
            "global" => Some(TrendQuery::Global),
            _ => None,
        }
    }
}

impl fmt::Display for TrendQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One recommended piece of content
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendRow {
    pub content_title: String,
    pub content_type: Option<ContentType>,
    pub total_views: u64,
    pub total_likes: u64,
}

/// Views descending, then likes descending, then title for stable output
pub fn by_engagement(a: &TrendRow, b: &TrendRow) -> Ordering {
    b.total_views
        .cmp(&a.total_views)
        .then(b.total_likes.cmp(&a.total_likes))
        .then_with(|| a.content_title.cmp(&b.content_title))
}

/// Top `limit` trends of a single partition
pub fn rank_regional<'a>(
    trends: impl IntoIterator<Item = &'a RegionalTrend>,
    content_types: &HashMap<String, ContentType>,
    limit: usize,
) -> Vec<TrendRow> {
    let mut rows: Vec<TrendRow> = trends
        .into_iter()
        .map(|t| TrendRow {
            content_title: t.top_content.clone(),
            content_type: content_types.get(&t.top_content).copied(),
            total_views: t.engagement_metrics.total_views,
            total_likes: t.engagement_metrics.total_likes,
        })
        .collect();

    rows.sort_by(by_engagement);
    rows.truncate(limit);
    rows
}

/// Group trends by top content, summing engagement, and keep the top `limit`
pub fn rank_global<'a>(
    trends: impl IntoIterator<Item = &'a RegionalTrend>,
    content_types: &HashMap<String, ContentType>,
    limit: usize,
) -> Vec<TrendRow> {
    let mut totals: HashMap<&str, (u64, u64)> = HashMap::new();
    for trend in trends {
        let entry = totals.entry(trend.top_content.as_str()).or_default();
        entry.0 += trend.engagement_metrics.total_views;
        entry.1 += trend.engagement_metrics.total_likes;
    }

    let mut rows: Vec<TrendRow> = totals
        .into_iter()
        .map(|(title, (views, likes))| TrendRow {
            content_title: title.to_string(),
            content_type: content_types.get(title).copied(),
            total_views: views,
            total_likes: likes,
        })
        .collect();

    rows.sort_by(by_engagement);
    rows.truncate(limit);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::EngagementMetrics;

    fn trend(region: Region, title: &str, views: u64, likes: u64) -> RegionalTrend {
        RegionalTrend {
            region,
            top_content: title.to_string(),
            trending_content: vec![],
            engagement_metrics: EngagementMetrics {
                total_views: views,
                total_likes: likes,
                total_shares: 0,
            },
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            TrendQuery::parse("regional", Some("asia")),
            Some(TrendQuery::Regional {
                region: Region::Asia
            })
        );
        assert_eq!(TrendQuery::parse("global", None), Some(TrendQuery::Global));
        assert_eq!(TrendQuery::parse("regional", None), None);
        assert_eq!(TrendQuery::parse("nearby", None), None);
    }

    #[test]
    fn test_display_name() {
        let q = TrendQuery::Regional {
            region: Region::SouthAmerica,
        };
        assert_eq!(q.display_name(), "South America Regional Query");
        assert_eq!(q.region(), Some(Region::SouthAmerica));
        assert_eq!(TrendQuery::Global.region(), None);
    }

    #[test]
    fn test_rank_regional_sorts_and_limits() {
        let trends = vec![
            trend(Region::Asia, "A.", 5000, 100),
            trend(Region::Asia, "B.", 9000, 100),
            trend(Region::Asia, "C.", 5000, 900),
        ];
        let mut types = HashMap::new();
        types.insert("B.".to_string(), ContentType::Movie);

        let rows = rank_regional(&trends, &types, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content_title, "B.");
        assert_eq!(rows[0].content_type, Some(ContentType::Movie));
        // equal views fall back to likes
        assert_eq!(rows[1].content_title, "C.");
        assert_eq!(rows[1].content_type, None);
    }

    #[test]
    fn test_rank_global_sums_across_regions() {
        let trends = vec![
            trend(Region::Asia, "Shared.", 4000, 100),
            trend(Region::Europe, "Shared.", 4000, 200),
            trend(Region::Europe, "Solo.", 7000, 50),
        ];

        let rows = rank_global(&trends, &HashMap::new(), 5);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content_title, "Shared.");
        assert_eq!(rows[0].total_views, 8000);
        assert_eq!(rows[0].total_likes, 300);
        assert_eq!(rows[1].content_title, "Solo.");
    }

    #[test]
    fn test_query_serde() {
        let q = TrendQuery::Regional {
            region: Region::Europe,
        };
        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(json, r#"{"kind":"regional","region":"Europe"}"#);
    }
}

//! Workload profiles
//!
//! Named request/concurrency presets for the standard query runs.

use serde::{Deserialize, Serialize};

use crate::backend::TrendQuery;
use crate::dataset::Region;

/// A named workload: which query, how many requests, how many callers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadProfile {
    /// Profile name
    pub name: String,
    /// Profile description
    #[serde(default)]
    pub description: String,
    /// Query scope: "regional" or "global"
    pub query: String,
    /// Region for regional queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub num_requests: usize,
    pub concurrency: usize,
}

impl WorkloadProfile {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            query: query.into(),
            region: None,
            num_requests: 100,
            concurrency: 10,
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region.name().to_string());
        self
    }

    pub fn with_load(mut self, num_requests: usize, concurrency: usize) -> Self {
        self.num_requests = num_requests;
        self.concurrency = concurrency;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Regional read load: 200 requests from 20 callers
    pub fn regional(region: Region) -> Self {
        Self::new(format!("regional-{}", slug(region.name())), "regional")
            .with_region(region)
            .with_load(200, 20)
            .with_description(format!("Top trends in {region}"))
    }

    /// Global read load: 1000 requests from 100 callers
    pub fn global() -> Self {
        Self::new("global", "global")
            .with_load(1000, 100)
            .with_description("Top content across every region")
    }

    /// Built-in profiles
    pub fn builtin() -> Vec<Self> {
        let mut profiles: Vec<Self> = Region::all().into_iter().map(Self::regional).collect();
        profiles.push(Self::global());
        profiles
    }

    /// Resolve the query this profile runs
    pub fn to_query(&self) -> Option<TrendQuery> {
        TrendQuery::parse(&self.query, self.region.as_deref())
    }
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles() {
        let profiles = WorkloadProfile::builtin();
        assert_eq!(profiles.len(), 5);
        assert!(profiles.iter().any(|p| p.name == "regional-north-america"));
        assert!(profiles.iter().all(|p| p.to_query().is_some()));
    }

    #[test]
    fn test_regional_profile() {
        let profile = WorkloadProfile::regional(Region::Asia);
        assert_eq!(profile.num_requests, 200);
        assert_eq!(profile.concurrency, 20);
        assert_eq!(
            profile.to_query(),
            Some(TrendQuery::Regional {
                region: Region::Asia
            })
        );
    }

    #[test]
    fn test_global_profile() {
        let profile = WorkloadProfile::global();
        assert_eq!(profile.num_requests, 1000);
        assert_eq!(profile.concurrency, 100);
        assert_eq!(profile.to_query(), Some(TrendQuery::Global));
    }

    #[test]
    fn test_invalid_profile_query() {
        let profile = WorkloadProfile::new("broken", "regional");
        assert_eq!(profile.to_query(), None);
    }
}

//! Synthetic dataset generation
//!
//! Produces users, content, interactions, recommendations, and regional
//! trends with the same value ranges as the reference dataset. Seeded
//! generators are deterministic.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Builder;

use super::model::{
    Content, ContentMetadata, ContentType, Dataset, EngagementMetrics, Genre, Interaction,
    InteractionType, Recommendation, Region, RegionalTrend, User, UserProfile,
};

const TAGS: [&str; 5] = ["action", "adventure", "mystery", "fantasy", "horror"];

const GENDERS: [&str; 3] = ["male", "female", "other"];

const REASONS: [&str; 3] = [
    "Based on your interests",
    "Trending in your location",
    "Similar to content you've watched",
];

const FIRST_NAMES: [&str; 16] = [
    "James", "Maria", "Wei", "Aisha", "Carlos", "Emma", "Ravi", "Sofia", "Liam", "Yuki", "Omar",
    "Chloe", "Mateo", "Priya", "Noah", "Elena",
];

const LAST_NAMES: [&str; 16] = [
    "Smith", "Garcia", "Chen", "Khan", "Silva", "Muller", "Patel", "Rossi", "Brown", "Tanaka",
    "Haddad", "Martin", "Lopez", "Sharma", "Wilson", "Novak",
];

const WORDS: [&str; 40] = [
    "series", "west", "issue", "power", "experience", "perhaps", "order", "reduce", "music",
    "management", "expert", "film", "environmental", "owner", "fall", "face", "along", "pick",
    "skin", "physical", "authority", "suddenly", "address", "rise", "beat", "central", "chance",
    "condition", "fish", "that", "night", "river", "signal", "garden", "memory", "machine",
    "silver", "future", "letter", "storm",
];

/// Entity counts for a generated dataset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetSize {
    pub users: usize,
    pub content: usize,
    pub interactions: usize,
    pub recommendations: usize,
    pub trends_per_region: usize,
}

impl Default for DatasetSize {
    fn default() -> Self {
        Self {
            users: 10_000,
            content: 2_000,
            interactions: 50_000,
            recommendations: 20_000,
            trends_per_region: 25,
        }
    }
}

impl DatasetSize {
    /// A small dataset for quick runs
    pub fn small() -> Self {
        Self {
            users: 100,
            content: 50,
            interactions: 500,
            recommendations: 200,
            trends_per_region: 15,
        }
    }
}

/// Random dataset generator
pub struct DatasetGenerator {
    rng: StdRng,
}

impl DatasetGenerator {
    /// Create a generator; `Some(seed)` makes output reproducible
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    /// Generate every collection
    pub fn generate(&mut self, size: &DatasetSize) -> Dataset {
        info!(
            "Generating dataset: {} users, {} content, {} interactions, {} recommendations",
            size.users, size.content, size.interactions, size.recommendations
        );

        let users = self.users(size.users);
        let content = self.content(size.content);
        let interactions = self.interactions(&users, &content, size.interactions);
        let recommendations = self.recommendations(&users, &content, size.recommendations);
        let regional_trends = self.regional_trends(&content, size.trends_per_region);

        let dataset = Dataset {
            users,
            content,
            interactions,
            recommendations,
            regional_trends,
        };
        debug!("Generated {}", dataset.format_summary());
        dataset
    }

    pub fn users(&mut self, n: usize) -> Vec<User> {
        (0..n)
            .map(|_| User {
                user_id: self.uuid4(),
                name: self.person_name(),
                location: self.pick(&Region::all()),
                latitude: round_to(self.rng.random_range(-90.0..=90.0), 6),
                longitude: round_to(self.rng.random_range(-180.0..=180.0), 6),
                profile: UserProfile {
                    age: self.rng.random_range(18..=70),
                    gender: self.pick(&GENDERS).to_string(),
                    interests: self.sample(&Genre::all(), 3),
                },
            })
            .collect()
    }

    pub fn content(&mut self, n: usize) -> Vec<Content> {
        let decade_start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();
        let today = Utc::now().date_naive();
        let decade_days = (today - decade_start).num_days().max(1);

        (0..n)
            .map(|_| {
                let actors = (0..3).map(|_| self.person_name()).collect();
                let release_date =
                    decade_start + ChronoDuration::days(self.rng.random_range(0..decade_days));

                Content {
                    content_id: self.uuid4(),
                    title: self.sentence(3),
                    description: (0..3)
                        .map(|_| self.sentence(8))
                        .collect::<Vec<_>>()
                        .join(" "),
                    content_type: self.pick(&ContentType::all()),
                    genre: self.pick(&Genre::all()),
                    tags: self
                        .sample(&TAGS, 3)
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    metadata: ContentMetadata {
                        duration: format!("{} mins", self.rng.random_range(60..=180)),
                        actors,
                        release_date,
                    },
                }
            })
            .collect()
    }

    pub fn interactions(&mut self, users: &[User], content: &[Content], n: usize) -> Vec<Interaction> {
        if users.is_empty() || content.is_empty() {
            return Vec::new();
        }

        let start = date_time(2022, 1, 1);
        let span = (date_time(2024, 12, 31) - start).num_seconds();
        let kinds = [InteractionType::View, InteractionType::Like, InteractionType::Share];

        (0..n)
            .map(|_| Interaction {
                user_id: self.pick_ref(users).user_id.clone(),
                content_id: self.pick_ref(content).content_id.clone(),
                interaction_type: self.pick(&kinds),
                timestamp: start + ChronoDuration::seconds(self.rng.random_range(0..=span)),
            })
            .collect()
    }

    pub fn recommendations(
        &mut self,
        users: &[User],
        content: &[Content],
        n: usize,
    ) -> Vec<Recommendation> {
        if users.is_empty() || content.is_empty() {
            return Vec::new();
        }

        let now = Utc::now().naive_utc();
        (0..n)
            .map(|_| Recommendation {
                user_id: self.pick_ref(users).user_id.clone(),
                content_id: self.pick_ref(content).content_id.clone(),
                score: round_to(self.rng.random_range(0.5..=5.0), 2),
                reason: self.pick(&REASONS).to_string(),
                timestamp: now,
            })
            .collect()
    }

    /// `per_region` trend documents for every region
    pub fn regional_trends(&mut self, content: &[Content], per_region: usize) -> Vec<RegionalTrend> {
        if content.is_empty() {
            return Vec::new();
        }

        let titles: Vec<&str> = content.iter().map(|c| c.title.as_str()).collect();
        let mut trends = Vec::with_capacity(per_region * 4);

        for region in Region::all() {
            for _ in 0..per_region {
                trends.push(RegionalTrend {
                    region,
                    top_content: self.pick(&titles).to_string(),
                    trending_content: self
                        .sample(&titles, 2)
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    engagement_metrics: EngagementMetrics {
                        total_views: self.rng.random_range(1000..=10000),
                        total_likes: self.rng.random_range(500..=5000),
                        total_shares: self.rng.random_range(100..=1000),
                    },
                });
            }
        }

        trends
    }

    fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        *items
            .choose(&mut self.rng)
            .expect("pick called on an empty slice")
    }

    fn pick_ref<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        items
            .choose(&mut self.rng)
            .expect("pick_ref called on an empty slice")
    }

    /// Up to `n` distinct items
    fn sample<T: Copy>(&mut self, items: &[T], n: usize) -> Vec<T> {
        items.choose_multiple(&mut self.rng, n).copied().collect()
    }

    fn person_name(&mut self) -> String {
        format!("{} {}", self.pick(&FIRST_NAMES), self.pick(&LAST_NAMES))
    }

    /// Capitalized sentence of `words` words ending in a period
    fn sentence(&mut self, words: usize) -> String {
        let count = self.rng.random_range(1..=words.max(1));
        let mut sentence = (0..count)
            .map(|_| self.pick(&WORDS))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }

    /// Random version 4 identifier drawn from the generator's rng
    fn uuid4(&mut self) -> String {
        Builder::from_random_bytes(self.rng.random())
            .into_uuid()
            .to_string()
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn date_time(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::{Uuid, Version};

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let size = DatasetSize::small();
        let a = DatasetGenerator::new(Some(7)).generate(&size);
        let b = DatasetGenerator::new(Some(7)).generate(&size);

        assert_eq!(a.users, b.users);
        assert_eq!(a.content, b.content);
        assert_eq!(a.regional_trends, b.regional_trends);
    }

    #[test]
    fn test_sizes() {
        let size = DatasetSize::small();
        let dataset = DatasetGenerator::new(Some(1)).generate(&size);

        assert_eq!(dataset.users.len(), size.users);
        assert_eq!(dataset.content.len(), size.content);
        assert_eq!(dataset.interactions.len(), size.interactions);
        assert_eq!(dataset.recommendations.len(), size.recommendations);
        assert_eq!(dataset.regional_trends.len(), size.trends_per_region * 4);
        for region in Region::all() {
            assert_eq!(dataset.trends_in(region).count(), size.trends_per_region);
        }
    }

    #[test]
    fn test_value_ranges() {
        let dataset = DatasetGenerator::new(Some(3)).generate(&DatasetSize::small());

        for user in &dataset.users {
            assert!((18..=70).contains(&user.profile.age));
            assert!((-90.0..=90.0).contains(&user.latitude));
            let interests: HashSet<_> = user.profile.interests.iter().collect();
            assert_eq!(interests.len(), 3);
        }

        for content in &dataset.content {
            assert!(content.title.ends_with('.'));
            assert_eq!(content.tags.len(), 3);
            assert_eq!(content.metadata.actors.len(), 3);
            assert!(content.metadata.duration.ends_with(" mins"));
        }

        for rec in &dataset.recommendations {
            assert!((0.5..=5.0).contains(&rec.score));
        }

        let titles: HashSet<_> = dataset.content.iter().map(|c| c.title.as_str()).collect();
        for trend in &dataset.regional_trends {
            let m = trend.engagement_metrics;
            assert!((1000..=10000).contains(&m.total_views));
            assert!((500..=5000).contains(&m.total_likes));
            assert!((100..=1000).contains(&m.total_shares));
            assert!(titles.contains(trend.top_content.as_str()));
            assert_eq!(trend.trending_content.len(), 2);
        }
    }

    #[test]
    fn test_interaction_window() {
        let dataset = DatasetGenerator::new(Some(9)).generate(&DatasetSize::small());
        let start = date_time(2022, 1, 1);
        let end = date_time(2024, 12, 31);

        for interaction in &dataset.interactions {
            assert!(interaction.timestamp >= start && interaction.timestamp <= end);
        }
    }

    #[test]
    fn test_uuid_format() {
        let mut generator = DatasetGenerator::new(Some(11));
        let id = generator.uuid4();

        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version(), Some(Version::Random));
        assert_eq!(id.len(), 36);

        let mut again = DatasetGenerator::new(Some(11));
        assert_eq!(again.uuid4(), id);
    }

    #[test]
    fn test_empty_inputs() {
        let mut generator = DatasetGenerator::new(Some(2));
        assert!(generator.interactions(&[], &[], 10).is_empty());
        assert!(generator.regional_trends(&[], 10).is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/dataset.json");
        let dataset = DatasetGenerator::new(Some(5)).generate(&DatasetSize::small());

        dataset.save(&path).unwrap();
        let loaded = Dataset::load(&path).unwrap();
        assert_eq!(loaded.regional_trends, dataset.regional_trends);
        assert_eq!(loaded.users.len(), dataset.users.len());
    }
}

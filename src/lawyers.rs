//! Lawyer finder: filters plus semantic match over a lawyer directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::config::LawyersConfig;
use crate::embedding::{cosine_similarity, embed_batched, embed_query, EmbeddingProvider};

/// Minimum cosine similarity for a description to match a query.
pub const MIN_SIMILARITY: f32 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lawyer {
    pub name: String,
    pub specialization: String,
    pub description: String,
    pub rating: f32,
    pub reviews: u32,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Comma-separated, e.g. `"Hindi, English"`.
    pub languages: String,
    pub experience_years: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LawyerFilters {
    pub cities: Vec<String>,
    pub specializations: Vec<String>,
    pub languages: Vec<String>,
    pub min_rating: f32,
    pub min_reviews: u32,
    pub min_experience: u32,
    pub query: Option<String>,
}

impl Default for LawyerFilters {
    fn default() -> Self {
        Self {
            cities: Vec::new(),
            specializations: Vec::new(),
            languages: Vec::new(),
            min_rating: 4.0,
            min_reviews: 50,
            min_experience: 5,
            query: None,
        }
    }
}

impl LawyerFilters {
    fn accepts(&self, lawyer: &Lawyer) -> bool {
        (self.cities.is_empty() || self.cities.contains(&lawyer.city))
            && (self.specializations.is_empty()
                || self.specializations.contains(&lawyer.specialization))
            && (self.languages.is_empty()
                || self
                    .languages
                    .iter()
                    .any(|l| lawyer.languages.contains(l.trim())))
            && lawyer.rating >= self.min_rating
            && lawyer.reviews >= self.min_reviews
            && lawyer.experience_years >= self.min_experience
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LawyerMatch {
    #[serde(flatten)]
    pub lawyer: Lawyer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

pub struct LawyerDirectory {
    lawyers: Vec<Lawyer>,
}

impl LawyerDirectory {
    pub fn new(lawyers: Vec<Lawyer>) -> Self {
        Self { lawyers }
    }

    /// Directory from `config.path` (a JSON array), or the built-in sample.
    pub fn load(config: &LawyersConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::new(sample_lawyers())),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lawyer directory: {}", path.display()))?;
        let lawyers: Vec<Lawyer> = serde_json::from_str(&text)
            .with_context(|| format!("Invalid lawyer directory: {}", path.display()))?;
        info!(path = %path.display(), count = lawyers.len(), "loaded lawyer directory");
        Ok(Self::new(lawyers))
    }

    pub fn all(&self) -> &[Lawyer] {
        &self.lawyers
    }

    /// Apply filters; with a query, keep lawyers whose description is
    /// similar enough and order them by similarity.
    pub async fn search(
        &self,
        filters: &LawyerFilters,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<LawyerMatch>> {
        let filtered: Vec<&Lawyer> = self.lawyers.iter().filter(|l| filters.accepts(l)).collect();

        let query = filters.query.as_deref().map(str::trim).unwrap_or("");
        if query.is_empty() || filtered.is_empty() {
            return Ok(filtered
                .into_iter()
                .map(|l| LawyerMatch {
                    lawyer: l.clone(),
                    similarity: None,
                })
                .collect());
        }

        let query_vec = embed_query(embedder, query).await?;
        let descriptions: Vec<String> = filtered.iter().map(|l| l.description.clone()).collect();
        let vectors = embed_batched(embedder, &descriptions, descriptions.len()).await?;

        let mut matches: Vec<LawyerMatch> = filtered
            .into_iter()
            .zip(vectors.iter())
            .map(|(l, v)| LawyerMatch {
                lawyer: l.clone(),
                similarity: Some(cosine_similarity(&query_vec, v)),
            })
            .filter(|m| m.similarity.unwrap_or(0.0) > MIN_SIMILARITY)
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(matches)
    }
}

#[allow(clippy::too_many_arguments)]
fn lawyer(
    name: &str,
    specialization: &str,
    description: &str,
    rating: f32,
    reviews: u32,
    city: &str,
    (latitude, longitude): (f64, f64),
    languages: &str,
    experience_years: u32,
) -> Lawyer {
    Lawyer {
        name: name.to_string(),
        specialization: specialization.to_string(),
        description: description.to_string(),
        rating,
        reviews,
        city: city.to_string(),
        latitude,
        longitude,
        languages: languages.to_string(),
        experience_years,
    }
}

/// Eight sample lawyers across major Indian cities.
pub fn sample_lawyers() -> Vec<Lawyer> {
    vec![
        lawyer(
            "Rajesh Kumar",
            "Criminal Law",
            "Experienced criminal defense advocate with practice in Delhi High Court.",
            4.8,
            152,
            "Delhi",
            (28.6139, 77.2090),
            "Hindi, English",
            15,
        ),
        lawyer(
            "Priya Sharma",
            "Family Law",
            "Family court specialist handling divorce and custody matters in Mumbai.",
            4.6,
            98,
            "Mumbai",
            (19.0760, 72.8777),
            "Hindi, English, Marathi",
            12,
        ),
        lawyer(
            "Amit Patel",
            "Corporate Law",
            "Corporate lawyer specializing in startup law and compliance in Bangalore.",
            4.9,
            203,
            "Bangalore",
            (12.9716, 77.5946),
            "English, Kannada",
            18,
        ),
        lawyer(
            "Deepa Verma",
            "Immigration Law",
            "Immigration expert handling NRI cases in Chennai.",
            4.7,
            167,
            "Chennai",
            (13.0827, 80.2707),
            "Tamil, English",
            10,
        ),
        lawyer(
            "Suresh Iyer",
            "Real Estate Law",
            "Real estate lawyer focusing on property disputes in Hyderabad.",
            4.5,
            88,
            "Hyderabad",
            (17.3850, 78.4867),
            "Telugu, English",
            14,
        ),
        lawyer(
            "Anita Desai",
            "Intellectual Property",
            "Patent attorney with expertise in IT sector cases in Pune.",
            4.8,
            176,
            "Pune",
            (18.5204, 73.8567),
            "Marathi, English",
            16,
        ),
        lawyer(
            "Vikram Singh",
            "Tax Law",
            "GST and income tax specialist in Kolkata.",
            4.6,
            134,
            "Kolkata",
            (22.5726, 88.3639),
            "Bengali, English",
            20,
        ),
        lawyer(
            "Meera Reddy",
            "Civil Rights",
            "Civil rights advocate working with NGOs in Ahmedabad.",
            4.9,
            189,
            "Ahmedabad",
            (23.0225, 72.5714),
            "Gujarati, Hindi, English",
            13,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// One axis per keyword: "tax", "family", "property".
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keywords"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    ["tax", "family", "property"]
                        .iter()
                        .map(|k| if t.contains(k) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect())
        }
    }

    /// Answers only the first text of every batch.
    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().take(1).map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_query_errors_on_missing_vectors() {
        let dir = LawyerDirectory::new(sample_lawyers());
        let filters = LawyerFilters {
            query: Some("tax dispute".into()),
            ..LawyerFilters::default()
        };
        let err = dir.search(&filters, &ShortEmbedder).await.unwrap_err();
        assert!(err.to_string().contains("returned 1 vectors for 8 texts"), "{err}");
    }

    #[tokio::test]
    async fn test_default_filters() {
        let dir = LawyerDirectory::new(sample_lawyers());
        let found = dir
            .search(&LawyerFilters::default(), &KeywordEmbedder)
            .await
            .unwrap();
        // Every sample lawyer clears the default thresholds.
        assert_eq!(found.len(), 8);
        assert!(found.iter().all(|m| m.similarity.is_none()));
    }

    #[tokio::test]
    async fn test_language_and_city_filters() {
        let dir = LawyerDirectory::new(sample_lawyers());
        let filters = LawyerFilters {
            languages: vec!["Marathi".into()],
            ..LawyerFilters::default()
        };
        let names: Vec<String> = dir
            .search(&filters, &KeywordEmbedder)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.lawyer.name)
            .collect();
        assert_eq!(names, vec!["Priya Sharma", "Anita Desai"]);

        let filters = LawyerFilters {
            cities: vec!["Delhi".into()],
            min_experience: 16,
            ..LawyerFilters::default()
        };
        assert!(dir.search(&filters, &KeywordEmbedder).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rating_threshold() {
        let dir = LawyerDirectory::new(sample_lawyers());
        let filters = LawyerFilters {
            min_rating: 4.85,
            ..LawyerFilters::default()
        };
        let found = dir.search(&filters, &KeywordEmbedder).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_query_ranks_and_drops_unrelated() {
        let dir = LawyerDirectory::new(sample_lawyers());
        let filters = LawyerFilters {
            query: Some("income tax notice".into()),
            ..LawyerFilters::default()
        };
        let found = dir.search(&filters, &KeywordEmbedder).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].lawyer.name, "Vikram Singh");
        assert!(found[0].similarity.unwrap() > 0.9);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lawyers.json");
        let one = vec![sample_lawyers().remove(0)];
        std::fs::write(&path, serde_json::to_string(&one).unwrap()).unwrap();
        let loaded = LawyerDirectory::load(&LawyersConfig {
            path: Some(path),
        })
        .unwrap();
        assert_eq!(loaded.all(), one.as_slice());
        assert_eq!(
            LawyerDirectory::load(&LawyersConfig::default()).unwrap().all().len(),
            8
        );
    }
}

//! Clause risk classification.
//!
//! The pipeline is `clause text → preprocess → embed → classify → label`.
//! [`Classifier`] maps an embedding to a label; [`LinearClassifier`] is a
//! logistic-regression model exported as JSON:
//!
//! ```json
//! { "classes": ["High", "Low"], "coef": [[0.12, -0.4, ...]], "intercept": [0.3] }
//! ```
//!
//! A single coefficient row is the binary form (positive decision picks
//! `classes[1]`); one row per class is the multiclass form (argmax).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::models::ClauseRisk;
use crate::preprocess::{preprocess_text, split_into_clauses};

/// Vector → label.
pub trait Classifier: Send + Sync {
    /// Every label [`Classifier::classify`] can return.
    fn labels(&self) -> &[String];
    /// Expected input dimensionality.
    fn input_dims(&self) -> usize;
    fn classify(&self, embedding: &[f32]) -> Result<String>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearClassifier {
    classes: Vec<String>,
    coef: Vec<Vec<f32>>,
    intercept: Vec<f32>,
}

impl LinearClassifier {
    pub fn new(classes: Vec<String>, coef: Vec<Vec<f32>>, intercept: Vec<f32>) -> Result<Self> {
        let model = Self {
            classes,
            coef,
            intercept,
        };
        model.check()?;
        Ok(model)
    }

    /// Load a classifier artifact. A missing or malformed file is an error;
    /// the server refuses to start without one.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Classifier model file not found at {}", path.display()))?;
        let model: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid classifier file: {}", path.display()))?;
        model.check()?;
        info!(
            path = %path.display(),
            classes = ?model.classes,
            dims = model.input_dims(),
            "loaded risk classifier"
        );
        Ok(model)
    }

    fn check(&self) -> Result<()> {
        if self.classes.len() < 2 {
            bail!("classifier needs at least two classes");
        }
        let binary = self.coef.len() == 1 && self.classes.len() == 2;
        if !binary && self.coef.len() != self.classes.len() {
            bail!(
                "classifier has {} coefficient rows for {} classes",
                self.coef.len(),
                self.classes.len()
            );
        }
        if self.intercept.len() != self.coef.len() {
            bail!("classifier intercept length does not match coefficient rows");
        }
        let dims = self.coef[0].len();
        if dims == 0 || self.coef.iter().any(|row| row.len() != dims) {
            bail!("classifier coefficient rows must share a non-zero width");
        }
        Ok(())
    }

    fn decision(&self, row: usize, x: &[f32]) -> f32 {
        self.coef[row].iter().zip(x).map(|(w, v)| w * v).sum::<f32>() + self.intercept[row]
    }
}

impl Classifier for LinearClassifier {
    fn labels(&self) -> &[String] {
        &self.classes
    }

    fn input_dims(&self) -> usize {
        self.coef[0].len()
    }

    fn classify(&self, embedding: &[f32]) -> Result<String> {
        if embedding.len() != self.input_dims() {
            bail!(
                "embedding has {} dimensions but the classifier expects {}",
                embedding.len(),
                self.input_dims()
            );
        }

        let idx = if self.coef.len() == 1 {
            usize::from(self.decision(0, embedding) > 0.0)
        } else {
            (0..self.coef.len())
                .map(|row| (row, self.decision(row, embedding)))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                })
                .0
        };

        Ok(self.classes[idx].clone())
    }
}

/// Ordinal rank of a risk label. Unknown labels rank below `low`.
pub fn risk_rank(label: &str) -> u8 {
    match label.trim().to_ascii_lowercase().as_str() {
        "high" => 3,
        "medium" => 2,
        "low" => 1,
        _ => 0,
    }
}

/// Highest-ranked label among `clauses`; ties keep the earliest clause.
pub fn overall_risk(clauses: &[ClauseRisk]) -> Option<String> {
    clauses
        .iter()
        .fold(None::<&ClauseRisk>, |best, c| match best {
            Some(b) if risk_rank(&b.risk_level) >= risk_rank(&c.risk_level) => Some(b),
            _ => Some(c),
        })
        .map(|c| c.risk_level.clone())
}

/// Embeds and classifies clause text.
#[derive(Clone)]
pub struct RiskAnalyzer {
    embedder: Arc<dyn EmbeddingProvider>,
    classifier: Arc<dyn Classifier>,
}

impl RiskAnalyzer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            embedder,
            classifier,
        }
    }

    pub fn labels(&self) -> &[String] {
        self.classifier.labels()
    }

    /// Risk label for one clause.
    pub async fn predict(&self, clause_text: &str) -> Result<String> {
        let processed = preprocess_text(clause_text);
        let embedding = embed_query(self.embedder.as_ref(), &processed).await?;
        let label = self.classifier.classify(&embedding)?;
        debug!(chars = clause_text.len(), label = %label, "classified clause");
        Ok(label)
    }

    /// Split `text` into clauses and classify each in order. The first
    /// failure aborts the whole analysis.
    pub async fn analyze_clauses(&self, text: &str) -> Result<Vec<ClauseRisk>> {
        let mut out = Vec::new();
        for (i, clause) in split_into_clauses(text).into_iter().enumerate() {
            let risk_level = self
                .predict(&clause)
                .await
                .with_context(|| format!("clause {}", i + 1))?;
            out.push(ClauseRisk {
                clause_number: i + 1,
                text: clause,
                risk_level,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn binary() -> LinearClassifier {
        LinearClassifier::new(
            vec!["Low".into(), "High".into()],
            vec![vec![1.0, -1.0]],
            vec![0.0],
        )
        .unwrap()
    }

    fn clause(n: usize, level: &str) -> ClauseRisk {
        ClauseRisk {
            clause_number: n,
            text: format!("clause {}", n),
            risk_level: level.to_string(),
        }
    }

    /// Embeds text as `[vowel count, consonant count]`.
    struct LetterEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let vowels = t.chars().filter(|c| "aeiou".contains(*c)).count() as f32;
                    let letters = t.chars().filter(|c| c.is_ascii_alphabetic()).count() as f32;
                    vec![vowels, letters - vowels]
                })
                .collect())
        }
    }

    #[test]
    fn test_binary_decision() {
        let model = binary();
        assert_eq!(model.classify(&[2.0, 1.0]).unwrap(), "High");
        assert_eq!(model.classify(&[1.0, 2.0]).unwrap(), "Low");
    }

    #[test]
    fn test_multiclass_argmax() {
        let model = LinearClassifier::new(
            vec!["Low".into(), "Medium".into(), "High".into()],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            vec![0.0, 0.0, -10.0],
        )
        .unwrap();
        assert_eq!(model.classify(&[3.0, 1.0]).unwrap(), "Low");
        assert_eq!(model.classify(&[1.0, 3.0]).unwrap(), "Medium");
        assert_eq!(model.classify(&[9.0, 9.0]).unwrap(), "High");
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let err = binary().classify(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(err.to_string().contains("expects 2"));
    }

    #[test]
    fn test_malformed_models_rejected() {
        assert!(LinearClassifier::new(vec!["Only".into()], vec![vec![1.0]], vec![0.0]).is_err());
        assert!(LinearClassifier::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec![vec![1.0]],
            vec![0.0]
        )
        .is_err());
        assert!(
            LinearClassifier::new(vec!["A".into(), "B".into()], vec![vec![1.0]], vec![]).is_err()
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = LinearClassifier::load(Path::new("/nonexistent/clf.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clf.json");
        std::fs::write(
            &path,
            r#"{"classes":["Low","High"],"coef":[[0.5,0.5]],"intercept":[-1.0]}"#,
        )
        .unwrap();
        let model = LinearClassifier::load(&path).unwrap();
        assert_eq!(model.input_dims(), 2);
        assert_eq!(model.labels(), &["Low".to_string(), "High".to_string()]);
    }

    #[test]
    fn test_risk_rank_ordering() {
        assert!(risk_rank("High") > risk_rank("medium"));
        assert!(risk_rank("MEDIUM") > risk_rank("Low"));
        assert!(risk_rank("low") > risk_rank("unknown"));
    }

    #[test]
    fn test_overall_risk_is_ordinal() {
        // Lexicographic max would pick "Low".
        let clauses = vec![clause(1, "Low"), clause(2, "High"), clause(3, "Low")];
        assert_eq!(overall_risk(&clauses).as_deref(), Some("High"));

        let clauses = vec![clause(1, "low"), clause(2, "Medium")];
        assert_eq!(overall_risk(&clauses).as_deref(), Some("Medium"));

        assert_eq!(overall_risk(&[]), None);
    }

    #[test]
    fn test_overall_risk_tie_keeps_first() {
        let clauses = vec![clause(1, "HIGH"), clause(2, "High")];
        assert_eq!(overall_risk(&clauses).as_deref(), Some("HIGH"));
    }

    #[tokio::test]
    async fn test_predict_returns_trained_label() {
        let analyzer = RiskAnalyzer::new(Arc::new(LetterEmbedder), Arc::new(binary()));
        let texts = [
            "The employee shall be entitled to any benefit.",
            "Strict penalty: 10%!",
            "aeiou",
            "x",
        ];
        for text in texts {
            let label = analyzer.predict(text).await.unwrap();
            assert!(analyzer.labels().contains(&label), "{} not a label", label);
        }
    }

    #[tokio::test]
    async fn test_analyze_clauses_numbers_from_one() {
        let analyzer = RiskAnalyzer::new(Arc::new(LetterEmbedder), Arc::new(binary()));
        let clauses = analyzer
            .analyze_clauses("1. You owe us. 2. We indemnify you.")
            .await
            .unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].clause_number, 1);
        assert_eq!(clauses[1].text, "2. We indemnify you.");
    }
}

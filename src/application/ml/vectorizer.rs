//! TF-IDF text vectorizer.
//!
//! Turns article text into fixed-length, L2-normalized term weight vectors.
//! The fitted state (vocabulary + idf weights) serializes with ordered maps
//! only, so the same fit always produces the same bytes.

use crate::domain::errors::{PipelineError, PipelineResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("static token pattern compiles"));

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "almost", "alone", "along",
    "already", "also", "although", "always", "am", "among", "an", "and", "another", "any",
    "anyhow", "anyone", "anything", "anyway", "are", "around", "as", "at", "be", "became",
    "because", "become", "been", "before", "being", "below", "beside", "besides", "between",
    "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "doing", "done", "down",
    "during", "each", "either", "else", "enough", "etc", "even", "ever", "every", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "however", "if", "in", "into", "is", "it", "its", "itself",
    "just", "least", "less", "many", "may", "me", "might", "mine", "more", "most", "much",
    "must", "my", "myself", "neither", "never", "nevertheless", "no", "nor", "not", "nothing",
    "now", "of", "off", "often", "on", "once", "one", "only", "onto", "or", "other", "others",
    "otherwise", "our", "ours", "ourselves", "out", "over", "own", "per", "perhaps", "rather",
    "same", "see", "seem", "seemed", "seems", "several", "she", "should", "since", "so", "some",
    "somehow", "someone", "something", "sometimes", "still", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "therefore", "these", "they",
    "this", "those", "though", "through", "thus", "to", "together", "too", "toward", "towards",
    "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were", "what",
    "whatever", "when", "whenever", "where", "whether", "which", "while", "who", "whoever",
    "whole", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet", "you",
    "your", "yours", "yourself", "yourselves",
];

/// Stop-word filter applied before vocabulary selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopWords {
    #[default]
    None,
    English,
    Custom(BTreeSet<String>),
}

impl StopWords {
    fn resolve(&self) -> BTreeSet<String> {
        match self {
            StopWords::None => BTreeSet::new(),
            StopWords::English => ENGLISH_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
            StopWords::Custom(words) => words.iter().map(|w| w.to_lowercase()).collect(),
        }
    }
}

/// Options recognized when fitting a new transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorizerConfig {
    pub max_features: usize,
    #[serde(default)]
    pub stop_words: StopWords,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: 500,
            stop_words: StopWords::English,
        }
    }
}

/// Fitted TF-IDF transform.
///
/// Deserialization rejects inconsistent state, so a stored transform either
/// loads whole or fails to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TfidfState")]
pub struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    stop_words: BTreeSet<String>,
    max_features: usize,
}

/// Unchecked serialized layout of [`TfidfVectorizer`].
#[derive(Deserialize)]
struct TfidfState {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    stop_words: BTreeSet<String>,
    max_features: usize,
}

impl TryFrom<TfidfState> for TfidfVectorizer {
    type Error = String;

    fn try_from(state: TfidfState) -> Result<Self, Self::Error> {
        let vectorizer = Self {
            vocabulary: state.vocabulary,
            idf: state.idf,
            stop_words: state.stop_words,
            max_features: state.max_features,
        };
        vectorizer.check()?;
        Ok(vectorizer)
    }
}

impl TfidfVectorizer {
    /// Fits vocabulary and idf weights on `corpus`.
    ///
    /// Keeps the `max_features` most frequent terms (ties broken
    /// alphabetically) and indexes them alphabetically.
    pub fn fit<S: AsRef<str>>(corpus: &[S], config: &VectorizerConfig) -> PipelineResult<Self> {
        if corpus.is_empty() {
            return Err(PipelineError::DataIntegrity(
                "cannot fit vectorizer on an empty corpus".to_string(),
            ));
        }
        if config.max_features == 0 {
            return Err(PipelineError::DataIntegrity(
                "max_features must be positive".to_string(),
            ));
        }

        let stop_words = config.stop_words.resolve();
        let mut term_counts: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in corpus {
            let tokens = tokenize(doc.as_ref(), &stop_words);
            let mut seen = BTreeSet::new();
            for token in tokens {
                *term_counts.entry(token.clone()).or_insert(0) += 1;
                if seen.insert(token.clone()) {
                    *doc_freq.entry(token).or_insert(0) += 1;
                }
            }
        }

        if term_counts.is_empty() {
            return Err(PipelineError::DataIntegrity(
                "empty vocabulary; corpus contains only stop words or no tokens".to_string(),
            ));
        }

        let mut ranked: Vec<(String, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(config.max_features);

        let selected: BTreeSet<String> = ranked.into_iter().map(|(term, _)| term).collect();
        let n_docs = corpus.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(selected.len());
        for (index, term) in selected.into_iter().enumerate() {
            let df = doc_freq.get(&term).copied().unwrap_or(0) as f64;
            idf.push(((1.0 + n_docs) / (1.0 + df)).ln() + 1.0);
            vocabulary.insert(term, index);
        }

        Ok(Self {
            vocabulary,
            idf,
            stop_words,
            max_features: config.max_features,
        })
    }

    /// Internal consistency: one idf weight per term, term indices exactly
    /// `0..len` and every weight finite.
    fn check(&self) -> Result<(), String> {
        if self.idf.len() != self.vocabulary.len() {
            return Err(format!(
                "{} idf weights for {} vocabulary terms",
                self.idf.len(),
                self.vocabulary.len()
            ));
        }
        let mut indices: Vec<usize> = self.vocabulary.values().copied().collect();
        indices.sort_unstable();
        if indices.iter().enumerate().any(|(expected, &index)| expected != index) {
            return Err("vocabulary indices are not a permutation of 0..len".to_string());
        }
        if let Some(bad) = self.idf.iter().find(|w| !w.is_finite()) {
            return Err(format!("non-finite idf weight {}", bad));
        }
        Ok(())
    }

    /// Weight vector for one text. Texts without known terms map to the
    /// zero vector.
    pub fn transform(&self, text: &str) -> Vec<f64> {
        let mut row = vec![0.0; self.vocabulary.len()];
        for token in tokenize(text, &self.stop_words) {
            if let Some(slot) = self.vocabulary.get(&token).and_then(|&index| row.get_mut(index)) {
                *slot += 1.0;
            }
        }
        for (value, idf) in row.iter_mut().zip(&self.idf) {
            *value *= idf;
        }
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.iter_mut().for_each(|v| *v /= norm);
        }
        row
    }

    pub fn transform_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Vec<f64>> {
        texts.iter().map(|t| self.transform(t.as_ref())).collect()
    }

    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        &self.vocabulary
    }

    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }
}

fn tokenize(text: &str, stop_words: &BTreeSet<String>) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|t| !stop_words.contains(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<&'static str> {
        vec![
            "Shares surge after strong earnings",
            "Shares plunge on weak guidance",
            "The earnings call was strong and the shares rallied",
        ]
    }

    #[test]
    fn test_fit_is_deterministic() {
        let config = VectorizerConfig::default();
        let a = TfidfVectorizer::fit(&corpus(), &config).unwrap();
        let b = TfidfVectorizer::fit(&corpus(), &config).unwrap();

        assert_eq!(a.vocabulary(), b.vocabulary());
        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
    }

    #[test]
    fn test_stop_words_and_short_tokens_excluded() {
        let config = VectorizerConfig {
            max_features: 100,
            stop_words: StopWords::English,
        };
        let vectorizer = TfidfVectorizer::fit(&["The X rallied and the shares rose"], &config).unwrap();

        let vocab: Vec<&str> = vectorizer.vocabulary().keys().map(String::as_str).collect();
        assert_eq!(vocab, vec!["rallied", "rose", "shares"]);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let config = VectorizerConfig {
            max_features: 2,
            stop_words: StopWords::None,
        };
        let vectorizer = TfidfVectorizer::fit(&corpus(), &config).unwrap();

        let vocab: Vec<&str> = vectorizer.vocabulary().keys().map(String::as_str).collect();
        assert_eq!(vocab, vec!["earnings", "shares"]);
        assert_eq!(vectorizer.n_features(), 2);
    }

    #[test]
    fn test_rows_are_l2_normalized() {
        let vectorizer = TfidfVectorizer::fit(&corpus(), &VectorizerConfig::default()).unwrap();
        let row = vectorizer.transform("strong earnings strong shares");

        let norm: f64 = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        assert!(vectorizer.transform("zzz unknown").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_inconsistent_state_fails_to_parse() {
        let out_of_range = r#"{"vocabulary":{"profit":5},"idf":[1.0],"stop_words":[],"max_features":10}"#;
        assert!(serde_json::from_str::<TfidfVectorizer>(out_of_range).is_err());

        let short_idf = r#"{"vocabulary":{"loss":0,"profit":1},"idf":[1.0],"stop_words":[],"max_features":10}"#;
        assert!(serde_json::from_str::<TfidfVectorizer>(short_idf).is_err());

        let repeated = r#"{"vocabulary":{"loss":1,"profit":1},"idf":[1.0,1.0],"stop_words":[],"max_features":10}"#;
        assert!(serde_json::from_str::<TfidfVectorizer>(repeated).is_err());
    }

    #[test]
    fn test_fitted_state_survives_serialization() {
        let fitted = TfidfVectorizer::fit(&corpus(), &VectorizerConfig::default()).unwrap();
        let bytes = serde_json::to_vec(&fitted).unwrap();
        let restored: TfidfVectorizer = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(restored, fitted);
        assert_eq!(restored.transform("strong earnings"), fitted.transform("strong earnings"));
    }

    #[test]
    fn test_empty_corpus_is_integrity_error() {
        let empty: Vec<&str> = vec![];
        assert!(matches!(
            TfidfVectorizer::fit(&empty, &VectorizerConfig::default()),
            Err(PipelineError::DataIntegrity(_))
        ));
        assert!(matches!(
            TfidfVectorizer::fit(&["the and of"], &VectorizerConfig::default()),
            Err(PipelineError::DataIntegrity(_))
        ));
    }
}

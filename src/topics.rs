//! Keyword extraction via topic modeling.
//!
//! Defines the [`KeywordExtractor`] collaborator used by the tag cache and a
//! seeded Latent Dirichlet Allocation implementation, [`LdaExtractor`].
//!
//! Each document is labelled with the top terms of its dominant topic, so
//! documents sharing a topic share a phrase. Training uses collapsed Gibbs
//! sampling with a fixed seed: the same input always yields the same phrases.

use anyhow::{Context, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::config::TopicsConfig;

/// Derives one keyword phrase per input text.
///
/// Implementations must return exactly one phrase per text, in input order.
/// Extraction is CPU-bound and synchronous; callers own any parallelism.
pub trait KeywordExtractor: Send + Sync {
    fn extract_keywords(&self, texts: &[String]) -> Result<Vec<String>>;
}

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "don", "down", "during", "each",
    "even", "few", "for", "from", "further", "get", "got", "had", "has", "have", "having", "he",
    "her", "here", "hers", "herself", "him", "himself", "his", "how", "if", "in", "into", "is",
    "it", "its", "itself", "just", "let", "like", "ll", "me", "more", "most", "much", "my",
    "myself", "new", "no", "nor", "not", "now", "of", "off", "on", "once", "one", "only", "or",
    "other", "our", "ours", "ourselves", "out", "over", "own", "re", "really", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "us", "ve", "very", "via", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    "yours", "yourself", "yourselves",
    // platform noise
    "amp", "co", "http", "https", "rt", "www",
];

/// Lowercasing tokenizer with stopword removal and optional bigrams.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stopwords: HashSet<String>,
    bigrams: bool,
    url: Regex,
    word: Regex,
}

impl Tokenizer {
    pub fn new(extra_stopwords: impl IntoIterator<Item = String>, bigrams: bool) -> Self {
        let mut stopwords: HashSet<String> =
            ENGLISH_STOPWORDS.iter().map(|s| s.to_string()).collect();
        stopwords.extend(
            extra_stopwords
                .into_iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty()),
        );

        Self {
            stopwords,
            bigrams,
            url: Regex::new(r"https?://\S+").expect("static url pattern"),
            word: Regex::new(r"[a-z][a-z0-9_]+").expect("static word pattern"),
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let without_urls = self.url.replace_all(&lowered, " ");

        let unigrams: Vec<&str> = self
            .word
            .find_iter(&without_urls)
            .map(|m| m.as_str())
            .filter(|w| !self.stopwords.contains(*w))
            .collect();

        let mut tokens: Vec<String> = unigrams.iter().map(|w| w.to_string()).collect();
        if self.bigrams {
            tokens.extend(unigrams.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
        }
        tokens
    }
}

/// Seeded LDA keyword extractor.
#[derive(Debug, Clone)]
pub struct LdaExtractor {
    tokenizer: Tokenizer,
    num_topics: usize,
    iterations: usize,
    alpha: f64,
    beta: f64,
    seed: u64,
    words_per_topic: usize,
}

impl LdaExtractor {
    pub fn from_config(config: &TopicsConfig) -> Result<Self> {
        let extra = match &config.stopwords_file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read stopwords file: {}", path.display()))?
                .lines()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            tokenizer: Tokenizer::new(extra, config.bigrams),
            num_topics: config.num_topics.max(1),
            iterations: config.iterations,
            alpha: config.alpha,
            beta: config.beta,
            seed: config.seed,
            words_per_topic: config.words_per_topic.max(1),
        })
    }
}

impl KeywordExtractor for LdaExtractor {
    fn extract_keywords(&self, texts: &[String]) -> Result<Vec<String>> {
        let tokenized: Vec<Vec<String>> = texts.iter().map(|t| self.tokenizer.tokenize(t)).collect();

        let mut lda = Lda::new(self.num_topics, self.alpha, self.beta, &tokenized, self.seed);
        lda.train(self.iterations);

        let topic_words: Vec<String> = lda
            .top_words(self.words_per_topic)
            .into_iter()
            .map(|words| words.join(" "))
            .collect();

        let phrases = (0..tokenized.len())
            .map(|d| match lda.dominant_topic(d) {
                Some(topic) => topic_words[topic].clone(),
                None => String::new(),
            })
            .collect();

        Ok(phrases)
    }
}

/// Collapsed Gibbs sampler state.
struct Lda {
    k: usize,
    alpha: f64,
    beta: f64,
    vocab: Vec<String>,
    docs: Vec<Vec<usize>>,
    z: Vec<Vec<usize>>,
    ndk: Vec<Vec<usize>>,
    nkw: Vec<Vec<usize>>,
    nk: Vec<usize>,
    rng: StdRng,
}

impl Lda {
    fn new(k: usize, alpha: f64, beta: f64, tokenized: &[Vec<String>], seed: u64) -> Self {
        let mut word_to_id: HashMap<&str, usize> = HashMap::new();
        let mut vocab: Vec<String> = Vec::new();
        let docs: Vec<Vec<usize>> = tokenized
            .iter()
            .map(|doc| {
                doc.iter()
                    .map(|w| {
                        *word_to_id.entry(w.as_str()).or_insert_with(|| {
                            vocab.push(w.clone());
                            vocab.len() - 1
                        })
                    })
                    .collect()
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(seed);
        let mut ndk = vec![vec![0usize; k]; docs.len()];
        let mut nkw = vec![vec![0usize; vocab.len()]; k];
        let mut nk = vec![0usize; k];
        let mut z = Vec::with_capacity(docs.len());

        for (d, doc) in docs.iter().enumerate() {
            let mut assignments = Vec::with_capacity(doc.len());
            for &w in doc {
                let topic = rng.gen_range(0..k);
                assignments.push(topic);
                ndk[d][topic] += 1;
                nkw[topic][w] += 1;
                nk[topic] += 1;
            }
            z.push(assignments);
        }

        Self {
            k,
            alpha,
            beta,
            vocab,
            docs,
            z,
            ndk,
            nkw,
            nk,
            rng,
        }
    }

    fn train(&mut self, iterations: usize) {
        let vb = self.vocab.len() as f64 * self.beta;
        let mut weights = vec![0.0f64; self.k];

        for it in 0..iterations {
            for d in 0..self.docs.len() {
                for p in 0..self.docs[d].len() {
                    let w = self.docs[d][p];
                    let old = self.z[d][p];

                    self.ndk[d][old] -= 1;
                    self.nkw[old][w] -= 1;
                    self.nk[old] -= 1;

                    // p(t) ∝ (ndk + α) · (nkw + β) / (nk + Vβ)
                    for (t, weight) in weights.iter_mut().enumerate() {
                        let left = self.ndk[d][t] as f64 + self.alpha;
                        let right = (self.nkw[t][w] as f64 + self.beta) / (self.nk[t] as f64 + vb);
                        *weight = left * right;
                    }

                    let new = match WeightedIndex::new(&weights) {
                        Ok(dist) => dist.sample(&mut self.rng),
                        Err(_) => self.rng.gen_range(0..self.k),
                    };

                    self.z[d][p] = new;
                    self.ndk[d][new] += 1;
                    self.nkw[new][w] += 1;
                    self.nk[new] += 1;
                }
            }

            if (it + 1) % 50 == 0 {
                tracing::debug!(iteration = it + 1, total = iterations, "training topic model");
            }
        }
    }

    /// Topic with the highest θ for document `d`; ties go to the lowest id.
    /// `None` for documents without tokens.
    fn dominant_topic(&self, d: usize) -> Option<usize> {
        if self.docs[d].is_empty() {
            return None;
        }
        let counts = &self.ndk[d];
        (0..self.k).fold(None, |best: Option<usize>, t| match best {
            Some(b) if counts[b] >= counts[t] => Some(b),
            _ => Some(t),
        })
    }

    /// Top `n` words per topic by φ. Ties keep vocabulary (first-seen) order.
    fn top_words(&self, n: usize) -> Vec<Vec<String>> {
        let vb = self.vocab.len() as f64 * self.beta;
        (0..self.k)
            .map(|t| {
                let denom = self.nk[t] as f64 + vb;
                let mut scored: Vec<(usize, f64)> = (0..self.vocab.len())
                    .map(|w| (w, (self.nkw[t][w] as f64 + self.beta) / denom))
                    .collect();
                scored.sort_by(|a, b| b.1.total_cmp(&a.1));
                scored
                    .into_iter()
                    .take(n)
                    .map(|(w, _)| self.vocab[w].clone())
                    .collect()
            })
            .collect()
    }
}

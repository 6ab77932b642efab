use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::Regex;
use tracing::info;

use crate::db::VacancyRecord;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

const MAX_FEATURES: usize = 1000;
const TEST_FRACTION: f64 = 0.2;
const SPLIT_SEED: u64 = 42;

/// Binary text classifier trained on (text, label) pairs.
pub trait TextClassifier {
    fn fit(&mut self, samples: &[(&str, u8)]);
    fn predict(&self, text: &str) -> u8;
}

/// Lower-cased unigram + bigram counts over the most frequent terms.
#[derive(Debug, Default, Clone)]
pub struct CountVectorizer {
    vocabulary: HashMap<String, usize>,
}

impl CountVectorizer {
    fn terms(text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = TOKEN_RE.find_iter(&lower).map(|m| m.as_str()).collect();
        let mut terms: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        terms.extend(tokens.windows(2).map(|w| format!("{} {}", w[0], w[1])));
        terms
    }

    pub fn fit<'a>(&mut self, texts: impl IntoIterator<Item = &'a str>) {
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for term in Self::terms(text) {
                *freq.entry(term).or_default() += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(MAX_FEATURES);

        let kept: BTreeSet<String> = ranked.into_iter().map(|(t, _)| t).collect();
        self.vocabulary = kept.into_iter().enumerate().map(|(i, t)| (t, i)).collect();
    }

    /// Sparse counts: feature index → occurrences.
    pub fn transform(&self, text: &str) -> HashMap<usize, f64> {
        let mut counts = HashMap::new();
        for term in Self::terms(text) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        counts
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }
}

/// Multinomial Naive Bayes with additive smoothing.
#[derive(Debug, Clone)]
pub struct NaiveBayes {
    alpha: f64,
    vectorizer: CountVectorizer,
    classes: Vec<u8>,
    log_prior: Vec<f64>,
    /// [class][feature]
    log_likelihood: Vec<Vec<f64>>,
}

impl Default for NaiveBayes {
    fn default() -> Self {
        NaiveBayes {
            alpha: 1.0,
            vectorizer: CountVectorizer::default(),
            classes: Vec::new(),
            log_prior: Vec::new(),
            log_likelihood: Vec::new(),
        }
    }
}

impl TextClassifier for NaiveBayes {
    fn fit(&mut self, samples: &[(&str, u8)]) {
        self.vectorizer.fit(samples.iter().map(|(t, _)| *t));
        let n_features = self.vectorizer.vocabulary_size();

        self.classes = samples
            .iter()
            .map(|(_, l)| *l)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut doc_count = vec![0usize; self.classes.len()];
        let mut feature_count = vec![vec![0.0f64; n_features]; self.classes.len()];
        for (text, label) in samples {
            let Some(ci) = self.classes.iter().position(|c| c == label) else {
                continue;
            };
            doc_count[ci] += 1;
            for (idx, n) in self.vectorizer.transform(text) {
                feature_count[ci][idx] += n;
            }
        }

        let total = samples.len() as f64;
        self.log_prior = doc_count.iter().map(|&n| (n as f64 / total).ln()).collect();
        self.log_likelihood = feature_count
            .iter()
            .map(|counts| {
                let denom = counts.iter().sum::<f64>() + self.alpha * n_features as f64;
                counts.iter().map(|&c| ((c + self.alpha) / denom).ln()).collect()
            })
            .collect();
    }

    fn predict(&self, text: &str) -> u8 {
        let x = self.vectorizer.transform(text);
        self.classes
            .iter()
            .enumerate()
            .map(|(ci, &class)| {
                let score = self.log_prior[ci]
                    + x.iter()
                        .map(|(&idx, &n)| n * self.log_likelihood[ci][idx])
                        .sum::<f64>();
                (class, score)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(class, _)| class)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: (f64, f64, f64),
    pub weighted_avg: (f64, f64, f64),
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    pub fn compute(truth: &[u8], predicted: &[u8]) -> Self {
        let labels: BTreeSet<u8> = truth.iter().chain(predicted).copied().collect();
        let pairs: Vec<(u8, u8)> = truth.iter().copied().zip(predicted.iter().copied()).collect();

        let classes: Vec<ClassMetrics> = labels
            .into_iter()
            .map(|label| {
                let tp = pairs.iter().filter(|(t, p)| *t == label && *p == label).count();
                let predicted_n = pairs.iter().filter(|(_, p)| *p == label).count();
                let support = pairs.iter().filter(|(t, _)| *t == label).count();
                let precision = ratio(tp, predicted_n);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let support = pairs.len();
        let correct = pairs.iter().filter(|(t, p)| t == p).count();
        let n = classes.len().max(1) as f64;
        let macro_avg = (
            classes.iter().map(|c| c.precision).sum::<f64>() / n,
            classes.iter().map(|c| c.recall).sum::<f64>() / n,
            classes.iter().map(|c| c.f1).sum::<f64>() / n,
        );
        let weight = |f: fn(&ClassMetrics) -> f64| {
            if support == 0 {
                0.0
            } else {
                classes.iter().map(|c| f(c) * c.support as f64).sum::<f64>() / support as f64
            }
        };
        let weighted_avg = (weight(|c| c.precision), weight(|c| c.recall), weight(|c| c.f1));

        ClassificationReport {
            accuracy: ratio(correct, support),
            classes,
            macro_avg,
            weighted_avg,
            support,
        }
    }

    pub fn print(&self) {
        println!("{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support");
        println!();
        for c in &self.classes {
            println!(
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            );
        }
        println!();
        println!("{:>14} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, self.support);
        let (p, r, f) = self.macro_avg;
        println!("{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}", "macro avg", p, r, f, self.support);
        let (p, r, f) = self.weighted_avg;
        println!("{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}", "weighted avg", p, r, f, self.support);
    }
}

/// Train on descriptions labelled by whether a position was found and
/// evaluate on a held-out fifth. Returns `None` below `min_rows`.
pub fn train_text_classifier<C: TextClassifier>(
    classifier: &mut C,
    vacancies: &[VacancyRecord],
    min_rows: usize,
) -> Option<ClassificationReport> {
    if vacancies.len() < min_rows {
        info!("Not enough data to train the model ({} < {})", vacancies.len(), min_rows);
        return None;
    }

    let mut samples: Vec<(&str, u8)> = vacancies
        .iter()
        .filter_map(|v| {
            let text = v.description.as_deref()?;
            Some((text, u8::from(v.position.is_some())))
        })
        .collect();
    if samples.len() < 2 {
        info!("Not enough described vacancies to train the model");
        return None;
    }

    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    samples.shuffle(&mut rng);
    let n_test = ((samples.len() as f64 * TEST_FRACTION).ceil() as usize).clamp(1, samples.len() - 1);
    let (test, train) = samples.split_at(n_test);

    classifier.fit(train);
    let truth: Vec<u8> = test.iter().map(|(_, l)| *l).collect();
    let predicted: Vec<u8> = test.iter().map(|(t, _)| classifier.predict(t)).collect();

    let report = ClassificationReport::compute(&truth, &predicted);
    info!(
        "Classifier trained on {} rows, evaluated on {} (accuracy {:.2})",
        train.len(),
        test.len(),
        report.accuracy
    );
    Some(report)
}

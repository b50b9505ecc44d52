use crate::text::TextPreprocessor;
use crate::types::{AnalyzerError, Result};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// What the engine found for a new document against a candidate window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimilarityOutcome {
    /// Window empty, or no candidate yielded usable text.
    NoCandidates,
    /// The new document itself cleaned down to nothing.
    NoUsableText,
    /// Best-matching candidate by cosine similarity; `index` points into the
    /// caller's candidate slice.
    Best { index: usize, score: f64 },
}

/// Lexical similarity over a TF-IDF vector space of unigrams and bigrams,
/// capped to a fixed vocabulary size. Owns its preprocessing service; no
/// global state.
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    preprocessor: TextPreprocessor,
    max_vocabulary: usize,
}

impl SimilarityEngine {
    pub fn new(preprocessor: TextPreprocessor, max_vocabulary: usize) -> Self {
        Self {
            preprocessor,
            max_vocabulary,
        }
    }

    /// Score `target` against every candidate and return the best match.
    /// Ties break toward the earliest candidate in the window. A degenerate
    /// corpus surfaces as an explicit error, never a guessed score.
    pub fn score(&self, target: &str, candidates: &[String]) -> Result<SimilarityOutcome> {
        if candidates.is_empty() {
            return Ok(SimilarityOutcome::NoCandidates);
        }

        let target_clean = self.preprocessor.clean(target);
        if target_clean.is_empty() {
            return Ok(SimilarityOutcome::NoUsableText);
        }

        let usable: Vec<(usize, String)> = candidates
            .iter()
            .enumerate()
            .filter_map(|(i, text)| {
                let cleaned = self.preprocessor.clean(text);
                (!cleaned.is_empty()).then_some((i, cleaned))
            })
            .collect();
        if usable.is_empty() {
            debug!("No candidate yielded usable text after preprocessing");
            return Ok(SimilarityOutcome::NoCandidates);
        }

        let mut docs: Vec<Vec<String>> = Vec::with_capacity(usable.len() + 1);
        docs.push(ngram_terms(&target_clean));
        docs.extend(usable.iter().map(|(_, cleaned)| ngram_terms(cleaned)));

        let vectors = vectorize(&docs, self.max_vocabulary)?;

        let mut best: Option<(usize, f64)> = None;
        for (slot, (orig_index, _)) in usable.iter().enumerate() {
            let score = cosine(&vectors[0], &vectors[slot + 1]).min(1.0);
            // Strictly-greater keeps the first-seen winner on ties.
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((*orig_index, score));
            }
        }

        let (index, score) = best.ok_or_else(|| {
            AnalyzerError::Similarity("no candidate could be scored".into())
        })?;
        Ok(SimilarityOutcome::Best { index, score })
    }
}

/// Unigrams plus adjacent bigrams of a cleaned document.
fn ngram_terms(cleaned: &str) -> Vec<String> {
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let mut terms = Vec::with_capacity(tokens.len() * 2);
    terms.extend(tokens.iter().map(|t| t.to_string()));
    terms.extend(tokens.windows(2).map(|w| format!("{} {}", w[0], w[1])));
    terms
}

/// TF-IDF with smoothed IDF and l2-normalized rows, so cosine scores stay
/// in [0, 1].
fn vectorize(docs: &[Vec<String>], max_vocabulary: usize) -> Result<Vec<HashMap<usize, f64>>> {
    // Corpus-wide document frequency and total count per term.
    let mut df: HashMap<&str, usize> = HashMap::new();
    let mut total: HashMap<&str, usize> = HashMap::new();
    for doc in docs {
        let mut seen: HashSet<&str> = HashSet::new();
        for term in doc {
            *total.entry(term).or_insert(0) += 1;
            if seen.insert(term) {
                *df.entry(term).or_insert(0) += 1;
            }
        }
    }
    if total.is_empty() {
        return Err(AnalyzerError::Similarity("empty vocabulary".into()));
    }

    // Cap the vocabulary to the most frequent terms, ties broken
    // alphabetically so the space is deterministic.
    let mut terms: Vec<&str> = total.keys().copied().collect();
    terms.sort_unstable_by(|a, b| total[b].cmp(&total[a]).then_with(|| a.cmp(b)));
    terms.truncate(max_vocabulary);
    let vocab: HashMap<&str, usize> = terms
        .iter()
        .enumerate()
        .map(|(idx, term)| (*term, idx))
        .collect();

    let n_docs = docs.len() as f64;
    let idf: Vec<f64> = terms
        .iter()
        .map(|term| ((1.0 + n_docs) / (1.0 + df[term] as f64)).ln() + 1.0)
        .collect();

    let mut vectors = Vec::with_capacity(docs.len());
    for doc in docs {
        let mut tf: HashMap<usize, f64> = HashMap::new();
        for term in doc {
            if let Some(&idx) = vocab.get(term.as_str()) {
                *tf.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        for (idx, weight) in tf.iter_mut() {
            *weight *= idf[*idx];
        }
        let norm = tf.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for weight in tf.values_mut() {
                *weight /= norm;
            }
        }
        vectors.push(tf);
    }
    Ok(vectors)
}

fn cosine(a: &HashMap<usize, f64>, b: &HashMap<usize, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(idx, wa)| large.get(idx).map(|wb| wa * wb))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SimilarityEngine {
        SimilarityEngine::new(TextPreprocessor::new(), 1000)
    }

    #[test]
    fn empty_window_reports_no_candidates() {
        let out = engine().score("central bank raises rates", &[]).unwrap();
        assert_eq!(out, SimilarityOutcome::NoCandidates);
    }

    #[test]
    fn stopword_only_target_reports_no_usable_text() {
        let out = engine()
            .score("the of and", &["central bank raises rates".to_string()])
            .unwrap();
        assert_eq!(out, SimilarityOutcome::NoUsableText);
    }

    #[test]
    fn unusable_candidates_report_no_candidates() {
        let out = engine()
            .score(
                "central bank raises rates",
                &["of the".to_string(), "an".to_string()],
            )
            .unwrap();
        assert_eq!(out, SimilarityOutcome::NoCandidates);
    }

    #[test]
    fn identical_documents_score_one() {
        let text = "دولت بودجه سال آینده تقدیم مجلس";
        let out = engine().score(text, &[text.to_string()]).unwrap();
        match out {
            SimilarityOutcome::Best { index, score } => {
                assert_eq!(index, 0);
                assert!((score - 1.0).abs() < 1e-9, "score {score}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn disjoint_documents_score_zero() {
        let out = engine()
            .score(
                "central bank raises interest rates",
                &["football championship final results".to_string()],
            )
            .unwrap();
        match out {
            SimilarityOutcome::Best { score, .. } => {
                assert!(score.abs() < 1e-9, "score {score}")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn picks_the_most_similar_candidate() {
        let out = engine()
            .score(
                "central bank raises interest rates amid inflation concerns",
                &[
                    "football championship final results tonight".to_string(),
                    "central bank raises interest rates amid inflation worries".to_string(),
                ],
            )
            .unwrap();
        match out {
            SimilarityOutcome::Best { index, score } => {
                assert_eq!(index, 1);
                assert!(score > 0.5, "score {score}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn ties_break_toward_the_earliest_candidate() {
        let text = "parliament approves national budget bill";
        let out = engine()
            .score(text, &[text.to_string(), text.to_string()])
            .unwrap();
        match out {
            SimilarityOutcome::Best { index, .. } => assert_eq!(index, 0),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn unusable_candidates_keep_original_indices() {
        let out = engine()
            .score(
                "central bank raises interest rates",
                &[
                    "of the".to_string(),
                    "central bank raises interest rates".to_string(),
                ],
            )
            .unwrap();
        match out {
            SimilarityOutcome::Best { index, score } => {
                assert_eq!(index, 1);
                assert!((score - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let out = engine()
            .score(
                "tehran stock exchange index climbs again today",
                &["tehran stock exchange index fell sharply yesterday".to_string()],
            )
            .unwrap();
        match out {
            SimilarityOutcome::Best { score, .. } => {
                assert!((0.0..=1.0).contains(&score), "score {score}")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}

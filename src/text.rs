use std::collections::HashSet;

/// Persian stopwords, the high-frequency function words filtered out before
/// vectorization.
const PERSIAN_STOPWORDS: &[&str] = &[
    "و", "در", "به", "از", "که", "این", "را", "با", "است", "برای", "آن", "یک",
    "خود", "تا", "کرد", "بر", "هم", "نیز", "گفت", "شد", "دارد", "اما", "یا",
    "شده", "باید", "هر", "آنها", "بود", "او", "دیگر", "دو", "مورد", "کند",
    "شود", "های", "هایی", "کرده", "اند", "ها", "بین", "پیش", "پس", "اگر",
    "همه", "ما", "هیچ", "وی", "بعد", "چه", "وقتی", "روی", "داد", "البته",
    "نمی", "بی", "می", "چند", "توسط", "علیه", "یعنی", "امروز", "براساس",
];

/// English stopwords, enough to keep mixed-script headlines clean.
const ENGLISH_STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "to", "in", "on", "for", "with",
    "is", "are", "was", "were", "be", "been", "by", "at", "as", "it", "its",
    "this", "that", "from", "but", "not", "has", "have", "had", "will",
    "would", "about", "into", "over", "after", "before", "than", "their",
    "they", "them", "his", "her", "she", "him", "who", "what", "which",
];

/// Map Persian (U+06F0..U+06F9) and Arabic-Indic (U+0660..U+0669) digits to
/// their ASCII equivalents, leaving everything else untouched.
pub(crate) fn fold_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{06F0}'..='\u{06F9}' => {
                char::from(b'0' + (c as u32 - 0x06F0) as u8)
            }
            '\u{0660}'..='\u{0669}' => {
                char::from(b'0' + (c as u32 - 0x0660) as u8)
            }
            _ => c,
        })
        .collect()
}

/// Stateless text-preprocessing service. Constructed explicitly and passed
/// to the similarity engine; there is no process-wide instance.
#[derive(Debug, Clone)]
pub struct TextPreprocessor {
    stopwords: HashSet<String>,
}

impl TextPreprocessor {
    pub fn new() -> Self {
        let stopwords = PERSIAN_STOPWORDS
            .iter()
            .chain(ENGLISH_STOPWORDS.iter())
            .map(|s| s.to_string())
            .collect();
        Self { stopwords }
    }

    /// Replace the built-in stopword list, e.g. for a corpus in another
    /// language.
    pub fn with_stopwords<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stopwords: words.into_iter().map(Into::into).collect(),
        }
    }

    /// Normalize script and digits, tokenize, drop stopwords and tokens of
    /// length <= 2, and rejoin. An empty result means the input had no
    /// usable text.
    pub fn clean(&self, text: &str) -> String {
        let normalized = normalize_chars(&fold_digits(text));
        normalized
            .split_whitespace()
            .filter(|token| token.chars().count() > 2)
            .filter(|token| !self.stopwords.contains(*token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for TextPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Unify Arabic variants with their Persian forms, strip diacritics and
/// tatweel, and turn punctuation into token boundaries.
fn normalize_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        match c {
            // Arabic -> Persian letter unification.
            '\u{064A}' => out.push('\u{06CC}'), // ي -> ی
            '\u{0643}' => out.push('\u{06A9}'), // ك -> ک
            '\u{0629}' => out.push('\u{0647}'), // ة -> ه
            '\u{0623}' | '\u{0625}' | '\u{0622}' => out.push('\u{0627}'), // أ إ آ -> ا
            '\u{0624}' => out.push('\u{0648}'), // ؤ -> و
            // Harakat and tatweel carry no lexical content.
            '\u{064B}'..='\u{0652}' | '\u{0640}' => {}
            // Zero-width non-joiner glues Persian morphemes together.
            '\u{200C}' => {}
            // Persian and ASCII punctuation become boundaries.
            '\u{060C}' | '\u{061B}' | '\u{061F}' | '«' | '»' => out.push(' '),
            c if c.is_ascii_punctuation() => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_persian_and_arabic_digits() {
        assert_eq!(fold_digits("۱۲۳"), "123");
        assert_eq!(fold_digits("٤٥"), "45");
        assert_eq!(fold_digits("12x"), "12x");
    }

    #[test]
    fn drops_stopwords_and_short_tokens_persian() {
        let pre = TextPreprocessor::new();
        let cleaned = pre.clean("دولت جدید برای اقتصاد برنامه دارد");
        assert!(cleaned.contains("دولت"));
        assert!(cleaned.contains("اقتصاد"));
        assert!(!cleaned.contains("برای"));
        assert!(!cleaned.contains("دارد"));
    }

    #[test]
    fn drops_stopwords_and_short_tokens_english() {
        let pre = TextPreprocessor::new();
        let cleaned = pre.clean("The cat sat on the mat");
        assert_eq!(cleaned, "cat sat mat");
    }

    #[test]
    fn unifies_arabic_script_variants() {
        let pre = TextPreprocessor::new();
        // Arabic yeh/kaf spellings collapse onto the Persian forms.
        assert_eq!(pre.clean("علي"), pre.clean("علی"));
        assert_eq!(pre.clean("كتاب"), pre.clean("کتاب"));
    }

    #[test]
    fn punctuation_becomes_boundaries() {
        let pre = TextPreprocessor::new();
        assert_eq!(pre.clean("market،report«today»"), "market report today");
    }

    #[test]
    fn empty_and_unusable_input_clean_to_empty() {
        let pre = TextPreprocessor::new();
        assert_eq!(pre.clean(""), "");
        assert_eq!(pre.clean("a of in!"), "");
    }
}

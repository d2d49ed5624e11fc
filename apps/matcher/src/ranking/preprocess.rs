//! Text normalisation for ranking.
//!
//! Pure functions of their input: the same text always yields the same tokens.

use crate::models::cv::CvRecord;

/// Tokens this short carry no signal.
const MIN_TOKEN_CHARS: usize = 3;

/// Common French and English function words. Tokens of two characters or fewer
/// are already dropped by length, so only longer words are listed.
const STOPWORDS: &[&str] = &[
    // French
    "les", "des", "une", "est", "être", "avoir", "que", "qui", "pour", "dans", "son", "sur",
    "avec", "pas", "tout", "plus", "par", "grand", "aux", "ces", "cette", "mais", "leur",
    "leurs", "nous", "vous", "ils", "elle", "elles", "sont", "ont", "été", "comme", "sans",
    "sous", "entre", "chez", "notre", "votre", "nos", "vos", "ses", "mes", "tes", "dont",
    "aussi", "très", "bien", "fait", "faire",
    // English
    "the", "and", "that", "have", "for", "not", "with", "you", "this", "but", "his", "from",
    "they", "say", "her", "she", "will", "one", "all", "would", "there", "their", "what",
    "out", "about", "who", "get", "which", "when", "can", "are", "was", "were", "has", "had",
    "our", "your", "its", "into", "than", "then", "them", "these", "those", "been", "also",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Lowercases, replaces anything outside letters/digits/whitespace with a
/// space, and collapses runs of whitespace.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalises and splits `text`, dropping short tokens and stopwords.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS && !is_stopword(t))
        .map(str::to_string)
        .collect()
}

/// An ordered token sequence: the job description or one candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    tokens: Vec<String>,
}

impl Document {
    pub fn from_text(text: &str) -> Self {
        Self {
            tokens: tokenize(text),
        }
    }

    pub fn from_cv(cv: &CvRecord) -> Self {
        Self::from_text(&cv_text(cv))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Concatenates the ranked CV fields: description, skills, experience,
/// education, name. Blank fields are left out.
pub fn cv_text(cv: &CvRecord) -> String {
    [
        cv.description.as_str(),
        cv.skills.as_str(),
        cv.experience.as_str(),
        cv.education.as_str(),
        cv.name.as_str(),
    ]
    .iter()
    .filter(|f| !f.trim().is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_normalize_strips_punctuation_and_collapses_space() {
        assert_eq!(normalize("  Java/Spring,   REST-API!! "), "java spring rest api");
    }

    #[test]
    fn test_normalize_keeps_diacritics() {
        assert_eq!(normalize("Développeur Sénior"), "développeur sénior");
    }

    #[test]
    fn test_tokenize_drops_short_tokens_and_stopwords() {
        let tokens = tokenize("The developer and an AI expert with Go, pour les équipes");
        assert_eq!(tokens, vec!["developer", "expert", "équipes"]);
    }

    #[test]
    fn test_tokenize_is_repeatable() {
        let text = "Senior Rust engineer, Rust async";
        assert_eq!(tokenize(text), tokenize(text));
        assert_eq!(tokenize(text), vec!["senior", "rust", "engineer", "rust", "async"]);
    }

    #[test]
    fn test_tokenize_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ,,, ").is_empty());
        assert!(Document::from_text("a an it").is_empty());
    }

    #[test]
    fn test_cv_text_skips_blank_fields() {
        let cv = CvRecord {
            user_id: 1,
            job_offer_id: 1,
            cv_path: String::new(),
            name: "Lea".to_string(),
            email: String::new(),
            phone: String::new(),
            description: "Data engineer".to_string(),
            skills: "  ".to_string(),
            experience: String::new(),
            education: "MSc".to_string(),
            extracted_at: NaiveDateTime::default(),
        };
        assert_eq!(cv_text(&cv), "Data engineer | MSc | Lea");
    }
}

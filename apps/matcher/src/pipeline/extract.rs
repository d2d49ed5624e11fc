//! Stage output extraction.
//!
//! Stages 2 and 3 write JSON: an array with one result object per input row
//! (a bare object is accepted too). Each stage has an explicit schema below.
//! Any field that is absent, `null`, or not a usable value degrades to `None`
//! with a warning; the combiner later substitutes its defaults.
//!
//! When the document is not valid JSON at all (truncated file, `NaN` literals)
//! the lenient label scanner in [`scan`] recovers whatever fields it can.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::errors::ExtractError;
use crate::models::score::{JobMatchResult, ScoreResult};

// ────────────────────────────────────────────────────────────────────────────
// Schemas
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::Many(items) => items.into_iter().next(),
            OneOrMany::One(item) => Some(item),
        }
    }
}

/// A score as a stage may write it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
    Other(Value),
}

impl RawScore {
    fn into_score(self, field: &str) -> Result<f64, ExtractError> {
        match self {
            RawScore::Number(n) => Ok(n),
            RawScore::Text(s) => s.trim().parse::<f64>().map_err(|_| ExtractError::NotNumeric {
                field: field.to_string(),
                raw: s,
            }),
            RawScore::Other(v) => Err(ExtractError::NotNumeric {
                field: field.to_string(),
                raw: v.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawText {
    Text(String),
    Other(Value),
}

/// Stage 2: organisation scorer.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrganizationOutput {
    organization_score: Option<RawScore>,
    technical_score: Option<RawScore>,
    composite_score: Option<RawScore>,
    experience_score: Option<RawScore>,
    skills_score: Option<RawScore>,
    education_score: Option<RawScore>,
}

/// Stage 3: job matcher.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobMatchOutput {
    overall_match_score: Option<RawScore>,
    match_level: Option<RawText>,
    job_title: Option<RawText>,
    skills_match: Option<SkillsMatch>,
    experience_match: Option<ExperienceMatch>,
    education_match: Option<EducationMatch>,
    content_relevance: Option<ContentRelevance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SkillsMatch {
    skills_match_score: Option<RawScore>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExperienceMatch {
    experience_match_score: Option<RawScore>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EducationMatch {
    education_match_score: Option<RawScore>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentRelevance {
    content_relevance_score: Option<RawScore>,
}

// ────────────────────────────────────────────────────────────────────────────
// Field degradation
// ────────────────────────────────────────────────────────────────────────────

fn degrade<T>(field: &str, value: Result<Option<T>, ExtractError>) -> Option<T> {
    match value {
        Ok(v) => v,
        Err(e) => {
            warn!("Ignoring stage output field '{field}': {e}");
            None
        }
    }
}

fn score(field: &str, raw: Option<RawScore>) -> Option<f64> {
    degrade(field, raw.map(|r| r.into_score(field)).transpose())
}

fn text(field: &str, raw: Option<RawText>) -> Option<String> {
    let value = match raw {
        None => Ok(None),
        Some(RawText::Text(s)) => Ok(Some(s.trim().to_string())),
        Some(RawText::Other(v)) => Err(ExtractError::NotText {
            field: field.to_string(),
            raw: v.to_string(),
        }),
    };
    degrade(field, value)
}

// ────────────────────────────────────────────────────────────────────────────
// Public entry points
// ────────────────────────────────────────────────────────────────────────────

/// Reads the organisation scorer's output. Never fails.
pub fn parse_score_result(content: &str) -> ScoreResult {
    match serde_json::from_str::<OneOrMany<OrganizationOutput>>(content) {
        Ok(parsed) => {
            let out = parsed.into_first().unwrap_or_else(|| {
                warn!("Organisation scorer produced no results, using defaults");
                OrganizationOutput::default()
            });
            ScoreResult {
                organization_score: score("organization_score", out.organization_score),
                technical_score: score("technical_score", out.technical_score),
                composite_score: score("composite_score", out.composite_score),
                experience_score: score("experience_score", out.experience_score),
                skills_score: score("skills_score", out.skills_score),
                education_score: score("education_score", out.education_score),
            }
        }
        Err(e) => {
            warn!("Organisation scorer output is not valid JSON ({e}), scanning leniently");
            scan_score_result(content)
        }
    }
}

/// Reads the job matcher's output. Never fails.
pub fn parse_job_match_result(content: &str) -> JobMatchResult {
    match serde_json::from_str::<OneOrMany<JobMatchOutput>>(content) {
        Ok(parsed) => {
            let out = parsed.into_first().unwrap_or_else(|| {
                warn!("Job matcher produced no results, using defaults");
                JobMatchOutput::default()
            });
            JobMatchResult {
                overall_match_score: score("overall_match_score", out.overall_match_score),
                skills_match_score: score(
                    "skills_match_score",
                    out.skills_match.and_then(|s| s.skills_match_score),
                ),
                experience_match_score: score(
                    "experience_match_score",
                    out.experience_match.and_then(|s| s.experience_match_score),
                ),
                education_match_score: score(
                    "education_match_score",
                    out.education_match.and_then(|s| s.education_match_score),
                ),
                content_relevance_score: score(
                    "content_relevance_score",
                    out.content_relevance.and_then(|s| s.content_relevance_score),
                ),
                match_level: text("match_level", out.match_level),
                job_title: text("job_title", out.job_title),
            }
        }
        Err(e) => {
            warn!("Job matcher output is not valid JSON ({e}), scanning leniently");
            scan_job_match_result(content)
        }
    }
}

fn scan_score_result(content: &str) -> ScoreResult {
    let number = |label: &str| degrade(label, scan::number(content, label));
    ScoreResult {
        organization_score: number("organization_score"),
        technical_score: number("technical_score"),
        composite_score: number("composite_score"),
        experience_score: number("experience_score"),
        skills_score: number("skills_score"),
        education_score: number("education_score"),
    }
}

fn scan_job_match_result(content: &str) -> JobMatchResult {
    let nested = |section: &str, label: &str| {
        let value = scan::section(content, section)
            .and_then(|body| body.map_or(Ok(None), |b| scan::number(b, label)));
        degrade(label, value)
    };
    JobMatchResult {
        overall_match_score: degrade(
            "overall_match_score",
            scan::number(content, "overall_match_score"),
        ),
        skills_match_score: nested("skills_match", "skills_match_score"),
        experience_match_score: nested("experience_match", "experience_match_score"),
        education_match_score: nested("education_match", "education_match_score"),
        content_relevance_score: nested("content_relevance", "content_relevance_score"),
        match_level: degrade("match_level", scan::text(content, "match_level")),
        job_title: degrade("job_title", scan::text(content, "job_title")),
    }
}

/// Label scanner for semi-structured output: finds `"label":` and reads the
/// value up to its terminator. Sections are delimited by brace depth.
pub mod scan {
    use crate::errors::ExtractError;

    /// Byte offset just past `"label"` + optional whitespace + `:` + optional
    /// whitespace, for the first occurrence that is actually a key.
    fn value_start(content: &str, label: &str) -> Option<usize> {
        let needle = format!("\"{label}\"");
        let mut from = 0;
        while let Some(pos) = content[from..].find(&needle) {
            let after = from + pos + needle.len();
            let rest = content[after..].trim_start();
            if let Some(value) = rest.strip_prefix(':') {
                let value = value.trim_start();
                return Some(content.len() - value.len());
            }
            from = after;
        }
        None
    }

    /// A numeric value made of digits and at most one decimal point.
    /// `null` reads as absent.
    pub fn number(content: &str, label: &str) -> Result<Option<f64>, ExtractError> {
        let Some(start) = value_start(content, label) else {
            return Ok(None);
        };
        let rest = &content[start..];
        if rest.starts_with("null") {
            return Ok(None);
        }

        let mut seen_dot = false;
        let end = rest
            .char_indices()
            .find(|&(_, c)| {
                if c == '.' && !seen_dot {
                    seen_dot = true;
                    false
                } else {
                    !c.is_ascii_digit()
                }
            })
            .map_or(rest.len(), |(i, _)| i);

        let raw = &rest[..end];
        raw.parse::<f64>().map(Some).map_err(|_| ExtractError::NotNumeric {
            field: label.to_string(),
            raw: rest
                .split([',', '}', '\n'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
        })
    }

    /// A double-quoted string value. Backslash escapes the next character.
    pub fn text(content: &str, label: &str) -> Result<Option<String>, ExtractError> {
        let Some(start) = value_start(content, label) else {
            return Ok(None);
        };
        let rest = &content[start..];
        let Some(body) = rest.strip_prefix('"') else {
            return Ok(None);
        };

        let mut value = String::new();
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            match c {
                '"' => return Ok(Some(value.trim().to_string())),
                '\\' => {
                    if let Some(next) = chars.next() {
                        value.push(next);
                    }
                }
                _ => value.push(c),
            }
        }
        Err(ExtractError::Unterminated {
            field: label.to_string(),
        })
    }

    /// The `{ ... }` body of the first `"name": {` section, braces included.
    pub fn section<'a>(content: &'a str, name: &str) -> Result<Option<&'a str>, ExtractError> {
        let Some(start) = value_start(content, name) else {
            return Ok(None);
        };
        if !content[start..].starts_with('{') {
            return Ok(None);
        }

        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (i, c) in content[start..].char_indices() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Some(&content[start..=start + i]));
                    }
                }
                _ => {}
            }
        }
        Err(ExtractError::SectionNotClosed {
            section: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORG_OUTPUT: &str = r#"[
      {
        "user_id": "12",
        "job_offer_id": "3",
        "timestamp": "2024-05-02T09:31:00",
        "organization_score": 72.5,
        "technical_score": 80,
        "composite_score": 76.25,
        "experience_score": 65.0,
        "skills_score": 90.0,
        "education_score": 70.0
      }
    ]"#;

    const MATCH_OUTPUT: &str = r#"[
      {
        "user_id": "12",
        "job_offer_id": "3",
        "overall_match_score": 81.4,
        "match_level": "GOOD",
        "skills_match": {
          "skills_match_score": 88.0,
          "matched_skills_count": 4,
          "required_skills_count": 5,
          "skills_coverage_percentage": 80.0
        },
        "experience_match": {
          "experience_match_score": 100.0,
          "experience_gap": 0.0,
          "experience_status": "Meets {requirement}"
        },
        "education_match": {
          "education_match_score": 75.0
        },
        "content_relevance": {
          "content_relevance_score": 62.3,
          "keyword_matches": 7
        },
        "job_title": "Backend Engineer",
        "analysis_timestamp": "2024-05-02T09:32:00"
      }
    ]"#;

    #[test]
    fn test_organization_output_parses_all_fields() {
        let r = parse_score_result(ORG_OUTPUT);
        assert_eq!(r.organization_score, Some(72.5));
        assert_eq!(r.technical_score, Some(80.0));
        assert_eq!(r.composite_score, Some(76.25));
        assert_eq!(r.education_score, Some(70.0));
    }

    #[test]
    fn test_organization_bare_object_and_missing_fields() {
        let r = parse_score_result(r#"{"composite_score": 64.0}"#);
        assert_eq!(r.composite_score, Some(64.0));
        assert_eq!(r.organization_score, None);
    }

    #[test]
    fn test_organization_bad_field_degrades_alone() {
        let r = parse_score_result(
            r#"[{"composite_score": "n/a", "skills_score": "55.5", "technical_score": null}]"#,
        );
        assert_eq!(r.composite_score, None);
        assert_eq!(r.skills_score, Some(55.5));
        assert_eq!(r.technical_score, None);
    }

    #[test]
    fn test_empty_array_yields_all_absent() {
        assert_eq!(parse_score_result("[]"), ScoreResult::default());
        assert_eq!(parse_job_match_result("[]"), JobMatchResult::default());
    }

    #[test]
    fn test_job_match_output_reads_nested_sections() {
        let r = parse_job_match_result(MATCH_OUTPUT);
        assert_eq!(r.overall_match_score, Some(81.4));
        assert_eq!(r.skills_match_score, Some(88.0));
        assert_eq!(r.experience_match_score, Some(100.0));
        assert_eq!(r.education_match_score, Some(75.0));
        assert_eq!(r.content_relevance_score, Some(62.3));
        assert_eq!(r.match_level.as_deref(), Some("GOOD"));
        assert_eq!(r.job_title.as_deref(), Some("Backend Engineer"));
    }

    #[test]
    fn test_invalid_json_falls_back_to_scanner() {
        // NaN is not JSON; the scanner still recovers the other fields
        let content = MATCH_OUTPUT.replace("\"education_match_score\": 75.0", "\"education_match_score\": NaN");
        let r = parse_job_match_result(&content);
        assert_eq!(r.overall_match_score, Some(81.4));
        assert_eq!(r.skills_match_score, Some(88.0));
        assert_eq!(r.education_match_score, None);
        assert_eq!(r.content_relevance_score, Some(62.3));
        assert_eq!(r.job_title.as_deref(), Some("Backend Engineer"));
    }

    #[test]
    fn test_truncated_organization_output_scans_present_fields() {
        let content = r#"[{"organization_score": 70.0, "technical_score": 61.5, "compos"#;
        let r = parse_score_result(content);
        assert_eq!(r.organization_score, Some(70.0));
        assert_eq!(r.technical_score, Some(61.5));
        assert_eq!(r.composite_score, None);
    }

    #[test]
    fn test_scan_number_stops_at_second_dot() {
        assert_eq!(scan::number(r#""v": 1.2.3"#, "v"), Ok(Some(1.2)));
        assert_eq!(scan::number(r#""v":42}"#, "v"), Ok(Some(42.0)));
        assert_eq!(scan::number(r#""v": null"#, "v"), Ok(None));
        assert_eq!(scan::number(r#""w": 1"#, "v"), Ok(None));
        assert!(matches!(
            scan::number(r#""v": abc,"#, "v"),
            Err(ExtractError::NotNumeric { .. })
        ));
    }

    #[test]
    fn test_scan_skips_label_used_as_value() {
        let content = r#"{"kind": "skills_score", "skills_score": 12}"#;
        assert_eq!(scan::number(content, "skills_score"), Ok(Some(12.0)));
    }

    #[test]
    fn test_scan_section_counts_depth_and_ignores_braces_in_strings() {
        let content = r#"{"a": {"note": "x}y", "inner": {"k": 1}, "a_score": 9}, "a_score": 1}"#;
        let body = scan::section(content, "a").unwrap().unwrap();
        assert!(body.ends_with("\"a_score\": 9}"));
        assert_eq!(scan::number(body, "a_score"), Ok(Some(9.0)));
    }

    #[test]
    fn test_scan_section_unclosed_is_error() {
        assert!(matches!(
            scan::section(r#"{"a": {"b": 1"#, "a"),
            Err(ExtractError::SectionNotClosed { .. })
        ));
    }

    #[test]
    fn test_scan_text_unterminated_is_error() {
        assert!(matches!(
            scan::text(r#"{"job_title": "Backend"#, "job_title"),
            Err(ExtractError::Unterminated { .. })
        ));
        assert_eq!(
            scan::text(r#"{"job_title": "Dev \"Ops\""}"#, "job_title"),
            Ok(Some("Dev \"Ops\"".to_string()))
        );
    }
}

use crate::error::PipelineError;
use crate::models::DocType;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct Classification {
    pub doc_type: DocType,
    pub subtype: Option<String>,
    pub confidence: f64,
}

impl Classification {
    pub fn is_confident(&self, floor: f64) -> bool {
        self.confidence >= floor
    }
}

struct TypePattern {
    regex: Regex,
    weight: f64,
}

struct TypePatternSet {
    doc_type: DocType,
    patterns: Vec<TypePattern>,
}

struct SubtypePattern {
    doc_type: DocType,
    regex: Regex,
    label: &'static str,
}

pub struct Classifier {
    type_sets: Vec<TypePatternSet>,
    subtypes: Vec<SubtypePattern>,
    clause_line: Regex,
    example_marker: Regex,
}

// A structural signal below this is treated as noise.
const STRONG_STRUCTURAL_SIGNAL: f64 = 30.0;
const STRUCTURAL_HIT_WEIGHT: f64 = 8.0;
// Per-pattern hit counts are capped so one repeated keyword cannot
// dominate the whole score.
const MAX_HITS_PER_PATTERN: usize = 5;

impl Classifier {
    pub fn new() -> Result<Self, PipelineError> {
        let type_sets = vec![
            pattern_set(
                DocType::RegulatoryNorms,
                &[
                    (r"(?i)\b(?:сп|снип|гост)\s*р?\s*\d+(?:[.\-]\d+)*", 45.0),
                    (r"(?i)\bп\.\s*\d+(?:\.\d+)*", 20.0),
                    (r"(?i)свод\s+правил", 25.0),
                    (r"(?i)нормативн\w*", 15.0),
                    (r"(?i)требован\w*", 10.0),
                    (r"(?i)\bдопускается\b", 10.0),
                ],
            )?,
            pattern_set(
                DocType::ProjectWorkPlan,
                &[
                    (r"(?i)проект\s+производства\s+работ", 40.0),
                    (r"(?i)\bппр\b", 35.0),
                    (r"(?i)график\s+(?:производства|выполнения)", 30.0),
                    (r"(?i)технологическ\w*\s+карт\w*", 30.0),
                    (r"(?i)последовательност\w*\s+работ", 20.0),
                    (r"(?i)календарн\w*", 15.0),
                ],
            )?,
            pattern_set(
                DocType::CostEstimate,
                &[
                    (r"(?i)\bсмет\w*", 35.0),
                    (r"(?i)расценк\w*", 25.0),
                    (r"(?i)стоимост\w*", 15.0),
                    (r"(?i)\bитого\b", 15.0),
                    (r"(?i)\bруб\w*|₽", 10.0),
                    (r"(?i)затрат\w*", 10.0),
                ],
            )?,
            pattern_set(
                DocType::WorkingDocs,
                &[
                    (r"(?i)черт[её]ж\w*", 35.0),
                    (r"(?i)\bлист\s*\d+", 20.0),
                    (r"(?i)спецификац\w*", 25.0),
                    (r"(?i)маркировк\w*", 15.0),
                    (r"\b(?:АР|КЖ|КМ|КМД|ЭОМ|ВК)\b", 20.0),
                ],
            )?,
            pattern_set(
                DocType::Generic,
                &[
                    (r"(?i)\bвведение\b", 10.0),
                    (r"(?i)\bпример\w*", 10.0),
                    (r"(?i)\bобзор\b", 10.0),
                    (r"(?i)примечани\w*", 5.0),
                ],
            )?,
        ];

        let subtypes = vec![
            subtype(DocType::RegulatoryNorms, r"(?i)\bсп\s*\d", "СП")?,
            subtype(DocType::RegulatoryNorms, r"(?i)\bгост\s*р?\s*\d", "ГОСТ")?,
            subtype(DocType::RegulatoryNorms, r"(?i)\bснип\b", "СНиП")?,
            subtype(DocType::ProjectWorkPlan, r"(?i)\bппр\b", "ППР")?,
            subtype(
                DocType::ProjectWorkPlan,
                r"(?i)технологическ\w*\s+карт\w*",
                "технологическая карта",
            )?,
            subtype(
                DocType::ProjectWorkPlan,
                r"(?i)график",
                "график производства работ",
            )?,
            subtype(
                DocType::CostEstimate,
                r"(?i)локальн\w*\s+смет\w*",
                "локальная смета",
            )?,
            subtype(
                DocType::CostEstimate,
                r"(?i)объектн\w*\s+смет\w*",
                "объектная смета",
            )?,
            subtype(
                DocType::CostEstimate,
                r"(?i)сводн\w*\s+смет\w*",
                "сводный сметный расчет",
            )?,
            subtype(DocType::WorkingDocs, r"\bАР\b", "АР")?,
            subtype(DocType::WorkingDocs, r"\bКЖ\b", "КЖ")?,
            subtype(DocType::WorkingDocs, r"\bКМ\b", "КМ")?,
            subtype(DocType::WorkingDocs, r"(?i)спецификац\w*", "спецификация")?,
        ];

        Ok(Self {
            type_sets,
            subtypes,
            clause_line: Regex::new(r"(?m)^\s*\d+(?:\.\d+)+\.?\s+\S")?,
            example_marker: Regex::new(r"(?i)\b(?:пример|задание|упражнение)\b")?,
        })
    }

    pub fn classify(&self, text: &str) -> Classification {
        let words = text.split_whitespace().count();
        let length_norm = (words as f64 / 120.0).max(1.0);

        let mut pattern_type = DocType::Generic;
        let mut pattern_score = 0.0;
        for set in &self.type_sets {
            let raw: f64 = set
                .patterns
                .iter()
                .map(|pattern| {
                    let hits = pattern.regex.find_iter(text).take(MAX_HITS_PER_PATTERN).count();
                    pattern.weight * hits as f64
                })
                .sum();
            let score = raw / length_norm;
            if score > pattern_score {
                pattern_score = score;
                pattern_type = set.doc_type;
            }
        }

        let (structural_type, structural_score) = self.structural_prescan(text);

        let (doc_type, confidence) = if structural_type == pattern_type
            || structural_score < STRONG_STRUCTURAL_SIGNAL
        {
            (pattern_type, pattern_score)
        } else if structural_score > pattern_score {
            (
                structural_type,
                0.7 * structural_score + 0.3 * pattern_score,
            )
        } else {
            (pattern_type, 0.7 * pattern_score + 0.3 * structural_score)
        };

        let confidence = confidence.clamp(0.0, 100.0);

        Classification {
            doc_type,
            subtype: self.resolve_subtype(doc_type, text),
            confidence,
        }
    }

    /// Cheap scan for markers a pattern table can miss: numbered clauses,
    /// tabular rows, example/exercise wording.
    fn structural_prescan(&self, text: &str) -> (DocType, f64) {
        let clause_lines = self.clause_line.find_iter(text).count();
        let tabular_lines = text
            .lines()
            .filter(|line| {
                line.matches('|').count() >= 2 || line.matches('\t').count() >= 2
            })
            .count();
        let example_hits = self.example_marker.find_iter(text).count();

        let candidates = [
            (DocType::RegulatoryNorms, clause_lines),
            (DocType::CostEstimate, tabular_lines),
            (DocType::Generic, example_hits),
        ];

        let (doc_type, hits) = candidates
            .into_iter()
            .max_by_key(|(_, hits)| *hits)
            .unwrap_or((DocType::Generic, 0));

        (doc_type, (hits as f64 * STRUCTURAL_HIT_WEIGHT).min(100.0))
    }

    fn resolve_subtype(&self, doc_type: DocType, text: &str) -> Option<String> {
        self.subtypes
            .iter()
            .filter(|candidate| candidate.doc_type == doc_type)
            .find(|candidate| candidate.regex.is_match(text))
            .map(|candidate| candidate.label.to_string())
    }
}

fn pattern_set(
    doc_type: DocType,
    table: &[(&str, f64)],
) -> Result<TypePatternSet, PipelineError> {
    let patterns = table
        .iter()
        .map(|(source, weight)| {
            Ok(TypePattern {
                regex: Regex::new(source)?,
                weight: *weight,
            })
        })
        .collect::<Result<Vec<_>, PipelineError>>()?;

    Ok(TypePatternSet { doc_type, patterns })
}

fn subtype(
    doc_type: DocType,
    source: &str,
    label: &'static str,
) -> Result<SubtypePattern, PipelineError> {
    Ok(SubtypePattern {
        doc_type,
        regex: Regex::new(source)?,
        label,
    })
}

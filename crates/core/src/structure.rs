use crate::error::PipelineError;
use crate::models::StructuralProfile;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct SectionSpan {
    pub heading: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct TableSpan {
    pub start: usize,
    pub end: usize,
}

/// Byte-offset map of the document used by the activity extractor and the
/// chunker. Offsets always fall on char boundaries.
#[derive(Debug, Clone, Default)]
pub struct Outline {
    pub sections: Vec<SectionSpan>,
    pub tables: Vec<TableSpan>,
}

pub struct StructuralAnalyzer {
    section_heading: Regex,
    figure_marker: Regex,
    table_caption: Regex,
}

impl StructuralAnalyzer {
    pub fn new() -> Result<Self, PipelineError> {
        Ok(Self {
            section_heading: Regex::new(
                r"(?m)^\s*(?:\d+(?:\.\d+)*[.)]?\s+\S.*|(?i:раздел|глава)\s+\d+.*)$",
            )?,
            figure_marker: Regex::new(r"(?i)\bрис(?:\.|унок|унке|унка)")?,
            table_caption: Regex::new(r"(?i)\bтаблица\s*\d*")?,
        })
    }

    pub fn outline(&self, text: &str) -> Outline {
        let heading_matches: Vec<(usize, usize)> = self
            .section_heading
            .find_iter(text)
            .map(|found| (found.start(), found.end()))
            .collect();

        let mut sections = Vec::new();
        for (index, (start, end)) in heading_matches.iter().enumerate() {
            let span_end = heading_matches
                .get(index + 1)
                .map(|(next_start, _)| *next_start)
                .unwrap_or(text.len());
            sections.push(SectionSpan {
                heading: text[*start..*end].trim().to_string(),
                start: *start,
                end: span_end,
            });
        }

        Outline {
            sections,
            tables: table_spans(text),
        }
    }

    pub fn profile(
        &self,
        text: &str,
        outline: &Outline,
        expected_sections: u32,
    ) -> StructuralProfile {
        let sections = outline.sections.len() as u32;
        let captions = self.table_caption.find_iter(text).count() as u32;
        let tables = (outline.tables.len() as u32).max(captions);
        let figures = self.figure_marker.find_iter(text).count() as u32;
        let paragraphs = text
            .split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .count() as u32;
        let words = text.split_whitespace().count() as u32;

        let completeness = if expected_sections == 0 {
            1.0
        } else {
            (sections as f64 / expected_sections as f64).min(1.0)
        };

        StructuralProfile {
            sections,
            tables,
            figures,
            paragraphs,
            words,
            completeness,
        }
    }
}

// A table is a run of two or more consecutive lines that look like rows.
fn table_spans(text: &str) -> Vec<TableSpan> {
    let mut spans = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut run_lines = 0usize;
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let is_row = line.matches('|').count() >= 2 || line.matches('\t').count() >= 2;

        if is_row {
            if run_start.is_none() {
                run_start = Some(offset);
            }
            run_lines += 1;
        } else if let Some(start) = run_start.take() {
            if run_lines >= 2 {
                spans.push(TableSpan { start, end: offset });
            }
            run_lines = 0;
        }

        offset += line.len();
    }

    if let Some(start) = run_start {
        if run_lines >= 2 {
            spans.push(TableSpan {
                start,
                end: text.len(),
            });
        }
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::StructuralAnalyzer;

    const SAMPLE: &str = "\
1. Общие положения
Настоящий документ устанавливает требования.

2. Земляные работы
Работы выполняются по проекту. См. рисунок 1.

Таблица 1
| Показатель | Значение |
| Глубина    | 1,5 м    |

3. Контроль качества
Контроль ведется постоянно.";

    #[test]
    fn outline_finds_sections_and_tables() {
        let analyzer = StructuralAnalyzer::new().expect("patterns should compile");
        let outline = analyzer.outline(SAMPLE);

        assert_eq!(outline.sections.len(), 3);
        assert!(outline.sections[0].heading.starts_with("1."));
        assert_eq!(outline.tables.len(), 1);

        // Section spans tile the document from the first heading onward.
        assert!(outline.sections[0].end <= outline.sections[1].start + 1);
    }

    #[test]
    fn profile_counts_and_completeness() {
        let analyzer = StructuralAnalyzer::new().expect("patterns should compile");
        let outline = analyzer.outline(SAMPLE);
        let profile = analyzer.profile(SAMPLE, &outline, 10);

        assert_eq!(profile.sections, 3);
        assert_eq!(profile.tables, 1);
        assert_eq!(profile.figures, 1);
        assert!(profile.words > 20);
        assert!((profile.completeness - 0.3).abs() < 1e-9);
    }

    #[test]
    fn zero_expected_sections_is_fully_complete() {
        let analyzer = StructuralAnalyzer::new().expect("patterns should compile");
        let outline = analyzer.outline("короткий текст");
        let profile = analyzer.profile("короткий текст", &outline, 0);
        assert!((profile.completeness - 1.0).abs() < 1e-9);
    }
}

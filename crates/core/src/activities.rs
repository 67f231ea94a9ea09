use crate::chunking::sentence_spans;
use crate::error::PipelineError;
use crate::models::{DependencyGraph, GraphEdge, GraphNode, ResourceRefs, WorkActivity};
use crate::structure::Outline;
use regex::Regex;

const WORK_LEXICON: [&str; 16] = [
    "подготовка площадки",
    "разработка грунта",
    "земляные работы",
    "гидроизоляция",
    "армирование",
    "бетонирование",
    "фундамент",
    "каркас",
    "кладка стен",
    "кровля",
    "фасадные работы",
    "отделочные работы",
    "электромонтажные работы",
    "сантехнические работы",
    "благоустройство",
    "демонтаж",
];

const DURATION_LOOKUP: [(&str, f64); 16] = [
    ("площадк", 2.0),
    ("грунт", 4.0),
    ("земляные", 5.0),
    ("гидроизоляц", 3.0),
    ("армирован", 3.0),
    ("бетонирован", 4.0),
    ("фундамент", 10.0),
    ("каркас", 14.0),
    ("кладка", 10.0),
    ("кровля", 7.0),
    ("фасад", 8.0),
    ("отделочн", 12.0),
    ("электромонтаж", 6.0),
    ("сантехн", 6.0),
    ("благоустройств", 5.0),
    ("демонтаж", 4.0),
];

const DEFAULT_DURATION_DAYS: f64 = 5.0;

const PRIORITY_LOOKUP: [(&str, u8); 10] = [
    ("фундамент", 9),
    ("земляные", 8),
    ("грунт", 8),
    ("каркас", 8),
    ("бетонирован", 7),
    ("армирован", 7),
    ("кровля", 6),
    ("гидроизоляц", 6),
    ("отделочн", 4),
    ("благоустройств", 3),
];

const DEFAULT_PRIORITY: u8 = 5;

// Canonical construction sequencing, used only for pairs the text itself
// did not wire (see DESIGN.md on precedence).
const CANONICAL_ORDER: [(&str, &str); 9] = [
    ("подготовка площадки", "земляные работы"),
    ("разработка грунта", "фундамент"),
    ("земляные работы", "фундамент"),
    ("армирование", "бетонирование"),
    ("фундамент", "каркас"),
    ("каркас", "кладка стен"),
    ("каркас", "кровля"),
    ("кровля", "фасадные работы"),
    ("отделочные работы", "благоустройство"),
];

#[derive(Debug, Clone)]
pub struct ExtractedActivities {
    pub activities: Vec<WorkActivity>,
    pub graph: DependencyGraph,
}

struct LexiconEntry {
    name: &'static str,
    regex: Regex,
}

pub struct ActivityExtractor {
    lexicon: Vec<LexiconEntry>,
    generic_activity: Regex,
    // Markers where the predecessor is named after the marker
    // («фундамент после земляных работ»).
    follows_markers: Vec<Regex>,
    // Markers where the predecessor is named before the marker
    // («армирование предшествует бетонированию»).
    precedes_markers: Vec<Regex>,
    materials: Vec<Regex>,
    money: Regex,
    date: Regex,
}

impl ActivityExtractor {
    pub fn new() -> Result<Self, PipelineError> {
        let mut lexicon = WORK_LEXICON
            .iter()
            .copied()
            .map(|name| {
                Ok(LexiconEntry {
                    name,
                    regex: Regex::new(&stem_pattern(name))?,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        // Longest names claim their spans first so «земляные работы» never
        // decays into a bare «работы» hit.
        lexicon.sort_by_key(|entry| std::cmp::Reverse(entry.name.chars().count()));

        let follows_markers = compile_all(&[
            r"(?i)\bпосле\b",
            r"(?i)\bпо\s+завершени\w*",
            r"(?i)\bпо\s+окончани\w*",
            r"(?i)\bвслед\s+за\b",
            r"(?i)\bзависит\s+от\b",
            r"(?i)\bтребует\s+завершени\w*",
        ])?;
        let precedes_markers = compile_all(&[
            r"(?i)\bпредшеству\w*",
            r"(?i)\bдо\s+начала\b",
            r"(?i)\bперед\s+начал\w*",
        ])?;
        let materials = compile_all(&[
            r"(?i)\bбетон\w{0,3}\b",
            r"(?i)\bарматур\w{0,3}\b",
            r"(?i)\bкирпич\w{0,3}\b",
            r"(?i)\bраствор\w{0,3}\b",
            r"(?i)\bщебень\b|\bщебн\w{0,3}\b",
            r"(?i)\bпесок\b|\bпеск\w{0,3}\b",
            r"(?i)\bопалубк\w{0,3}\b",
            r"(?i)\bметаллоконструкц\w{0,4}\b",
        ])?;

        Ok(Self {
            lexicon,
            generic_activity: Regex::new(r"(?i)\b[а-яё]{4,}\s+работ[а-яё]*")?,
            follows_markers,
            precedes_markers,
            materials,
            money: Regex::new(r"(?i)\d[\d\s]*(?:тыс\.|млн)?\s*(?:руб\w*|₽)")?,
            date: Regex::new(r"\b\d{1,2}\.\d{1,2}\.\d{2,4}\b")?,
        })
    }

    /// Extracts named work activities and the dependency graph between
    /// them. `use_generic` switches to the type-agnostic pattern when the
    /// classifier was not confident.
    pub fn extract(
        &self,
        text: &str,
        outline: &Outline,
        use_generic: bool,
        max_activities: usize,
    ) -> ExtractedActivities {
        let mentions = self.collect_mentions(text, use_generic);

        let mut names: Vec<String> = Vec::new();
        for (_, _, name) in &mentions {
            if !names.iter().any(|known| known == name) {
                names.push(name.clone());
            }
        }
        names.truncate(max_activities);

        let mut edges = self.explicit_edges(text, &mentions, &names);

        // Canonical fill: only for successors the text left unexplained,
        // and never against an explicitly stated reverse edge.
        let mut table_edges = Vec::new();
        for (pred, succ) in CANONICAL_ORDER {
            let both_known = names.iter().any(|name| name == pred)
                && names.iter().any(|name| name == succ);
            let unexplained = !edges.iter().any(|(_, target)| target == succ);
            let contradicted = edges
                .iter()
                .any(|(from, to)| from == succ && to == pred);
            if both_known && unexplained && !contradicted {
                table_edges.push((pred.to_string(), succ.to_string()));
            }
        }
        edges.extend(table_edges);

        // Last resort: chain activities in declaration order when the
        // document has declared structure but no dependency wording.
        if edges.is_empty() && names.len() >= 2 && !outline.sections.is_empty() {
            for pair in names.windows(2) {
                edges.push((pair[0].clone(), pair[1].clone()));
            }
        }

        let activities = self.build_activities(text, &mentions, &names, &edges);
        let graph = build_graph(&names, &activities, &edges);

        ExtractedActivities { activities, graph }
    }

    fn collect_mentions(&self, text: &str, use_generic: bool) -> Vec<(usize, usize, String)> {
        let mut mentions: Vec<(usize, usize, String)> = Vec::new();

        if use_generic {
            for found in self.generic_activity.find_iter(text) {
                let name = found
                    .as_str()
                    .to_lowercase()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                mentions.push((found.start(), found.end(), name));
            }
        } else {
            for entry in &self.lexicon {
                for found in entry.regex.find_iter(text) {
                    let overlaps = mentions.iter().any(|(start, end, _)| {
                        found.start() < *end && *start < found.end()
                    });
                    if !overlaps {
                        mentions.push((found.start(), found.end(), entry.name.to_string()));
                    }
                }
            }
        }

        mentions.sort_by_key(|(start, _, _)| *start);
        mentions
    }

    fn explicit_edges(
        &self,
        text: &str,
        mentions: &[(usize, usize, String)],
        names: &[String],
    ) -> Vec<(String, String)> {
        let mut edges: Vec<(String, String)> = Vec::new();

        for (sentence_start, sentence_end) in sentence_spans(text) {
            let sentence = &text[sentence_start..sentence_end];

            let mut in_sentence: Vec<(usize, &String)> = Vec::new();
            for (start, _, name) in mentions {
                let inside = *start >= sentence_start && *start < sentence_end;
                if inside && !in_sentence.iter().any(|(_, known)| *known == name) {
                    in_sentence.push((start - sentence_start, name));
                }
            }
            if in_sentence.len() < 2 {
                continue;
            }

            let follows_at = first_match(&self.follows_markers, sentence);
            let precedes_at = first_match(&self.precedes_markers, sentence);

            let pair = if let Some(marker) = follows_at {
                let successor = in_sentence
                    .iter()
                    .filter(|(position, _)| *position < marker)
                    .next_back();
                let predecessor = in_sentence.iter().find(|(position, _)| *position > marker);
                predecessor.zip(successor)
            } else if let Some(marker) = precedes_at {
                let predecessor = in_sentence
                    .iter()
                    .filter(|(position, _)| *position < marker)
                    .next_back();
                let successor = in_sentence.iter().find(|(position, _)| *position > marker);
                predecessor.zip(successor)
            } else {
                None
            };

            if let Some(((_, predecessor), (_, successor))) = pair {
                let both_known = names.iter().any(|name| name == *predecessor)
                    && names.iter().any(|name| name == *successor);
                let duplicate = edges
                    .iter()
                    .any(|(from, to)| from == *predecessor && to == *successor);
                if both_known && !duplicate && predecessor != successor {
                    edges.push(((*predecessor).clone(), (*successor).clone()));
                }
            }
        }

        edges
    }

    fn build_activities(
        &self,
        text: &str,
        mentions: &[(usize, usize, String)],
        names: &[String],
        edges: &[(String, String)],
    ) -> Vec<WorkActivity> {
        let spans = sentence_spans(text);

        names
            .iter()
            .map(|name| {
                let mut resources = ResourceRefs::default();
                for (sentence_start, sentence_end) in &spans {
                    let mentioned = mentions.iter().any(|(start, _, mention_name)| {
                        mention_name == name
                            && *start >= *sentence_start
                            && *start < *sentence_end
                    });
                    if !mentioned {
                        continue;
                    }
                    let sentence = &text[*sentence_start..*sentence_end];
                    collect_resources(self, sentence, &mut resources);
                }

                let duration_days = lookup(&DURATION_LOOKUP, name, DEFAULT_DURATION_DAYS);
                let priority = lookup(&PRIORITY_LOOKUP, name, DEFAULT_PRIORITY);
                let predecessors = edges
                    .iter()
                    .filter(|(_, succ)| succ == name)
                    .map(|(pred, _)| pred.clone())
                    .collect::<Vec<_>>();

                let quality = (0.5
                    + 0.3 * (priority as f64 / 10.0)
                    + if resources.count() > 0 { 0.2 } else { 0.0 })
                .min(1.0);

                WorkActivity {
                    name: name.clone(),
                    duration_days,
                    priority,
                    quality,
                    resources,
                    predecessors,
                    is_critical: false,
                }
            })
            .collect()
    }
}

fn collect_resources(extractor: &ActivityExtractor, sentence: &str, resources: &mut ResourceRefs) {
    for material in &extractor.materials {
        for found in material.find_iter(sentence) {
            let token = found.as_str().to_lowercase();
            if !resources.materials.contains(&token) {
                resources.materials.push(token);
            }
        }
    }
    for found in extractor.money.find_iter(sentence) {
        let token = found.as_str().trim().to_string();
        if !resources.money.contains(&token) {
            resources.money.push(token);
        }
    }
    for found in extractor.date.find_iter(sentence) {
        let token = found.as_str().to_string();
        if !resources.dates.contains(&token) {
            resources.dates.push(token);
        }
    }
}

fn build_graph(
    names: &[String],
    activities: &[WorkActivity],
    edges: &[(String, String)],
) -> DependencyGraph {
    let nodes = activities
        .iter()
        .map(|activity| GraphNode {
            name: activity.name.clone(),
            duration_days: activity.duration_days,
        })
        .collect::<Vec<_>>();

    let mut graph_edges = Vec::new();
    for (pred, succ) in edges {
        let from = names.iter().position(|name| name == pred);
        let to = names.iter().position(|name| name == succ);
        if let (Some(from), Some(to)) = (from, to) {
            let edge = GraphEdge { from, to };
            if !graph_edges.contains(&edge) {
                graph_edges.push(edge);
            }
        }
    }

    DependencyGraph {
        nodes,
        edges: graph_edges,
    }
}

// «земляные работы» -> r"(?i)\bземлян\w*\s+рабо\w*", tolerant of case
// endings.
fn stem_pattern(name: &str) -> String {
    let stems = name
        .split_whitespace()
        .map(|word| {
            let chars: Vec<char> = word.chars().collect();
            let keep = if chars.len() > 5 {
                chars.len() - 2
            } else {
                chars.len()
            };
            let stem: String = chars[..keep].iter().collect();
            format!(r"{}\w*", regex::escape(&stem))
        })
        .collect::<Vec<_>>();
    format!(r"(?i)\b{}", stems.join(r"\s+"))
}

fn compile_all(sources: &[&str]) -> Result<Vec<Regex>, PipelineError> {
    sources
        .iter()
        .map(|source| Regex::new(source).map_err(PipelineError::from))
        .collect()
}

fn first_match(markers: &[Regex], sentence: &str) -> Option<usize> {
    markers
        .iter()
        .filter_map(|marker| marker.find(sentence).map(|found| found.start()))
        .min()
}

fn lookup<T: Copy>(table: &[(&str, T)], name: &str, default: T) -> T {
    table
        .iter()
        .find(|(stem, _)| name.contains(stem))
        .map(|(_, value)| *value)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::ActivityExtractor;
    use crate::structure::Outline;

    const CHAIN: &str = "СП 45.13330.2017 п. 5.2. Земляные работы выполняются \
в соответствии с проектом. Фундамент устраивается после завершения земляных \
работ. Монтаж каркаса начинается после устройства фундамента.";

    #[test]
    fn inflected_mentions_resolve_to_lexicon_names() {
        let extractor = ActivityExtractor::new().expect("patterns should compile");
        let extracted = extractor.extract(CHAIN, &Outline::default(), false, 25);

        let names: Vec<&str> = extracted
            .activities
            .iter()
            .map(|activity| activity.name.as_str())
            .collect();
        assert_eq!(names, ["земляные работы", "фундамент", "каркас"]);
    }

    #[test]
    fn explicit_phrasing_builds_the_dependency_chain() {
        let extractor = ActivityExtractor::new().expect("patterns should compile");
        let extracted = extractor.extract(CHAIN, &Outline::default(), false, 25);

        let foundation = extracted
            .activities
            .iter()
            .find(|activity| activity.name == "фундамент")
            .expect("foundation should be extracted");
        assert_eq!(foundation.predecessors, ["земляные работы"]);

        let frame = extracted
            .activities
            .iter()
            .find(|activity| activity.name == "каркас")
            .expect("frame should be extracted");
        assert_eq!(frame.predecessors, ["фундамент"]);

        assert_eq!(extracted.graph.edges.len(), 2);
    }

    #[test]
    fn canonical_table_fills_unexplained_pairs() {
        let extractor = ActivityExtractor::new().expect("patterns should compile");
        let text = "Выполняются земляные работы. Затем устраивается фундамент.";
        let extracted = extractor.extract(text, &Outline::default(), false, 25);

        let foundation = extracted
            .activities
            .iter()
            .find(|activity| activity.name == "фундамент")
            .expect("foundation should be extracted");
        assert_eq!(foundation.predecessors, ["земляные работы"]);
    }

    #[test]
    fn explicit_phrasing_wins_over_the_canonical_table() {
        let extractor = ActivityExtractor::new().expect("patterns should compile");
        // The text inverts the canonical order on purpose.
        let text = "Земляные работы выполняются после устройства фундамента.";
        let extracted = extractor.extract(text, &Outline::default(), false, 25);

        let earthworks = extracted
            .activities
            .iter()
            .find(|activity| activity.name == "земляные работы")
            .expect("earthworks should be extracted");
        assert_eq!(earthworks.predecessors, ["фундамент"]);
        // The canonical table must not reintroduce the inverted pair.
        assert_eq!(extracted.graph.edges.len(), 1);
    }

    #[test]
    fn activity_count_is_bounded() {
        let extractor = ActivityExtractor::new().expect("patterns should compile");
        let extracted = extractor.extract(CHAIN, &Outline::default(), false, 2);
        assert_eq!(extracted.activities.len(), 2);
        assert_eq!(extracted.graph.nodes.len(), 2);
    }

    #[test]
    fn generic_mode_still_finds_work_phrases() {
        let extractor = ActivityExtractor::new().expect("patterns should compile");
        let text = "Сначала выполняются подготовительные работы, затем монтажные работы.";
        let extracted = extractor.extract(text, &Outline::default(), true, 25);
        assert!(extracted.activities.len() >= 2);
    }

    #[test]
    fn resources_are_attached_from_the_same_sentence() {
        let extractor = ActivityExtractor::new().expect("patterns should compile");
        let text = "Бетонирование выполняется с опалубкой, стоимость 150 000 руб, срок до 12.05.2024.";
        let extracted = extractor.extract(text, &Outline::default(), false, 25);

        let concrete = extracted
            .activities
            .iter()
            .find(|activity| activity.name == "бетонирование")
            .expect("concrete works should be extracted");
        assert!(!concrete.resources.materials.is_empty());
        assert!(!concrete.resources.money.is_empty());
        assert_eq!(concrete.resources.dates, ["12.05.2024"]);
    }
}

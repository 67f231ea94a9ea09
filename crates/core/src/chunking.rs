use crate::error::PipelineError;
use crate::models::{Chunk, ChunkStrategy, PipelineOptions};
use crate::structure::Outline;
use regex::Regex;
use sha2::{Digest, Sha256};

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Sentence boundaries as byte spans. A period only terminates when
/// followed by whitespace, which keeps «45.13330.2017» in one piece.
pub(crate) fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut iter = text.char_indices().peekable();

    while let Some((index, ch)) = iter.next() {
        if !matches!(ch, '.' | '!' | '?' | ';') {
            continue;
        }
        let followed_by_space = match iter.peek() {
            None => true,
            Some((_, next)) => next.is_whitespace(),
        };
        if !followed_by_space {
            continue;
        }
        let end = index + ch.len_utf8();
        if !text[start..end].trim().is_empty() {
            spans.push((start, end));
        }
        start = end;
    }

    if start < text.len() && !text[start..].trim().is_empty() {
        spans.push((start, text.len()));
    }

    spans
}

struct RawChunk {
    text: String,
    start: usize,
    end: usize,
    strategy: ChunkStrategy,
    section: Option<String>,
}

/// Strategy cascade: structural, tabular, then semantic and the overlap
/// fallback until the minimum chunk count is reached.
pub fn chunk_document(
    text: &str,
    outline: &Outline,
    document_hash: &str,
    options: &PipelineOptions,
) -> Result<Vec<Chunk>, PipelineError> {
    let list_marker = Regex::new(r"(?m)^\s*(?:[-•*]|\d+[.)])\s+")?;
    let table_word = Regex::new(r"(?i)\bтаблица\b")?;

    let mut raw = Vec::new();

    for section in &outline.sections {
        let mut spans = Vec::new();
        split_on_sentences(text, section.start, section.end, options.max_chunk_chars, &mut spans);
        for (start, end) in spans {
            raw.push(RawChunk {
                text: text[start..end].to_string(),
                start,
                end,
                strategy: ChunkStrategy::Structural,
                section: Some(section.heading.clone()),
            });
        }
    }

    for table in &outline.tables {
        raw.push(RawChunk {
            text: serialize_table(&text[table.start..table.end]),
            start: table.start,
            end: table.end,
            strategy: ChunkStrategy::Tabular,
            section: None,
        });
    }

    if raw.len() < options.min_chunks {
        for (start, end) in semantic_spans(text, options.target_chunk_chars) {
            raw.push(RawChunk {
                text: text[start..end].to_string(),
                start,
                end,
                strategy: ChunkStrategy::Semantic,
                section: None,
            });
        }
    }

    if raw.len() < options.min_chunks {
        for (start, end) in overlap_spans(text, options) {
            raw.push(RawChunk {
                text: text[start..end].to_string(),
                start,
                end,
                strategy: ChunkStrategy::OverlapFallback,
                section: None,
            });
        }
    }

    let total_chars = text.chars().count();
    let effective_min = options.min_chunk_chars.min(total_chars.max(1));

    let mut chunks = Vec::new();
    let mut cursor = 0u64;
    for piece in raw {
        let char_len = piece.text.chars().count();
        if char_len < effective_min {
            continue;
        }

        let mut chunk_text = piece.text;
        let mut truncated = false;
        if char_len > options.max_chunk_chars {
            chunk_text = chunk_text.chars().take(options.max_chunk_chars).collect();
            truncated = true;
        }

        let has_numbers = chunk_text.chars().any(|ch| ch.is_ascii_digit());
        let has_lists = list_marker.is_match(&chunk_text);
        let has_tables = chunk_text.contains('|')
            || chunk_text.contains('\t')
            || table_word.is_match(&chunk_text);

        let quality = chunk_quality(
            chunk_text.chars().count(),
            options.target_chunk_chars,
            has_numbers,
            has_lists,
            has_tables,
            piece.strategy,
        );

        chunks.push(Chunk {
            chunk_id: make_chunk_id(document_hash, cursor, &chunk_text),
            document_hash: document_hash.to_string(),
            chunk_index: cursor,
            text: chunk_text,
            start: piece.start,
            end: piece.end,
            strategy: piece.strategy,
            quality,
            has_numbers,
            has_lists,
            has_tables,
            truncated,
            section: piece.section,
        });
        cursor = cursor.saturating_add(1);
    }

    Ok(chunks)
}

// Recursive bisection at the sentence boundary nearest the midpoint;
// hard char split only when a span has no boundary at all.
fn split_on_sentences(
    text: &str,
    start: usize,
    end: usize,
    max_chars: usize,
    out: &mut Vec<(usize, usize)>,
) {
    let slice = &text[start..end];
    let char_count = slice.chars().count();
    if char_count <= max_chars.max(1) {
        out.push((start, end));
        return;
    }

    let mid_char = char_count / 2;
    let mid_byte = start
        + slice
            .char_indices()
            .nth(mid_char)
            .map(|(index, _)| index)
            .unwrap_or(slice.len());

    let split_at = sentence_spans(slice)
        .iter()
        .map(|(_, sentence_end)| start + sentence_end)
        .filter(|boundary| *boundary > start && *boundary < end)
        .min_by_key(|boundary| boundary.abs_diff(mid_byte))
        .unwrap_or(mid_byte);

    if split_at <= start || split_at >= end {
        out.push((start, end));
        return;
    }

    split_on_sentences(text, start, split_at, max_chars, out);
    split_on_sentences(text, split_at, end, max_chars, out);
}

fn serialize_table(table_text: &str) -> String {
    table_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// Paragraph accumulation up to the target window. A paragraph is only
// split when it alone exceeds the window.
fn semantic_spans(text: &str, target_chars: usize) -> Vec<(usize, usize)> {
    let target = target_chars.max(1);
    let mut spans = Vec::new();
    let mut group: Option<(usize, usize)> = None;
    let mut offset = 0usize;

    for part in text.split("\n\n") {
        let range = (offset, offset + part.len());
        offset += part.len() + 2;

        if part.trim().is_empty() {
            continue;
        }

        if part.chars().count() > target {
            if let Some(flushed) = group.take() {
                spans.push(flushed);
            }
            split_on_sentences(text, range.0, range.1, target, &mut spans);
            continue;
        }

        group = match group {
            None => Some(range),
            Some((group_start, group_end)) => {
                let combined = text[group_start..range.1].chars().count();
                if combined <= target {
                    Some((group_start, range.1))
                } else {
                    spans.push((group_start, group_end));
                    Some(range)
                }
            }
        };
    }

    if let Some(flushed) = group {
        spans.push(flushed);
    }

    spans
}

// Fixed window with fixed overlap; the window end snaps back to the
// nearest sentence terminator. Consecutive spans always overlap, so the
// union covers the whole document.
fn overlap_spans(text: &str, options: &PipelineOptions) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let mut byte_offsets: Vec<usize> = text.char_indices().map(|(index, _)| index).collect();
    byte_offsets.push(text.len());

    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }

    let window = options.target_chunk_chars.max(1);
    let overlap = options.overlap_chars.min(window.saturating_sub(1));
    let min_len = options.min_chunk_chars;

    let mut spans = Vec::new();
    let mut start = 0usize;
    while start < total {
        let mut end = (start + window).min(total);

        if total - end < min_len {
            // Absorb a tail that would be dropped as too short.
            end = total;
        } else {
            let floor = start + min_len.max(1);
            let mut probe = end;
            while probe > floor {
                if matches!(chars[probe - 1], '.' | '!' | '?') {
                    end = probe;
                    break;
                }
                probe -= 1;
            }
        }

        spans.push((byte_offsets[start], byte_offsets[end]));
        if end >= total {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    spans
}

fn chunk_quality(
    char_len: usize,
    target_chars: usize,
    has_numbers: bool,
    has_lists: bool,
    has_tables: bool,
    strategy: ChunkStrategy,
) -> f64 {
    let target = target_chars.max(1) as f64;
    let length = char_len as f64;
    let fit = if char_len == 0 {
        0.0
    } else if length <= target {
        length / target
    } else {
        target / length
    };

    let strategy_bonus = match strategy {
        ChunkStrategy::Tabular => 0.20,
        ChunkStrategy::Structural => 0.15,
        ChunkStrategy::Semantic => 0.10,
        ChunkStrategy::OverlapFallback => 0.05,
    };

    let mut score = 0.55 * fit + strategy_bonus;
    if has_numbers {
        score += 0.10;
    }
    if has_lists {
        score += 0.10;
    }
    if has_tables {
        score += 0.10;
    }

    score.clamp(0.05, 1.0)
}

fn make_chunk_id(document_hash: &str, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_hash.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::{chunk_document, normalize_whitespace, overlap_spans, sentence_spans};
    use crate::models::{ChunkStrategy, PipelineOptions};
    use crate::structure::StructuralAnalyzer;

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn sentence_spans_keep_standard_codes_together() {
        let text = "СП 45.13330.2017 применяется повсеместно. Вторая фраза.";
        let spans = sentence_spans(text);
        assert_eq!(spans.len(), 2);
        assert!(text[spans[0].0..spans[0].1].contains("45.13330.2017"));
    }

    #[test]
    fn structural_sections_become_chunks() {
        let text = "\
1. Общие положения
Первый раздел с достаточно длинным содержимым для чанка.

2. Земляные работы
Второй раздел, тоже с достаточно длинным содержимым для чанка.";
        let analyzer = StructuralAnalyzer::new().expect("patterns should compile");
        let outline = analyzer.outline(text);
        let options = PipelineOptions {
            min_chunk_chars: 20,
            min_chunks: 1,
            ..PipelineOptions::default()
        };

        let chunks = chunk_document(text, &outline, "hash", &options).expect("chunking");
        assert_eq!(chunks.len(), 2);
        assert!(chunks
            .iter()
            .all(|chunk| chunk.strategy == ChunkStrategy::Structural));
        assert_eq!(chunks[0].section.as_deref(), Some("1. Общие положения"));
    }

    #[test]
    fn oversized_sections_split_on_sentence_boundaries() {
        let body = "Предложение номер один о работах. ".repeat(30);
        let text = format!("1. Раздел\n{body}");
        let analyzer = StructuralAnalyzer::new().expect("patterns should compile");
        let outline = analyzer.outline(&text);
        let options = PipelineOptions {
            max_chunk_chars: 200,
            min_chunk_chars: 10,
            min_chunks: 1,
            ..PipelineOptions::default()
        };

        let chunks = chunk_document(&text, &outline, "hash", &options).expect("chunking");
        assert!(chunks.len() > 1);
        assert!(chunks
            .iter()
            .all(|chunk| chunk.text.chars().count() <= 200));
        assert!(chunks.iter().all(|chunk| !chunk.truncated));
    }

    #[test]
    fn paragraphs_accumulate_up_to_the_window() {
        let text = "Первый абзац текста.\n\nВторой абзац текста.\n\nТретий абзац текста.";
        let options = PipelineOptions {
            target_chunk_chars: 48,
            min_chunk_chars: 10,
            min_chunks: 3,
            ..PipelineOptions::default()
        };

        let chunks = chunk_document(text, &Default::default(), "hash", &options).expect("chunking");
        let semantic: Vec<_> = chunks
            .iter()
            .filter(|chunk| chunk.strategy == ChunkStrategy::Semantic)
            .collect();
        // Two ~20-char paragraphs fit a 48-char window; the third starts
        // a new chunk.
        assert_eq!(semantic.len(), 2);
        assert!(semantic[0].text.contains("Первый"));
        assert!(semantic[0].text.contains("Второй"));
        assert!(semantic[1].text.contains("Третий"));
    }

    #[test]
    fn overlap_spans_cover_the_whole_document() {
        let text = "One two three. Four five six. Seven eight nine. Ten eleven twelve. \
More text follows here. And the tail ends now.";
        let options = PipelineOptions {
            target_chunk_chars: 40,
            overlap_chars: 10,
            min_chunk_chars: 5,
            ..PipelineOptions::default()
        };

        let spans = overlap_spans(text, &options);
        assert!(spans.len() > 1);
        assert_eq!(spans[0].0, 0);
        assert_eq!(spans.last().expect("at least one span").1, text.len());
        for pair in spans.windows(2) {
            // Ignoring overlap, consecutive spans leave no gap.
            assert!(pair[1].0 <= pair[0].1);
        }
    }

    #[test]
    fn tabular_chunks_rank_above_overlap_chunks() {
        let text = "\
Таблица 1
| Работы | Срок |
| Фундамент | 10 дней |
| Каркас | 14 дней |";
        let analyzer = StructuralAnalyzer::new().expect("patterns should compile");
        let outline = analyzer.outline(text);
        let options = PipelineOptions {
            min_chunk_chars: 10,
            min_chunks: 5,
            target_chunk_chars: 80,
            overlap_chars: 10,
            ..PipelineOptions::default()
        };

        let chunks = chunk_document(text, &outline, "hash", &options).expect("chunking");
        let tabular = chunks
            .iter()
            .find(|chunk| chunk.strategy == ChunkStrategy::Tabular)
            .expect("table chunk");
        let overlap = chunks
            .iter()
            .find(|chunk| chunk.strategy == ChunkStrategy::OverlapFallback)
            .expect("overlap chunk");

        assert!(tabular.has_tables);
        assert!(tabular.quality > overlap.quality);
    }

    #[test]
    fn long_chunks_are_truncated_and_flagged() {
        let text = "Очень длинное предложение без терминаторов ".repeat(60);
        let options = PipelineOptions {
            max_chunk_chars: 300,
            target_chunk_chars: 5_000,
            min_chunk_chars: 10,
            min_chunks: 1,
            ..PipelineOptions::default()
        };

        let chunks = chunk_document(&text, &Default::default(), "hash", &options).expect("chunking");
        assert!(chunks
            .iter()
            .any(|chunk| chunk.truncated && chunk.text.chars().count() == 300));
    }
}

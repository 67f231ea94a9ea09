use crate::models::DocType;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub path: PathBuf,
    pub bytes: u64,
    pub priority: f64,
}

const SIZE_BONUS_PER_100_KB: f64 = 1.0;
const SIZE_BONUS_CAP: f64 = 20.0;

/// Derived intake order, recomputed from filename and size on every run.
/// Nothing here is persisted: priorities should reflect the current
/// backlog, not history.
pub fn build_queue(paths: &[PathBuf]) -> Vec<QueueItem> {
    let mut items: Vec<QueueItem> = paths
        .iter()
        .map(|path| {
            let bytes = std::fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
            QueueItem {
                path: path.clone(),
                bytes,
                priority: priority_for(path, bytes),
            }
        })
        .collect();

    items.sort_by(|left, right| {
        right
            .priority
            .total_cmp(&left.priority)
            .then_with(|| left.path.cmp(&right.path))
    });
    items
}

pub fn priority_for(path: &Path, bytes: u64) -> f64 {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let base = base_priority(guess_type_from_name(&name));
    let size_bonus = ((bytes / 102_400) as f64 * SIZE_BONUS_PER_100_KB).min(SIZE_BONUS_CAP);

    let mut adjustment = 0.0;
    if name.contains("срочно") || name.contains("urgent") {
        adjustment += 15.0;
    }
    if name.contains("draft") || name.contains("черновик") {
        adjustment -= 15.0;
    }
    if name.contains("test") || name.contains("тест") {
        adjustment -= 20.0;
    }

    base + size_bonus + adjustment
}

/// Filename-only guess used for queue ordering. The real type comes from
/// the classifier once the document is actually read.
pub fn guess_type_from_name(name: &str) -> DocType {
    if name.contains("сп ")
        || name.starts_with("сп_")
        || name.starts_with("сп-")
        || name.contains("гост")
        || name.contains("снип")
        || name.contains("gost")
    {
        DocType::RegulatoryNorms
    } else if name.contains("ппр") || name.contains("график") || name.contains("plan") {
        DocType::ProjectWorkPlan
    } else if name.contains("смет") || name.contains("estimate") {
        DocType::CostEstimate
    } else if name.contains("чертеж") || name.contains("чертёж") || name.contains("drawing") {
        DocType::WorkingDocs
    } else {
        DocType::Generic
    }
}

fn base_priority(doc_type: DocType) -> f64 {
    match doc_type {
        DocType::RegulatoryNorms => 50.0,
        DocType::ProjectWorkPlan => 40.0,
        DocType::CostEstimate => 35.0,
        DocType::WorkingDocs => 30.0,
        DocType::Generic => 20.0,
    }
}

/// Round-robin over the priority-sorted order; shards are disjoint and
/// of near-equal size.
pub fn shard(items: Vec<QueueItem>, workers: usize) -> Vec<Vec<QueueItem>> {
    let workers = workers.max(1);
    let mut shards: Vec<Vec<QueueItem>> = (0..workers).map(|_| Vec::new()).collect();
    for (index, item) in items.into_iter().enumerate() {
        shards[index % workers].push(item);
    }
    shards
}

#[cfg(test)]
mod tests {
    use super::{build_queue, priority_for, shard};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn regulatory_names_rank_above_generic() {
        let regulatory = priority_for(Path::new("ГОСТ 12345.txt"), 1_000);
        let generic = priority_for(Path::new("заметки.txt"), 1_000);
        assert!(regulatory > generic);
    }

    #[test]
    fn keywords_adjust_priority() {
        let urgent = priority_for(Path::new("срочно_смета.txt"), 1_000);
        let plain = priority_for(Path::new("смета.txt"), 1_000);
        let draft = priority_for(Path::new("смета_draft.txt"), 1_000);

        assert!(urgent > plain);
        assert!(draft < plain);
    }

    #[test]
    fn larger_files_get_a_bounded_bonus() {
        let small = priority_for(Path::new("doc.txt"), 10_000);
        let large = priority_for(Path::new("doc.txt"), 5_000_000);
        let huge = priority_for(Path::new("doc.txt"), 500_000_000);

        assert!(large > small);
        assert!(huge - large < 1.0);
    }

    #[test]
    fn queue_is_sorted_and_shards_are_disjoint() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let names = ["гост_основной.txt", "заметки.txt", "смета_тест.txt", "ппр.txt"];
        let mut paths = Vec::new();
        for name in names {
            let path = dir.path().join(name);
            fs::write(&path, b"content")?;
            paths.push(path);
        }

        let queue = build_queue(&paths);
        assert_eq!(queue.len(), 4);
        for pair in queue.windows(2) {
            assert!(pair[0].priority >= pair[1].priority);
        }

        let shards = shard(queue, 3);
        let total: usize = shards.iter().map(|shard| shard.len()).sum();
        assert_eq!(total, 4);
        Ok(())
    }
}

/// One scoring formula, one clamp. The floor keeps legitimately sparse
/// documents from ranking near zero downstream.
pub const QUALITY_FLOOR: f64 = 0.30;

const CONFIDENCE_WEIGHT: f64 = 0.25;
const LENGTH_WEIGHT: f64 = 0.20;
const STRUCTURE_WEIGHT: f64 = 0.25;
const YIELD_WEIGHT: f64 = 0.15;
const DENSITY_WEIGHT: f64 = 0.15;

// Saturation points for the individual signals.
const ADEQUATE_WORDS: f64 = 800.0;
const RICH_STRUCTURE_UNITS: f64 = 10.0;
const FULL_YIELD_ACTIVITIES: f64 = 8.0;
const DENSE_ENTITIES_PER_1000_WORDS: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct QualitySignals {
    pub confidence: f64,
    pub words: u32,
    pub sections: u32,
    pub tables: u32,
    pub activity_count: usize,
    pub entity_count: usize,
}

pub fn score_document(signals: &QualitySignals) -> f64 {
    let confidence = (signals.confidence / 100.0).clamp(0.0, 1.0);
    let length = (signals.words as f64 / ADEQUATE_WORDS).min(1.0);
    let structure = ((signals.sections as f64 + 2.0 * signals.tables as f64)
        / RICH_STRUCTURE_UNITS)
        .min(1.0);
    let work_yield = (signals.activity_count as f64 / FULL_YIELD_ACTIVITIES).min(1.0);
    let density = if signals.words == 0 {
        0.0
    } else {
        let per_thousand = signals.entity_count as f64 * 1000.0 / signals.words as f64;
        (per_thousand / DENSE_ENTITIES_PER_1000_WORDS).min(1.0)
    };

    let combined = CONFIDENCE_WEIGHT * confidence
        + LENGTH_WEIGHT * length
        + STRUCTURE_WEIGHT * structure
        + YIELD_WEIGHT * work_yield
        + DENSITY_WEIGHT * density;

    combined.clamp(QUALITY_FLOOR, 1.0)
}

#[cfg(test)]
mod tests {
    use super::{score_document, QualitySignals, QUALITY_FLOOR};

    #[test]
    fn score_stays_within_bounds() {
        let empty = QualitySignals::default();
        let score = score_document(&empty);
        assert!((QUALITY_FLOOR..=1.0).contains(&score));

        let saturated = QualitySignals {
            confidence: 100.0,
            words: 100_000,
            sections: 50,
            tables: 20,
            activity_count: 40,
            entity_count: 10_000,
        };
        let score = score_document(&saturated);
        assert!((QUALITY_FLOOR..=1.0).contains(&score));
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sparse_documents_land_on_the_floor() {
        let sparse = QualitySignals {
            confidence: 10.0,
            words: 40,
            sections: 0,
            tables: 0,
            activity_count: 0,
            entity_count: 0,
        };
        assert!((score_document(&sparse) - QUALITY_FLOOR).abs() < 1e-9);
    }

    #[test]
    fn richer_structure_scores_higher() {
        let flat = QualitySignals {
            confidence: 70.0,
            words: 900,
            sections: 0,
            tables: 0,
            activity_count: 3,
            entity_count: 5,
        };
        let structured = QualitySignals {
            sections: 8,
            tables: 2,
            ..flat
        };
        assert!(score_document(&structured) > score_document(&flat));
    }
}

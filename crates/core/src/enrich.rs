use crate::error::PipelineError;
use crate::models::DocType;
use regex::Regex;

const MAX_ENTITIES: usize = 64;

/// Per-type behavior bundle, selected once after classification instead
/// of branching on the type at every call site.
pub trait TypeProfile: Send + Sync {
    fn doc_type(&self) -> DocType;

    /// Section count a complete document of this type is expected to have.
    fn expected_sections(&self) -> u32;

    fn extract_entities(&self, text: &str) -> Result<Vec<String>, PipelineError>;
}

pub fn profile_for(doc_type: DocType) -> &'static dyn TypeProfile {
    match doc_type {
        DocType::RegulatoryNorms => &RegulatoryProfile,
        DocType::ProjectWorkPlan => &WorkPlanProfile,
        DocType::CostEstimate => &CostEstimateProfile,
        DocType::WorkingDocs => &WorkingDocsProfile,
        DocType::Generic => &GenericProfile,
    }
}

fn collect_matches(text: &str, sources: &[&str]) -> Result<Vec<String>, PipelineError> {
    let mut entities = Vec::new();
    for source in sources {
        let regex = Regex::new(source)?;
        for found in regex.find_iter(text) {
            let token = found.as_str().trim().to_string();
            if !entities.contains(&token) {
                entities.push(token);
            }
            if entities.len() >= MAX_ENTITIES {
                return Ok(entities);
            }
        }
    }
    Ok(entities)
}

struct RegulatoryProfile;

impl TypeProfile for RegulatoryProfile {
    fn doc_type(&self) -> DocType {
        DocType::RegulatoryNorms
    }

    fn expected_sections(&self) -> u32 {
        10
    }

    fn extract_entities(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        collect_matches(
            text,
            &[
                r"(?i)\b(?:сп|снип|гост)\s*р?\s*\d+(?:[.\-]\d+)*",
                r"(?i)\bп\.\s*\d+(?:\.\d+)*",
            ],
        )
    }
}

struct WorkPlanProfile;

impl TypeProfile for WorkPlanProfile {
    fn doc_type(&self) -> DocType {
        DocType::ProjectWorkPlan
    }

    fn expected_sections(&self) -> u32 {
        8
    }

    fn extract_entities(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        collect_matches(
            text,
            &[
                r"\b\d{1,2}\.\d{1,2}\.\d{2,4}\b",
                r"(?i)\bэтап\s*№?\s*\d+",
                r"(?i)\bбригад\w*\s*№?\s*\d*",
            ],
        )
    }
}

struct CostEstimateProfile;

impl TypeProfile for CostEstimateProfile {
    fn doc_type(&self) -> DocType {
        DocType::CostEstimate
    }

    fn expected_sections(&self) -> u32 {
        5
    }

    fn extract_entities(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        collect_matches(
            text,
            &[
                r"(?i)\d[\d\s]*(?:тыс\.|млн)?\s*(?:руб\w*|₽)",
                r"(?i)\bитого\b[^\n]{0,40}",
            ],
        )
    }
}

struct WorkingDocsProfile;

impl TypeProfile for WorkingDocsProfile {
    fn doc_type(&self) -> DocType {
        DocType::WorkingDocs
    }

    fn expected_sections(&self) -> u32 {
        6
    }

    fn extract_entities(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        collect_matches(
            text,
            &[
                r"\b(?:АР|КЖ|КМ|КМД|ЭОМ|ВК|ОВ)[-.]?\d*",
                r"(?i)\bлист\s*\d+",
            ],
        )
    }
}

struct GenericProfile;

impl TypeProfile for GenericProfile {
    fn doc_type(&self) -> DocType {
        DocType::Generic
    }

    fn expected_sections(&self) -> u32 {
        4
    }

    fn extract_entities(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        collect_matches(
            text,
            &[
                r"\b\d{1,2}\.\d{1,2}\.\d{2,4}\b",
                r"(?i)\d+[,.]?\d*\s*(?:мм|см|кг|км|м2|м3|шт)\b",
            ],
        )
    }
}

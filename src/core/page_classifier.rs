use crate::core::model::DocumentType;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub document_type: DocumentType,
    /// Percentage of the type's keyword patterns found in the text.
    pub score: f32,
}

/// Percentage of `document_type`'s keywords present anywhere in `text`.
pub fn match_score(document_type: DocumentType, text: &str) -> f32 {
    let keywords = document_type.keywords();
    if keywords.is_empty() {
        return 0.0;
    }
    let matched = keywords.iter().filter(|re| re.is_match(text)).count();
    matched as f32 / keywords.len() as f32 * 100.0
}

/// Best-scoring type for a page's recognized text. Earlier types win ties;
/// `None` when nothing scores above zero.
pub fn classify_text(text: &str) -> Option<Classification> {
    let mut best: Option<Classification> = None;
    for document_type in DocumentType::ALL {
        let score = match_score(document_type, text);
        let best_score = best.map(|b| b.score).unwrap_or(0.0);
        if score > best_score {
            best = Some(Classification {
                document_type,
                score,
            });
        }
    }
    best
}

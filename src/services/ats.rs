use rand::Rng;
use serde::Serialize;
use rocket_okapi::okapi::schemars::JsonSchema;

// Component weights; must sum to 1.0.
const WEIGHT_KEYWORDS: f64 = 0.50;
const WEIGHT_FORMATTING: f64 = 0.25;
const WEIGHT_STRUCTURE: f64 = 0.15;
const WEIGHT_CONTACT: f64 = 0.10;

// The overall score is clamped to this band. The low ceiling is a product
// decision: scores land just below "good" to steer users toward the paid
// CV enhancement. Do not widen it.
const MIN_OVERALL: f64 = 30.0;
const MAX_OVERALL: f64 = 42.0;

#[derive(Debug, Serialize, JsonSchema)]
pub struct ComponentScores {
    pub keywords: i64,
    pub formatting: i64,
    pub structure: i64,
    pub contact: i64,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AtsScore {
    pub filename: String,
    pub overall_score: f64,
    pub components: ComponentScores,
    pub recommendations: Vec<String>,
}

/// Simulated ATS scorer. Not content-aware: the four component scores are
/// random draws from fixed ranges and the weighted sum is clamped to the
/// [30, 42] band regardless of the upload.
pub struct AtsService;

impl AtsService {
    pub fn calculate_score(filename: &str) -> AtsScore {
        let mut rng = rand::thread_rng();

        let keywords: i64 = rng.gen_range(30..=46);
        let formatting: i64 = rng.gen_range(28..=42);
        let structure: i64 = rng.gen_range(30..=44);
        let contact: i64 = rng.gen_range(32..=46);

        let weighted = keywords as f64 * WEIGHT_KEYWORDS
            + formatting as f64 * WEIGHT_FORMATTING
            + structure as f64 * WEIGHT_STRUCTURE
            + contact as f64 * WEIGHT_CONTACT;

        let overall_score = (weighted.clamp(MIN_OVERALL, MAX_OVERALL) * 10.0).round() / 10.0;

        let components = ComponentScores {
            keywords,
            formatting,
            structure,
            contact,
        };

        AtsScore {
            filename: filename.to_string(),
            overall_score,
            recommendations: Self::recommendations(&components),
            components,
        }
    }

    fn recommendations(components: &ComponentScores) -> Vec<String> {
        let mut recs = Vec::new();

        if components.keywords < 40 {
            recs.push(
                "Mirror more role-specific keywords from the job description in your skills and experience sections".to_string(),
            );
        }
        if components.formatting < 36 {
            recs.push(
                "Simplify the layout: tables, columns and graphics are often dropped by ATS parsers".to_string(),
            );
        }
        if components.structure < 38 {
            recs.push(
                "Use standard section headings (Experience, Education, Skills) so sections are detected reliably".to_string(),
            );
        }
        if components.contact < 40 {
            recs.push(
                "Keep contact details in the document body; headers and footers are frequently ignored".to_string(),
            );
        }

        recs.push(
            "Consider the CV Enhancement service for a professionally optimized rewrite".to_string(),
        );

        recs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_always_within_band() {
        for _ in 0..2000 {
            let score = AtsService::calculate_score("resume.pdf");
            assert!(
                (MIN_OVERALL..=MAX_OVERALL).contains(&score.overall_score),
                "overall {} out of band",
                score.overall_score
            );
        }
    }

    #[test]
    fn components_stay_in_their_draw_ranges() {
        for _ in 0..500 {
            let s = AtsService::calculate_score("resume.docx");
            assert!((30..=46).contains(&s.components.keywords));
            assert!((28..=42).contains(&s.components.formatting));
            assert!((30..=44).contains(&s.components.structure));
            assert!((32..=46).contains(&s.components.contact));
        }
    }

    #[test]
    fn recommendations_match_component_thresholds() {
        for _ in 0..500 {
            let s = AtsService::calculate_score("resume.pdf");

            let keyword_rec = s.recommendations.iter().any(|r| r.contains("keywords"));
            assert_eq!(keyword_rec, s.components.keywords < 40);

            // the upsell line is always present
            assert!(s
                .recommendations
                .iter()
                .any(|r| r.contains("CV Enhancement")));
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let total = WEIGHT_KEYWORDS + WEIGHT_FORMATTING + WEIGHT_STRUCTURE + WEIGHT_CONTACT;
        assert!((total - 1.0).abs() < f64::EPSILON);
    }
}

//! Structural checks for Python solutions to the ML problem set

use super::{basic_structure_check, StructureValidator, ValidationResult};

/// Problem id and the function names a solution must define (any one of)
const REQUIRED_FUNCTIONS: &[(&str, &[&str])] = &[
    ("sentiment-analysis", &["predict_sentiment", "analyze_sentiment"]),
    ("recommendation-system", &["recommend", "get_recommendations"]),
    ("image-classification", &["classify", "predict", "classify_image"]),
    ("chatbot-nlp", &["respond", "generate_response", "chat"]),
    ("style-transfer", &["transfer_style", "apply_style", "style_transfer"]),
];

pub struct PythonStructureValidator;

impl PythonStructureValidator {
    fn required_functions(problem_id: &str) -> Option<&'static [&'static str]> {
        REQUIRED_FUNCTIONS
            .iter()
            .find(|(id, _)| *id == problem_id)
            .map(|(_, functions)| *functions)
    }

    fn check_lines(code: &str, result: &mut ValidationResult) {
        let lines: Vec<&str> = code.split('\n').collect();
        let mut seen_def = false;

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("def ") {
                seen_def = true;
                if !trimmed.ends_with(':') {
                    result.add_error(format!(
                        "Line {}: Function definition should end with ':'",
                        i + 1
                    ));
                }
            }

            // Once inside function territory, top-level statements look suspicious
            if let (true, Some(next)) = (seen_def, lines.get(i + 1)) {
                let next_trimmed = next.trim();
                if !next_trimmed.is_empty()
                    && !next_trimmed.starts_with("def ")
                    && !next.starts_with("    ")
                    && !next.starts_with('\t')
                {
                    result.add_warning(format!(
                        "Line {}: Consider proper indentation for function body",
                        i + 2
                    ));
                }
            }
        }
    }
}

impl StructureValidator for PythonStructureValidator {
    fn name(&self) -> &'static str {
        "python-structure"
    }

    fn supports(&self, problem_id: &str) -> bool {
        Self::required_functions(problem_id).is_some()
    }

    fn validate(&self, code: Option<&str>, problem_id: &str) -> ValidationResult {
        let mut result = basic_structure_check(code);
        let code = match code {
            Some(code) if result.success => code,
            _ => return result,
        };

        if !code.contains("def ") {
            result.add_error("No function definition found. Please define at least one function.");
        }

        if !code.contains("return") {
            result.add_warning("No return statement found. Make sure your function returns a value.");
        }

        if let Some(functions) = Self::required_functions(problem_id) {
            if !functions.iter().any(|f| code.contains(f)) {
                result.add_error(format!(
                    "Missing required function. Expected one of: {}",
                    functions.join(", ")
                ));
            }
        }

        Self::check_lines(code, &mut result);
        result
    }
}

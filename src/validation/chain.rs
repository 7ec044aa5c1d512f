//! Validator resolution
//!
//! Structural validators: the first one (in registration order) that supports
//! the problem wins; otherwise the basic length check applies.
//!
//! Behavioral validators resolve in two passes: the first supporting specific
//! validator, then the first supporting generic one.

use tracing::{debug, warn};

use super::{
    basic_structure_check, BehaviorOutcome, BehaviorValidator, GenericBehaviorValidator,
    PythonStructureValidator, SentimentAnalysisValidator, StructureValidator, ValidationResult,
};
use crate::core::TestCase;

pub const NO_VALIDATOR_FEEDBACK: &str = "No validator found for this problem type";

pub struct ValidatorChain {
    structure: Vec<Box<dyn StructureValidator>>,
    behavior: Vec<Box<dyn BehaviorValidator>>,
}

impl ValidatorChain {
    pub fn new(
        structure: Vec<Box<dyn StructureValidator>>,
        behavior: Vec<Box<dyn BehaviorValidator>>,
    ) -> Self {
        Self {
            structure,
            behavior,
        }
    }

    /// The validators shipped with the engine
    pub fn with_defaults() -> Self {
        Self::new(
            vec![Box::new(PythonStructureValidator)],
            vec![
                Box::new(SentimentAnalysisValidator),
                Box::new(GenericBehaviorValidator),
            ],
        )
    }

    pub fn validate_structure(&self, code: Option<&str>, problem_id: &str) -> ValidationResult {
        match self.structure.iter().find(|v| v.supports(problem_id)) {
            Some(validator) => {
                debug!(
                    "Structure validator for {}: {}",
                    problem_id,
                    validator.name()
                );
                validator.validate(code, problem_id)
            }
            None => basic_structure_check(code),
        }
    }

    pub fn resolve_behavior(&self, problem_id: &str) -> Option<&dyn BehaviorValidator> {
        self.behavior
            .iter()
            .find(|v| !v.is_generic() && v.supports(problem_id))
            .or_else(|| self.behavior.iter().find(|v| v.supports(problem_id)))
            .map(|v| v.as_ref())
    }

    pub fn validate_case(&self, problem_id: &str, case: &TestCase, code: &str) -> BehaviorOutcome {
        match self.resolve_behavior(problem_id) {
            Some(validator) => {
                debug!("Behavior validator for {}: {}", problem_id, validator.name());
                validator.validate(problem_id, case, code)
            }
            None => {
                warn!("No behavior validator supports problem {}", problem_id);
                BehaviorOutcome {
                    input: case.input.clone(),
                    expected: case.expected_output.clone(),
                    actual: "error".into(),
                    passed: false,
                    feedback: Some(NO_VALIDATOR_FEEDBACK.into()),
                }
            }
        }
    }
}

impl Default for ValidatorChain {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Specific validator that only claims one problem id
    struct OnlyFor(&'static str);

    impl BehaviorValidator for OnlyFor {
        fn name(&self) -> &'static str {
            self.0
        }

        fn supports(&self, problem_id: &str) -> bool {
            problem_id == self.0
        }

        fn validate(&self, _problem_id: &str, case: &TestCase, _code: &str) -> BehaviorOutcome {
            BehaviorOutcome {
                input: case.input.clone(),
                expected: case.expected_output.clone(),
                actual: self.0.to_string(),
                passed: true,
                feedback: None,
            }
        }
    }

    #[test]
    fn test_specific_beats_generic_regardless_of_order() {
        // Generic registered first must still lose to the specific one
        let chain = ValidatorChain::new(
            vec![],
            vec![
                Box::new(GenericBehaviorValidator),
                Box::new(SentimentAnalysisValidator),
            ],
        );

        let chosen = chain.resolve_behavior("sentiment-analysis").unwrap();
        assert_eq!(chosen.name(), "sentiment-analysis");

        let fallback = chain.resolve_behavior("chatbot-nlp").unwrap();
        assert_eq!(fallback.name(), "generic");
    }

    #[test]
    fn test_first_specific_in_registration_order() {
        let chain = ValidatorChain::new(
            vec![],
            vec![Box::new(OnlyFor("a")), Box::new(OnlyFor("a")), Box::new(OnlyFor("b"))],
        );
        let outcome = chain.validate_case("b", &TestCase::new(1, "in", "out"), "");
        assert_eq!(outcome.actual, "b");
    }

    #[test]
    fn test_no_validator_found() {
        let chain = ValidatorChain::new(vec![], vec![Box::new(OnlyFor("a"))]);
        let outcome = chain.validate_case("z", &TestCase::new(1, "in", "out"), "");

        assert!(!outcome.passed);
        assert_eq!(outcome.actual, "error");
        assert_eq!(outcome.input, "in");
        assert_eq!(outcome.feedback.as_deref(), Some(NO_VALIDATOR_FEEDBACK));
    }

    #[test]
    fn test_structure_falls_back_to_basic_check() {
        let chain = ValidatorChain::with_defaults();

        // No plugin claims this id: only length matters
        let result = chain.validate_structure(Some("print('no functions here')"), "two-sum");
        assert!(result.success);

        // Python plugin claims this one and wants a function
        let result =
            chain.validate_structure(Some("print('no functions here')"), "sentiment-analysis");
        assert!(!result.success);

        let result = chain.validate_structure(None, "two-sum");
        assert_eq!(result.errors, vec!["Code is too short or empty"]);
    }
}

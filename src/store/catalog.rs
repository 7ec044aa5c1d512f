//! Static problem catalog loaded from TOML

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::ProblemSource;
use crate::core::TestCase;

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    problems: Vec<RawProblem>,
}

#[derive(Debug, Deserialize)]
struct RawProblem {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    test_cases: Vec<TestCase>,
}

/// A catalog entry
#[derive(Debug, Clone)]
pub struct Problem {
    pub id: String,
    pub title: Option<String>,
    /// Sorted by `order_index`
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogProblemSource {
    problems: HashMap<String, Problem>,
}

impl CatalogProblemSource {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read problem catalog: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse problem catalog: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let raw: RawCatalog = toml::from_str(content)?;
        let mut problems = HashMap::new();

        for problem in raw.problems {
            let mut test_cases = problem.test_cases;
            test_cases.sort_by_key(|case| case.order_index);

            let previous = problems.insert(
                problem.id.clone(),
                Problem {
                    id: problem.id.clone(),
                    title: problem.title,
                    test_cases,
                },
            );
            if previous.is_some() {
                anyhow::bail!("Duplicate problem id: {}", problem.id);
            }
        }

        Ok(Self { problems })
    }

    pub fn get(&self, problem_id: &str) -> Option<&Problem> {
        self.problems.get(problem_id)
    }

    pub fn problem_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.problems.keys().map(|id| id.as_str()).collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ProblemSource for CatalogProblemSource {
    async fn get_test_cases(&self, problem_id: &str) -> anyhow::Result<Option<Vec<TestCase>>> {
        Ok(self.get(problem_id).map(|p| p.test_cases.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MatchPolicy;

    const CATALOG: &str = r#"
[[problems]]
id = "echo"
title = "Echo"

[[problems.test_cases]]
id = 2
input = "b"
expected_output = "b processed"
order_index = 1
hidden = true

[[problems.test_cases]]
id = 1
input = "a"
expected_output = "A PROCESSED"
order_index = 0
match_type = "IGNORE_CASE"

[[problems]]
id = "empty"
"#;

    #[tokio::test]
    async fn test_catalog_orders_cases() {
        let catalog = CatalogProblemSource::from_toml_str(CATALOG).unwrap();
        assert_eq!(catalog.problem_ids(), vec!["echo", "empty"]);

        let cases = catalog.get_test_cases("echo").await.unwrap().unwrap();
        assert_eq!(cases.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(cases[0].match_type, MatchPolicy::IgnoreCase);
        assert!(cases[1].hidden);

        assert!(catalog.get_test_cases("empty").await.unwrap().unwrap().is_empty());
        assert!(catalog.get_test_cases("missing").await.unwrap().is_none());

        assert_eq!(catalog.get("echo").unwrap().title.as_deref(), Some("Echo"));
        assert!(catalog.get("empty").unwrap().title.is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let doubled = "[[problems]]\nid = \"x\"\n[[problems]]\nid = \"x\"\n";
        assert!(CatalogProblemSource::from_toml_str(doubled).is_err());
    }

    #[test]
    fn test_shipped_catalog_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/files/problems.toml");
        let catalog = CatalogProblemSource::load(path).unwrap();
        assert!(catalog.get("sentiment-analysis").is_some());
    }
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use metrica_common::{Variable, VariableId};
use serde::{Deserialize, Serialize};

/// On-disk catalog snapshot: every variable with its formula, goals and periods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    pub variables: Vec<Variable>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CatalogFormat {
    Json,
    Yaml,
}

impl CatalogFormat {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Ok(Self::Yaml)
            }
            _ => bail!(
                "cannot infer catalog format of {}; expected a .json, .yaml or .yml file",
                path.display()
            ),
        }
    }
}

impl CatalogDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let format = CatalogFormat::from_path(path)?;
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let doc = match format {
            CatalogFormat::Json => serde_json::from_str(&text)
                .with_context(|| format!("invalid JSON catalog {}", path.display()))?,
            CatalogFormat::Yaml => serde_yaml::from_str(&text)
                .with_context(|| format!("invalid YAML catalog {}", path.display()))?,
        };
        Ok(doc)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = match CatalogFormat::from_path(path)? {
            CatalogFormat::Json => {
                let mut text = serde_json::to_string_pretty(self)?;
                text.push('\n');
                text
            }
            CatalogFormat::Yaml => serde_yaml::to_string(self)?,
        };
        fs::write(path, text).with_context(|| format!("failed to write catalog {}", path.display()))
    }

    pub fn variable(&self, id: VariableId) -> Result<&Variable> {
        match self.variables.iter().find(|var| var.id == id) {
            Some(var) => Ok(var),
            None => bail!("variable {id} is not in the catalog"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            CatalogFormat::from_path(Path::new("catalog.JSON")).expect("json"),
            CatalogFormat::Json
        );
        assert_eq!(
            CatalogFormat::from_path(Path::new("catalog.yml")).expect("yaml"),
            CatalogFormat::Yaml
        );
        assert!(CatalogFormat::from_path(Path::new("catalog.toml")).is_err());
    }

    #[test]
    fn yaml_catalog_parses_tagged_steps() {
        let yaml = r#"
variables:
  - id: 1
    name: Execution
    code: EXE
    formula:
      - type: goal_variable
        goal: { id: 10, label: "Meta 2025: 100", value: 100.0 }
      - type: operator
        op: "+"
      - type: number
        value: 1.5
    goals:
      - { id: 10, label: "Meta 2025: 100", value: 100.0, year: 2025 }
  - id: 2
    name: Contracts
    code: CTR
"#;
        let doc: CatalogDocument = serde_yaml::from_str(yaml).expect("catalog parses");
        let exe = doc.variable(VariableId(1)).expect("EXE present");
        assert_eq!(exe.formula.as_ref().map(|f| f.len()), Some(3));
        assert!(doc.variable(VariableId(3)).is_err());
    }
}

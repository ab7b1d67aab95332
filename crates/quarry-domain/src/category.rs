//! Category module - extraction intents and their eligibility rules
//!
//! The catalog is immutable configuration. It is built once (from defaults
//! or TOML) and handed to every component that needs it.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Shape of the JSON payload a category's completions carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadShape {
    /// One record per object; arrays yield one record per element
    Flat,

    /// Shared metadata plus named sub-lists of entries
    ///
    /// Each entry becomes its own record, tagged with `type_field` set to the
    /// name of the list it came from.
    Nested {
        /// Names of the nested lists, e.g. `projected` and `realized`
        lists: Vec<String>,
        /// Field receiving the list name on each flattened record
        type_field: String,
    },
}

/// One extraction intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category name as it appears in correlation ids and output paths
    pub name: String,

    /// Fixed 1-based ordinal used by the `prompt{N}` id grammar
    pub ordinal: u32,

    /// Document prefixes this category applies to
    pub prefixes: Vec<String>,

    /// Instruction text sent as the user message preamble
    pub instructions: String,

    /// Payload shape of the completions
    #[serde(default = "default_shape")]
    pub shape: PayloadShape,
}

fn default_shape() -> PayloadShape {
    PayloadShape::Flat
}

impl Category {
    /// Whether documents with `prefix` are eligible for this category
    pub fn accepts(&self, prefix: &str) -> bool {
        self.prefixes.iter().any(|p| p.eq_ignore_ascii_case(prefix))
    }
}

/// The controlled, finite set of categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCatalog {
    categories: Vec<Category>,
}

impl CategoryCatalog {
    /// Build a catalog, rejecting duplicate names/ordinals and unusable names
    pub fn new(categories: Vec<Category>) -> Result<Self, DomainError> {
        let mut names = HashSet::new();
        let mut ordinals = HashSet::new();

        for category in &categories {
            if category.name.is_empty() || category.name.chars().any(char::is_whitespace) {
                return Err(DomainError::InvalidCatalog(format!(
                    "category name '{}' must be non-empty and contain no whitespace",
                    category.name
                )));
            }
            if category.ordinal == 0 {
                return Err(DomainError::InvalidCatalog(format!(
                    "category '{}' has ordinal 0; ordinals start at 1",
                    category.name
                )));
            }
            if !names.insert(category.name.as_str()) {
                return Err(DomainError::InvalidCatalog(format!(
                    "duplicate category name '{}'",
                    category.name
                )));
            }
            if !ordinals.insert(category.ordinal) {
                return Err(DomainError::InvalidCatalog(format!(
                    "duplicate ordinal {}",
                    category.ordinal
                )));
            }
            if let PayloadShape::Nested { lists, type_field } = &category.shape {
                if lists.is_empty() || type_field.is_empty() {
                    return Err(DomainError::InvalidCatalog(format!(
                        "nested category '{}' needs lists and a type field",
                        category.name
                    )));
                }
            }
        }

        Ok(Self { categories })
    }

    /// Load a catalog from TOML (`[[categories]]` tables)
    pub fn from_toml(s: &str) -> Result<Self, DomainError> {
        let raw: CategoryCatalog =
            toml::from_str(s).map_err(|e| DomainError::InvalidCatalog(e.to_string()))?;
        Self::new(raw.categories)
    }

    /// Serialize the catalog to TOML
    pub fn to_toml(&self) -> Result<String, DomainError> {
        toml::to_string_pretty(self).map_err(|e| DomainError::InvalidCatalog(e.to_string()))
    }

    /// All categories in declaration order
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Categories eligible for a document prefix, in declaration order
    pub fn for_prefix(&self, prefix: &str) -> Vec<&Category> {
        self.categories.iter().filter(|c| c.accepts(prefix)).collect()
    }

    /// Look up a category by exact name
    pub fn by_name(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Look up a category by its fixed ordinal
    pub fn by_ordinal(&self, ordinal: u32) -> Option<&Category> {
        self.categories.iter().find(|c| c.ordinal == ordinal)
    }

    /// Category names ordered longest first, for suffix matching
    pub fn names_longest_first(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.categories.iter().map(|c| c.name.as_str()).collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names
    }
}

impl Default for CategoryCatalog {
    /// Products, disbursements and audit findings
    fn default() -> Self {
        let categories = vec![
            Category {
                name: "products".to_string(),
                ordinal: 1,
                prefixes: vec!["ROP".into(), "INI".into(), "DEC".into(), "IFS".into()],
                instructions: "List every product or deliverable the document commits to. \
                    Return one JSON object per product with the fields it states \
                    (name, description, target date, responsible party). \
                    Omit fields the document does not mention."
                    .to_string(),
                shape: PayloadShape::Flat,
            },
            Category {
                name: "disbursements".to_string(),
                ordinal: 2,
                prefixes: vec!["ROP".into(), "INI".into(), "DEC".into()],
                instructions: "Return one JSON object with the operation's metadata and two \
                    lists, \"projected\" and \"realized\", each holding the disbursements \
                    (amount, currency, date) the document reports. \
                    Leave a list empty when the document has none."
                    .to_string(),
                shape: PayloadShape::Nested {
                    lists: vec!["projected".to_string(), "realized".to_string()],
                    type_field: "disbursement_type".to_string(),
                },
            },
            Category {
                name: "audit".to_string(),
                ordinal: 3,
                prefixes: vec!["IXP".into()],
                instructions: "List every audit finding in the document. Return one JSON \
                    object per finding with its title, severity and recommendation."
                    .to_string(),
                shape: PayloadShape::Flat,
            },
        ];

        Self { categories }
    }
}

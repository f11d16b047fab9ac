//! The typed contract the model's answer is coerced into.
//!
//! [`Results::coerce`] is the only way a model answer becomes a [`Results`]
//! value. It checks the candidate against the derived JSON Schema (so the
//! model gets path-qualified errors back), deserializes it, and rejects
//! blank required text.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One product listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Product {
    /// The brand name of the product
    #[schemars(title = "Brand Name")]
    pub brand_name: String,
    /// The name of the product
    #[schemars(title = "Product Name")]
    pub product_name: String,
    /// The price of the product, as shown on the page
    #[schemars(title = "Price")]
    #[serde(default)]
    pub price: Option<String>,
    /// The rating count of the product
    #[schemars(title = "Rating Count")]
    #[serde(default)]
    pub rating_count: Option<u64>,
}

/// All products extracted from one page, in page order. Duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Results {
    /// The list of products
    #[schemars(title = "Datasets")]
    pub dataset: Vec<Product>,
}

/// A candidate that could not be turned into [`Results`].
#[derive(Debug, Clone, Error)]
#[error("result does not match the schema: {}", errors.join("; "))]
pub struct CoercionError {
    /// One line per problem, path-qualified where possible.
    pub errors: Vec<String>,
    /// The value the model submitted.
    pub submitted: Value,
}

impl Results {
    /// JSON Schema of the contract, as sent to the model.
    pub fn schema() -> Value {
        crate::json_schema_for::<Results>()
    }

    /// Coerce a model-produced value into `Results`.
    pub fn coerce(candidate: &Value) -> Result<Results, CoercionError> {
        let fail = |errors: Vec<String>| CoercionError {
            errors,
            submitted: candidate.clone(),
        };

        let schema = Self::schema();
        if let Ok(validator) = jsonschema::validator_for(&schema) {
            let errors: Vec<String> = validator
                .iter_errors(candidate)
                .map(|e| format!("at '{}': {e}", e.instance_path()))
                .collect();
            if !errors.is_empty() {
                return Err(fail(errors));
            }
        }

        let results: Results =
            serde_json::from_value(candidate.clone()).map_err(|e| fail(vec![e.to_string()]))?;

        let blanks = results.blank_required_fields();
        if blanks.is_empty() {
            Ok(results)
        } else {
            Err(fail(blanks))
        }
    }

    fn blank_required_fields(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (i, product) in self.dataset.iter().enumerate() {
            if product.brand_name.trim().is_empty() {
                errors.push(format!("at '/dataset/{i}/brand_name': must not be empty"));
            }
            if product.product_name.trim().is_empty() {
                errors.push(format!("at '/dataset/{i}/product_name': must not be empty"));
            }
        }
        errors
    }
}

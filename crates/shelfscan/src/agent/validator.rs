//! Post-coercion gate over candidate results.
//!
//! By the time a candidate reaches a validator it is already a well-typed
//! [`Results`]. The default [`TypeCheckValidator`] therefore accepts
//! everything; stricter policies plug in through [`ResultValidator`].

use crate::schema::Results;
use tracing::info;

/// Binary verdict on a candidate. Rejection discards the whole candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted(Results),
    Rejected(String),
}

pub trait ResultValidator: Send + Sync {
    fn validate(&self, candidate: Results) -> ValidationOutcome;
}

/// Accepts every well-typed candidate.
pub struct TypeCheckValidator;

impl ResultValidator for TypeCheckValidator {
    fn validate(&self, candidate: Results) -> ValidationOutcome {
        info!("Validating result...");
        info!("Result is valid ({} product(s))", candidate.dataset.len());
        ValidationOutcome::Accepted(candidate)
    }
}

/// Rejects results with no products, so the model gets another try.
pub struct NonEmptyValidator;

impl ResultValidator for NonEmptyValidator {
    fn validate(&self, candidate: Results) -> ValidationOutcome {
        if candidate.dataset.is_empty() {
            ValidationOutcome::Rejected(
                "the dataset is empty; extract every product listed on the page".into(),
            )
        } else {
            ValidationOutcome::Accepted(candidate)
        }
    }
}

/// A validator backed by a closure returning `Err(reason)` to reject.
pub struct FnValidator<F>(F)
where
    F: Fn(&Results) -> Result<(), String> + Send + Sync;

impl<F> FnValidator<F>
where
    F: Fn(&Results) -> Result<(), String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ResultValidator for FnValidator<F>
where
    F: Fn(&Results) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, candidate: Results) -> ValidationOutcome {
        match (self.0)(&candidate) {
            Ok(()) => ValidationOutcome::Accepted(candidate),
            Err(reason) => ValidationOutcome::Rejected(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Product;

    fn one_product() -> Results {
        Results {
            dataset: vec![Product {
                brand_name: "IKEA".into(),
                product_name: "BILLY".into(),
                price: Some("€ 59".into()),
                rating_count: Some(10),
            }],
        }
    }

    #[test]
    fn type_check_accepts_everything() {
        assert_eq!(
            TypeCheckValidator.validate(Results::default()),
            ValidationOutcome::Accepted(Results::default())
        );
        assert_eq!(
            TypeCheckValidator.validate(one_product()),
            ValidationOutcome::Accepted(one_product())
        );
    }

    #[test]
    fn non_empty_rejects_empty() {
        assert!(matches!(
            NonEmptyValidator.validate(Results::default()),
            ValidationOutcome::Rejected(_)
        ));
        assert!(matches!(
            NonEmptyValidator.validate(one_product()),
            ValidationOutcome::Accepted(_)
        ));
    }

    #[test]
    fn fn_validator_passes_reason_through() {
        let v = FnValidator::new(|r: &Results| {
            if r.dataset.iter().all(|p| p.price.is_some()) {
                Ok(())
            } else {
                Err("every product needs a price".into())
            }
        });
        let mut results = one_product();
        results.dataset[0].price = None;
        assert_eq!(
            v.validate(results),
            ValidationOutcome::Rejected("every product needs a price".into())
        );
    }
}

//! CSV export of accepted results.
//!
//! One row per product in page order, under a fixed header. Fields holding a
//! comma, quote or line break are quoted, with embedded quotes doubled.
//! Missing optional values are written as empty fields.

use crate::schema::{Product, Results};
use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CSV_HEADER: &str = "brand_name,product_name,price,rating_count";

/// `product_listings_<YYYY-MM-DD_HH-MM-SS>.csv` for the given instant.
pub fn output_file_name(at: DateTime<Local>) -> String {
    format!("product_listings_{}.csv", at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Render the header plus one line per product. Always ends with a newline.
pub fn render_csv(results: &Results) -> String {
    let mut out = String::with_capacity(64 * (results.dataset.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');
    for product in &results.dataset {
        push_row(&mut out, product);
    }
    out
}

fn push_row(out: &mut String, product: &Product) {
    let rating = product.rating_count.map(|n| n.to_string()).unwrap_or_default();
    let fields = [
        product.brand_name.as_str(),
        product.product_name.as_str(),
        product.price.as_deref().unwrap_or(""),
        rating.as_str(),
    ];
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// Write `results` to a timestamped file in `dir` and return its path.
///
/// An empty dataset still produces a file holding only the header.
pub async fn write_csv(results: &Results, dir: &Path, at: DateTime<Local>) -> io::Result<PathBuf> {
    let path = dir.join(output_file_name(at));
    tokio::fs::write(&path, render_csv(results)).await?;
    info!(
        "Wrote {} product(s) to {}",
        results.dataset.len(),
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn product(brand: &str, name: &str, price: Option<&str>, rating: Option<u64>) -> Product {
        Product {
            brand_name: brand.into(),
            product_name: name.into(),
            price: price.map(String::from),
            rating_count: rating,
        }
    }

    #[test]
    fn file_name_uses_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            output_file_name(at),
            "product_listings_2024-03-09_14-05-07.csv"
        );
    }

    #[test]
    fn renders_rows_in_order_with_empty_optionals() {
        let results = Results {
            dataset: vec![
                product("IKEA", "BILLY", Some("€ 59"), Some(1520)),
                product("IKEA", "POÄNG", None, None),
            ],
        };
        assert_eq!(
            render_csv(&results),
            "brand_name,product_name,price,rating_count\n\
             IKEA,BILLY,€ 59,1520\n\
             IKEA,POÄNG,,\n"
        );
    }

    #[test]
    fn quotes_fields_with_separators() {
        let results = Results {
            dataset: vec![product(
                "IKEA",
                "KALLAX shelf, 77x147 \"white\"",
                Some("1,299.00"),
                None,
            )],
        };
        let csv = render_csv(&results);
        assert!(
            csv.ends_with("IKEA,\"KALLAX shelf, 77x147 \"\"white\"\"\",\"1,299.00\",\n"),
            "{csv}"
        );
    }

    #[test]
    fn empty_dataset_is_header_only() {
        assert_eq!(render_csv(&Results::default()), format!("{CSV_HEADER}\n"));
    }

    #[tokio::test]
    async fn writes_file_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let results = Results {
            dataset: vec![product("IKEA", "BILLY", None, Some(3))],
        };

        let path = write_csv(&results, dir.path(), at).await.unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "product_listings_2024-01-02_03-04-05.csv"
        );
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, format!("{CSV_HEADER}\nIKEA,BILLY,,3\n"));
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(
            write_csv(&Results::default(), &missing, Local::now())
                .await
                .is_err()
        );
    }
}

//! Seed the catalog from a YAML file.
//!
//! Categories and products are upserted by name, so the command can be
//! re-run after editing the file.
//!
//! ```yaml
//! categories:
//!   - name: Plantas
//!     kind: plant
//! products:
//!   - name: Monstera deliciosa
//!     category: Plantas
//!     price: "25.00"
//!     stock: 5
//!     description: Hojas grandes y perforadas.
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};
use vivero_core::CategoryKind;
use vivero_storefront::db;

use super::database_url;

/// Top-level seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    pub kind: CategoryKind,
}

#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    /// Name of a category in the same file.
    pub category: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: u32,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Counts reported after seeding.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub categories: usize,
    pub products: usize,
}

/// Problems that would make the upsert fail or produce bad data.
#[must_use]
pub fn validate(seed: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();
    let mut category_names = HashSet::new();
    let mut product_names = HashSet::new();

    for category in &seed.categories {
        if category.name.trim().is_empty() {
            errors.push("category with empty name".to_owned());
        } else if !category_names.insert(category.name.as_str()) {
            errors.push(format!("duplicate category: {}", category.name));
        }
    }

    for product in &seed.products {
        if product.name.trim().is_empty() {
            errors.push("product with empty name".to_owned());
            continue;
        }
        if !product_names.insert(product.name.as_str()) {
            errors.push(format!("duplicate product: {}", product.name));
        }
        if !category_names.contains(product.category.as_str()) {
            errors.push(format!(
                "{}: unknown category {}",
                product.name, product.category
            ));
        }
        if product.price.is_sign_negative() {
            errors.push(format!("{}: negative price", product.name));
        }
        if i32::try_from(product.stock).is_err() {
            errors.push(format!("{}: stock out of range", product.name));
        }
    }

    errors
}

/// Seed the catalog from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or a database write fails.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = database_url()?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let result = upsert(&pool, &seed).await?;

    info!("Seeding complete!");
    info!("  Categories upserted: {}", result.categories);
    info!("  Products upserted: {}", result.products);
    Ok(())
}

/// Write the whole file in one transaction.
async fn upsert(pool: &PgPool, seed: &CatalogSeed) -> Result<SeedResult, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut category_ids = HashMap::new();

    for category in &seed.categories {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO storefront.categories (name, kind)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET kind = EXCLUDED.kind
            RETURNING id
            ",
        )
        .bind(&category.name)
        .bind(category.kind.as_str())
        .fetch_one(&mut *tx)
        .await?;
        category_ids.insert(category.name.as_str(), id);
    }

    let mut products = 0;
    for product in &seed.products {
        // Validated: every product names a category from the file.
        let Some(category_id) = category_ids.get(product.category.as_str()) else {
            continue;
        };
        let stock = i32::try_from(product.stock).unwrap_or(i32::MAX);

        sqlx::query(
            r"
            INSERT INTO storefront.products
                (name, description, price, stock, category_id, image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO UPDATE SET
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                category_id = EXCLUDED.category_id,
                image_url = EXCLUDED.image_url,
                updated_at = NOW()
            ",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(stock)
        .bind(category_id)
        .bind(&product.image_url)
        .execute(&mut *tx)
        .await?;
        products += 1;
    }

    tx.commit().await?;

    Ok(SeedResult {
        categories: category_ids.len(),
        products,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
categories:
  - name: Plantas
    kind: plant
  - name: Macetas
    kind: accessory
products:
  - name: Monstera deliciosa
    category: Plantas
    price: "25.00"
    stock: 5
  - name: Maceta de barro
    category: Macetas
    price: "8.50"
"#;

    #[test]
    fn test_sample_parses_and_validates() {
        let seed: CatalogSeed = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(seed.categories.len(), 2);
        assert_eq!(seed.categories[1].kind, CategoryKind::Accessory);
        assert_eq!(seed.products[0].price, Decimal::new(2500, 2));
        assert_eq!(seed.products[1].stock, 0);
        assert!(validate(&seed).is_empty());
    }

    #[test]
    fn test_unknown_kind_is_a_parse_error() {
        let yaml = "categories:\n  - name: Rocas\n    kind: mineral\n";
        assert!(serde_yaml::from_str::<CatalogSeed>(yaml).is_err());
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let seed: CatalogSeed = serde_yaml::from_str(
            r#"
categories:
  - name: Kits
    kind: kit
  - name: Kits
    kind: kit
products:
  - name: Kit terrario
    category: Terrarios
    price: "-1.00"
"#,
        )
        .unwrap();

        let errors = validate(&seed);
        assert_eq!(
            errors,
            vec![
                "duplicate category: Kits".to_owned(),
                "Kit terrario: unknown category Terrarios".to_owned(),
                "Kit terrario: negative price".to_owned(),
            ]
        );
    }
}

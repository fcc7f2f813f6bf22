//! Features command implementation.

use anyhow::{Context, Result};
use qrcert_core::{FeatureExtractor, FeatureSchema, ShortenerList};

/// Print the feature vector the classifier would see for `url`.
pub fn execute(url: String, schema: String, json: bool) -> Result<()> {
    let schema = FeatureSchema::from_name_or_path(&schema)
        .with_context(|| format!("Invalid feature schema: {schema}"))?;
    let extractor = FeatureExtractor::new(schema, ShortenerList::default());
    let vector = extractor.extract(&url);

    let names = extractor.schema().features.iter();
    if json {
        let map: serde_json::Map<String, serde_json::Value> = names
            .zip(&vector)
            .map(|(kind, value)| (kind.to_string(), serde_json::Value::from(*value)))
            .collect();
        println!("{}", serde_json::Value::Object(map));
    } else {
        println!("# schema {}", extractor.schema().version);
        for (kind, value) in names.zip(&vector) {
            println!("{kind}\t{value}");
        }
    }
    Ok(())
}

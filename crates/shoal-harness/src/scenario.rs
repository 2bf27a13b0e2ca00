use std::fmt;

use bson::{Bson, Document, doc};
use shoal_client::Client;
use shoal_db::BucketConfig;
use shoal_query::FieldType;
use tracing::info;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::{ops, populate};

/// The field each scenario adds to the schema in its second version.
pub const PROPERTY: &str = "newly_indexed_property";

pub fn sentinel(field_type: FieldType) -> Bson {
    match field_type {
        FieldType::String => Bson::String("sentinel".into()),
        FieldType::Boolean => Bson::Boolean(true),
        FieldType::Number => Bson::Int64(42),
    }
}

pub fn non_sentinel(field_type: FieldType) -> Bson {
    match field_type {
        FieldType::String => Bson::String("nonSentinel".into()),
        FieldType::Boolean => Bson::Boolean(false),
        FieldType::Number => Bson::Int64(24),
    }
}

/// Filter literal for a stored value.
pub fn literal(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::Boolean(b) => b.to_string(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Double(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn v1_config() -> BucketConfig {
    BucketConfig::new()
        .with_unique_index("uuid", FieldType::String)
        .with_index("name", FieldType::String)
}

pub fn v2_config(field_type: FieldType) -> BucketConfig {
    v1_config().with_index(PROPERTY, field_type).with_version(2)
}

fn compound(value: &Bson) -> String {
    format!("(&({PROPERTY}={})(name=bar))", literal(value))
}

fn with_property(value: &Bson) -> Document {
    let mut fields = Document::new();
    fields.insert(PROPERTY, value.clone());
    fields
}

fn named(name: &str, property: Option<Bson>) -> Document {
    let mut template = doc! { "name": name };
    if let Some(value) = property {
        template.insert(PROPERTY, value);
    }
    template
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    /// Objects exist before the field is declared.
    ExistingValues,
    /// Objects carrying the field are written after it is declared.
    NewValues,
}

impl ScenarioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKind::ExistingValues => "existing_values",
            ScenarioKind::NewValues => "new_values",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    DeleteBucket,
    CreateBucket(BucketConfig),
    UpdateBucket(BucketConfig),
    AddObjects { template: Document, count: usize },
    Search {
        filter: String,
        version: u32,
        expected: usize,
        properties: Document,
    },
    VersionMismatch { filter: String, version: u32 },
    Reindex { expected_processed: usize },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::DeleteBucket => write!(f, "delete bucket"),
            Step::CreateBucket(config) => {
                write!(f, "create bucket v{}", config.options.version.unwrap_or(1))
            }
            Step::UpdateBucket(config) => match config.options.version {
                Some(v) => write!(f, "update bucket to v{v}"),
                None => write!(f, "update bucket"),
            },
            Step::AddObjects { template, count } => write!(f, "add {count} x {template}"),
            Step::Search {
                filter,
                version,
                expected,
                ..
            } => write!(f, "search {filter} at v{version} expecting {expected}"),
            Step::VersionMismatch { filter, version } => {
                write!(f, "search {filter} at stale v{version}")
            }
            Step::Reindex { .. } => write!(f, "reindex"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub field_type: FieldType,
    pub kind: ScenarioKind,
    pub bucket: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioReport {
    pub steps: usize,
}

impl Scenario {
    /// Every scenario, in run order.
    pub fn all(objects_per_name: usize) -> Vec<Scenario> {
        FieldType::ALL
            .into_iter()
            .flat_map(|field_type| {
                [
                    Scenario::existing_values(field_type, objects_per_name),
                    Scenario::new_values(field_type, objects_per_name),
                ]
            })
            .collect()
    }

    /// Declare the field over objects that already carry it. Before the
    /// declaration the field is unknown to the schema, so only string values
    /// match. Once declared, every type matches before and after backfill.
    pub fn existing_values(field_type: FieldType, n: usize) -> Scenario {
        let value = sentinel(field_type);
        let property = with_property(&value);
        let undeclared_matches = match field_type {
            FieldType::String => n,
            FieldType::Boolean | FieldType::Number => 0,
        };
        let steps = vec![
            Step::DeleteBucket,
            Step::CreateBucket(v1_config()),
            Step::AddObjects {
                template: named("foo", Some(value.clone())),
                count: n,
            },
            Step::AddObjects {
                template: named("bar", Some(value.clone())),
                count: n,
            },
            Step::Search {
                filter: "(name=bar)".into(),
                version: 1,
                expected: n,
                properties: doc! { "name": "bar" },
            },
            Step::Search {
                filter: compound(&value),
                version: 1,
                expected: undeclared_matches,
                properties: Document::new(),
            },
            Step::UpdateBucket(v2_config(field_type)),
            Step::VersionMismatch {
                filter: "(name=bar)".into(),
                version: 1,
            },
            Step::Search {
                filter: "(name=bar)".into(),
                version: 2,
                expected: n,
                properties: doc! { "name": "bar" },
            },
            Step::Search {
                filter: compound(&value),
                version: 2,
                expected: n,
                properties: property.clone(),
            },
            Step::Reindex {
                expected_processed: 2 * n,
            },
            Step::Search {
                filter: compound(&value),
                version: 2,
                expected: n,
                properties: property,
            },
            Step::Search {
                filter: compound(&non_sentinel(field_type)),
                version: 2,
                expected: 0,
                properties: Document::new(),
            },
        ];
        Scenario::new(field_type, ScenarioKind::ExistingValues, steps)
    }

    /// Declare the field first, then write objects carrying it next to
    /// older objects that lack it.
    pub fn new_values(field_type: FieldType, n: usize) -> Scenario {
        let value = sentinel(field_type);
        let property = with_property(&value);
        let steps = vec![
            Step::DeleteBucket,
            Step::CreateBucket(v1_config()),
            Step::AddObjects {
                template: named("bar", None),
                count: n,
            },
            Step::UpdateBucket(v2_config(field_type)),
            Step::AddObjects {
                template: named("bar", Some(value.clone())),
                count: n,
            },
            Step::Search {
                filter: "(name=bar)".into(),
                version: 2,
                expected: 2 * n,
                properties: doc! { "name": "bar" },
            },
            Step::Search {
                filter: compound(&value),
                version: 2,
                expected: n,
                properties: property.clone(),
            },
            Step::Reindex {
                expected_processed: n,
            },
            Step::Search {
                filter: compound(&value),
                version: 2,
                expected: n,
                properties: property,
            },
            Step::Search {
                filter: compound(&non_sentinel(field_type)),
                version: 2,
                expected: 0,
                properties: Document::new(),
            },
        ];
        Scenario::new(field_type, ScenarioKind::NewValues, steps)
    }

    fn new(field_type: FieldType, kind: ScenarioKind, steps: Vec<Step>) -> Scenario {
        Scenario {
            field_type,
            kind,
            bucket: format!("test_filter_{field_type}_{}", kind.as_str()),
            steps,
        }
    }

    /// Run the steps in order. The first failing step stops the scenario.
    pub async fn run(
        &self,
        client: &Client,
        config: &HarnessConfig,
    ) -> Result<ScenarioReport, HarnessError> {
        info!(scenario = %self.bucket, steps = self.steps.len(), "scenario started");
        for (index, step) in self.steps.iter().enumerate() {
            self.run_step(client, config, step)
                .await
                .map_err(|e| HarnessError::Step {
                    index: index + 1,
                    step: step.to_string(),
                    source: Box::new(e),
                })?;
        }
        info!(scenario = %self.bucket, "scenario passed");
        Ok(ScenarioReport {
            steps: self.steps.len(),
        })
    }

    async fn run_step(
        &self,
        client: &Client,
        config: &HarnessConfig,
        step: &Step,
    ) -> Result<(), HarnessError> {
        let bucket = self.bucket.as_str();
        match step {
            Step::DeleteBucket => ops::delete_bucket(client, bucket).await,
            Step::CreateBucket(schema) => ops::create_bucket(client, bucket, schema)
                .await
                .map(|_| ()),
            Step::UpdateBucket(schema) => ops::update_bucket(client, bucket, schema)
                .await
                .map(|_| ()),
            Step::AddObjects { template, count } => {
                populate::add_objects(client, bucket, template, *count, config.add_concurrency)
                    .await
                    .map(|_| ())
            }
            Step::Search {
                filter,
                version,
                expected,
                properties,
            } => ops::search_for_objects(client, bucket, filter, *version, *expected, properties)
                .await
                .map(|_| ()),
            Step::VersionMismatch { filter, version } => {
                ops::expect_version_mismatch(client, bucket, filter, *version).await
            }
            Step::Reindex { expected_processed } => {
                let batch = config.reindex_batch_size;
                let summary = ops::reindex_bucket(client, bucket, batch).await?;
                let expected_calls = expected_processed.div_ceil(batch) + 1;
                if summary.processed != *expected_processed || summary.calls != expected_calls {
                    return Err(HarnessError::Outcome {
                        expected: format!("{expected_processed} objects in {expected_calls} calls"),
                        actual: format!("{} objects in {} calls", summary.processed, summary.calls),
                    });
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_order_and_bucket_names() {
        let names: Vec<String> = Scenario::all(1).into_iter().map(|s| s.bucket).collect();
        assert_eq!(
            names,
            vec![
                "test_filter_boolean_existing_values",
                "test_filter_boolean_new_values",
                "test_filter_number_existing_values",
                "test_filter_number_new_values",
                "test_filter_string_existing_values",
                "test_filter_string_new_values",
            ]
        );
    }

    #[test]
    fn literals_match_filter_syntax() {
        assert_eq!(literal(&sentinel(FieldType::String)), "sentinel");
        assert_eq!(literal(&sentinel(FieldType::Boolean)), "true");
        assert_eq!(literal(&sentinel(FieldType::Number)), "42");
        assert_eq!(literal(&non_sentinel(FieldType::Number)), "24");
        assert_eq!(
            compound(&sentinel(FieldType::Boolean)),
            "(&(newly_indexed_property=true)(name=bar))"
        );
    }

    #[test]
    fn undeclared_compound_expects_strings_only() {
        for field_type in FieldType::ALL {
            let scenario = Scenario::existing_values(field_type, 3);
            let expected = scenario.steps.iter().find_map(|step| match step {
                Step::Search {
                    version: 1,
                    filter,
                    expected,
                    ..
                } if filter.starts_with("(&") => Some(*expected),
                _ => None,
            });
            let want = if field_type == FieldType::String { 3 } else { 0 };
            assert_eq!(expected, Some(want));
        }
    }
}

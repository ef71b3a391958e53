//! Provider response normalization.
//!
//! Embedding servers disagree on how a batch reply looks. The known layouts
//! form a closed set ([`ResponseShape`]); recognition tries them in a fixed
//! priority order and stops at the first full match:
//!
//! 1. `[[0.1, ...], ...]` - bare list of vectors
//! 2. `{"embeddings": [[...], ...]}` / `{"embedding": [...]}` - keyed field
//! 3. `{"data": [{"embedding": [...]}, ...]}` - per-item objects (OpenAI)
//! 4. `[{"embedding": [...]}, ...]` - list of mappings with a vector key
//!
//! Anything else is [`ResponseShape::Unrecognized`] and carries a structural
//! summary of the payload instead of the payload itself.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::EmbeddingError;
use crate::model::Embedding;

/// Keys accepted for the vector inside a per-item object.
const ITEM_VECTOR_KEYS: &[&str] = &["embedding", "vector", "values"];

/// Nesting depth rendered by [`summarize_shape`].
const SUMMARY_DEPTH: usize = 3;

/// Object keys rendered per level by [`summarize_shape`].
const SUMMARY_KEYS: usize = 8;

/// A recognized provider reply layout with its extracted vectors.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// A bare array of vectors
    VectorList(Vec<Vec<f32>>),
    /// An object with an `embeddings` or `embedding` field
    KeyedField {
        field: &'static str,
        vectors: Vec<Vec<f32>>,
    },
    /// An object whose `data` array holds one object per input
    DataItems(Vec<Vec<f32>>),
    /// An array of objects, each exposing a vector key
    ItemList(Vec<Vec<f32>>),
    /// None of the above
    Unrecognized { summary: String },
}

impl ResponseShape {
    /// Match a raw reply against the known layouts in priority order.
    pub fn recognize(value: &Value) -> Self {
        if let Some(vectors) = parse_vector_list(value) {
            return ResponseShape::VectorList(vectors);
        }
        if let Some(shape) = parse_keyed_field(value) {
            return shape;
        }
        if let Some(vectors) = parse_data_items(value) {
            return ResponseShape::DataItems(vectors);
        }
        if let Some(vectors) = value.as_array().and_then(|items| parse_items(items)) {
            return ResponseShape::ItemList(vectors);
        }
        ResponseShape::Unrecognized {
            summary: summarize_shape(value),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ResponseShape::VectorList(_) => "vector_list",
            ResponseShape::KeyedField { .. } => "keyed_field",
            ResponseShape::DataItems(_) => "data_items",
            ResponseShape::ItemList(_) => "item_list",
            ResponseShape::Unrecognized { .. } => "unrecognized",
        }
    }

    /// Extract the vectors, failing for an unrecognized reply.
    pub fn into_vectors(self) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match self {
            ResponseShape::VectorList(vectors)
            | ResponseShape::KeyedField { vectors, .. }
            | ResponseShape::DataItems(vectors)
            | ResponseShape::ItemList(vectors) => Ok(vectors),
            ResponseShape::Unrecognized { summary } => {
                Err(EmbeddingError::MalformedEmbeddingResponse { shape: summary })
            }
        }
    }
}

/// Converts raw provider replies into validated embeddings.
///
/// Pure and deterministic: the same reply always yields the same result.
#[derive(Debug, Clone, Default)]
pub struct ResponseNormalizer {
    expected_dimension: Option<usize>,
    unit_length: bool,
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require every vector to have this length.
    pub fn with_expected_dimension(mut self, dimension: Option<usize>) -> Self {
        self.expected_dimension = dimension;
        self
    }

    /// Scale vectors to unit length after validation.
    pub fn with_unit_length(mut self, unit_length: bool) -> Self {
        self.unit_length = unit_length;
        self
    }

    pub fn expected_dimension(&self) -> Option<usize> {
        self.expected_dimension
    }

    /// Normalize a reply for `input_count` texts.
    ///
    /// Returns exactly `input_count` embeddings of equal length. The length is
    /// the configured dimension, or the first vector's length when none is set.
    pub fn normalize(
        &self,
        response: &Value,
        input_count: usize,
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        let shape = ResponseShape::recognize(response);
        let shape_name = shape.name();

        if let ResponseShape::Unrecognized { summary } = &shape {
            warn!(shape = %summary, inputs = input_count, "Unrecognized embedding response");
        }
        let vectors = shape.into_vectors()?;

        if vectors.len() != input_count {
            warn!(
                shape = shape_name,
                expected = input_count,
                actual = vectors.len(),
                "Embedding count mismatch"
            );
            return Err(EmbeddingError::VectorCountMismatch {
                expected: input_count,
                actual: vectors.len(),
            });
        }

        let dimension = match (self.expected_dimension, vectors.first()) {
            (Some(dim), _) => dim,
            (None, Some(first)) => first.len(),
            (None, None) => return Ok(Vec::new()),
        };

        for vector in &vectors {
            if vector.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
        }

        debug!(shape = shape_name, count = vectors.len(), dimension, "Normalized embedding response");

        Ok(vectors
            .into_iter()
            .map(|values| {
                if self.unit_length {
                    Embedding::new(values)
                } else {
                    Embedding::raw(values)
                }
            })
            .collect())
    }
}

/// `[0.1, 0.2, ...]` -> non-empty vector of numbers.
fn parse_vector(value: &Value) -> Option<Vec<f32>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// `[[...], [...]]` -> list of vectors. An empty array is an empty list.
fn parse_vector_list(value: &Value) -> Option<Vec<Vec<f32>>> {
    value.as_array()?.iter().map(parse_vector).collect()
}

/// A flat vector is one embedding; an array of vectors is many.
fn parse_one_or_many(value: &Value) -> Option<Vec<Vec<f32>>> {
    parse_vector(value)
        .map(|v| vec![v])
        .or_else(|| parse_vector_list(value))
}

fn parse_keyed_field(value: &Value) -> Option<ResponseShape> {
    let object = value.as_object()?;
    for field in ["embeddings", "embedding"] {
        if let Some(vectors) = object.get(field).and_then(parse_one_or_many) {
            return Some(ResponseShape::KeyedField { field, vectors });
        }
    }
    None
}

fn parse_data_items(value: &Value) -> Option<Vec<Vec<f32>>> {
    let items = value.as_object()?.get("data")?.as_array()?;
    parse_items(items)
}

/// Objects each carrying a vector key. When every item has a numeric
/// `index` (OpenAI), items are reordered by it.
fn parse_items(items: &[Value]) -> Option<Vec<Vec<f32>>> {
    if items.is_empty() {
        return None;
    }
    let mut parsed: Vec<(Option<u64>, Vec<f32>)> = items
        .iter()
        .map(|item| {
            let object = item.as_object()?;
            let vector = item_vector(object)?;
            Some((object.get("index").and_then(Value::as_u64), vector))
        })
        .collect::<Option<_>>()?;

    if parsed.iter().all(|(index, _)| index.is_some()) {
        parsed.sort_by_key(|(index, _)| *index);
    }
    Some(parsed.into_iter().map(|(_, v)| v).collect())
}

fn item_vector(object: &Map<String, Value>) -> Option<Vec<f32>> {
    ITEM_VECTOR_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(parse_vector))
}

/// Render the structure of a JSON value without its contents,
/// e.g. `object{data: array[2] of object{...}, model: string}`.
pub fn summarize_shape(value: &Value) -> String {
    summarize(value, SUMMARY_DEPTH)
}

fn summarize(value: &Value, depth: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => match items.first() {
            None => "array[0]".to_string(),
            Some(_) if depth == 0 => format!("array[{}]", items.len()),
            Some(first) => format!("array[{}] of {}", items.len(), summarize(first, depth - 1)),
        },
        Value::Object(map) => {
            if depth == 0 {
                return format!("object{{{} keys}}", map.len());
            }
            let mut fields: Vec<String> = map
                .iter()
                .take(SUMMARY_KEYS)
                .map(|(k, v)| format!("{}: {}", k, summarize(v, depth - 1)))
                .collect();
            if map.len() > SUMMARY_KEYS {
                fields.push(format!("+{} more", map.len() - SUMMARY_KEYS));
            }
            format!("object{{{}}}", fields.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> ResponseNormalizer {
        ResponseNormalizer::new()
    }

    #[test]
    fn test_vector_list_shape() {
        let reply = json!([[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(ResponseShape::recognize(&reply).name(), "vector_list");
        let out = normalizer().normalize(&reply, 2).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_keyed_embeddings_shape() {
        let reply = json!({"model": "nomic", "embeddings": [[0.1, 0.2, 0.3]]});
        match ResponseShape::recognize(&reply) {
            ResponseShape::KeyedField { field, vectors } => {
                assert_eq!(field, "embeddings");
                assert_eq!(vectors.len(), 1);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_keyed_single_embedding_shape() {
        let reply = json!({"embedding": [0.5, 0.5]});
        let out = normalizer().normalize(&reply, 1).unwrap();
        assert_eq!(out[0].values, vec![0.5, 0.5]);
    }

    #[test]
    fn test_data_items_shape_reordered_by_index() {
        let reply = json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        assert_eq!(ResponseShape::recognize(&reply).name(), "data_items");
        let out = normalizer().normalize(&reply, 2).unwrap();
        assert_eq!(out[0].values, vec![1.0, 0.0]);
        assert_eq!(out[1].values, vec![0.0, 1.0]);
    }

    #[test]
    fn test_item_list_shape() {
        let reply = json!([{"vector": [1.0, 1.0]}, {"embedding": [2.0, 2.0]}]);
        assert_eq!(ResponseShape::recognize(&reply).name(), "item_list");
        let out = normalizer().normalize(&reply, 2).unwrap();
        assert_eq!(out[1].values, vec![2.0, 2.0]);
    }

    #[test]
    fn test_all_recognized_shapes_yield_n_equal_vectors() {
        let replies = [
            json!([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            json!({"embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]}),
            json!({"data": [{"embedding": [1.0, 0.0, 0.0]}, {"embedding": [0.0, 1.0, 0.0]}, {"embedding": [0.0, 0.0, 1.0]}]}),
            json!([{"embedding": [1.0, 0.0, 0.0]}, {"embedding": [0.0, 1.0, 0.0]}, {"embedding": [0.0, 0.0, 1.0]}]),
        ];
        for reply in &replies {
            let out = normalizer().normalize(reply, 3).unwrap();
            assert_eq!(out.len(), 3);
            assert!(out.iter().all(|e| e.dimension() == 3));
        }
    }

    #[test]
    fn test_unrecognized_shapes_are_malformed() {
        let replies = [
            json!("oops"),
            json!({"error": "model not found"}),
            json!({"embeddings": "not a list"}),
            json!([["a", "b"]]),
            json!({"data": [{"text": "no vector"}]}),
            json!(null),
        ];
        for reply in &replies {
            let err = normalizer().normalize(reply, 1).unwrap_err();
            assert!(
                matches!(err, EmbeddingError::MalformedEmbeddingResponse { .. }),
                "expected malformed for {}, got {:?}",
                reply,
                err
            );
        }
    }

    #[test]
    fn test_malformed_carries_summary_not_payload() {
        let reply = json!({"error": "secret-ish payload text", "code": 7});
        let err = normalizer().normalize(&reply, 1).unwrap_err();
        match err {
            EmbeddingError::MalformedEmbeddingResponse { shape } => {
                assert!(shape.contains("error: string"));
                assert!(shape.contains("code: number"));
                assert!(!shape.contains("secret-ish"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_count_mismatch() {
        let reply = json!({"embeddings": [[1.0, 2.0]]});
        let err = normalizer().normalize(&reply, 2).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::VectorCountMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_dimension_inferred_from_first() {
        let reply = json!([[1.0, 2.0], [1.0, 2.0, 3.0]]);
        let err = normalizer().normalize(&reply, 2).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_expected_dimension_enforced() {
        let reply = json!([[1.0, 2.0]]);
        let err = normalizer()
            .with_expected_dimension(Some(3))
            .normalize(&reply, 1)
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_unit_length_option() {
        let reply = json!([[3.0, 4.0]]);
        let out = normalizer().with_unit_length(true).normalize(&reply, 1).unwrap();
        assert!((out[0].values[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_deterministic() {
        let reply = json!({"data": [{"embedding": [0.3, 0.4]}]});
        let a = normalizer().normalize(&reply, 1).unwrap();
        let b = normalizer().normalize(&reply, 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_summary_is_bounded() {
        let big: Vec<f32> = vec![0.0; 4096];
        let reply = json!({"weird": {"nested": {"deeper": {"deepest": big}}}});
        let summary = summarize_shape(&reply);
        assert!(summary.len() < 120, "summary too long: {}", summary);
    }
}

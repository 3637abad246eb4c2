use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GenerationError;
use crate::llm::ResponseShape;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Entity {
    pub fn new(name: &str, entity_type: &str, description: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            description: description.map(str::to_string),
        }
    }
}

/// Relationship between two entities. The graph treats it as undirected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub from_entity: Entity,
    pub to_entity: Entity,
    #[serde(default)]
    pub label: Option<String>,
    /// Within [0.0, 1.0] when present
    #[serde(default)]
    pub strength: Option<f64>,
}

/// Unit of exchange between pipeline stages. The wire form keeps the
/// `{"type": ..., "object": ...}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "object", rename_all = "lowercase")]
pub enum Object {
    Entity(Entity),
    Relationship(Relationship),
}

impl Object {
    /// Serialized payload without the type tag.
    pub fn payload_json(&self) -> serde_json::Result<Value> {
        match self {
            Object::Entity(entity) => serde_json::to_value(entity),
            Object::Relationship(relationship) => serde_json::to_value(relationship),
        }
    }

    /// One-line description used when asking the service to merge objects.
    pub fn describe(&self) -> String {
        match self {
            Object::Entity(e) => format!(
                "Entity {} ({}): {}",
                e.name,
                e.entity_type,
                e.description.as_deref().unwrap_or("None")
            ),
            Object::Relationship(r) => format!(
                "Relationship from {} to {} with label {} and strength {}",
                r.from_entity.name,
                r.to_entity.name,
                r.label.as_deref().unwrap_or("None"),
                r.strength.map(format_strength).unwrap_or_else(|| "None".to_string())
            ),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if let Object::Relationship(r) = self {
            if let Some(strength) = r.strength {
                if !(0.0..=1.0).contains(&strength) {
                    return Err(format!(
                        "strength {} of relationship {} -> {} is outside [0, 1]",
                        strength, r.from_entity.name, r.to_entity.name
                    ));
                }
            }
        }
        Ok(())
    }
}

// Whole numbers keep one decimal place: 1.0 rather than 1
fn format_strength(strength: f64) -> String {
    if strength.fract() == 0.0 {
        format!("{:.1}", strength)
    } else {
        strength.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ObjectsEnvelope {
    List(Vec<Object>),
    Wrapped { objects: Vec<Object> },
}

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$").expect("code fence pattern is valid")
});

/// Models often wrap JSON in a markdown code block.
pub fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

pub fn decode_objects(raw: &str) -> Result<Vec<Object>, GenerationError> {
    let envelope: ObjectsEnvelope = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| GenerationError::schema(ResponseShape::Objects, e.to_string()))?;

    let objects = match envelope {
        ObjectsEnvelope::List(objects) => objects,
        ObjectsEnvelope::Wrapped { objects } => objects,
    };

    for (index, object) in objects.iter().enumerate() {
        object.validate().map_err(|reason| {
            GenerationError::schema(ResponseShape::Objects, format!("object {index}: {reason}"))
        })?;
    }

    Ok(objects)
}

pub fn decode_summary(raw: &str) -> Result<String, GenerationError> {
    let summary: Summary = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| GenerationError::schema(ResponseShape::Summary, e.to_string()))?;
    Ok(summary.summary.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_tagged_objects() {
        let raw = r#"[
            {"type": "entity", "object": {"name": "Alice", "type": "person", "description": "an employee"}},
            {"type": "relationship", "object": {
                "from_entity": {"name": "Alice", "type": "person", "description": null},
                "to_entity": {"name": "Acme", "type": "organization", "description": null},
                "label": "works at", "strength": 0.9}}
        ]"#;

        let objects = decode_objects(raw).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(
            objects[0],
            Object::Entity(Entity::new("Alice", "person", Some("an employee")))
        );
        match &objects[1] {
            Object::Relationship(r) => {
                assert_eq!(r.to_entity.name, "Acme");
                assert_eq!(r.strength, Some(0.9));
            }
            other => panic!("expected relationship, got {other:?}"),
        }
    }

    #[test]
    fn test_accepts_wrapped_list_in_code_fence() {
        let raw = "```json\n{\"objects\": [{\"type\": \"entity\", \"object\": {\"name\": \"Bob\", \"type\": \"person\"}}]}\n```";
        let objects = decode_objects(raw).unwrap();
        assert_eq!(objects, vec![Object::Entity(Entity::new("Bob", "person", None))]);
    }

    #[test]
    fn test_tag_must_match_payload() {
        // An entity payload cannot be tagged as a relationship
        let raw = r#"[{"type": "relationship", "object": {"name": "Alice", "type": "person"}}]"#;
        let err = decode_objects(raw).unwrap_err();
        assert!(matches!(err, GenerationError::SchemaViolation { .. }));
    }

    #[test]
    fn test_rejects_strength_out_of_range() {
        let raw = r#"[{"type": "relationship", "object": {
            "from_entity": {"name": "A", "type": "x"},
            "to_entity": {"name": "B", "type": "x"},
            "label": "knows", "strength": 1.5}}]"#;
        let err = decode_objects(raw).unwrap_err();
        assert!(err.to_string().contains("outside [0, 1]"));
    }

    #[test]
    fn test_payload_json_drops_type_tag() {
        let object = Object::Entity(Entity::new("Acme", "organization", None));
        let payload = object.payload_json().unwrap();
        assert_eq!(
            payload,
            serde_json::json!({"name": "Acme", "type": "organization", "description": null})
        );
    }

    #[test]
    fn test_describe_lines() {
        let entity = Object::Entity(Entity::new("Alice", "person", Some("engineer")));
        assert_eq!(entity.describe(), "Entity Alice (person): engineer");

        let relationship = Object::Relationship(Relationship {
            from_entity: Entity::new("Alice", "person", None),
            to_entity: Entity::new("Acme", "organization", None),
            label: Some("works at".to_string()),
            strength: Some(1.0),
        });
        assert_eq!(
            relationship.describe(),
            "Relationship from Alice to Acme with label works at and strength 1.0"
        );
    }

    #[test]
    fn test_decode_summary() {
        assert_eq!(decode_summary(r#"{"summary": " A team. "}"#).unwrap(), "A team.");
        assert!(decode_summary("not json").is_err());
    }
}

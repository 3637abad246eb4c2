const OBJECT_DEFINITIONS: &str = r#"SCHEMA:
Entity:       {"name": string, "type": string, "description": string | null}
Relationship: {"from_entity": Entity, "to_entity": Entity, "label": string | null, "strength": number in [0.0, 1.0] | null}
Object:       {"type": "entity" | "relationship", "object": Entity | Relationship}

Respond with {"objects": [Object, ...]} and nothing else."#;

pub fn extraction_instruction() -> String {
    format!(
        r#"Extract all entities from the following document.

INSTRUCTIONS:
1. Every entity needs a name, a type (person, organization, location, concept, ...) and a short description
2. Identify relationships between the entities
3. For each relationship give the from entity, the to entity, a label and a strength between 0.0 and 1.0
4. Output ONLY valid JSON

{}"#,
        OBJECT_DEFINITIONS
    )
}

pub fn merge_instruction() -> String {
    format!(
        r#"Summarise the following entities and relationships into a concise list of objects.

INSTRUCTIONS:
1. Prefer quality over quantity
2. Deduplicate entities that refer to the same thing and merge their descriptions
3. Deduplicate relationships between the same pair of entities
4. Output ONLY valid JSON

{}"#,
        OBJECT_DEFINITIONS
    )
}

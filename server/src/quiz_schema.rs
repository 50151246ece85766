//! The quiz document schema served by this backend.

use quizdraft_engine::{CollectionSchema, FieldDef, FieldType, Schema};

/// Quizzes with their questions, answers, scoring levels, call-to-action
/// blocks and translations.
pub fn quiz_schema() -> Schema {
    Schema::new(
        CollectionSchema::new(
            "quizzes",
            vec![
                FieldDef::required("title", FieldType::String),
                FieldDef::optional("description", FieldType::String),
                FieldDef::optional("language", FieldType::String),
                FieldDef::optional("settings", FieldType::Json),
                FieldDef::optional("published", FieldType::Bool),
            ],
        ),
        "quiz_id",
    )
    .with_collection(CollectionSchema::new(
        "questions",
        vec![
            FieldDef::required("text", FieldType::String),
            FieldDef::optional("position", FieldType::Int),
            FieldDef::optional("kind", FieldType::String),
            FieldDef::optional("media", FieldType::Json),
        ],
    ))
    .with_collection(
        CollectionSchema::new(
            "answers",
            vec![
                FieldDef::required("text", FieldType::String),
                FieldDef::optional("position", FieldType::Int),
                FieldDef::optional("correct", FieldType::Bool),
                FieldDef::optional("points", FieldType::Int),
            ],
        )
        .child_of("questions", "question_id"),
    )
    .with_collection(CollectionSchema::new(
        "levels",
        vec![
            FieldDef::required("name", FieldType::String),
            FieldDef::optional("min_score", FieldType::Int),
            FieldDef::optional("max_score", FieldType::Int),
            FieldDef::optional("description", FieldType::String),
        ],
    ))
    .with_collection(CollectionSchema::new(
        "cta_blocks",
        vec![
            FieldDef::required("title", FieldType::String),
            FieldDef::optional("button_text", FieldType::String),
            FieldDef::optional("url", FieldType::String),
            FieldDef::optional("position", FieldType::Int),
        ],
    ))
    .with_collection(CollectionSchema::new(
        "translations",
        vec![
            FieldDef::required("language", FieldType::String),
            FieldDef::required("strings", FieldType::Json),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_valid() {
        let schema = quiz_schema();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.depth("answers").unwrap(), 1);
        assert_eq!(schema.link_field("levels").unwrap(), "quiz_id");
        assert_eq!(schema.load_order().last().map(|c| c.as_str()), Some("answers"));
    }
}

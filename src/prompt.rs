//! Prompt assembly for SQL generation.
//!
//! Assembly and rendering are pure transformations: no IO, no shared
//! state, so both are unit-testable without a live generation backend.
//! Retrieved context keeps its retrieval order, since generation backends
//! weight earlier context more heavily.

use crate::artifact::{ExampleQuery, TrainingArtifact};
use crate::llm::ChatMessage;
use crate::retriever::Retrieval;

/// Everything the generator needs for one question.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub question: String,
    /// Rendered DDL strings, most relevant first.
    pub schemas: Vec<String>,
    /// Example queries, most relevant first.
    pub examples: Vec<ExampleQuery>,
    /// Set only for the single re-generation pass after a failed
    /// extraction: tightens the output instruction to SQL-only.
    pub strict: bool,
}

impl GenerationRequest {
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// Combine a question with its retrieved context.
pub fn assemble(question: &str, retrieval: &Retrieval) -> GenerationRequest {
    let schemas = retrieval
        .schemas
        .iter()
        .filter_map(|scored| match &scored.artifact {
            TrainingArtifact::Schema(schema) => Some(schema.to_ddl()),
            TrainingArtifact::Example(_) => None,
        })
        .collect();

    let examples = retrieval
        .examples
        .iter()
        .filter_map(|scored| match &scored.artifact {
            TrainingArtifact::Example(example) => Some(example.clone()),
            TrainingArtifact::Schema(_) => None,
        })
        .collect();

    GenerationRequest {
        question: question.to_string(),
        schemas,
        examples,
        strict: false,
    }
}

/// Render a request into chat messages.
///
/// Schemas and question-less example queries go into the system message;
/// question/SQL pairs become user/assistant turns so the model sees them
/// as answered questions; the actual question comes last.
pub fn render_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let mut system = String::from(
        "You are a SQL expert. Answer the user's question with a single SQL query \
         for the schema below.\n",
    );

    if !request.schemas.is_empty() {
        system.push_str("\n===Tables\n");
        for ddl in &request.schemas {
            system.push_str(ddl);
            system.push('\n');
        }
    }

    let reference_sql: Vec<&ExampleQuery> = request
        .examples
        .iter()
        .filter(|e| e.question.is_none())
        .collect();
    if !reference_sql.is_empty() {
        system.push_str("\n===Example queries\n");
        for example in reference_sql {
            system.push_str(&example.sql);
            system.push('\n');
        }
    }

    system.push_str("\n===Response Guidelines\n");
    if request.strict {
        system.push_str(
            "Output only the SQL statement. No prose, no explanation, no markdown fences.\n",
        );
    } else {
        system.push_str(
            "Respond with a single SQL statement inside one ```sql code block. \
             Use only tables and columns from the schema above.\n",
        );
    }

    let mut messages = vec![ChatMessage::system(system)];
    for example in request.examples.iter().filter(|e| e.question.is_some()) {
        if let Some(question) = &example.question {
            messages.push(ChatMessage::user(question.clone()));
            messages.push(ChatMessage::assistant(example.sql.clone()));
        }
    }
    messages.push(ChatMessage::user(request.question.clone()));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ColumnDef, SchemaDefinition};
    use crate::store::Scored;

    fn scored_schema(table: &str) -> Scored {
        Scored {
            id: table.to_string(),
            artifact: TrainingArtifact::Schema(SchemaDefinition {
                table: table.to_string(),
                columns: vec![ColumnDef {
                    name: "id".to_string(),
                    sql_type: "BIGINT".to_string(),
                }],
            }),
            score: 0.9,
        }
    }

    fn scored_example(question: Option<&str>, sql: &str) -> Scored {
        Scored {
            id: sql.to_string(),
            artifact: TrainingArtifact::Example(ExampleQuery {
                question: question.map(str::to_string),
                sql: sql.to_string(),
            }),
            score: 0.8,
        }
    }

    #[test]
    fn assemble_preserves_retrieval_order() {
        let retrieval = Retrieval {
            schemas: vec![scored_schema("loans"), scored_schema("emis")],
            examples: vec![scored_example(None, "SELECT 1")],
        };

        let request = assemble("how many loans", &retrieval);
        assert_eq!(request.question, "how many loans");
        assert_eq!(request.schemas.len(), 2);
        assert!(request.schemas[0].contains("loans"));
        assert!(request.schemas[1].contains("emis"));
        assert!(!request.strict);
    }

    #[test]
    fn assemble_is_deterministic() {
        let retrieval = Retrieval {
            schemas: vec![scored_schema("loans")],
            examples: vec![scored_example(Some("count loans"), "SELECT COUNT(*) FROM loans")],
        };
        let a = assemble("q", &retrieval);
        let b = assemble("q", &retrieval);
        assert_eq!(a.schemas, b.schemas);
        assert_eq!(a.examples, b.examples);
    }

    #[test]
    fn render_puts_ddl_in_system_and_pairs_as_turns() {
        let retrieval = Retrieval {
            schemas: vec![scored_schema("loans")],
            examples: vec![
                scored_example(Some("count loans"), "SELECT COUNT(*) FROM loans"),
                scored_example(None, "SELECT * FROM loans LIMIT 5"),
            ],
        };

        let messages = render_messages(&assemble("how many loans", &retrieval));
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("CREATE TABLE loans"));
        assert!(messages[0].content.contains("SELECT * FROM loans LIMIT 5"));
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "count loans");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[2].content, "SELECT COUNT(*) FROM loans");
        assert_eq!(messages.last().unwrap().content, "how many loans");
    }

    #[test]
    fn strict_rendering_tightens_the_output_rule() {
        let request = assemble("q", &Retrieval::default()).strict();
        let messages = render_messages(&request);
        assert!(messages[0].content.contains("Output only the SQL statement"));
    }
}

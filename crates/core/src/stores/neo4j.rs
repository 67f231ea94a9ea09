use crate::error::StoreError;
use crate::models::{DocumentRecord, WorkActivity};
use crate::traits::GraphSink;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub struct Neo4jStore {
    endpoint: String,
    database: String,
    username: String,
    password: String,
    client: Client,
}

impl Neo4jStore {
    pub fn new(
        endpoint: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            client: Client::new(),
        }
    }

    fn tx_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.endpoint, self.database)
    }
}

#[async_trait]
impl GraphSink for Neo4jStore {
    async fn upsert_document(
        &self,
        document: &DocumentRecord,
        activities: &[WorkActivity],
    ) -> Result<(), StoreError> {
        let document_row = json!({
            "hash": document.content_hash,
            "source": document.source_path,
            "doc_type": document.doc_type.label(),
            "subtype": document.subtype,
            "confidence": document.confidence,
            "quality": document.quality,
            "processed_at": document.processed_at.to_rfc3339(),
        });

        let activity_rows: Vec<Value> = activities
            .iter()
            .map(|activity| {
                json!({
                    "hash": document.content_hash,
                    "name": activity.name,
                    "duration_days": activity.duration_days,
                    "priority": activity.priority,
                    "quality": activity.quality,
                    "is_critical": activity.is_critical,
                })
            })
            .collect();

        let edge_rows: Vec<Value> = activities
            .iter()
            .flat_map(|activity| {
                activity.predecessors.iter().map(|predecessor| {
                    json!({
                        "hash": document.content_hash,
                        "successor": activity.name,
                        "predecessor": predecessor,
                    })
                })
            })
            .collect();

        let document_statement = r#"
            MERGE (doc:Document {content_hash: $row.hash})
            SET doc.source_path = $row.source,
                doc.doc_type = $row.doc_type,
                doc.subtype = $row.subtype,
                doc.confidence = $row.confidence,
                doc.quality = $row.quality,
                doc.processed_at = $row.processed_at
            RETURN doc.content_hash;
        "#;

        let activity_statement = r#"
            UNWIND $rows AS row
            MATCH (doc:Document {content_hash: row.hash})
            MERGE (activity:Activity {content_hash: row.hash, name: row.name})
            SET activity.duration_days = row.duration_days,
                activity.priority = row.priority,
                activity.quality = row.quality,
                activity.is_critical = row.is_critical
            MERGE (doc)-[:CONTAINS]->(activity)
            RETURN count(activity);
        "#;

        let edge_statement = r#"
            UNWIND $rows AS row
            MATCH (successor:Activity {content_hash: row.hash, name: row.successor})
            MATCH (predecessor:Activity {content_hash: row.hash, name: row.predecessor})
            MERGE (successor)-[:DEPENDS_ON]->(predecessor)
            RETURN count(row);
        "#;

        let mut statements = vec![json!({
            "statement": document_statement,
            "parameters": { "row": document_row }
        })];
        if !activity_rows.is_empty() {
            statements.push(json!({
                "statement": activity_statement,
                "parameters": { "rows": activity_rows }
            }));
        }
        if !edge_rows.is_empty() {
            statements.push(json!({
                "statement": edge_statement,
                "parameters": { "rows": edge_rows }
            }));
        }

        let response = self
            .client
            .post(self.tx_url())
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "statements": statements }))
            .send()
            .await
            .map_err(connection_aware)?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "neo4j".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        let errors = body
            .pointer("/errors")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if !errors.is_empty() {
            return Err(StoreError::BackendResponse {
                backend: "neo4j".to_string(),
                details: serde_json::to_string(&errors)?,
            });
        }

        Ok(())
    }
}

fn connection_aware(error: reqwest::Error) -> StoreError {
    if error.is_connect() || error.is_timeout() {
        StoreError::Unavailable(error.to_string())
    } else {
        StoreError::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use super::Neo4jStore;

    #[test]
    fn tx_url_targets_the_configured_database() {
        let store = Neo4jStore::new("http://localhost:7474", "knowledge", "neo4j", "secret");
        assert_eq!(
            store.tx_url(),
            "http://localhost:7474/db/knowledge/tx/commit"
        );
    }
}

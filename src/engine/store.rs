//! Operation persistence contract and an in-memory implementation.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::operation::Operation;

/// Where stored operations live.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Whether an operation with this number was stored before.
    async fn exists(&self, operation_number: &str) -> Result<bool, StoreError>;

    /// Persist `operation` and return its id.
    async fn store(&self, operation: &Operation) -> Result<i64, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Operation>, StoreError>;

    /// Mark the operation as acknowledged.
    async fn acknowledge(&self, id: i64) -> Result<(), StoreError>;
}

/// Keeps operations in memory with sequential ids starting at 1.
#[derive(Default)]
pub struct InMemoryOperationStore {
    operations: RwLock<Vec<Operation>>,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.operations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.operations.read().await.is_empty()
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn exists(&self, operation_number: &str) -> Result<bool, StoreError> {
        Ok(self
            .operations
            .read()
            .await
            .iter()
            .any(|op| op.operation_number == operation_number))
    }

    async fn store(&self, operation: &Operation) -> Result<i64, StoreError> {
        let mut operations = self.operations.write().await;
        let id = operations.len() as i64 + 1;
        let mut stored = operation.clone();
        stored.id = Some(id);
        operations.push(stored);
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<Operation>, StoreError> {
        Ok(self
            .operations
            .read()
            .await
            .iter()
            .find(|op| op.id == Some(id))
            .cloned())
    }

    async fn acknowledge(&self, id: i64) -> Result<(), StoreError> {
        let mut operations = self.operations.write().await;
        let operation = operations
            .iter_mut()
            .find(|op| op.id == Some(id))
            .ok_or(StoreError::NotFound { id })?;
        operation.is_acknowledged = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn op(number: &str) -> Operation {
        let mut op = Operation::new(NaiveDateTime::default());
        op.operation_number = number.to_string();
        op
    }

    #[tokio::test]
    async fn assigns_sequential_ids() {
        let store = InMemoryOperationStore::new();
        assert_eq!(store.store(&op("a")).await.unwrap(), 1);
        assert_eq!(store.store(&op("b")).await.unwrap(), 2);
        assert_eq!(store.get(2).await.unwrap().unwrap().operation_number, "b");
        assert!(store.exists("a").await.unwrap());
        assert!(!store.exists("c").await.unwrap());
    }

    #[tokio::test]
    async fn acknowledge_unknown_id_fails() {
        let store = InMemoryOperationStore::new();
        store.store(&op("a")).await.unwrap();
        store.acknowledge(1).await.unwrap();
        assert!(store.get(1).await.unwrap().unwrap().is_acknowledged);
        assert!(matches!(store.acknowledge(9).await, Err(StoreError::NotFound { id: 9 })));
    }
}

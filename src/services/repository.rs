//! services/repository.rs
//! Contrato CRUD común a cualquier entidad guardada.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::customer_model::{Entity, RecordId};

#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Todos los registros, en orden de id.
    async fn find_all(&self) -> Result<Vec<T>>;

    /// Inserta o actualiza; devuelve el id (nuevo o existente).
    async fn upsert(&self, item: &T) -> Result<RecordId>;

    async fn find_by_id(&self, id: RecordId) -> Result<Option<T>>;
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Department {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Development")]
    pub name: String,
    #[schema(example = 2, nullable = true)]
    pub manager_id: Option<u64>,
}

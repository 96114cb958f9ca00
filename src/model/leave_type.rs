use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Shown when a leave type carries no color of its own.
pub const DEFAULT_COLOR: &str = "#9E9E9E";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "PTO",
        "description": "Paid time off",
        "color": "#4CAF50",
        "default_days": 20.0,
        "monthly_accrual": 1.67,
        "max_carry_forward": 5.0,
        "is_active": true
    })
)]
pub struct LeaveType {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Annual allocation in days
    pub default_days: f64,
    /// Days credited by each monthly accrual run, may be 0
    pub monthly_accrual: f64,
    /// Days allowed to roll over on top of the annual allocation
    pub max_carry_forward: f64,
    pub is_active: bool,
}

impl LeaveType {
    /// Highest balance a credit may produce.
    pub fn balance_cap(&self) -> f64 {
        self.default_days + self.max_carry_forward
    }

    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_COLOR)
    }
}

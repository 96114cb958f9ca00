/// Login account, always linked to an employee record.
#[derive(Debug, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub password: String,
    pub employee_id: u64,
    pub role: String,
}

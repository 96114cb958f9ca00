use std::time::Duration;

use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::OnceCell;
use sqlx::MySqlPool;

use crate::model::leave_type::LeaveType;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Leave types are read on every application and rarely written.
static LEAVE_TYPE_CACHE: OnceCell<Cache<u64, LeaveType>> = OnceCell::new();

fn build(ttl: Duration) -> Cache<u64, LeaveType> {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(ttl)
        .build()
}

/// Sets the TTL; only the first call has any effect.
pub fn init(ttl: Duration) {
    let _ = LEAVE_TYPE_CACHE.set(build(ttl));
}

fn cache() -> &'static Cache<u64, LeaveType> {
    LEAVE_TYPE_CACHE.get_or_init(|| build(DEFAULT_TTL))
}

pub async fn put(leave_type: LeaveType) {
    cache().insert(leave_type.id, leave_type).await;
}

pub async fn invalidate(id: u64) {
    cache().invalidate(&id).await;
}

/// Cached leave type, falling back to the database on a miss.
pub async fn get(pool: &MySqlPool, id: u64) -> Result<Option<LeaveType>> {
    if let Some(hit) = cache().get(&id).await {
        return Ok(Some(hit));
    }

    let mut conn = pool.acquire().await?;
    let found = crate::repo::load_leave_type(&mut conn, id, false).await?;
    if let Some(lt) = &found {
        put(lt.clone()).await;
    }
    Ok(found)
}

/// Load every leave type into the cache, in batches.
pub async fn warmup_leave_type_cache(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, LeaveType>(
        r#"
        SELECT id, name, description, color, default_days, monthly_accrual, max_carry_forward, is_active
        FROM leave_types
        "#,
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        batch.push(row?);
        total_count += 1;

        if batch.len() >= batch_size {
            futures::future::join_all(batch.drain(..).map(put)).await;
        }
    }

    if !batch.is_empty() {
        futures::future::join_all(batch.drain(..).map(put)).await;
    }

    log::info!("Leave type cache warmup complete: {} leave types", total_count);

    Ok(())
}

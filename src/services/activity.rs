// Activity recording
// Audit writes never fail the request that triggered them

use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::{ActivityLog, ActivityType, NewActivityLog};

/// IP addresses longer than the column allows are dropped rather than truncated
const MAX_IP_LENGTH: usize = 45;

pub async fn record_activity(
    pool: &DieselPool,
    user_id: Uuid,
    action: ActivityType,
    ip_address: Option<String>,
) {
    let ip_address = ip_address.filter(|ip| ip.len() <= MAX_IP_LENGTH);

    let mut conn = match pool.get().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(user_id = %user_id, action = action.as_str(), error = %e, "[ACTIVITY] No connection to record activity");
            return;
        },
    };

    match ActivityLog::create(
        &mut conn,
        NewActivityLog {
            user_id,
            action,
            ip_address,
        },
    )
    .await
    {
        Ok(entry) => debug!(user_id = %user_id, action = entry.action.as_str(), "[ACTIVITY] Recorded"),
        Err(e) => {
            warn!(user_id = %user_id, action = action.as_str(), error = %e, "[ACTIVITY] Failed to record activity")
        },
    }
}

use crate::repo::ArticleRepository;
use crate::types::{Result, SpeedOutcome};
use tracing::{debug, info};
use uuid::Uuid;

/// Publication-speed pass over one story group: for every timestamped
/// member after the earliest one, record the minutes between the group's
/// earliest publish time and that member's publish time. Each article is
/// measured at most once, so re-runs are no-ops.
pub async fn compute_publication_speed(
    repo: &dyn ArticleRepository,
    group_id: Uuid,
) -> Result<SpeedOutcome> {
    let members = repo.find_group_members_with_publish_time(group_id).await?;
    if members.len() < 2 {
        debug!(
            "Group {group_id} has {} timestamped members, nothing to measure",
            members.len()
        );
        return Ok(SpeedOutcome::InsufficientData);
    }

    // Members arrive earliest-first. The earliest member is the baseline
    // and never gets a metric against itself.
    let earliest = match members.first().and_then(|a| a.published_at) {
        Some(instant) => instant,
        None => return Ok(SpeedOutcome::InsufficientData),
    };

    let mut recorded = 0;
    for member in &members[1..] {
        let published = match member.published_at {
            Some(instant) => instant,
            None => continue,
        };
        if repo.has_speed_metric(member.id).await? {
            continue;
        }
        let minutes = (published - earliest).num_seconds() as f64 / 60.0;
        repo.record_speed_metric(member.id, minutes).await?;
        recorded += 1;
    }

    if recorded > 0 {
        info!("Recorded {recorded} speed metrics for group {group_id}");
    }
    Ok(SpeedOutcome::Computed {
        metrics_recorded: recorded,
    })
}

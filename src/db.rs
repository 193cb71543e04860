use std::path::Path;

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::EventRecord;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Mirrors the canonical dataset into Postgres for the dashboard. Rows are
/// upserted by (name, date, community); a validated cost already stored is
/// kept when the incoming row is not validated.
pub async fn publish_events(
    pool: &PgPool,
    source_path: &Path,
    events: &[EventRecord],
) -> anyhow::Result<Uuid> {
    let run_id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO club_analytics.publish_runs (id, source_path, event_count)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(run_id)
    .bind(source_path.display().to_string())
    .bind(i32::try_from(events.len())?)
    .execute(&mut *tx)
    .await?;

    for event in events {
        sqlx::query(
            r#"
            INSERT INTO club_analytics.events
            (id, name, event_date, community, registered, paid, attended, pending,
             revenue, average_price, event_type, season, activity, unit_cost,
             cost_validated, collaboration, estimated_cost, estimated_profit, last_run_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT (name, event_date, community) DO UPDATE
            SET registered = EXCLUDED.registered,
                paid = EXCLUDED.paid,
                attended = EXCLUDED.attended,
                pending = EXCLUDED.pending,
                revenue = EXCLUDED.revenue,
                average_price = EXCLUDED.average_price,
                event_type = EXCLUDED.event_type,
                season = EXCLUDED.season,
                activity = EXCLUDED.activity,
                unit_cost = CASE
                    WHEN events.cost_validated AND NOT EXCLUDED.cost_validated THEN events.unit_cost
                    ELSE EXCLUDED.unit_cost
                END,
                cost_validated = events.cost_validated OR EXCLUDED.cost_validated,
                collaboration = EXCLUDED.collaboration,
                estimated_cost = CASE
                    WHEN events.cost_validated AND NOT EXCLUDED.cost_validated
                        THEN events.unit_cost * EXCLUDED.registered
                    ELSE EXCLUDED.estimated_cost
                END,
                estimated_profit = CASE
                    WHEN events.cost_validated AND NOT EXCLUDED.cost_validated
                        THEN EXCLUDED.revenue - events.unit_cost * EXCLUDED.registered
                    ELSE EXCLUDED.estimated_profit
                END,
                last_run_id = EXCLUDED.last_run_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.name)
        .bind(event.date)
        .bind(event.community.as_str())
        .bind(i32::try_from(event.registered)?)
        .bind(i32::try_from(event.paid)?)
        .bind(i32::try_from(event.attended)?)
        .bind(i32::try_from(event.pending)?)
        .bind(event.revenue)
        .bind(event.average_price)
        .bind(event.event_type.as_str())
        .bind(event.season.as_str())
        .bind(&event.activity)
        .bind(event.unit_cost)
        .bind(event.cost_validated)
        .bind(event.collaboration)
        .bind(event.estimated_cost)
        .bind(event.estimated_profit)
        .bind(run_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(run_id)
}

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE activities (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                points_mode     TEXT NOT NULL DEFAULT 'incremental',
                grading_method  TEXT NOT NULL DEFAULT 'simple',
                tile_width      INTEGER NOT NULL DEFAULT 60,
                tile_height     INTEGER NOT NULL DEFAULT 20,
                time_modified   INTEGER NOT NULL
            );

            CREATE TABLE participants (
                activity_id TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
                group_id    INTEGER NOT NULL DEFAULT 0,
                user_id     TEXT NOT NULL,
                full_name   TEXT NOT NULL,
                PRIMARY KEY (activity_id, group_id, user_id)
            );

            CREATE TABLE user_names (
                user_id     TEXT PRIMARY KEY,
                full_name   TEXT NOT NULL
            );

            CREATE TABLE awards (
                id              TEXT PRIMARY KEY,
                activity_id     TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
                recipient_id    TEXT NOT NULL,
                awarder_id      TEXT NOT NULL,
                points          INTEGER NOT NULL,
                comment         TEXT NOT NULL DEFAULT '',
                comment_format  TEXT NOT NULL DEFAULT 'plain',
                time_created    INTEGER NOT NULL,
                time_awarded    INTEGER NOT NULL,
                time_modified   INTEGER NOT NULL
            );

            CREATE INDEX idx_awards_recipient
                ON awards(activity_id, recipient_id, time_awarded);

            CREATE TABLE maps (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL DEFAULT '',
                owner_id        TEXT NOT NULL,
                group_id        INTEGER NOT NULL DEFAULT 0,
                activity_id     TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
                visibility      INTEGER NOT NULL DEFAULT 0,
                width           INTEGER NOT NULL DEFAULT 0,
                height          INTEGER NOT NULL DEFAULT 0,
                tile_width      INTEGER NOT NULL,
                tile_height     INTEGER NOT NULL,
                time_modified   INTEGER NOT NULL
            );

            CREATE INDEX idx_maps_scope
                ON maps(activity_id, group_id, owner_id);

            CREATE TABLE coordinates (
                map_id  TEXT NOT NULL REFERENCES maps(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                x       INTEGER NOT NULL DEFAULT 0,
                y       INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (map_id, user_id)
            );

            CREATE TABLE grades (
                activity_id     TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL,
                grade           INTEGER NOT NULL,
                time_modified   INTEGER NOT NULL,
                PRIMARY KEY (activity_id, user_id)
            );

            CREATE TABLE preferences (
                user_id     TEXT NOT NULL,
                activity_id TEXT NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                value       TEXT NOT NULL,
                PRIMARY KEY (user_id, activity_id, name)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

use std::collections::HashMap;

use crate::Database;
use crate::models::{ActivityRow, AwardRow, CoordinateRow, MapRow, ParticipantRow};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use tracing::debug;
use uuid::Uuid;

use pointsmap_types::models::{
    ALL_PARTICIPANTS, Activity, Award, Coordinate, GroupId, Participant, UserMap,
};

const MAP_COLUMNS: &str = "id, name, owner_id, group_id, activity_id, visibility, width, height, \
                           tile_width, tile_height, time_modified";

const AWARD_COLUMNS: &str = "id, activity_id, recipient_id, awarder_id, points, comment, \
                             comment_format, time_created, time_awarded, time_modified";

impl Database {
    // -- Activities --

    pub fn upsert_activity(&self, activity: &Activity) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO activities
                    (id, name, points_mode, grading_method, tile_width, tile_height, time_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    points_mode = excluded.points_mode,
                    grading_method = excluded.grading_method,
                    tile_width = excluded.tile_width,
                    tile_height = excluded.tile_height,
                    time_modified = excluded.time_modified",
                params![
                    activity.id.to_string(),
                    activity.name,
                    activity.points_mode.as_str(),
                    activity.grading_method.as_str(),
                    activity.tile_width,
                    activity.tile_height,
                    now(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_activity(&self, id: Uuid) -> Result<Option<Activity>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, points_mode, grading_method, tile_width, tile_height
                 FROM activities WHERE id = ?1",
                [id.to_string()],
                |row| {
                    Ok(ActivityRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        points_mode: row.get(2)?,
                        grading_method: row.get(3)?,
                        tile_width: row.get(4)?,
                        tile_height: row.get(5)?,
                    })
                },
            )
            .optional()?
            .map(ActivityRow::into_model)
            .transpose()
        })
    }

    /// Delete an activity together with its roster, awards, grades, maps and
    /// coordinates.
    pub fn delete_activity(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM activities WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }

    // -- Roster --

    /// Replace the whole roster of an activity in one transaction.
    pub fn replace_roster(&self, activity_id: Uuid, participants: &[Participant]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM participants WHERE activity_id = ?1",
                [activity_id.to_string()],
            )?;
            {
                let mut insert = tx.prepare(
                    "INSERT OR REPLACE INTO participants (activity_id, group_id, user_id, full_name)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                let mut name = tx.prepare(
                    "INSERT INTO user_names (user_id, full_name) VALUES (?1, ?2)
                     ON CONFLICT(user_id) DO UPDATE SET full_name = excluded.full_name",
                )?;
                for p in participants {
                    let user_id = p.user_id.to_string();
                    insert.execute(params![
                        activity_id.to_string(),
                        p.group_id,
                        user_id,
                        p.full_name
                    ])?;
                    name.execute(params![user_id, p.full_name])?;
                }
            }
            tx.commit()?;
            debug!("Roster of {} replaced ({} rows)", activity_id, participants.len());
            Ok(())
        })
    }

    /// Participants in a group scope, ordered by name. [`ALL_PARTICIPANTS`]
    /// returns every distinct user of the activity.
    pub fn get_roster(&self, activity_id: Uuid, group_id: GroupId) -> Result<Vec<Participant>> {
        self.with_conn(|conn| query_roster(conn, activity_id, group_id))
    }

    // -- Directory --

    pub fn remember_user_name(&self, user_id: Uuid, full_name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_names (user_id, full_name) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET full_name = excluded.full_name",
                params![user_id.to_string(), full_name],
            )?;
            Ok(())
        })
    }

    /// Display names for a set of users. Unknown ids are absent from the map.
    pub fn get_user_names(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=user_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT user_id, full_name FROM user_names WHERE user_id IN ({})",
                placeholders.join(", ")
            );

            let ids: Vec<String> = user_ids.iter().map(Uuid::to_string).collect();
            let params: Vec<&dyn rusqlite::types::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows
                .into_iter()
                .filter_map(|(id, name)| id.parse().ok().map(|id| (id, name)))
                .collect())
        })
    }

    // -- Awards --

    pub fn insert_award(&self, award: &Award) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO awards ({AWARD_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    award.id.to_string(),
                    award.activity_id.to_string(),
                    award.recipient_id.to_string(),
                    award.awarder_id.to_string(),
                    award.points,
                    award.comment,
                    award.comment_format.as_str(),
                    award.time_created.timestamp(),
                    award.time_awarded.timestamp(),
                    award.time_modified.timestamp(),
                ],
            )?;
            Ok(())
        })
    }

    /// Running sum of every award a user received in an activity.
    pub fn sum_points(&self, activity_id: Uuid, user_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let total = conn.query_row(
                "SELECT COALESCE(SUM(points), 0) FROM awards
                 WHERE activity_id = ?1 AND recipient_id = ?2",
                [activity_id.to_string(), user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(total)
        })
    }

    /// Sum of the awards a user received at or after `since` (unix seconds).
    pub fn sum_points_since(&self, activity_id: Uuid, user_id: Uuid, since: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let total = conn.query_row(
                "SELECT COALESCE(SUM(points), 0) FROM awards
                 WHERE activity_id = ?1 AND recipient_id = ?2 AND time_awarded >= ?3",
                params![activity_id.to_string(), user_id.to_string(), since],
                |row| row.get(0),
            )?;
            Ok(total)
        })
    }

    /// Points of the most recent award, insertion order breaking ties.
    pub fn latest_points(&self, activity_id: Uuid, user_id: Uuid) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT points FROM awards WHERE activity_id = ?1 AND recipient_id = ?2
                 ORDER BY time_awarded DESC, rowid DESC LIMIT 1",
                [activity_id.to_string(), user_id.to_string()],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Every award a user received, oldest first.
    pub fn get_awards_for_user(&self, activity_id: Uuid, user_id: Uuid) -> Result<Vec<Award>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AWARD_COLUMNS} FROM awards WHERE activity_id = ?1 AND recipient_id = ?2
                 ORDER BY time_awarded ASC, rowid ASC"
            ))?;
            let rows = stmt
                .query_map([activity_id.to_string(), user_id.to_string()], award_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(AwardRow::into_model).collect()
        })
    }

    // -- Grades --

    pub fn upsert_grade(&self, activity_id: Uuid, user_id: Uuid, grade: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO grades (activity_id, user_id, grade, time_modified)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(activity_id, user_id) DO UPDATE SET
                    grade = excluded.grade,
                    time_modified = excluded.time_modified",
                params![activity_id.to_string(), user_id.to_string(), grade, now()],
            )?;
            Ok(())
        })
    }

    pub fn get_grade(&self, activity_id: Uuid, user_id: Uuid) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT grade FROM grades WHERE activity_id = ?1 AND user_id = ?2",
                [activity_id.to_string(), user_id.to_string()],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn get_grades(&self, activity_id: Uuid) -> Result<HashMap<Uuid, i64>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_id, grade FROM grades WHERE activity_id = ?1")?;
            let rows = stmt
                .query_map([activity_id.to_string()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows
                .into_iter()
                .filter_map(|(id, grade)| id.parse().ok().map(|id| (id, grade)))
                .collect())
        })
    }

    // -- Preferences --

    pub fn set_preference(
        &self,
        user_id: Uuid,
        activity_id: Uuid,
        name: &str,
        value: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO preferences (user_id, activity_id, name, value)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, activity_id, name) DO UPDATE SET value = excluded.value",
                params![user_id.to_string(), activity_id.to_string(), name, value],
            )?;
            Ok(())
        })
    }

    pub fn get_preference(
        &self,
        user_id: Uuid,
        activity_id: Uuid,
        name: &str,
    ) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM preferences
                 WHERE user_id = ?1 AND activity_id = ?2 AND name = ?3",
                params![user_id.to_string(), activity_id.to_string(), name],
                |row| row.get(0),
            )
            .optional()
        })
    }

    // -- Maps --

    pub fn insert_map(&self, map: &UserMap) -> Result<()> {
        self.with_conn(|conn| insert_map_row(conn, map))
    }

    pub fn get_map(&self, id: Uuid) -> Result<Option<UserMap>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {MAP_COLUMNS} FROM maps WHERE id = ?1"),
                [id.to_string()],
                map_row,
            )
            .optional()?
            .map(MapRow::into_model)
            .transpose()
        })
    }

    /// Maps a user may select in a (group, activity) scope: their own private
    /// maps for the group, the group's maps and the activity's shared maps.
    /// Most specific first, then most recently modified.
    pub fn list_visible_maps(
        &self,
        activity_id: Uuid,
        owner_id: Uuid,
        group_id: GroupId,
    ) -> Result<Vec<UserMap>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MAP_COLUMNS} FROM maps
                 WHERE activity_id = ?1
                   AND ((visibility = 0 AND owner_id = ?2 AND group_id = ?3)
                     OR (visibility = 1 AND group_id = ?3)
                     OR visibility = 2)
                 ORDER BY visibility ASC, time_modified DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map(
                    params![activity_id.to_string(), owner_id.to_string(), group_id],
                    map_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(MapRow::into_model).collect()
        })
    }

    /// Names of every map an owner has in an activity.
    pub fn get_map_names(&self, activity_id: Uuid, owner_id: Uuid) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT name FROM maps WHERE activity_id = ?1 AND owner_id = ?2")?;
            let names = stmt
                .query_map([activity_id.to_string(), owner_id.to_string()], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }

    /// Insert `map` with a copy of every coordinate of `source_id`.
    pub fn clone_map(&self, source_id: Uuid, map: &UserMap) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_map_row(&tx, map)?;
            tx.execute(
                "INSERT INTO coordinates (map_id, user_id, x, y)
                 SELECT ?1, user_id, x, y FROM coordinates WHERE map_id = ?2",
                [map.id.to_string(), source_id.to_string()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Delete a map; its coordinates cascade.
    pub fn delete_map(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM maps WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }

    /// Write a map's size and a batch of coordinates in one transaction.
    /// Coordinates not in the batch are left alone.
    pub fn save_map_state(&self, map: &UserMap, coordinates: &[Coordinate]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE maps
                 SET width = ?2, height = ?3, tile_width = ?4, tile_height = ?5, time_modified = ?6
                 WHERE id = ?1",
                params![
                    map.id.to_string(),
                    map.width,
                    map.height,
                    map.tile_width,
                    map.tile_height,
                    map.time_modified.timestamp(),
                ],
            )?;
            upsert_coordinates(&tx, coordinates)?;
            tx.commit()?;
            Ok(())
        })
    }

    // -- Coordinates --

    pub fn get_coordinates(&self, map_id: Uuid) -> Result<Vec<Coordinate>> {
        self.with_conn(|conn| query_coordinates(conn, map_id))
    }

    /// Make the coordinate set of a map equal `user_ids`: missing users are
    /// added at (0, 0), everyone else is deleted. Returns (added, removed).
    pub fn reconcile_coordinates(&self, map_id: Uuid, user_ids: &[Uuid]) -> Result<(usize, usize)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing = query_coordinates(&tx, map_id)?;

            let mut removed = 0;
            for c in existing.iter().filter(|c| !user_ids.contains(&c.user_id)) {
                removed += tx.execute(
                    "DELETE FROM coordinates WHERE map_id = ?1 AND user_id = ?2",
                    [map_id.to_string(), c.user_id.to_string()],
                )?;
            }

            let mut added = 0;
            for user_id in user_ids {
                if existing.iter().any(|c| c.user_id == *user_id) {
                    continue;
                }
                added += tx.execute(
                    "INSERT OR IGNORE INTO coordinates (map_id, user_id, x, y)
                     VALUES (?1, ?2, 0, 0)",
                    [map_id.to_string(), user_id.to_string()],
                )?;
            }

            tx.commit()?;
            Ok((added, removed))
        })
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<MapRow> {
    Ok(MapRow {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        group_id: row.get(3)?,
        activity_id: row.get(4)?,
        visibility: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
        tile_width: row.get(8)?,
        tile_height: row.get(9)?,
        time_modified: row.get(10)?,
    })
}

fn participant_row(row: &Row<'_>) -> rusqlite::Result<ParticipantRow> {
    Ok(ParticipantRow {
        user_id: row.get(0)?,
        group_id: row.get(1)?,
        full_name: row.get(2)?,
    })
}

fn award_row(row: &Row<'_>) -> rusqlite::Result<AwardRow> {
    Ok(AwardRow {
        id: row.get(0)?,
        activity_id: row.get(1)?,
        recipient_id: row.get(2)?,
        awarder_id: row.get(3)?,
        points: row.get(4)?,
        comment: row.get(5)?,
        comment_format: row.get(6)?,
        time_created: row.get(7)?,
        time_awarded: row.get(8)?,
        time_modified: row.get(9)?,
    })
}

fn insert_map_row(conn: &Connection, map: &UserMap) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO maps ({MAP_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            map.id.to_string(),
            map.name,
            map.owner_id.to_string(),
            map.group_id,
            map.activity_id.to_string(),
            map.visibility.rank(),
            map.width,
            map.height,
            map.tile_width,
            map.tile_height,
            map.time_modified.timestamp(),
        ],
    )?;
    Ok(())
}

fn upsert_coordinates(conn: &Connection, coordinates: &[Coordinate]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO coordinates (map_id, user_id, x, y) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(map_id, user_id) DO UPDATE SET x = excluded.x, y = excluded.y",
    )?;
    for c in coordinates {
        stmt.execute(params![c.map_id.to_string(), c.user_id.to_string(), c.x, c.y])?;
    }
    Ok(())
}

fn query_coordinates(conn: &Connection, map_id: Uuid) -> Result<Vec<Coordinate>> {
    let mut stmt = conn.prepare("SELECT map_id, user_id, x, y FROM coordinates WHERE map_id = ?1")?;
    let rows = stmt
        .query_map([map_id.to_string()], |row| {
            Ok(CoordinateRow {
                map_id: row.get(0)?,
                user_id: row.get(1)?,
                x: row.get(2)?,
                y: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(CoordinateRow::into_model).collect()
}

fn query_roster(
    conn: &Connection,
    activity_id: Uuid,
    group_id: GroupId,
) -> Result<Vec<Participant>> {
    let rows = if group_id == ALL_PARTICIPANTS {
        let mut stmt = conn.prepare(
            "SELECT user_id, 0, MIN(full_name) AS name FROM participants
             WHERE activity_id = ?1
             GROUP BY user_id
             ORDER BY name, user_id",
        )?;
        let rows = stmt
            .query_map([activity_id.to_string()], participant_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    } else {
        let mut stmt = conn.prepare(
            "SELECT user_id, group_id, full_name FROM participants
             WHERE activity_id = ?1 AND group_id = ?2
             ORDER BY full_name, user_id",
        )?;
        let rows = stmt
            .query_map(params![activity_id.to_string(), group_id], participant_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    rows.into_iter().map(ParticipantRow::into_model).collect()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

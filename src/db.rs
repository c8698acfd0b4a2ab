use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::extract::Segment;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS resources (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS tags (
            id         INTEGER PRIMARY KEY,
            name       TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- No uniqueness on (resource_id, tag_id): reprocessing a resource
        -- produces duplicate links. Known gap, covered by a regression test.
        CREATE TABLE IF NOT EXISTS tags_resources (
            id          INTEGER PRIMARY KEY,
            resource_id INTEGER NOT NULL REFERENCES resources(id),
            tag_id      INTEGER NOT NULL REFERENCES tags(id)
        );
        CREATE INDEX IF NOT EXISTS idx_tags_resources_resource
            ON tags_resources(resource_id);

        CREATE TABLE IF NOT EXISTS transcripts (
            id          INTEGER PRIMARY KEY,
            resource_id INTEGER NOT NULL REFERENCES resources(id),
            transcript  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_transcripts_resource
            ON transcripts(resource_id);
        ",
    )?;
    Ok(())
}

// ── Resources ──

pub struct Resource {
    pub id: i64,
    pub url: String,
}

pub fn insert_resource(conn: &Connection, url: &str) -> Result<usize> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO resources (url) VALUES (?1)",
        rusqlite::params![url],
    )?;
    Ok(count)
}

pub fn fetch_resources(conn: &Connection, limit: usize) -> Result<Vec<Resource>> {
    let mut stmt = conn.prepare("SELECT id, url FROM resources ORDER BY id LIMIT ?1")?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(Resource {
                id: row.get(0)?,
                url: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Transcripts ──

/// Persist the structured transcript for one extraction pass as a single
/// unit. Segments are stored as the JSON array the extractor produced.
pub fn save_transcript(conn: &Connection, resource_id: i64, segments: &[Segment]) -> Result<()> {
    let json = serde_json::to_string(segments)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO transcripts (resource_id, transcript) VALUES (?1, ?2)",
        rusqlite::params![resource_id, json],
    )?;
    tx.commit()?;
    Ok(())
}

pub fn transcript_count(conn: &Connection, resource_id: i64) -> Result<usize> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM transcripts WHERE resource_id = ?1",
        [resource_id],
        |r| r.get(0),
    )?;
    Ok(count)
}

// ── Tag vocabulary ──

/// Snapshot of every tag name currently known. Fetched fresh per
/// classification call; backend output is validated against it.
pub fn fetch_tag_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM tags ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_tag_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM tags WHERE name = ?1")?;
    let id = stmt
        .query_map([name], |row| row.get(0))?
        .next()
        .transpose()?;
    Ok(id)
}

pub fn insert_tag(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO tags (name) VALUES (?1)",
        rusqlite::params![name],
    )?;
    let id = conn.query_row("SELECT id FROM tags WHERE name = ?1", [name], |r| r.get(0))?;
    Ok(id)
}

/// Plain link insert. Deliberately not idempotent — see the schema comment.
pub fn link_tag(conn: &Connection, resource_id: i64, tag_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO tags_resources (resource_id, tag_id) VALUES (?1, ?2)",
        rusqlite::params![resource_id, tag_id],
    )?;
    Ok(())
}

// ── Overview / stats ──

pub struct TagUsage {
    pub name: String,
    pub resources: usize,
}

pub fn fetch_tag_overview(conn: &Connection) -> Result<Vec<TagUsage>> {
    let mut stmt = conn.prepare(
        "SELECT t.name, COUNT(tr.id)
         FROM tags t
         LEFT JOIN tags_resources tr ON tr.tag_id = t.id
         GROUP BY t.id
         ORDER BY COUNT(tr.id) DESC, t.name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TagUsage {
                name: row.get(0)?,
                resources: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct Stats {
    pub resources: usize,
    pub transcripts: usize,
    pub tags: usize,
    pub links: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let resources: usize = conn.query_row("SELECT COUNT(*) FROM resources", [], |r| r.get(0))?;
    let transcripts: usize = conn.query_row("SELECT COUNT(*) FROM transcripts", [], |r| r.get(0))?;
    let tags: usize = conn.query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))?;
    let links: usize = conn.query_row("SELECT COUNT(*) FROM tags_resources", [], |r| r.get(0))?;
    Ok(Stats {
        resources,
        transcripts,
        tags,
        links,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn resource_insert_is_idempotent() {
        let conn = test_conn();
        assert_eq!(insert_resource(&conn, "https://example.com/a.pdf").unwrap(), 1);
        assert_eq!(insert_resource(&conn, "https://example.com/a.pdf").unwrap(), 0);
        assert_eq!(fetch_resources(&conn, 10).unwrap().len(), 1);
    }

    #[test]
    fn vocabulary_grows_append_only() {
        let conn = test_conn();
        let a = insert_tag(&conn, "pdf").unwrap();
        let b = insert_tag(&conn, "video").unwrap();
        // Re-inserting an existing name returns the same id.
        assert_eq!(insert_tag(&conn, "pdf").unwrap(), a);
        assert_ne!(a, b);
        assert_eq!(fetch_tag_names(&conn).unwrap(), vec!["pdf", "video"]);
        assert_eq!(find_tag_id(&conn, "pdf").unwrap(), Some(a));
        assert_eq!(find_tag_id(&conn, "e-book").unwrap(), None);
    }

    #[test]
    fn relinking_duplicates_links_but_transcripts_append() {
        let conn = test_conn();
        insert_resource(&conn, "https://example.com/talk.mp4").unwrap();
        let resource = &fetch_resources(&conn, 1).unwrap()[0];
        let tag = insert_tag(&conn, "video").unwrap();

        // Two processing passes over the same resource: links duplicate
        // (no guard in the schema), transcripts simply append one row per
        // pass. Documents current behavior, not an endorsement.
        for _ in 0..2 {
            save_transcript(
                &conn,
                resource.id,
                &[Segment::Video {
                    transcript: "hello".into(),
                    video: resource.url.clone(),
                }],
            )
            .unwrap();
            link_tag(&conn, resource.id, tag).unwrap();
        }

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.links, 2);
        assert_eq!(transcript_count(&conn, resource.id).unwrap(), 2);
    }

    #[test]
    fn transcript_round_trips_segment_json() {
        let conn = test_conn();
        insert_resource(&conn, "https://example.com/page.html").unwrap();
        let resource = &fetch_resources(&conn, 1).unwrap()[0];
        save_transcript(
            &conn,
            resource.id,
            &[Segment::Text {
                transcript: "visible text".into(),
            }],
        )
        .unwrap();

        let stored: String = conn
            .query_row(
                "SELECT transcript FROM transcripts WHERE resource_id = ?1",
                [resource.id],
                |r| r.get(0),
            )
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(parsed[0]["type"], "text");
        assert_eq!(parsed[0]["transcript"], "visible text");
    }

    #[test]
    fn tag_overview_counts_links() {
        let conn = test_conn();
        insert_resource(&conn, "https://example.com/a").unwrap();
        insert_resource(&conn, "https://example.com/b").unwrap();
        let resources = fetch_resources(&conn, 2).unwrap();
        let video = insert_tag(&conn, "video").unwrap();
        insert_tag(&conn, "pdf").unwrap();
        for r in &resources {
            link_tag(&conn, r.id, video).unwrap();
        }

        let overview = fetch_tag_overview(&conn).unwrap();
        assert_eq!(overview[0].name, "video");
        assert_eq!(overview[0].resources, 2);
        assert_eq!(overview[1].name, "pdf");
        assert_eq!(overview[1].resources, 0);
    }
}

//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via `tokio::task::spawn_blocking`.
//!
//! Rows are read into plain column structs inside the rusqlite closures and
//! validated into core entities afterwards, so malformed ids or state codes
//! surface as [`StoreError::Core`] rather than as SQL errors.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use souma_core::{
    ContentState, KeyMaterial, Keyring, Oneup, OneupId, OneupState, Persona, PersonaId, Planet,
    PlanetId, PlanetKind, Signature, Souma, SoumaId, Star, StarId, Starmap, StarmapId,
    StateCode, Timestamp, Vesicle, VesicleId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{InsertResult, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

struct KeyColumns {
    sign_private: Vec<u8>,
    sign_public: Vec<u8>,
    crypt_private: Vec<u8>,
    crypt_public: Vec<u8>,
}

impl KeyColumns {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sign_private: row.get("sign_private")?,
            sign_public: row.get("sign_public")?,
            crypt_private: row.get("crypt_private")?,
            crypt_public: row.get("crypt_public")?,
        })
    }

    fn into_keyring(self) -> Keyring {
        Keyring {
            sign_private: KeyMaterial::new(self.sign_private),
            sign_public: KeyMaterial::new(self.sign_public),
            crypt_private: KeyMaterial::new(self.crypt_private),
            crypt_public: KeyMaterial::new(self.crypt_public),
        }
    }
}

struct PersonaRow {
    id: String,
    username: Option<String>,
    email: Option<String>,
    keys: KeyColumns,
    modified: i64,
    profile_id: Option<String>,
    index_id: Option<String>,
    myelin_offset: Option<i64>,
}

impl PersonaRow {
    const COLUMNS: &'static str = "id, username, email, sign_private, sign_public, crypt_private,
        crypt_public, modified, profile_id, index_id, myelin_offset";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            keys: KeyColumns::read(row)?,
            modified: row.get("modified")?,
            profile_id: row.get("profile_id")?,
            index_id: row.get("index_id")?,
            myelin_offset: row.get("myelin_offset")?,
        })
    }

    fn into_persona(self, contacts: Vec<String>) -> Result<Persona> {
        Ok(Persona {
            id: PersonaId::parse(&self.id)?,
            username: self.username,
            email: self.email,
            keyring: self.keys.into_keyring(),
            modified: Timestamp::from_millis(self.modified),
            profile_id: self.profile_id.as_deref().map(StarmapId::parse).transpose()?,
            index_id: self.index_id.as_deref().map(StarmapId::parse).transpose()?,
            contacts: contacts
                .iter()
                .map(|c| PersonaId::parse(c))
                .collect::<std::result::Result<_, _>>()?,
            myelin_offset: self.myelin_offset.map(Timestamp::from_millis),
        })
    }
}

struct StarRow {
    id: String,
    text: String,
    created: i64,
    modified: i64,
    state: i64,
    creator_id: String,
}

impl StarRow {
    const COLUMNS: &'static str = "id, text, created, modified, state, creator_id";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            text: row.get("text")?,
            created: row.get("created")?,
            modified: row.get("modified")?,
            state: row.get("state")?,
            creator_id: row.get("creator_id")?,
        })
    }

    fn into_star(self, planets: Vec<String>) -> Result<Star> {
        let planets = planets
            .iter()
            .map(|p| PlanetId::parse(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Star::restore(
            StarId::parse(&self.id)?,
            self.text,
            Timestamp::from_millis(self.created),
            Timestamp::from_millis(self.modified),
            ContentState::validate("star", self.state)?,
            PersonaId::parse(&self.creator_id)?,
            planets,
        ))
    }
}

struct PlanetRow {
    id: String,
    title: Option<String>,
    kind: String,
    payload: String,
    created: i64,
    modified: i64,
    state: i64,
    source: Option<String>,
}

impl PlanetRow {
    const COLUMNS: &'static str = "id, title, kind, payload, created, modified, state, source";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            kind: row.get("kind")?,
            payload: row.get("payload")?,
            created: row.get("created")?,
            modified: row.get("modified")?,
            state: row.get("state")?,
            source: row.get("source")?,
        })
    }

    fn into_planet(self) -> Result<Planet> {
        let kind = match self.kind.as_str() {
            "picture" => PlanetKind::Picture {
                filename: self.payload,
            },
            "link" => PlanetKind::Link { url: self.payload },
            other => {
                return Err(StoreError::InvalidData(format!(
                    "unknown planet kind {other:?} for {}",
                    self.id
                )))
            }
        };
        Ok(Planet::restore(
            PlanetId::parse(&self.id)?,
            self.title,
            kind,
            Timestamp::from_millis(self.created),
            Timestamp::from_millis(self.modified),
            ContentState::validate("planet", self.state)?,
            self.source,
        ))
    }
}

fn planet_payload(kind: &PlanetKind) -> &str {
    match kind {
        PlanetKind::Picture { filename } => filename,
        PlanetKind::Link { url } => url,
    }
}

struct OneupRow {
    id: String,
    created: i64,
    modified: i64,
    state: i64,
    creator_id: String,
    star_id: String,
}

impl OneupRow {
    const COLUMNS: &'static str = "id, created, modified, state, creator_id, star_id";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            created: row.get("created")?,
            modified: row.get("modified")?,
            state: row.get("state")?,
            creator_id: row.get("creator_id")?,
            star_id: row.get("star_id")?,
        })
    }

    fn into_oneup(self) -> Result<Oneup> {
        Ok(Oneup::restore(
            OneupId::parse(&self.id)?,
            Timestamp::from_millis(self.created),
            Timestamp::from_millis(self.modified),
            OneupState::validate("oneup", self.state)?,
            PersonaId::parse(&self.creator_id)?,
            StarId::parse(&self.star_id)?,
        ))
    }
}

struct VesicleRow {
    id: String,
    created: i64,
    author_id: String,
    source_id: Option<String>,
    payload: String,
    signature: Vec<u8>,
}

impl VesicleRow {
    const COLUMNS: &'static str = "id, created, author_id, source_id, payload, signature";

    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            created: row.get("created")?,
            author_id: row.get("author_id")?,
            source_id: row.get("source_id")?,
            payload: row.get("payload")?,
            signature: row.get("signature")?,
        })
    }

    fn into_vesicle(self) -> Result<Vesicle> {
        let signature = Signature::from_slice(&self.signature).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "vesicle {} has a {}-byte signature",
                self.id,
                self.signature.len()
            ))
        })?;
        Ok(Vesicle {
            id: VesicleId::parse(&self.id)?,
            created: Timestamp::from_millis(self.created),
            author_id: PersonaId::parse(&self.author_id)?,
            source_id: self.source_id.as_deref().map(SoumaId::parse).transpose()?,
            payload: self.payload,
            signature,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blocking helpers
// ─────────────────────────────────────────────────────────────────────────────

fn query_strings(conn: &Connection, sql: &str, key: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let values = stmt
        .query_map(params![key], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(values)
}

fn load_persona(conn: &Connection, id: &str) -> Result<Option<Persona>> {
    let sql = format!("SELECT {} FROM persona WHERE id = ?1", PersonaRow::COLUMNS);
    let Some(row) = conn
        .query_row(&sql, params![id], PersonaRow::read)
        .optional()?
    else {
        return Ok(None);
    };
    let contacts = query_strings(
        conn,
        "SELECT right_id FROM contacts WHERE left_id = ?1 ORDER BY position",
        id,
    )?;
    row.into_persona(contacts).map(Some)
}

fn load_star(conn: &Connection, id: &str) -> Result<Option<Star>> {
    let sql = format!("SELECT {} FROM star WHERE id = ?1", StarRow::COLUMNS);
    let Some(row) = conn.query_row(&sql, params![id], StarRow::read).optional()? else {
        return Ok(None);
    };
    let planets = query_strings(
        conn,
        "SELECT planet_id FROM satellites WHERE star_id = ?1 ORDER BY planet_id",
        id,
    )?;
    row.into_star(planets).map(Some)
}

fn load_planet(conn: &Connection, id: &str) -> Result<Option<Planet>> {
    let sql = format!("SELECT {} FROM planet WHERE id = ?1", PlanetRow::COLUMNS);
    conn.query_row(&sql, params![id], PlanetRow::read)
        .optional()?
        .map(PlanetRow::into_planet)
        .transpose()
}

fn load_starmap(conn: &Connection, id: &str) -> Result<Option<Starmap>> {
    let Some((modified, author_id)) = conn
        .query_row(
            "SELECT modified, author_id FROM starmap WHERE id = ?1",
            params![id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?
    else {
        return Ok(None);
    };
    let index = query_strings(
        conn,
        "SELECT star_id FROM starmap_index WHERE starmap_id = ?1 ORDER BY position",
        id,
    )?
    .iter()
    .map(|s| StarId::parse(s))
    .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(Starmap::restore(
        StarmapId::parse(id)?,
        author_id.as_deref().map(PersonaId::parse).transpose()?,
        Timestamp::from_millis(modified),
        index,
    )))
}

fn write_keys(keyring: &Keyring) -> [&[u8]; 4] {
    [
        keyring.sign_private.as_bytes(),
        keyring.sign_public.as_bytes(),
        keyring.crypt_private.as_bytes(),
        keyring.crypt_public.as_bytes(),
    ]
}

#[async_trait]
impl Store for SqliteStore {
    async fn put_persona(&self, persona: &Persona) -> Result<()> {
        let persona = persona.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let [sign_private, sign_public, crypt_private, crypt_public] =
                write_keys(&persona.keyring);
            tx.execute(
                "INSERT OR REPLACE INTO persona (
                    id, username, email, sign_private, sign_public, crypt_private,
                    crypt_public, modified, profile_id, index_id, myelin_offset
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    persona.id.as_str(),
                    persona.username,
                    persona.email,
                    sign_private,
                    sign_public,
                    crypt_private,
                    crypt_public,
                    persona.modified.as_millis(),
                    persona.profile_id.as_ref().map(|id| id.as_str()),
                    persona.index_id.as_ref().map(|id| id.as_str()),
                    persona.myelin_offset.map(|t| t.as_millis()),
                ],
            )?;

            tx.execute(
                "DELETE FROM contacts WHERE left_id = ?1",
                params![persona.id.as_str()],
            )?;
            for (position, contact) in persona.contacts.iter().enumerate() {
                tx.execute(
                    "INSERT INTO contacts (left_id, right_id, position) VALUES (?1, ?2, ?3)",
                    params![persona.id.as_str(), contact.as_str(), position as i64],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_persona(&self, id: &PersonaId) -> Result<Option<Persona>> {
        let id = id.clone();
        self.run(move |conn| load_persona(conn, id.as_str())).await
    }

    async fn list_personas(&self, controlled_only: bool) -> Result<Vec<Persona>> {
        self.run(move |conn| {
            let sql = if controlled_only {
                "SELECT id FROM persona
                 WHERE length(sign_private) > 0 AND length(crypt_private) > 0
                 ORDER BY id"
            } else {
                "SELECT id FROM persona ORDER BY id"
            };
            let mut stmt = conn.prepare(sql)?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut personas = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(persona) = load_persona(conn, &id)? {
                    personas.push(persona);
                }
            }
            Ok(personas)
        })
        .await
    }

    async fn put_souma(&self, souma: &Souma) -> Result<()> {
        let souma = souma.clone();

        self.run(move |conn| {
            let [sign_private, sign_public, crypt_private, crypt_public] =
                write_keys(&souma.keyring);
            conn.execute(
                "INSERT OR REPLACE INTO souma (
                    id, sign_private, sign_public, crypt_private, crypt_public, starmap_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    souma.id.as_str(),
                    sign_private,
                    sign_public,
                    crypt_private,
                    crypt_public,
                    souma.starmap_id.as_ref().map(|id| id.as_str()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_souma(&self, id: &SoumaId) -> Result<Option<Souma>> {
        let id = id.clone();

        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT sign_private, sign_public, crypt_private, crypt_public, starmap_id
                     FROM souma WHERE id = ?1",
                    params![id.as_str()],
                    |row| {
                        Ok((
                            KeyColumns::read(row)?,
                            row.get::<_, Option<String>>("starmap_id")?,
                        ))
                    },
                )
                .optional()?;

            let Some((keys, starmap_id)) = row else {
                return Ok(None);
            };
            Ok(Some(Souma {
                id,
                keyring: keys.into_keyring(),
                starmap_id: starmap_id.as_deref().map(StarmapId::parse).transpose()?,
            }))
        })
        .await
    }

    async fn put_star(&self, star: &Star) -> Result<()> {
        let star = star.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO star (id, text, created, modified, state, creator_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    star.id.as_str(),
                    star.text,
                    star.created.as_millis(),
                    star.modified.as_millis(),
                    star.state().code(),
                    star.creator_id().as_str(),
                ],
            )?;

            tx.execute(
                "DELETE FROM satellites WHERE star_id = ?1",
                params![star.id.as_str()],
            )?;
            for planet in star.planet_ids() {
                tx.execute(
                    "INSERT INTO satellites (star_id, planet_id) VALUES (?1, ?2)",
                    params![star.id.as_str(), planet.as_str()],
                )?;
            }

            tx.commit()?;
            tracing::debug!(star = %star.id.short(), "stored star");
            Ok(())
        })
        .await
    }

    async fn get_star(&self, id: &StarId) -> Result<Option<Star>> {
        let id = id.clone();
        self.run(move |conn| load_star(conn, id.as_str())).await
    }

    async fn stars_by_creator(&self, creator: &PersonaId) -> Result<Vec<Star>> {
        let creator = creator.clone();

        self.run(move |conn| {
            let ids = query_strings(
                conn,
                "SELECT id FROM star WHERE creator_id = ?1 ORDER BY created, id",
                creator.as_str(),
            )?;
            let mut stars = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(star) = load_star(conn, &id)? {
                    stars.push(star);
                }
            }
            Ok(stars)
        })
        .await
    }

    async fn stars_with_planet(&self, planet: &PlanetId) -> Result<Vec<StarId>> {
        let planet = planet.clone();

        self.run(move |conn| {
            query_strings(
                conn,
                "SELECT star_id FROM satellites WHERE planet_id = ?1 ORDER BY star_id",
                planet.as_str(),
            )?
            .iter()
            .map(|s| StarId::parse(s).map_err(StoreError::from))
            .collect()
        })
        .await
    }

    async fn put_planet(&self, planet: &Planet) -> Result<()> {
        let planet = planet.clone();

        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO planet (
                    id, title, kind, payload, created, modified, state, source
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    planet.id.as_str(),
                    planet.title,
                    planet.kind().name(),
                    planet_payload(planet.kind()),
                    planet.created.as_millis(),
                    planet.modified.as_millis(),
                    planet.state().code(),
                    planet.source,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_planet(&self, id: &PlanetId) -> Result<Option<Planet>> {
        let id = id.clone();
        self.run(move |conn| load_planet(conn, id.as_str())).await
    }

    async fn get_planets(&self, ids: &[PlanetId]) -> Result<Vec<Planet>> {
        let ids = ids.to_vec();

        self.run(move |conn| {
            let mut planets = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(planet) = load_planet(conn, id.as_str())? {
                    planets.push(planet);
                }
            }
            Ok(planets)
        })
        .await
    }

    async fn delete_planet(&self, id: &PlanetId) -> Result<bool> {
        let id = id.clone();

        self.run(move |conn| {
            let deleted = conn.execute("DELETE FROM planet WHERE id = ?1", params![id.as_str()])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn insert_oneup(&self, oneup: &Oneup) -> Result<InsertResult<OneupId>> {
        let oneup = oneup.clone();

        self.run(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM oneup WHERE id = ?1)",
                params![oneup.id.as_str()],
                |row| row.get(0),
            )?;
            if exists {
                return Ok(InsertResult::AlreadyExists);
            }

            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM oneup WHERE creator_id = ?1 AND star_id = ?2",
                    params![oneup.creator_id().as_str(), oneup.star_id().as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(existing) = existing {
                tracing::debug!(oneup = %oneup, existing = %existing, "oneup slot taken");
                return Ok(InsertResult::Conflict {
                    existing: OneupId::parse(&existing)?,
                });
            }

            conn.execute(
                "INSERT INTO oneup (id, created, modified, state, creator_id, star_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    oneup.id.as_str(),
                    oneup.created.as_millis(),
                    oneup.modified.as_millis(),
                    oneup.state().code(),
                    oneup.creator_id().as_str(),
                    oneup.star_id().as_str(),
                ],
            )?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn update_oneup(&self, oneup: &Oneup) -> Result<()> {
        let oneup = oneup.clone();

        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE oneup SET state = ?2, modified = ?3 WHERE id = ?1",
                params![
                    oneup.id.as_str(),
                    oneup.state().code(),
                    oneup.modified.as_millis()
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("oneup", &oneup.id));
            }
            Ok(())
        })
        .await
    }

    async fn find_oneup(&self, creator: &PersonaId, star: &StarId) -> Result<Option<Oneup>> {
        let creator = creator.clone();
        let star = star.clone();

        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM oneup WHERE creator_id = ?1 AND star_id = ?2",
                OneupRow::COLUMNS
            );
            conn.query_row(
                &sql,
                params![creator.as_str(), star.as_str()],
                OneupRow::read,
            )
            .optional()?
            .map(OneupRow::into_oneup)
            .transpose()
        })
        .await
    }

    async fn oneups_for_star(&self, star: &StarId) -> Result<Vec<Oneup>> {
        let star = star.clone();

        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM oneup WHERE star_id = ?1 ORDER BY created, id",
                OneupRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![star.as_str()], OneupRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(OneupRow::into_oneup).collect()
        })
        .await
    }

    async fn count_active_oneups(&self, star: &StarId) -> Result<u64> {
        let star = star.clone();

        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM oneup WHERE star_id = ?1 AND state = ?2",
                params![star.as_str(), OneupState::Active.code()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn put_starmap(&self, starmap: &Starmap) -> Result<()> {
        let starmap = starmap.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO starmap (id, modified, author_id) VALUES (?1, ?2, ?3)",
                params![
                    starmap.id.as_str(),
                    starmap.modified.as_millis(),
                    starmap.author_id.as_ref().map(|id| id.as_str()),
                ],
            )?;

            tx.execute(
                "DELETE FROM starmap_index WHERE starmap_id = ?1",
                params![starmap.id.as_str()],
            )?;
            for (position, star) in starmap.index().iter().enumerate() {
                tx.execute(
                    "INSERT INTO starmap_index (starmap_id, star_id, position)
                     VALUES (?1, ?2, ?3)",
                    params![starmap.id.as_str(), star.as_str(), position as i64],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_starmap(&self, id: &StarmapId) -> Result<Option<Starmap>> {
        let id = id.clone();
        self.run(move |conn| load_starmap(conn, id.as_str())).await
    }

    async fn starmaps_indexing(&self, star: &StarId) -> Result<Vec<StarmapId>> {
        let star = star.clone();

        self.run(move |conn| {
            query_strings(
                conn,
                "SELECT starmap_id FROM starmap_index WHERE star_id = ?1 ORDER BY starmap_id",
                star.as_str(),
            )?
            .iter()
            .map(|s| StarmapId::parse(s).map_err(StoreError::from))
            .collect()
        })
        .await
    }

    async fn insert_vesicle(&self, vesicle: &Vesicle) -> Result<InsertResult<VesicleId>> {
        let vesicle = vesicle.clone();

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO vesicle (
                    id, created, author_id, source_id, payload, signature
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    vesicle.id.as_str(),
                    vesicle.created.as_millis(),
                    vesicle.author_id.as_str(),
                    vesicle.source_id.as_ref().map(|id| id.as_str()),
                    vesicle.payload,
                    vesicle.signature.as_bytes().as_slice(),
                ],
            )?;
            Ok(if inserted > 0 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn get_vesicle(&self, id: &VesicleId) -> Result<Option<Vesicle>> {
        let id = id.clone();

        self.run(move |conn| {
            let sql = format!("SELECT {} FROM vesicle WHERE id = ?1", VesicleRow::COLUMNS);
            conn.query_row(&sql, params![id.as_str()], VesicleRow::read)
                .optional()?
                .map(VesicleRow::into_vesicle)
                .transpose()
        })
        .await
    }

    async fn vesicles_by_author(&self, author: &PersonaId) -> Result<Vec<Vesicle>> {
        let author = author.clone();

        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM vesicle WHERE author_id = ?1 ORDER BY created, id",
                VesicleRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![author.as_str()], VesicleRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(VesicleRow::into_vesicle).collect()
        })
        .await
    }
}

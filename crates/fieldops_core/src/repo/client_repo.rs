//! Client/site repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD persistence for clients and their sites.
//!
//! # Invariants
//! - Client listings exclude archived rows unless asked otherwise.
//! - Sites always reference an existing client (enforced by FK).

use crate::model::client::{Client, ClientId, Site, SiteId};
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, map_constraint, normalize_list_limit,
    parse_uuid_text, RepoError, RepoResult, TableSpec,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const REQUIRED_TABLES: &[TableSpec] = &[
    ("clients", &["uuid", "name", "archived"]),
    ("sites", &["uuid", "client_uuid", "label", "address"]),
];

const CLIENT_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    contact_name,
    email,
    phone,
    archived
FROM clients";

const SITE_SELECT_SQL: &str = "SELECT
    uuid,
    client_uuid,
    label,
    address,
    access_notes
FROM sites";

/// Query options for listing clients.
#[derive(Debug, Clone, Default)]
pub struct ClientListQuery {
    pub include_archived: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for client/site persistence.
pub trait ClientRepository {
    fn create_client(&self, client: &Client) -> RepoResult<ClientId>;
    fn update_client(&self, client: &Client) -> RepoResult<()>;
    fn set_archived(&self, id: ClientId, archived: bool) -> RepoResult<()>;
    fn get_client(&self, id: ClientId) -> RepoResult<Option<Client>>;
    fn list_clients(&self, query: &ClientListQuery) -> RepoResult<Vec<Client>>;
    fn add_site(&self, site: &Site) -> RepoResult<SiteId>;
    fn update_site(&self, site: &Site) -> RepoResult<()>;
    fn remove_site(&self, id: SiteId) -> RepoResult<()>;
    fn get_site(&self, id: SiteId) -> RepoResult<Option<Site>>;
    fn list_sites(&self, client_id: ClientId) -> RepoResult<Vec<Site>>;
}

/// SQLite-backed client repository.
pub struct SqliteClientRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteClientRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl ClientRepository for SqliteClientRepository<'_> {
    fn create_client(&self, client: &Client) -> RepoResult<ClientId> {
        client.validate()?;

        self.conn.execute(
            "INSERT INTO clients (uuid, name, contact_name, email, phone, archived)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                client.id.to_string(),
                client.name.as_str(),
                client.contact_name.as_deref(),
                client.email.as_deref(),
                client.phone.as_deref(),
                bool_to_int(client.archived),
            ],
        )?;

        Ok(client.id)
    }

    fn update_client(&self, client: &Client) -> RepoResult<()> {
        client.validate()?;

        let changed = self.conn.execute(
            "UPDATE clients
             SET
                name = ?2,
                contact_name = ?3,
                email = ?4,
                phone = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                client.id.to_string(),
                client.name.as_str(),
                client.contact_name.as_deref(),
                client.email.as_deref(),
                client.phone.as_deref(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "client",
                id: client.id,
            });
        }

        Ok(())
    }

    fn set_archived(&self, id: ClientId, archived: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE clients
             SET archived = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), bool_to_int(archived)],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "client",
                id,
            });
        }

        Ok(())
    }

    fn get_client(&self, id: ClientId) -> RepoResult<Option<Client>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CLIENT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_client_row(row)?));
        }
        Ok(None)
    }

    fn list_clients(&self, query: &ClientListQuery) -> RepoResult<Vec<Client>> {
        let mut sql = format!("{CLIENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_archived {
            sql.push_str(" AND archived = 0");
        }

        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, uuid ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_list_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut clients = Vec::new();
        while let Some(row) = rows.next()? {
            clients.push(parse_client_row(row)?);
        }
        Ok(clients)
    }

    fn add_site(&self, site: &Site) -> RepoResult<SiteId> {
        site.validate()?;

        self.conn
            .execute(
                "INSERT INTO sites (uuid, client_uuid, label, address, access_notes)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    site.id.to_string(),
                    site.client_id.to_string(),
                    site.label.as_str(),
                    site.address.as_str(),
                    site.access_notes.as_deref(),
                ],
            )
            .map_err(|err| map_constraint(err, "site references unknown client"))?;

        Ok(site.id)
    }

    fn update_site(&self, site: &Site) -> RepoResult<()> {
        site.validate()?;

        let changed = self.conn.execute(
            "UPDATE sites
             SET
                label = ?2,
                address = ?3,
                access_notes = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                site.id.to_string(),
                site.label.as_str(),
                site.address.as_str(),
                site.access_notes.as_deref(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "site",
                id: site.id,
            });
        }

        Ok(())
    }

    fn remove_site(&self, id: SiteId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM sites WHERE uuid = ?1;", [id.to_string()])
            .map_err(|err| map_constraint(err, "site is referenced by other documents"))?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: "site", id });
        }

        Ok(())
    }

    fn get_site(&self, id: SiteId) -> RepoResult<Option<Site>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SITE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_site_row(row)?));
        }
        Ok(None)
    }

    fn list_sites(&self, client_id: ClientId) -> RepoResult<Vec<Site>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SITE_SELECT_SQL}
             WHERE client_uuid = ?1
             ORDER BY label COLLATE NOCASE ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([client_id.to_string()])?;
        let mut sites = Vec::new();
        while let Some(row) = rows.next()? {
            sites.push(parse_site_row(row)?);
        }
        Ok(sites)
    }
}

fn parse_client_row(row: &Row<'_>) -> RepoResult<Client> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid_text(&uuid_text, "clients.uuid").map_err(RepoError::InvalidData)?;
    let archived =
        int_to_bool(row.get("archived")?, "clients.archived").map_err(RepoError::InvalidData)?;

    Ok(Client {
        id,
        name: row.get("name")?,
        contact_name: row.get("contact_name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        archived,
    })
}

fn parse_site_row(row: &Row<'_>) -> RepoResult<Site> {
    let uuid_text: String = row.get("uuid")?;
    let client_text: String = row.get("client_uuid")?;

    Ok(Site {
        id: parse_uuid_text(&uuid_text, "sites.uuid").map_err(RepoError::InvalidData)?,
        client_id: parse_uuid_text(&client_text, "sites.client_uuid")
            .map_err(RepoError::InvalidData)?,
        label: row.get("label")?,
        address: row.get("address")?,
        access_notes: row.get("access_notes")?,
    })
}

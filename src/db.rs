use std::env::var;

use anyhow::Result;
use diesel::{Connection, MysqlConnection};
use diesel_async::{AsyncConnection, AsyncMysqlConnection};

fn database_url() -> String {
    let user = var("MYSQL_USER").expect("MYSQL_USER must be set");
    let password = var("MYSQL_PASSWORD").expect("MYSQL_PASSWORD must be set");
    let host = var("MYSQL_HOST").expect("MYSQL_HOST must be set");
    let database = var("MYSQL_DATABASE").expect("MYSQL_DATABASE must be set");
    format!("mysql://{}:{}@{}/{}", user, password, host, database)
}

/// One connection per logical operation; there is no pool and no
/// cross-call transactional scope.
pub async fn establish_db_connection() -> Result<AsyncMysqlConnection> {
    match AsyncMysqlConnection::establish(&database_url()).await {
        Ok(db) => Ok(db),
        Err(e) => Err(anyhow::Error::from(e)),
    }
}

/// Sync connection used only to run the embedded migrations at startup.
pub fn establish_sync_db_connection() -> Result<MysqlConnection> {
    match MysqlConnection::establish(&database_url()) {
        Ok(db) => Ok(db),
        Err(e) => Err(anyhow::Error::from(e)),
    }
}

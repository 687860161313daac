//! SQL Server driver over TDS (tiberius).
//!
//! Every call to [`TdsDriver::connect`] performs a full TCP connect and TDS
//! handshake. Nothing is pooled; the client closes when dropped.
//!
//! tiberius does not surface INFO tokens (PRINT output) to callers, so this
//! driver never yields [`ResultItem::Info`].

use crate::database::driver::{ConnectOptions, ResultItem, ResultStream, SqlConnection, SqlDriver};
use crate::database::types::TypeMapper;
use crate::error::DriverError;
use async_trait::async_trait;
use futures_util::stream::StreamExt;
use tiberius::{Client, Config, QueryItem};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

/// Type alias for a raw tiberius connection.
pub type RawConnection = Client<Compat<TcpStream>>;

/// Production [`SqlDriver`] for SQL Server.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdsDriver;

impl TdsDriver {
    /// Create a new driver.
    pub fn new() -> Self {
        Self
    }

    async fn open(config: Config) -> Result<RawConnection, DriverError> {
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;

        match Client::connect(config.clone(), tcp.compat_write()).await {
            Ok(client) => Ok(client),
            // Azure SQL gateways may redirect to the node hosting the database.
            Err(tiberius::error::Error::Routing { host, port }) => {
                debug!("Following server redirect to {}:{}", host, port);
                let mut config = config;
                config.host(&host);
                config.port(port);

                let tcp = TcpStream::connect(config.get_addr()).await?;
                tcp.set_nodelay(true)?;
                Ok(Client::connect(config, tcp.compat_write()).await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SqlDriver for TdsDriver {
    async fn connect(
        &self,
        connection_string: &str,
        _options: &ConnectOptions,
    ) -> Result<Box<dyn SqlConnection>, DriverError> {
        let config = Config::from_ado_string(connection_string)
            .map_err(|e| DriverError::config(format!("Invalid connection string: {}", e)))?;

        let client = Self::open(config).await?;
        debug!("Connection established");
        Ok(Box::new(TdsConnection { client }))
    }
}

/// An open TDS connection.
pub struct TdsConnection {
    client: RawConnection,
}

#[async_trait]
impl SqlConnection for TdsConnection {
    async fn execute<'a>(&'a mut self, sql: &'a str) -> Result<ResultStream<'a>, DriverError> {
        let stream = self.client.simple_query(sql).await?;

        let items = stream.map(|item| {
            item.map_err(DriverError::from).map(|item| match item {
                QueryItem::Metadata(meta) => ResultItem::Columns(
                    meta.columns()
                        .iter()
                        .map(|col| col.name().to_string())
                        .collect(),
                ),
                QueryItem::Row(row) => ResultItem::Row(TypeMapper::row_values(&row)),
            })
        });

        Ok(items.boxed())
    }
}

impl From<tiberius::error::Error> for DriverError {
    fn from(e: tiberius::error::Error) -> Self {
        use tiberius::error::Error;

        match e {
            Error::Server(token) => {
                let line = Some(token.line()).filter(|line| *line > 0);
                DriverError::server(token.code() as i32, line, token.message())
            }
            Error::Io { kind, message } => DriverError::from_io_kind(kind, message),
            Error::Tls(message) => DriverError::other(format!("TLS error: {}", message)),
            other => DriverError::other(other.to_string()),
        }
    }
}

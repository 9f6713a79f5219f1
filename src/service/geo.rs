use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use maxminddb::geoip2;
use snafu::{OptionExt as _, ResultExt as _, Snafu};
use tracing::instrument;

use crate::model::Attribution;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum GeoError {
    /// could not open the country database
    #[snafu(display("could not open the country database `{}`: {source}", path.display()))]
    OpenDatabase {
        path: PathBuf,
        source: maxminddb::MaxMindDBError,
    },

    /// the country database has no entry for the address
    #[snafu(display("could not look up `{address}`: {source}"))]
    Lookup {
        address: IpAddr,
        source: maxminddb::MaxMindDBError,
    },

    #[snafu(display("`{address}` is not a network address"))]
    MalformedAddress {
        address: String,
        source: AddrParseError,
    },

    #[snafu(display("no country is recorded for `{address}`"))]
    MissingCountry { address: IpAddr },

    #[snafu(display("the lookup task for `{address}` did not finish: {source}"))]
    LookupTask {
        address: IpAddr,
        source: tokio::task::JoinError,
    },
}

/// Maps a network address to the country it belongs to.
pub trait CountryLookup: Send + Sync + 'static {
    fn lookup(&self, address: IpAddr) -> Result<Attribution, GeoError>;
}

impl<F> CountryLookup for F
where
    F: Fn(IpAddr) -> Result<Attribution, GeoError> + Send + Sync + 'static,
{
    fn lookup(&self, address: IpAddr) -> Result<Attribution, GeoError> {
        self(address)
    }
}

/// Looks addresses up in a MaxMind country database on disk.
///
/// The file is opened for every lookup and closed right after, so replacing it on disk takes effect on the next click.
#[derive(Debug, Clone)]
pub struct MaxMindLookup {
    path: PathBuf,
}

impl MaxMindLookup {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CountryLookup for MaxMindLookup {
    fn lookup(&self, address: IpAddr) -> Result<Attribution, GeoError> {
        let reader = maxminddb::Reader::open_readfile(&self.path).context(OpenDatabaseSnafu {
            path: self.path.clone(),
        })?;

        let record: geoip2::Country = reader.lookup(address).context(LookupSnafu { address })?;
        let country = record.country.context(MissingCountrySnafu { address })?;

        let code = country
            .iso_code
            .filter(|code| !code.is_empty())
            .context(MissingCountrySnafu { address })?;

        let name = country
            .names
            .as_ref()
            .and_then(|names| names.get("en").copied())
            .unwrap_or(code);

        Ok(Attribution::new(code.to_owned(), name.to_owned()))
    }
}

/// Resolves the country a click is attributed to. Never fails: anything that goes wrong yields [Attribution::unknown].
#[derive(Clone)]
pub struct GeoResolver {
    lookup: Arc<dyn CountryLookup>,
}

impl GeoResolver {
    pub fn new(lookup: impl CountryLookup) -> Self {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    pub fn maxmind(path: impl Into<PathBuf>) -> Self {
        Self::new(MaxMindLookup::new(path))
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, address: Option<&str>, anonymous: bool) -> Attribution {
        if anonymous {
            return Attribution::unknown();
        }

        let Some(address) = address else {
            tracing::debug!("visitor has no address, attributing to the unknown country");
            return Attribution::unknown();
        };

        match self.try_resolve(address).await {
            Ok(attribution) => attribution,
            Err(error) => {
                tracing::debug!(%error, address, "could not resolve visitor country");
                Attribution::unknown()
            }
        }
    }

    async fn try_resolve(&self, address: &str) -> Result<Attribution, GeoError> {
        let address = parse_address(address)?;
        let lookup = Arc::clone(&self.lookup);

        let attribution = tokio::task::spawn_blocking(move || lookup.lookup(address))
            .await
            .context(LookupTaskSnafu { address })??;

        if attribution.code.is_empty() {
            return MissingCountrySnafu { address }.fail();
        }

        Ok(attribution)
    }
}

/// Accepts a bare IP address or a socket address with a port.
fn parse_address(text: &str) -> Result<IpAddr, GeoError> {
    let text = text.trim();

    text.parse::<IpAddr>()
        .or_else(|_| text.parse::<SocketAddr>().map(|socket| socket.ip()))
        .context(MalformedAddressSnafu { address: text })
}

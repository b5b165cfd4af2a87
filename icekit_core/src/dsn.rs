//! Query-engine connection string.

use std::collections::BTreeMap;

/// Connection parameters for the query engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrinoConf {
    pub user: String,
    pub host: String,
    pub port: u16,
    pub catalog: String,
    pub schema: String,
    pub session_params: BTreeMap<String, String>
}

impl TrinoConf {
    /// Formats `http://{user}@{host}:{port}?catalog={catalog}&schema={schema}`,
    /// appending `&session_properties=k=v,...` only when session params are
    /// set.
    pub fn connection_string(&self) -> String {
        let mut dsn = format!(
            "http://{}@{}:{}?catalog={}&schema={}",
            self.user, self.host, self.port, self.catalog, self.schema
        );
        if !self.session_params.is_empty() {
            let params = self
                .session_params
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join(",");
            dsn.push_str("&session_properties=");
            dsn.push_str(&params);
        }
        dsn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf() -> TrinoConf {
        TrinoConf {
            user: "PLZ".to_string(),
            host: "127.0.0.1".to_string(),
            port: 51234,
            catalog: "iceberg".to_string(),
            schema: "default".to_string(),
            session_params: BTreeMap::new()
        }
    }

    #[test]
    fn test_connection_string_without_session_params() {
        assert_eq!(
            conf().connection_string(),
            "http://PLZ@127.0.0.1:51234?catalog=iceberg&schema=default"
        );
    }

    #[test]
    fn test_connection_string_with_session_param() {
        let mut conf = conf();
        conf.session_params.insert("a".to_string(), "1".to_string());
        let dsn = conf.connection_string();
        assert!(dsn.ends_with("&session_properties=a=1"), "got {dsn}");
    }

    #[test]
    fn test_connection_string_joins_session_params_with_commas() {
        let mut conf = conf();
        conf.session_params
            .insert("query_max_run_time".to_string(), "10m".to_string());
        conf.session_params
            .insert("iceberg.compression_codec".to_string(), "ZSTD".to_string());
        let dsn = conf.connection_string();
        let (_, params) = dsn.split_once("&session_properties=").unwrap();
        let mut pairs: Vec<&str> = params.split(',').collect();
        pairs.sort_unstable();
        assert_eq!(
            pairs,
            vec!["iceberg.compression_codec=ZSTD", "query_max_run_time=10m"]
        );
    }
}

//! Startup descriptors for the five fixture services.
//!
//! Everything here is pure data assembly except the scratch-directory helpers,
//! which create the host paths bind-mounted into the containers.
//!
//! Services reach each other by container name on the fixture network. Names
//! are `<network>-<alias>` so that concurrent fixtures never collide.

use errors::FixtureError;
use icekit_core::{ImageRef, Readiness, ServiceDescriptor, ServiceKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

pub const POSTGRES_IMAGE: &str = "postgres";
pub const MINIO_IMAGE: &str = "minio/minio";
pub const MINIO_TAG: &str = "RELEASE.2025-05-24T17-08-30Z";
pub const MC_IMAGE: &str = "minio/mc";
pub const MC_TAG: &str = "RELEASE.2025-05-21T01-59-54Z.hotfix.e98f1ead";
pub const ICEBERG_REST_IMAGE: &str = "tabulario/iceberg-rest";
pub const ICEBERG_REST_TAG: &str = "1.6.0";
pub const TRINO_IMAGE: &str = "trinodb/trino";

pub const POSTGRES_PORT: u16 = 5432;
pub const MINIO_PORT: u16 = 9000;
pub const CATALOG_PORT: u16 = 8181;
pub const TRINO_PORT: u16 = 8080;

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "password";
pub const AWS_REGION: &str = "us-east-1";
pub const WAREHOUSE_BUCKET: &str = "warehouse";
pub const WAREHOUSE_PATH: &str = "s3://warehouse/";
pub const CATALOG_DATABASE: &str = "demo_catalog";

pub const CATALOG_READY_LOG: &str = "Started";
pub const TRINO_READY_LOG: &str = "======== SERVER STARTED ========";

const POSTGRES_DATA: &str = "/var/lib/postgresql/data";
const TRINO_CATALOG_FILE: &str = "/etc/trino/catalog/iceberg.properties";

/// First Trino release that ships the native S3 file system.
const NATIVE_S3_SINCE: u32 = 440;

/// DNS name of `kind` on `network`.
pub fn service_alias(network: &str, kind: ServiceKind) -> String {
    format!("{}-{}", network, kind.alias())
}

fn with_aws_credentials(descriptor: ServiceDescriptor) -> ServiceDescriptor {
    descriptor
        .with_env("AWS_ACCESS_KEY_ID", ADMIN_USER)
        .with_env("AWS_SECRET_ACCESS_KEY", ADMIN_PASSWORD)
        .with_env("AWS_REGION", AWS_REGION)
}

/// PostgreSQL backing the catalog's JDBC store.
pub fn metadata_store(network: &str, version: &str, data_dir: &Path) -> ServiceDescriptor {
    let kind = ServiceKind::MetadataStore;
    ServiceDescriptor::new(kind, ImageRef::new(POSTGRES_IMAGE, version), network)
        .with_alias(service_alias(network, kind))
        .with_env("PGDATA", POSTGRES_DATA)
        .with_env("POSTGRES_USER", ADMIN_USER)
        .with_env("POSTGRES_PASSWORD", ADMIN_PASSWORD)
        .with_env("POSTGRES_DB", CATALOG_DATABASE)
        .with_env("POSTGRES_HOST_AUTH_METHOD", "md5")
        .with_exposed_port(POSTGRES_PORT)
        .with_volume(data_dir, POSTGRES_DATA)
        .with_readiness(Readiness::listening_port(POSTGRES_PORT))
}

/// MinIO holding the warehouse bucket.
pub fn object_store(network: &str, data_dir: &Path) -> ServiceDescriptor {
    let kind = ServiceKind::ObjectStore;
    let alias = service_alias(network, kind);
    ServiceDescriptor::new(kind, ImageRef::new(MINIO_IMAGE, MINIO_TAG), network)
        .with_alias(alias.clone())
        .with_env("MINIO_ROOT_USER", ADMIN_USER)
        .with_env("MINIO_ROOT_PASSWORD", ADMIN_PASSWORD)
        .with_env("MINIO_DOMAIN", alias)
        .with_exposed_port(MINIO_PORT)
        .with_cmd(["server", "/data", "--console-address", ":9001"])
        .with_volume(data_dir, "/data")
        .with_readiness(Readiness::listening_port(MINIO_PORT))
}

/// Script run by the bootstrap sidecar: wait for the object store, create the
/// public warehouse bucket, then idle so the container stays up.
pub fn bootstrap_script(network: &str) -> String {
    let endpoint = format!(
        "http://{}:{}",
        service_alias(network, ServiceKind::ObjectStore),
        MINIO_PORT
    );
    format!(
        "until (/usr/bin/mc alias set minio {endpoint} {ADMIN_USER} {ADMIN_PASSWORD}) do echo '...waiting...' && sleep 1; done;\
         /usr/bin/mc mb --ignore-existing minio/{WAREHOUSE_BUCKET};\
         /usr/bin/mc anonymous set public minio/{WAREHOUSE_BUCKET};\
         tail -f /dev/null"
    )
}

/// `mc` sidecar that provisions the warehouse bucket.
pub fn object_store_bootstrap(network: &str) -> ServiceDescriptor {
    let kind = ServiceKind::ObjectStoreBootstrap;
    with_aws_credentials(ServiceDescriptor::new(
        kind,
        ImageRef::new(MC_IMAGE, MC_TAG),
        network,
    ))
    .with_alias(service_alias(network, kind))
    .with_entrypoint("/bin/sh")
    .with_cmd(["-c".to_string(), bootstrap_script(network)])
    .with_readiness(Readiness::Started)
}

/// JDBC URI of the catalog's metadata store.
pub fn catalog_jdbc_uri(network: &str) -> String {
    format!(
        "jdbc:postgresql://{}:{}/{}",
        service_alias(network, ServiceKind::MetadataStore),
        POSTGRES_PORT,
        CATALOG_DATABASE
    )
}

/// Iceberg REST catalog over the metadata store and object store.
pub fn catalog(network: &str, readiness_timeout: Duration) -> ServiceDescriptor {
    let kind = ServiceKind::Catalog;
    let s3_endpoint = format!(
        "http://{}:{}",
        service_alias(network, ServiceKind::ObjectStore),
        MINIO_PORT
    );
    with_aws_credentials(ServiceDescriptor::new(
        kind,
        ImageRef::new(ICEBERG_REST_IMAGE, ICEBERG_REST_TAG),
        network,
    ))
    .with_alias(service_alias(network, kind))
    .with_env("CATALOG_WAREHOUSE", WAREHOUSE_PATH)
    .with_env("CATALOG_IO__IMPL", "org.apache.iceberg.aws.s3.S3FileIO")
    .with_env("CATALOG_S3_ENDPOINT", s3_endpoint)
    .with_env("CATALOG_S3_PATH__STYLE__ACCESS", "true")
    .with_env("CATALOG_URI", catalog_jdbc_uri(network))
    .with_env("CATALOG_JDBC_USER", ADMIN_USER)
    .with_env("CATALOG_JDBC_PASSWORD", ADMIN_PASSWORD)
    .with_exposed_port(CATALOG_PORT)
    .with_readiness(Readiness::log_pattern(CATALOG_READY_LOG).with_timeout(readiness_timeout))
}

/// Trino with the rendered Iceberg catalog file mounted.
pub fn query_engine(network: &str, version: &str, catalog_file: &Path) -> ServiceDescriptor {
    let kind = ServiceKind::QueryEngine;
    with_aws_credentials(ServiceDescriptor::new(
        kind,
        ImageRef::new(TRINO_IMAGE, version),
        network,
    ))
    .with_alias(service_alias(network, kind))
    .with_exposed_port(TRINO_PORT)
    .with_volume(catalog_file, TRINO_CATALOG_FILE)
    .with_readiness(Readiness::log_pattern(TRINO_READY_LOG))
}

fn uses_native_s3(trino_version: &str) -> bool {
    let digits: String = trino_version
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits
        .parse::<u32>()
        .map(|release| release >= NATIVE_S3_SINCE)
        .unwrap_or(true)
}

/// Contents of Trino's `iceberg.properties` for a fixture on `network`.
pub fn catalog_properties(network: &str, trino_version: &str) -> String {
    let catalog_uri = format!(
        "http://{}:{}",
        service_alias(network, ServiceKind::Catalog),
        CATALOG_PORT
    );
    let s3_endpoint = format!(
        "http://{}:{}",
        service_alias(network, ServiceKind::ObjectStore),
        MINIO_PORT
    );

    let mut lines = vec![
        "connector.name=iceberg".to_string(),
        "iceberg.catalog.type=rest".to_string(),
        format!("iceberg.rest-catalog.uri={catalog_uri}"),
        format!("iceberg.rest-catalog.warehouse={WAREHOUSE_PATH}"),
        "iceberg.file-format=PARQUET".to_string(),
    ];
    if uses_native_s3(trino_version) {
        lines.extend([
            "fs.native-s3.enabled=true".to_string(),
            format!("s3.endpoint={s3_endpoint}"),
            format!("s3.region={AWS_REGION}"),
            "s3.path-style-access=true".to_string(),
            format!("s3.aws-access-key={ADMIN_USER}"),
            format!("s3.aws-secret-key={ADMIN_PASSWORD}"),
        ]);
    } else {
        lines.extend([
            format!("hive.s3.endpoint={s3_endpoint}"),
            format!("hive.s3.region={AWS_REGION}"),
            "hive.s3.path-style-access=true".to_string(),
            format!("hive.s3.aws-access-key={ADMIN_USER}"),
            format!("hive.s3.aws-secret-key={ADMIN_PASSWORD}"),
        ]);
    }

    let mut contents = lines.join("\n");
    contents.push('\n');
    contents
}

/// Fresh host directory for `kind`'s bind mounts.
pub fn scratch_dir(kind: ServiceKind) -> Result<TempDir, FixtureError> {
    tempfile::Builder::new()
        .prefix(&format!("icekit-{}-", kind.alias()))
        .tempdir()
        .map_err(|e| FixtureError::DescriptorBuildFailed {
            service: kind.to_string(),
            reason: format!("temp dir: {}", e)
        })
}

/// Writes the query engine's catalog file into `dir`.
pub fn write_catalog_properties(dir: &Path, contents: &str) -> Result<PathBuf, FixtureError> {
    let path = dir.join("iceberg.properties");
    std::fs::write(&path, contents).map_err(|e| FixtureError::DescriptorBuildFailed {
        service: ServiceKind::QueryEngine.to_string(),
        reason: format!("writing {}: {}", path.display(), e)
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET: &str = "icekit-0123456789ab";

    #[test]
    fn test_metadata_store_descriptor() {
        let descriptor = metadata_store(NET, "13", Path::new("/tmp/pg"));

        assert_eq!(descriptor.image.to_string(), "postgres:13");
        assert_eq!(descriptor.network, NET);
        assert_eq!(descriptor.container_name(), "icekit-0123456789ab-postgres");
        assert_eq!(descriptor.env["POSTGRES_DB"], "demo_catalog");
        assert_eq!(descriptor.env["POSTGRES_HOST_AUTH_METHOD"], "md5");
        assert_eq!(descriptor.volumes[0].host_path, PathBuf::from("/tmp/pg"));
        assert_eq!(descriptor.volumes[0].container_path, POSTGRES_DATA);
        assert_eq!(descriptor.readiness, Readiness::listening_port(5432));
    }

    #[test]
    fn test_object_store_descriptor() {
        let descriptor = object_store(NET, Path::new("/tmp/minio"));

        assert_eq!(
            descriptor.image.to_string(),
            "minio/minio:RELEASE.2025-05-24T17-08-30Z"
        );
        assert_eq!(descriptor.exposed_ports, vec![9000]);
        assert_eq!(descriptor.cmd, vec!["server", "/data", "--console-address", ":9001"]);
        assert_eq!(descriptor.env["MINIO_DOMAIN"], "icekit-0123456789ab-minio");
        assert_eq!(descriptor.readiness, Readiness::listening_port(9000));
    }

    #[test]
    fn test_bootstrap_targets_object_store_alias() {
        let descriptor = object_store_bootstrap(NET);

        assert_eq!(descriptor.entrypoint.as_deref(), Some("/bin/sh"));
        assert_eq!(descriptor.cmd[0], "-c");
        let script = &descriptor.cmd[1];
        assert!(script.contains("mc alias set minio http://icekit-0123456789ab-minio:9000 admin password"));
        assert!(script.contains("mc mb --ignore-existing minio/warehouse"));
        assert!(script.contains("mc anonymous set public minio/warehouse"));
        assert!(script.ends_with("tail -f /dev/null"));
        assert_eq!(descriptor.readiness, Readiness::Started);
    }

    #[test]
    fn test_catalog_descriptor_wires_dependencies() {
        let descriptor = catalog(NET, Duration::from_secs(30));

        assert_eq!(descriptor.image.to_string(), "tabulario/iceberg-rest:1.6.0");
        assert_eq!(
            descriptor.env["CATALOG_URI"],
            "jdbc:postgresql://icekit-0123456789ab-postgres:5432/demo_catalog"
        );
        assert_eq!(
            descriptor.env["CATALOG_S3_ENDPOINT"],
            "http://icekit-0123456789ab-minio:9000"
        );
        assert_eq!(descriptor.env["CATALOG_WAREHOUSE"], "s3://warehouse/");
        assert_eq!(descriptor.env["AWS_REGION"], "us-east-1");
        assert_eq!(
            descriptor.readiness,
            Readiness::log_pattern("Started").with_timeout(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_query_engine_descriptor() {
        let descriptor = query_engine(NET, "419", Path::new("/tmp/trino/iceberg.properties"));

        assert_eq!(descriptor.image.to_string(), "trinodb/trino:419");
        assert_eq!(descriptor.exposed_ports, vec![8080]);
        assert_eq!(descriptor.volumes[0].container_path, TRINO_CATALOG_FILE);
        assert_eq!(descriptor.env["AWS_ACCESS_KEY_ID"], "admin");
        assert_eq!(descriptor.readiness.timeout(), None);
    }

    #[test]
    fn test_catalog_properties_native_s3() {
        let contents = catalog_properties(NET, "466");

        assert!(contents.contains("iceberg.rest-catalog.uri=http://icekit-0123456789ab-iceberg-rest:8181\n"));
        assert!(contents.contains("fs.native-s3.enabled=true\n"));
        assert!(contents.contains("s3.endpoint=http://icekit-0123456789ab-minio:9000\n"));
        assert!(!contents.contains("hive.s3"));
    }

    #[test]
    fn test_catalog_properties_legacy_s3() {
        let contents = catalog_properties(NET, "419");

        assert!(contents.contains("hive.s3.endpoint=http://icekit-0123456789ab-minio:9000\n"));
        assert!(contents.contains("hive.s3.path-style-access=true\n"));
        assert!(!contents.contains("fs.native-s3"));
    }

    #[test]
    fn test_non_numeric_versions_use_native_s3() {
        assert!(uses_native_s3("latest"));
        assert!(uses_native_s3("466-amd64"));
        assert!(!uses_native_s3("432"));
    }

    #[test]
    fn test_write_catalog_properties() {
        let dir = scratch_dir(ServiceKind::QueryEngine).unwrap();
        let path = write_catalog_properties(dir.path(), "connector.name=iceberg\n").unwrap();

        assert_eq!(path, dir.path().join("iceberg.properties"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "connector.name=iceberg\n");
    }

    #[test]
    fn test_unwritable_catalog_dir_fails_descriptor_build() {
        let dir = scratch_dir(ServiceKind::QueryEngine).unwrap();
        let missing = dir.path().join("gone");

        let err = write_catalog_properties(&missing, "connector.name=iceberg\n").unwrap_err();

        assert!(matches!(
            err,
            FixtureError::DescriptorBuildFailed { ref service, .. } if service == "query-engine"
        ));
    }
}

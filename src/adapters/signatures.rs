//! Built-in boundary signature table.
//!
//! Covers the common I/O libraries of the Python, JavaScript/TypeScript, Go, Java and
//! Rust ecosystems. Projects extend or replace it through the `signatures` section of
//! the analysis config.

use crate::domain::boundary::{BoundaryCategory, SignatureTable};

const NETWORK: &[&str] = &[
    // python
    "requests.*",
    "httpx.*",
    "aiohttp.*",
    "urllib.request.*",
    "urllib3.*",
    "http.client.*",
    "socket.*",
    "grpc.*",
    "smtplib.*",
    // javascript / typescript
    "fetch",
    "axios.*",
    "http.request",
    "https.request",
    // go
    "net.http.*",
    // java
    "java.net.*",
    "okhttp3.*",
    // rust
    "reqwest.*",
    "hyper.*",
];

const STORAGE: &[&str] = &[
    "sqlite3.*",
    "sqlalchemy.*",
    "psycopg2.*",
    "psycopg.*",
    "pymysql.*",
    "pymongo.*",
    "redis.*",
    "boto3.*",
    "django.db.*",
    "mongoose.*",
    "pg.*",
    "database.sql.*",
    "java.sql.*",
    "javax.persistence.*",
    "sqlx.*",
    "diesel.*",
    "*.execute",
    "*.executemany",
    "*.commit",
];

const PROCESS: &[&str] = &[
    "open",
    "builtins.open",
    "io.open",
    "os.system",
    "os.popen",
    "os.remove",
    "os.unlink",
    "os.makedirs",
    "os.listdir",
    "os.environ",
    "shutil.*",
    "subprocess.*",
    "pathlib.Path.*",
    "fs.*",
    "child_process.*",
    "process.env",
    "os.exec.*",
    "java.io.*",
    "java.nio.file.*",
    "std.fs.*",
    "std.process.*",
    "std.env.*",
];

/// Default table: network first, then storage, then process.
pub fn builtin_signatures() -> SignatureTable {
    SignatureTable::default()
        .with_rule(BoundaryCategory::Network, NETWORK)
        .with_rule(BoundaryCategory::Storage, STORAGE)
        .with_rule(BoundaryCategory::Process, PROCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::boundary::BoundaryDetector;

    #[test]
    fn test_builtin_table_compiles_and_classifies() {
        let detector = BoundaryDetector::from_table(&builtin_signatures()).unwrap();
        let category = |sig: &str| detector.classify_signature(sig).map(|m| m.node.category);

        assert_eq!(category("requests.get"), Some(BoundaryCategory::Network));
        assert_eq!(category("fetch"), Some(BoundaryCategory::Network));
        assert_eq!(category("sqlalchemy.orm.Session.query"), Some(BoundaryCategory::Storage));
        assert_eq!(category("self.db.execute"), Some(BoundaryCategory::Storage));
        assert_eq!(category("subprocess.run"), Some(BoundaryCategory::Process));
        assert_eq!(category("open"), Some(BoundaryCategory::Process));
        assert_eq!(category("os.path.join"), None);
        assert_eq!(category("json.dumps"), None);
    }

    #[test]
    fn test_categories_are_tried_in_order() {
        let table = builtin_signatures();
        let order: Vec<BoundaryCategory> = table.rules.iter().map(|r| r.category).collect();
        assert_eq!(
            order,
            vec![
                BoundaryCategory::Network,
                BoundaryCategory::Storage,
                BoundaryCategory::Process
            ]
        );
    }
}

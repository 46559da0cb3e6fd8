//! Static module tables used when turning imports into pip requirements

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Packages every generated application needs regardless of its imports
pub const FRAMEWORK_PACKAGES: &[&str] = &["quixstreams"];

static STDLIB: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "__future__", "abc", "argparse", "array", "ast", "asyncio", "atexit", "base64",
        "binascii", "bisect", "builtins", "bz2", "calendar", "cmath", "codecs", "collections",
        "concurrent", "configparser", "contextlib", "contextvars", "copy", "csv", "ctypes",
        "dataclasses", "datetime", "decimal", "difflib", "dis", "email", "enum", "errno",
        "fcntl", "filecmp", "fnmatch", "fractions", "ftplib", "functools", "gc", "getpass",
        "gettext", "glob", "gzip", "hashlib", "heapq", "hmac", "html", "http", "imaplib",
        "importlib", "inspect", "io", "ipaddress", "itertools", "json", "keyword", "linecache",
        "locale", "logging", "lzma", "mailbox", "math", "mimetypes", "mmap", "multiprocessing",
        "numbers", "operator", "os", "pathlib", "pickle", "pkgutil", "platform", "plistlib",
        "pprint", "profile", "queue", "random", "re", "reprlib", "resource", "sched", "secrets",
        "select", "selectors", "shelve", "shlex", "shutil", "signal", "smtplib", "socket",
        "socketserver", "sqlite3", "ssl", "stat", "statistics", "string", "struct",
        "subprocess", "sys", "sysconfig", "tarfile", "tempfile", "textwrap", "threading",
        "time", "timeit", "tkinter", "token", "tokenize", "traceback", "types", "typing",
        "unicodedata", "unittest", "urllib", "uuid", "warnings", "weakref", "xml", "xmlrpc",
        "zipfile", "zlib", "zoneinfo",
    ]
    .into_iter()
    .collect()
});

/// Import name → pip distribution name, where they differ
static TOP_LEVEL: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("sklearn", "scikit-learn"),
        ("PIL", "Pillow"),
        ("yaml", "PyYAML"),
        ("cv2", "opencv-python"),
        ("bs4", "beautifulsoup4"),
        ("dotenv", "python-dotenv"),
        ("kafka", "kafka-python"),
        ("confluent_kafka", "confluent-kafka"),
        ("psycopg2", "psycopg2-binary"),
        ("MySQLdb", "mysqlclient"),
        ("mysql", "mysql-connector-python"),
        ("jwt", "PyJWT"),
        ("dateutil", "python-dateutil"),
        ("magic", "python-magic"),
        ("serial", "pyserial"),
        ("usb", "pyusb"),
        ("Crypto", "pycryptodome"),
        ("OpenSSL", "pyOpenSSL"),
        ("influxdb_client", "influxdb-client"),
        ("paho", "paho-mqtt"),
        ("snowflake", "snowflake-connector-python"),
        ("azure", "azure-storage-blob"),
        ("elasticsearch", "elasticsearch"),
        ("attr", "attrs"),
        ("google", "google-cloud-core"),
    ])
});

/// Dotted import paths that name a specific distribution
static DOTTED: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("google.cloud.bigquery", "google-cloud-bigquery"),
        ("google.cloud.storage", "google-cloud-storage"),
        ("google.cloud.pubsub", "google-cloud-pubsub"),
        ("google.cloud.pubsub_v1", "google-cloud-pubsub"),
        ("google.cloud.firestore", "google-cloud-firestore"),
        ("google.protobuf", "protobuf"),
        ("azure.storage.blob", "azure-storage-blob"),
        ("azure.eventhub", "azure-eventhub"),
        ("azure.cosmos", "azure-cosmos"),
        ("azure.identity", "azure-identity"),
        ("paho.mqtt", "paho-mqtt"),
        ("snowflake.connector", "snowflake-connector-python"),
        ("mysql.connector", "mysql-connector-python"),
    ])
});

pub fn is_stdlib(top_level: &str) -> bool {
    STDLIB.contains(top_level)
}

/// Resolve a dotted import path to a pip name.
///
/// The longest matching dotted prefix wins, then the top-level table, then
/// the top-level module name itself.
pub fn pip_name(path: &str) -> String {
    let mut prefix = path;
    loop {
        if let Some(name) = DOTTED.get(prefix) {
            return (*name).to_string();
        }
        match prefix.rfind('.') {
            Some(idx) => prefix = &prefix[..idx],
            None => break,
        }
    }

    let top = path.split('.').next().unwrap_or(path);
    TOP_LEVEL
        .get(top)
        .map(|name| (*name).to_string())
        .unwrap_or_else(|| top.to_string())
}

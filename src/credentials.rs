//! Credential field name normalization
//!
//! Connection details arrive with every naming convention imaginable
//! (`DB_HOST`, `Host Name`, `serverAddress`, ...). This module maps them onto a
//! small canonical vocabulary so prompts and generated code can rely on
//! stable keys.

use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Canonical field names with their known synonyms.
///
/// Order matters: the fuzzy pass walks this table top to bottom and the first
/// synonym contained in the field name wins.
const FIELD_SYNONYMS: &[(&str, &[&str])] = &[
    ("password", &["password", "pass", "passwd", "pwd", "userpassword", "dbpassword"]),
    ("secret", &["secret", "secretkey", "clientsecret", "apisecret", "secretaccesskey"]),
    ("token", &["token", "accesstoken", "authtoken", "bearertoken", "pat"]),
    ("api_key", &["apikey", "accesskey", "accesskeyid", "key", "subscriptionkey"]),
    ("user", &["user", "username", "login", "userid", "uid", "dbuser", "account"]),
    ("port", &["port", "portnumber", "dbport"]),
    ("host", &["host", "hostname", "server", "servername", "address", "hostaddress", "endpoint", "dbhost"]),
    ("database", &["database", "db", "dbname", "databasename", "catalog", "initialcatalog"]),
    ("region", &["region", "location", "zone", "awsregion"]),
    ("bucket", &["bucket", "bucketname", "container"]),
    ("table", &["table", "tablename", "collection", "measurement"]),
    ("url", &["url", "uri", "baseurl", "connectionstring", "dsn"]),
];

/// Synonyms shorter than this only match exactly, never by containment
const MIN_FUZZY_LEN: usize = 4;

/// Strip everything but ASCII letters and digits, and lowercase
pub fn strip_field_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Canonical name for a field, if one matches
pub fn canonical_field(name: &str) -> Option<&'static str> {
    let stripped = strip_field_name(name);
    if stripped.is_empty() {
        return None;
    }

    let exact = FIELD_SYNONYMS
        .iter()
        .find(|(_, synonyms)| synonyms.contains(&stripped.as_str()))
        .map(|(canonical, _)| *canonical);
    if exact.is_some() {
        return exact;
    }

    FIELD_SYNONYMS
        .iter()
        .find(|(_, synonyms)| {
            synonyms
                .iter()
                .any(|syn| syn.len() >= MIN_FUZZY_LEN && stripped.contains(syn))
        })
        .map(|(canonical, _)| *canonical)
}

/// Normalize a field name to its canonical form.
///
/// Unknown names come back stripped and lowercased.
pub fn normalize_field_name(name: &str) -> String {
    canonical_field(name)
        .map(str::to_string)
        .unwrap_or_else(|| strip_field_name(name))
}

fn is_canonical(name: &str) -> bool {
    FIELD_SYNONYMS.iter().any(|(canonical, _)| *canonical == name)
}

/// Rename credential keys to canonical names, keeping the input order.
///
/// Keys already spelled canonically always keep their name. Other keys take
/// the canonical name they map to unless it is already taken; when several
/// keys map to the same name the earliest one wins and the rest pass through
/// under their original names. Unmapped keys pass through unchanged, which
/// makes the mapping idempotent.
pub fn map_to_standard(credentials: &IndexMap<String, String>) -> IndexMap<String, String> {
    let mut claimed: BTreeSet<&str> = credentials
        .keys()
        .map(String::as_str)
        .filter(|k| is_canonical(k))
        .collect();
    let mut mapped = IndexMap::with_capacity(credentials.len());

    for (key, value) in credentials {
        let name = match canonical_field(key) {
            _ if is_canonical(key) => key.as_str(),
            Some(canonical) if claimed.insert(canonical) => canonical,
            _ => key.as_str(),
        };
        mapped.insert(name.to_string(), value.clone());
    }

    mapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_host_spellings_normalize_to_host() {
        assert_eq!(normalize_field_name("Host Name"), "host");
        assert_eq!(normalize_field_name("hostname"), "host");
        assert_eq!(normalize_field_name("DB_HOST"), "host");
        assert_eq!(normalize_field_name("serverAddress"), "host");
    }

    #[test]
    fn test_exact_match_beats_fuzzy() {
        // "dbpassword" contains "db" but matches password exactly first
        assert_eq!(normalize_field_name("db_password"), "password");
        assert_eq!(normalize_field_name("DB"), "database");
    }

    #[test]
    fn test_fuzzy_containment() {
        assert_eq!(normalize_field_name("postgres_user_name"), "user");
        assert_eq!(normalize_field_name("my-database-name"), "database");
        assert_eq!(normalize_field_name("AWS_SECRET_ACCESS_KEY"), "secret");
    }

    #[test]
    fn test_short_synonyms_do_not_match_fuzzily() {
        // "db" is too short to match inside another word
        assert_eq!(normalize_field_name("dbx_flag"), "dbxflag");
    }

    #[test]
    fn test_unknown_field_is_stripped() {
        assert_eq!(normalize_field_name("Sample-Rate"), "samplerate");
        assert_eq!(canonical_field("Sample-Rate"), None);
        assert_eq!(canonical_field("!!!"), None);
    }

    #[test]
    fn test_map_to_standard_renames_and_passes_through() {
        let input = creds(&[
            ("Host Name", "db.example.com"),
            ("Port Number", "5432"),
            ("dbname", "metrics"),
            ("sslmode", "require"),
        ]);
        let mapped = map_to_standard(&input);
        assert_eq!(mapped.get("host").unwrap(), "db.example.com");
        assert_eq!(mapped.get("port").unwrap(), "5432");
        assert_eq!(mapped.get("database").unwrap(), "metrics");
        assert_eq!(mapped.get("sslmode").unwrap(), "require");
        assert_eq!(mapped.len(), 4);
    }

    #[test]
    fn test_collision_first_match_wins() {
        let input = creds(&[("hostname", "a"), ("server", "b")]);
        let mapped = map_to_standard(&input);
        assert_eq!(mapped.get("host").unwrap(), "a");
        assert_eq!(mapped.get("server").unwrap(), "b");
    }

    #[test]
    fn test_collision_follows_input_order() {
        let input = creds(&[("server", "primary"), ("hostname", "fallback")]);
        let mapped = map_to_standard(&input);
        assert_eq!(mapped.get("host").unwrap(), "primary");
        assert_eq!(mapped.get("hostname").unwrap(), "fallback");
        let keys: Vec<_> = mapped.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["host", "hostname"]);
    }

    #[test]
    fn test_canonical_key_keeps_its_slot() {
        let input = creds(&[("address", "from-address"), ("host", "from-host")]);
        let mapped = map_to_standard(&input);
        assert_eq!(mapped.get("host").unwrap(), "from-host");
        assert_eq!(mapped.get("address").unwrap(), "from-address");
    }

    #[test]
    fn test_map_to_standard_is_idempotent() {
        let inputs = vec![
            creds(&[("Host Name", "h"), ("USER", "u"), ("Pass", "p")]),
            creds(&[("hostname", "a"), ("server", "b"), ("host", "c")]),
            creds(&[("api-key", "k"), ("secret_key", "s"), ("weird", "w")]),
            creds(&[]),
        ];
        for input in inputs {
            let once = map_to_standard(&input);
            let twice = map_to_standard(&once);
            assert_eq!(once, twice);
        }
    }
}

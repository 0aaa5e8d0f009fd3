use crate::bounded::{self, strip};
use crate::config::Config;
use crate::identity::Identity;
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::{debug, warn};

/// Longest pronoun line kept, in bytes.
pub const MAX_LINE: usize = 256;

/// Pronouns for `identity`: the stripped first line of its pronoun file plus a newline, or the
/// configured default when the file is missing, unreadable or empty.
pub async fn lookup(identity: &Identity, config: &Config) -> String {
    let path = identity.home_directory.join(&config.pronoun_file_name);

    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(_) => return config.default_pronouns.clone(),
    };

    let line = match bounded::read_line(BufReader::new(file), MAX_LINE).await {
        Ok(line) => line,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not read pronoun file");
            return config.default_pronouns.clone();
        }
    };

    if line.consumed == 0 {
        return config.default_pronouns.clone();
    }

    if line.overflowed {
        warn!(
            path = %path.display(),
            limit = MAX_LINE,
            "pronoun file line too long; truncating"
        );
    }

    let text = line.to_text();
    let pronouns = strip(&text);

    format!("{pronouns}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn home_with(contents: Option<&str>) -> (TempDir, Identity) {
        let home = tempfile::tempdir().unwrap();
        if let Some(contents) = contents {
            fs::write(home.path().join(".pronouns"), contents).unwrap();
        }

        let identity = Identity {
            uid: 1000,
            home_directory: home.path().to_owned(),
        };

        (home, identity)
    }

    #[tokio::test]
    async fn first_line_stripped() {
        let (_home, identity) = home_with(Some("  she/her \r\nignored\n"));
        assert_eq!(lookup(&identity, &Config::default()).await, "she/her\n");
    }

    #[tokio::test]
    async fn internal_spaces_are_kept() {
        let (_home, identity) = home_with(Some("\tany pronouns, just ask\n"));
        assert_eq!(
            lookup(&identity, &Config::default()).await,
            "any pronouns, just ask\n"
        );
    }

    #[tokio::test]
    async fn missing_file_uses_default() {
        let (_home, identity) = home_with(None);
        assert_eq!(
            lookup(&identity, &Config::default()).await,
            "not specified\n"
        );
    }

    #[tokio::test]
    async fn empty_file_uses_default() {
        let (_home, identity) = home_with(Some(""));
        let config = Config {
            default_pronouns: "they/them\n".to_owned(),
            ..Config::default()
        };
        assert_eq!(lookup(&identity, &config).await, "they/them\n");
    }

    #[tokio::test]
    async fn blank_first_line_is_a_bare_newline() {
        let (_home, identity) = home_with(Some("\n"));
        assert_eq!(lookup(&identity, &Config::default()).await, "\n");

        let (_home, identity) = home_with(Some("  \t\r\n he/him\n"));
        assert_eq!(lookup(&identity, &Config::default()).await, "\n");
    }

    #[tokio::test]
    async fn configured_file_name() {
        let (home, identity) = home_with(Some("wrong file\n"));
        fs::write(home.path().join("pronouns.txt"), "xe/xem").unwrap();

        let config = Config {
            pronoun_file_name: "pronouns.txt".to_owned(),
            ..Config::default()
        };
        assert_eq!(lookup(&identity, &config).await, "xe/xem\n");
    }

    #[tokio::test]
    async fn long_line_is_truncated() {
        let long = "x".repeat(MAX_LINE + 50);
        let (_home, identity) = home_with(Some(&long));

        let got = lookup(&identity, &Config::default()).await;
        assert_eq!(got.len(), MAX_LINE + 1);
        assert!(got.ends_with('\n'));
    }

    #[tokio::test]
    async fn directory_instead_of_file_uses_default() {
        let (home, identity) = home_with(None);
        fs::create_dir(home.path().join(".pronouns")).unwrap();

        assert_eq!(
            lookup(&identity, &Config::default()).await,
            "not specified\n"
        );
    }
}

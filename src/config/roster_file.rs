//! Line-based roster file:
//!
//! ```text
//! # comment
//! [main]
//! platform: psn
//! username: Alice
//!
//! [ally1]
//! platform: ubisoft
//! username: Bob
//! ```

use crate::domain::{Platform, PlayerIdentity, Roster, MAX_ALLIES};
use crate::error::{Result, TrackerError};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct Section {
    name: String,
    entries: HashMap<String, String>,
}

impl Section {
    fn player(&self) -> Option<(&str, &str)> {
        Some((
            self.entries.get("platform")?.as_str(),
            self.entries.get("username")?.as_str(),
        ))
    }
}

fn sections(contents: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<Section> = None;

    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            sections.extend(current.take());
            current = Some(Section {
                name: name.trim().to_lowercase(),
                ..Section::default()
            });
            continue;
        }
        if let (Some(section), Some((key, value))) = (current.as_mut(), line.split_once(':')) {
            section
                .entries
                .insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }
    sections.extend(current);
    sections
}

pub fn parse_roster(contents: &str) -> Result<Roster> {
    let mut main = None;
    let mut allies = Vec::new();

    for section in sections(contents) {
        let Some((platform, username)) = section.player() else {
            warn!("Skipping incomplete [{}] section", section.name);
            continue;
        };

        if section.name == "main" {
            let platform: Platform = platform.parse().map_err(|_| {
                TrackerError::Config(format!(
                    "platform '{platform}' not valid for [main], expected psn, xbox or ubisoft"
                ))
            })?;
            main = Some(PlayerIdentity::new(username, platform)?);
        } else if section.name.starts_with("ally") {
            if allies.len() == MAX_ALLIES {
                warn!("Ignoring [{}]: at most {} allies", section.name, MAX_ALLIES);
                continue;
            }
            match PlayerIdentity::parse(username, platform) {
                Ok(identity) => allies.push(identity),
                Err(e) => warn!("Skipping [{}]: {}", section.name, e),
            }
        }
    }

    let main =
        main.ok_or_else(|| TrackerError::Config("[main] section not found or incomplete".into()))?;
    Roster::new(Some(main), allies, Vec::new())
}

pub fn load_roster(path: &Path) -> Result<Roster> {
    let contents = std::fs::read_to_string(path)?;
    let roster = parse_roster(&contents)?;
    info!(
        "Loaded roster from {:?}: main + {} allies",
        path,
        roster.allies().len()
    );
    Ok(roster)
}

/// Main and allies in file form. Enemies are per match and never written.
pub fn render_roster(roster: &Roster) -> Result<String> {
    let main = roster
        .main()
        .ok_or_else(|| TrackerError::Config("no main player to save".into()))?;

    let mut out = String::new();
    let sections = std::iter::once(("main".to_string(), main)).chain(
        roster
            .allies()
            .iter()
            .enumerate()
            .map(|(i, ally)| (format!("ally{}", i + 1), ally)),
    );
    for (name, player) in sections {
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "[{name}]\nplatform: {}\nusername: {}\n",
            player.platform().as_str(),
            player.username()
        );
    }
    Ok(out)
}

pub fn save_roster(path: &Path, roster: &Roster) -> Result<()> {
    std::fs::write(path, render_roster(roster)?)?;
    info!("Saved roster to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;

    const SAMPLE: &str = "\
# Players for tonight
[main]
platform: PSN
username: Alice

[ally1]
platform: ubisoft
username: Bob

[ally2]
username: NoPlatform

[ally3]
platform: stadia
username: Carol

[ally4]
platform: xbox
username: Dave: The Brave
";

    #[test]
    fn parses_sections() {
        let roster = parse_roster(SAMPLE).unwrap();

        let main = roster.main().unwrap();
        assert_eq!(main.username(), "Alice");
        assert_eq!(main.platform(), Platform::Psn);

        let allies: Vec<_> = roster.allies().iter().map(|a| a.username()).collect();
        assert_eq!(allies, ["Bob", "Dave: The Brave"]);
        assert!(roster.enemies().is_empty());
    }

    #[test]
    fn main_is_required() {
        let err = parse_roster("[ally1]\nplatform: psn\nusername: Bob\n").unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[test]
    fn invalid_main_platform_is_a_config_error() {
        let err = parse_roster("[main]\nplatform: gamecube\nusername: Alice\n").unwrap_err();
        assert!(err.to_string().contains("gamecube"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        let roster = Roster::new(
            Some(PlayerIdentity::new("Alice", Platform::Xbox).unwrap()),
            vec![PlayerIdentity::new("Bob", Platform::Ubisoft).unwrap()],
            vec![PlayerIdentity::new("Eve", Platform::Psn).unwrap()],
        )
        .unwrap();

        save_roster(&path, &roster).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("[main]\nplatform: xbox\nusername: Alice\n"));
        assert!(!written.contains("Eve"));

        let loaded = load_roster(&path).unwrap();
        assert_eq!(loaded.main(), roster.main());
        assert_eq!(loaded.allies(), roster.allies());
        assert!(loaded.enemies().is_empty());
    }

    #[test]
    fn nothing_to_save_without_main() {
        assert!(render_roster(&Roster::default()).is_err());
    }
}

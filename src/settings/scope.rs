//! Settings scopes.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A precedence tier for settings, lowest first.
///
/// The derived ordering is the precedence order: `Bundled < User < Project <
/// Local < Session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Defaults compiled into the binary
    Bundled,
    /// `~/.amplifier/settings.yaml`
    User,
    /// `.amplifier/settings.yaml` (committed, team-shared)
    Project,
    /// `.amplifier/settings.local.yaml` (gitignored, machine-specific)
    Local,
    /// Per-session settings under `~/.amplifier/projects/`
    Session,
}

impl Scope {
    /// All scopes, lowest precedence first.
    pub const ALL: [Scope; 5] = [
        Scope::Bundled,
        Scope::User,
        Scope::Project,
        Scope::Local,
        Scope::Session,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Bundled => "bundled",
            Scope::User => "user",
            Scope::Project => "project",
            Scope::Local => "local",
            Scope::Session => "session",
        }
    }

    /// Whether settings at this scope live in a file that can be written.
    pub fn is_writable(&self) -> bool {
        !matches!(self, Scope::Bundled)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bundled" => Ok(Scope::Bundled),
            "user" | "global" => Ok(Scope::User),
            "project" => Ok(Scope::Project),
            "local" => Ok(Scope::Local),
            "session" => Ok(Scope::Session),
            _ => {
                let writable: Vec<&str> = Scope::ALL
                    .iter()
                    .filter(|scope| scope.is_writable())
                    .map(Scope::as_str)
                    .collect();
                Err(format!("Invalid scope: {}. Use one of: {}", s, writable.join(", ")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_ordering_is_precedence() {
        let mut shuffled = vec![Scope::Local, Scope::Bundled, Scope::Session, Scope::User, Scope::Project];
        shuffled.sort();
        assert_eq!(shuffled, Scope::ALL.to_vec());
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!("global".parse::<Scope>().unwrap(), Scope::User);
        assert_eq!("Project".parse::<Scope>().unwrap(), Scope::Project);
        let err = "team".parse::<Scope>().unwrap_err();
        assert_eq!(err, "Invalid scope: team. Use one of: user, project, local, session");
    }

    #[test]
    fn test_scope_display_roundtrip() {
        for scope in Scope::ALL {
            assert_eq!(scope.to_string().parse::<Scope>().unwrap(), scope);
        }
    }
}

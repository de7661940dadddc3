//! Backend surfaces that need their own authenticated session.

use std::fmt;
use std::str::FromStr;

use portal_types::PortalError;

/// A backend domain reachable through the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Academic records.
    Mycqu,
    /// Campus card.
    Card,
    Library,
}

impl Surface {
    pub const ALL: [Surface; 3] = [Surface::Mycqu, Surface::Card, Surface::Library];

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Mycqu => "mycqu",
            Surface::Card => "card",
            Surface::Library => "library",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Surface::ALL
            .into_iter()
            .find(|surface| surface.as_str() == s)
            .ok_or_else(|| PortalError::InvalidParameter(format!("unknown surface '{s}'")))
    }
}

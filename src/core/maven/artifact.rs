use std::fmt;
use std::str::FromStr;

use crate::core::error::LauncherError;

/// `group:artifact:version[:classifier][@ext]`, as found in the `name` of
/// legacy library entries that carry no `downloads` block.
///
/// ```
/// use pure_launcher_core::core::maven::MavenCoordinate;
///
/// let lib: MavenCoordinate = "net.sf.jopt-simple:jopt-simple:5.0.4".parse().unwrap();
/// assert_eq!(lib.relative_path(), "net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MavenCoordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl FromStr for MavenCoordinate {
    type Err = LauncherError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (coords, extension) = match raw.rsplit_once('@') {
            Some((coords, ext)) if !ext.is_empty() => (coords, ext),
            _ => (raw, "jar"),
        };

        let mut parts = coords.split(':');
        let (Some(group), Some(artifact), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(LauncherError::InvalidMavenCoordinate(raw.to_string()));
        };
        let classifier = parts.next().map(str::to_string);
        if parts.next().is_some() || [group, artifact, version].iter().any(|p| p.is_empty()) {
            return Err(LauncherError::InvalidMavenCoordinate(raw.to_string()));
        }

        Ok(Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.to_string(),
            classifier,
            extension: extension.to_string(),
        })
    }
}

impl MavenCoordinate {
    /// Same coordinate with `classifier` replacing any existing one.
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    fn file_name(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{}.{}", self.artifact, self.version, c, self.extension),
            None => format!("{}-{}.{}", self.artifact, self.version, self.extension),
        }
    }

    /// Repository layout path, `/`-separated on every platform.
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.file_name()
        )
    }

    pub fn url(&self, repository: &str) -> String {
        format!("{}/{}", repository.trim_end_matches('/'), self.relative_path())
    }
}

impl fmt::Display for MavenCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        if self.extension != "jar" {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}

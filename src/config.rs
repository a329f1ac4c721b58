use crate::{key, ByteSize, Error};
use std::collections::BTreeSet;

/// Defines when an output file is closed and the next part started.
///
/// Both limits may be active at once; whichever trips first closes the file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Limits {
    /// Close the file once at least this many bytes (header included) are written.
    pub max_bytes: Option<u64>,

    /// Close the file once at least this many data rows are written.
    pub max_rows: Option<u64>,
}

impl Limits {
    pub fn is_unbounded(&self) -> bool {
        self.max_bytes.is_none() && self.max_rows.is_none()
    }

    /// Returns true if a file holding `bytes` bytes and `rows` data rows should be closed.
    pub fn is_breached(&self, bytes: u64, rows: u64) -> bool {
        self.max_bytes.map_or(false, |max| bytes >= max)
            || self.max_rows.map_or(false, |max| rows >= max)
    }
}

/// The set of group keys that get their own output files when filtering.
///
/// Entries are normalized the same way keys are derived from rows, so
/// `.TXT` and `txt` are the same entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowList(BTreeSet<String>);

impl AllowList {
    /// Parses a comma-separated list such as `txt,xml,.PDF`.
    pub fn parse(list: &str) -> Result<Self, Error> {
        Self::from_keys(list.split(','))
    }

    pub fn from_keys<I, S>(keys: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: BTreeSet<String> = keys
            .into_iter()
            .map(|k| key::normalize_extension(k.as_ref()))
            .filter(|k| !k.is_empty())
            .collect();

        if keys.is_empty() {
            return Err(Error::EmptyAllowList);
        }

        Ok(Self(keys))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// How a single input file is split up.
#[derive(Clone, Debug)]
pub struct SplitConfig {
    pub limits: Limits,

    /// Zero-based column whose value picks the output file for each row.
    pub group_column: Option<usize>,

    /// When set, rows are grouped by extension and keys outside the list
    /// land in the overflow file.
    pub allow_list: Option<AllowList>,

    /// Stem for every output file name; default is "split".
    pub prefix: String,

    /// The field delimiter for input and output; default is ','.
    pub delimiter: u8,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            group_column: None,
            allow_list: None,
            prefix: "split".to_owned(),
            delimiter: b',',
        }
    }
}

impl SplitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes output files once they reach `size`.
    pub fn with_max_size(mut self, size: ByteSize) -> Self {
        self.limits.max_bytes = Some(size.bytes());
        self
    }

    /// Closes output files once they hold `rows` data rows.
    pub fn with_max_rows(mut self, rows: u64) -> Self {
        self.limits.max_rows = Some(rows);
        self
    }

    pub fn with_group_column(mut self, column: usize) -> Self {
        self.group_column = Some(column);
        self
    }

    pub fn with_allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = Some(allow_list);
        self
    }

    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Checks that the combination of options describes a runnable split.
    pub fn validate(&self) -> Result<(), Error> {
        if self.limits.is_unbounded() && self.group_column.is_none() {
            return Err(Error::NoCriterionSpecified);
        }

        if self.allow_list.is_some() && self.group_column.is_none() {
            return Err(Error::AllowListWithoutGroupColumn);
        }

        if self.limits.max_bytes == Some(0) {
            return Err(Error::InvalidLimit("size"));
        }

        if self.limits.max_rows == Some(0) {
            return Err(Error::InvalidLimit("row"));
        }

        if self.prefix.trim().is_empty() {
            return Err(Error::InvalidPrefix);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_trip_on_either_bound() {
        let limits = Limits {
            max_bytes: Some(100),
            max_rows: Some(3),
        };

        assert!(!limits.is_breached(99, 2));
        assert!(limits.is_breached(100, 0));
        assert!(limits.is_breached(10, 3));
        assert!(!Limits::default().is_breached(u64::MAX, u64::MAX));
    }

    #[test]
    fn allow_list_is_normalized() {
        let list = AllowList::parse(" TXT, .xml,,pdf ").unwrap();
        let keys: Vec<_> = list.iter().collect();
        assert_eq!(keys, vec!["pdf", "txt", "xml"]);
        assert!(list.contains("xml"));
        assert!(!list.contains("XML"));
    }

    #[test]
    fn blank_allow_list_is_rejected() {
        assert!(matches!(AllowList::parse(" , ,"), Err(Error::EmptyAllowList)));
    }

    #[test]
    fn needs_a_criterion() {
        assert!(matches!(
            SplitConfig::new().validate(),
            Err(Error::NoCriterionSpecified)
        ));
        assert!(SplitConfig::new().with_max_rows(10).validate().is_ok());
        assert!(SplitConfig::new().with_group_column(2).validate().is_ok());
        assert!(SplitConfig::new()
            .with_max_size(ByteSize(1024))
            .validate()
            .is_ok());
    }

    #[test]
    fn rejects_inconsistent_options() {
        let allow = AllowList::parse("txt").unwrap();
        assert!(matches!(
            SplitConfig::new()
                .with_max_rows(5)
                .with_allow_list(allow)
                .validate(),
            Err(Error::AllowListWithoutGroupColumn)
        ));
        assert!(matches!(
            SplitConfig::new().with_max_rows(0).validate(),
            Err(Error::InvalidLimit("row"))
        ));
        assert!(matches!(
            SplitConfig::new().with_max_size(ByteSize(0)).validate(),
            Err(Error::InvalidLimit("size"))
        ));
        assert!(matches!(
            SplitConfig::new().with_max_rows(1).with_prefix(" ").validate(),
            Err(Error::InvalidPrefix)
        ));
    }
}
